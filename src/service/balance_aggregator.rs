//! 余额聚合
//!
//! - 单链视图：通过钱包 provider 读取 `eth_accounts` 下各地址的原生余额、
//!   ENS 名称，以及选中账户的代币持仓
//! - "所有网络"视图：按注册表逐链查询公开只读 RPC，与钱包当前所在链无关
//!
//! 每条链独立、尽力而为：失败或超时的链返回零余额行，整体从不失败。

use std::{sync::Arc, time::Duration};

use ethers::types::U256;
use futures::{future::join_all, stream, StreamExt};
use serde_json::json;

use crate::{
    config::AggregationConfig,
    domain::{
        chain_config::token_list_for_chain, AccountInfo, ChainFamily, Network, NetworkBalanceInfo,
        TokenInfo, TokenListEntry,
    },
    infrastructure::{
        evm_reader::{
            EvmReader, TokenSnapshot, DEFAULT_TOKEN_DECIMALS, UNKNOWN_TOKEN_NAME,
            UNKNOWN_TOKEN_SYMBOL,
        },
        provider::{parse_accounts, ProviderRpcError, RpcTransport},
        rpc_client::{NonEvmBalanceSource, TransportFactory},
    },
    service::chain_registry::NetworkRegistry,
    utils::units::{format_fixed, format_units},
};

/// EVM 原生币精度
const NATIVE_DECIMALS: u8 = 18;
const SOLANA_DECIMALS: u8 = 9;
const BITCOIN_DECIMALS: u8 = 8;

/// 参与"所有网络"聚合的地址
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    pub evm: Vec<String>,
    pub solana: Option<String>,
    pub bitcoin: Option<String>,
}

impl AddressSet {
    pub fn is_empty(&self) -> bool {
        self.evm.is_empty() && self.solana.is_none() && self.bitcoin.is_none()
    }

    fn covers(&self, family: ChainFamily) -> bool {
        match family {
            ChainFamily::Evm => !self.evm.is_empty(),
            ChainFamily::Solana => self.solana.is_some(),
            ChainFamily::Bitcoin => self.bitcoin.is_some(),
        }
    }
}

pub struct BalanceAggregator {
    transports: Arc<dyn TransportFactory>,
    non_evm: Arc<dyn NonEvmBalanceSource>,
    config: AggregationConfig,
}

impl BalanceAggregator {
    pub fn new(
        transports: Arc<dyn TransportFactory>,
        non_evm: Arc<dyn NonEvmBalanceSource>,
        config: AggregationConfig,
    ) -> Self {
        Self {
            transports,
            non_evm,
            config,
        }
    }

    /// 钱包授权的全部账户；只有选中账户加载代币
    pub async fn fetch_accounts<T: RpcTransport + ?Sized>(
        &self,
        transport: &T,
        chain_id: &str,
        selected_index: usize,
    ) -> Result<Vec<AccountInfo>, ProviderRpcError> {
        let addresses = parse_accounts(&transport.request("eth_accounts", json!([])).await?);

        let accounts = join_all(addresses.iter().enumerate().map(|(index, address)| {
            self.fetch_account(transport, chain_id, index, address, index == selected_index)
        }))
        .await;

        tracing::debug!(%chain_id, count = accounts.len(), "Accounts fetched");
        Ok(accounts)
    }

    async fn fetch_account<T: RpcTransport + ?Sized>(
        &self,
        transport: &T,
        chain_id: &str,
        index: usize,
        address: &str,
        with_tokens: bool,
    ) -> AccountInfo {
        let reader = EvmReader::new(transport);
        let (balance, ens_name) = futures::join!(
            reader.native_balance(address),
            reader.lookup_ens_name(address, chain_id),
        );

        let balance = match balance {
            Ok(wei) => wei,
            Err(e) => {
                tracing::warn!(%address, %chain_id, error = %e, "Failed to fetch account balance");
                return AccountInfo::placeholder(index, address);
            }
        };

        let tokens = if with_tokens {
            self.fetch_account_tokens(transport, address, chain_id).await
        } else {
            Vec::new()
        };

        AccountInfo {
            name: ens_name.unwrap_or_else(|| AccountInfo::default_name(index)),
            address: address.to_string(),
            native_balance: format_units(balance, NATIVE_DECIMALS),
            tokens,
        }
    }

    /// 候选代币中余额非零的持仓
    pub async fn fetch_account_tokens<T: RpcTransport + ?Sized>(
        &self,
        transport: &T,
        address: &str,
        chain_id: &str,
    ) -> Vec<TokenInfo> {
        let reader = EvmReader::new(transport);
        let snapshots = join_all(
            token_list_for_chain(chain_id)
                .iter()
                .map(|token| reader.token_snapshot(&token.address, address)),
        )
        .await;

        snapshots
            .into_iter()
            .filter(|s| !s.raw_balance.is_zero())
            .map(TokenSnapshot::into_token_info)
            .collect()
    }

    /// 跨链聚合，行顺序与注册表一致
    pub async fn fetch_all_networks(
        &self,
        registry: &NetworkRegistry,
        addresses: &AddressSet,
    ) -> Vec<NetworkBalanceInfo> {
        let networks: Vec<Network> = registry
            .networks()
            .iter()
            .filter(|n| self.config.include_testnets || !n.is_testnet)
            .filter(|n| addresses.covers(n.family()))
            .cloned()
            .collect();

        let per_chain_timeout = Duration::from_millis(self.config.per_chain_timeout_ms);
        let rows: Vec<NetworkBalanceInfo> = stream::iter(networks)
            .map(|network| async move {
                match tokio::time::timeout(
                    per_chain_timeout,
                    self.fetch_network(registry, &network, addresses),
                )
                .await
                {
                    Ok(Ok(row)) => row,
                    Ok(Err(e)) => {
                        tracing::warn!(chain_id = %network.chain_id, error = %e, "Chain balance fetch failed");
                        NetworkBalanceInfo::empty(&network)
                    }
                    Err(_) => {
                        tracing::warn!(chain_id = %network.chain_id, "Chain balance fetch timed out");
                        NetworkBalanceInfo::empty(&network)
                    }
                }
            })
            .buffered(self.config.max_concurrent_chains.max(1))
            .collect()
            .await;

        tracing::info!(rows = rows.len(), "All-networks aggregation finished");
        rows
    }

    async fn fetch_network(
        &self,
        registry: &NetworkRegistry,
        network: &Network,
        addresses: &AddressSet,
    ) -> anyhow::Result<NetworkBalanceInfo> {
        match network.family() {
            ChainFamily::Evm => self.fetch_evm_network(registry, network, &addresses.evm).await,
            ChainFamily::Solana => {
                let address = addresses.solana.as_deref().unwrap_or_default();
                let lamports = self.non_evm.solana_lamports(address).await?;
                Ok(NetworkBalanceInfo {
                    native_balance: format_fixed(u128::from(lamports), SOLANA_DECIMALS),
                    ..NetworkBalanceInfo::empty(network)
                })
            }
            ChainFamily::Bitcoin => {
                let address = addresses.bitcoin.as_deref().unwrap_or_default();
                let sats = self.non_evm.bitcoin_sats(address).await?;
                Ok(NetworkBalanceInfo {
                    native_balance: format_fixed(u128::from(sats), BITCOIN_DECIMALS),
                    ..NetworkBalanceInfo::empty(network)
                })
            }
        }
    }

    /// 同链多个地址的原生余额与代币余额分别求和
    async fn fetch_evm_network(
        &self,
        registry: &NetworkRegistry,
        network: &Network,
        owners: &[String],
    ) -> anyhow::Result<NetworkBalanceInfo> {
        let url = registry
            .public_rpc(&network.chain_id)
            .ok_or_else(|| anyhow::anyhow!("No public RPC for chain {}", network.chain_id))?;
        let transport = self.transports.transport_for(&network.chain_id, &url);
        let reader = EvmReader::new(transport.as_ref());

        let mut native_total = U256::zero();
        for balance in join_all(owners.iter().map(|owner| reader.native_balance(owner))).await {
            native_total = native_total.saturating_add(balance?);
        }

        let tokens = join_all(
            token_list_for_chain(&network.chain_id)
                .iter()
                .map(|token| Self::token_total(&reader, token, owners)),
        )
        .await
        .into_iter()
        .flatten()
        .map(|mut token| {
            token.chain_id = Some(network.chain_id.clone());
            token.network_name = Some(network.label().to_string());
            token
        })
        .collect();

        Ok(NetworkBalanceInfo {
            chain_id: network.chain_id.clone(),
            network: network.clone(),
            native_balance: format_units(native_total, network.native_currency.decimals),
            tokens,
        })
    }

    /// 余额非零时才查询元数据
    async fn token_total<T: RpcTransport + ?Sized>(
        reader: &EvmReader<'_, T>,
        token: &TokenListEntry,
        owners: &[String],
    ) -> Option<TokenInfo> {
        let total = join_all(owners.iter().map(|owner| reader.balance_of(&token.address, owner)))
            .await
            .into_iter()
            .filter_map(Result::ok)
            .fold(U256::zero(), |acc, b| acc.saturating_add(b));
        if total.is_zero() {
            return None;
        }

        let (decimals, symbol, name) = futures::join!(
            reader.decimals(&token.address),
            reader.symbol(&token.address),
            reader.name(&token.address),
        );

        Some(
            TokenSnapshot {
                address: token.address.to_lowercase(),
                symbol: symbol.unwrap_or_else(|_| UNKNOWN_TOKEN_SYMBOL.to_string()),
                name: name.unwrap_or_else(|_| UNKNOWN_TOKEN_NAME.to_string()),
                decimals: decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
                raw_balance: total,
            }
            .into_token_info(),
        )
    }
}
