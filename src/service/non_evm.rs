//! Solana / Bitcoin 会话
//!
//! 与 EVM 会话相互独立：各自连接注入钱包拿到地址，余额走公共 HTTP 接口。
//! 不参与切链，只为"所有网络"聚合与收款地址提供数据。

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{AccountInfo, BITCOIN_CHAIN_ID, SOLANA_CHAIN_ID},
    error::{WalletError, WalletResult},
    infrastructure::rpc_client::NonEvmBalanceSource,
    utils::{address_validator::AddressValidator, units::format_fixed},
};

const SOLANA_DECIMALS: u8 = 9;
const BITCOIN_DECIMALS: u8 = 8;

/// 注入的 Solana 钱包（Phantom 等）
#[async_trait]
pub trait SolanaWallet: Send + Sync {
    /// 返回 base58 公钥
    async fn connect(&self) -> anyhow::Result<String>;

    async fn disconnect(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 注入的 Bitcoin 钱包（Unisat 等）
#[async_trait]
pub trait BitcoinWallet: Send + Sync {
    async fn request_accounts(&self) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonEvmAccount {
    pub address: String,
    pub balance: String,
}

#[derive(Debug, Default)]
struct NonEvmState {
    solana: Option<NonEvmAccount>,
    bitcoin: Option<NonEvmAccount>,
}

pub struct NonEvmSessions {
    solana_wallet: Option<Arc<dyn SolanaWallet>>,
    bitcoin_wallet: Option<Arc<dyn BitcoinWallet>>,
    balances: Arc<dyn NonEvmBalanceSource>,
    state: Mutex<NonEvmState>,
}

impl NonEvmSessions {
    pub fn new(balances: Arc<dyn NonEvmBalanceSource>) -> Self {
        Self {
            solana_wallet: None,
            bitcoin_wallet: None,
            balances,
            state: Mutex::new(NonEvmState::default()),
        }
    }

    pub fn with_solana_wallet(mut self, wallet: Arc<dyn SolanaWallet>) -> Self {
        self.solana_wallet = Some(wallet);
        self
    }

    pub fn with_bitcoin_wallet(mut self, wallet: Arc<dyn BitcoinWallet>) -> Self {
        self.bitcoin_wallet = Some(wallet);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NonEvmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn connect_solana(&self) -> WalletResult<NonEvmAccount> {
        let wallet = self.solana_wallet.as_ref().ok_or(WalletError::NotConnected)?;
        let address = wallet
            .connect()
            .await
            .map_err(|e| WalletError::ProviderError(e.to_string()))?;
        if !AddressValidator::is_solana_address(&address) {
            return Err(WalletError::InvalidInput(format!(
                "Invalid Solana address: {}",
                address
            )));
        }

        let account = NonEvmAccount {
            balance: self.solana_balance(&address).await,
            address,
        };
        tracing::info!(address = %account.address, "Solana wallet connected");
        self.lock().solana = Some(account.clone());
        Ok(account)
    }

    pub async fn connect_bitcoin(&self) -> WalletResult<NonEvmAccount> {
        let wallet = self.bitcoin_wallet.as_ref().ok_or(WalletError::NotConnected)?;
        let accounts = wallet
            .request_accounts()
            .await
            .map_err(|e| WalletError::ProviderError(e.to_string()))?;
        let address = accounts
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::ConnectionRejected("No Bitcoin account returned".into()))?;
        if !AddressValidator::is_bitcoin_address(&address) {
            return Err(WalletError::InvalidInput(format!(
                "Invalid Bitcoin address: {}",
                address
            )));
        }

        let account = NonEvmAccount {
            balance: self.bitcoin_balance(&address).await,
            address,
        };
        tracing::info!(address = %account.address, "Bitcoin wallet connected");
        self.lock().bitcoin = Some(account.clone());
        Ok(account)
    }

    /// 余额查询失败按 0 展示，不影响连接
    async fn solana_balance(&self, address: &str) -> String {
        let lamports = self.balances.solana_lamports(address).await.unwrap_or_else(|e| {
            tracing::warn!(%address, error = %e, "Failed to fetch Solana balance");
            0
        });
        format_fixed(u128::from(lamports), SOLANA_DECIMALS)
    }

    async fn bitcoin_balance(&self, address: &str) -> String {
        let sats = self.balances.bitcoin_sats(address).await.unwrap_or_else(|e| {
            tracing::warn!(%address, error = %e, "Failed to fetch Bitcoin balance");
            0
        });
        format_fixed(u128::from(sats), BITCOIN_DECIMALS)
    }

    /// 重新查询已连接地址的余额
    pub async fn refresh_balances(&self) {
        let (solana, bitcoin) = self.addresses();
        if let Some(address) = solana {
            let balance = self.solana_balance(&address).await;
            if let Some(account) = self.lock().solana.as_mut().filter(|a| a.address == address) {
                account.balance = balance;
            }
        }
        if let Some(address) = bitcoin {
            let balance = self.bitcoin_balance(&address).await;
            if let Some(account) = self.lock().bitcoin.as_mut().filter(|a| a.address == address) {
                account.balance = balance;
            }
        }
    }

    pub async fn disconnect_solana(&self) {
        if let Some(wallet) = &self.solana_wallet {
            if let Err(e) = wallet.disconnect().await {
                tracing::debug!(error = %e, "Solana wallet disconnect failed");
            }
        }
        self.lock().solana = None;
    }

    pub fn disconnect_bitcoin(&self) {
        self.lock().bitcoin = None;
    }

    pub fn solana(&self) -> Option<NonEvmAccount> {
        self.lock().solana.clone()
    }

    pub fn bitcoin(&self) -> Option<NonEvmAccount> {
        self.lock().bitcoin.clone()
    }

    /// (solana, bitcoin)
    pub fn addresses(&self) -> (Option<String>, Option<String>) {
        let state = self.lock();
        (
            state.solana.as_ref().map(|a| a.address.clone()),
            state.bitcoin.as_ref().map(|a| a.address.clone()),
        )
    }

    pub fn has_any(&self) -> bool {
        let state = self.lock();
        state.solana.is_some() || state.bitcoin.is_some()
    }

    /// 账户列表中的非 EVM 行
    pub fn display_accounts(&self) -> Vec<AccountInfo> {
        let state = self.lock();
        let rows = [("Solana", &state.solana), ("Bitcoin", &state.bitcoin)];
        rows.into_iter()
            .filter_map(|(name, account)| {
                account.as_ref().map(|a| AccountInfo {
                    name: name.to_string(),
                    address: a.address.clone(),
                    native_balance: a.balance.clone(),
                    tokens: Vec::new(),
                })
            })
            .collect()
    }

    /// 收款地址
    pub fn receive_address(&self, chain_id: &str) -> Option<String> {
        let (solana, bitcoin) = self.addresses();
        match chain_id {
            SOLANA_CHAIN_ID => solana,
            BITCOIN_CHAIN_ID => bitcoin,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL_ADDRESS: &str = "So11111111111111111111111111111111111111112";
    const BTC_ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    struct Phantom;

    #[async_trait]
    impl SolanaWallet for Phantom {
        async fn connect(&self) -> anyhow::Result<String> {
            Ok(SOL_ADDRESS.to_string())
        }
    }

    struct Unisat(Vec<String>);

    #[async_trait]
    impl BitcoinWallet for Unisat {
        async fn request_accounts(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct Balances;

    #[async_trait]
    impl NonEvmBalanceSource for Balances {
        async fn solana_lamports(&self, _address: &str) -> anyhow::Result<u64> {
            Ok(2_000_000_001)
        }

        async fn bitcoin_sats(&self, _address: &str) -> anyhow::Result<u64> {
            anyhow::bail!("HTTP 429")
        }
    }

    #[tokio::test]
    async fn test_connect_without_wallet() {
        let sessions = NonEvmSessions::new(Arc::new(Balances));
        assert_eq!(
            sessions.connect_solana().await.unwrap_err(),
            WalletError::NotConnected
        );
        assert!(!sessions.has_any());
    }

    #[tokio::test]
    async fn test_connect_and_project_accounts() {
        let sessions = NonEvmSessions::new(Arc::new(Balances))
            .with_solana_wallet(Arc::new(Phantom))
            .with_bitcoin_wallet(Arc::new(Unisat(vec![BTC_ADDRESS.to_string()])));

        let sol = sessions.connect_solana().await.unwrap();
        assert_eq!(sol.balance, "2.000000001");
        let btc = sessions.connect_bitcoin().await.unwrap();
        assert_eq!(btc.balance, "0.00000000");

        let accounts = sessions.display_accounts();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "Solana");
        assert_eq!(accounts[1].name, "Bitcoin");
        assert_eq!(sessions.receive_address("bitcoin").as_deref(), Some(BTC_ADDRESS));
        assert_eq!(sessions.receive_address("0x1"), None);

        sessions.disconnect_solana().await;
        sessions.disconnect_bitcoin();
        assert!(!sessions.has_any());
    }

    #[tokio::test]
    async fn test_bitcoin_wallet_without_accounts() {
        let sessions = NonEvmSessions::new(Arc::new(Balances))
            .with_bitcoin_wallet(Arc::new(Unisat(Vec::new())));
        assert_eq!(
            sessions.connect_bitcoin().await.unwrap_err().code(),
            "connection_rejected"
        );
    }
}
