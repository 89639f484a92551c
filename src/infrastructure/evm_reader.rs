//! EVM 链上只读查询
//!
//! 通过任意 `RpcTransport`（钱包 provider 或公共 RPC）读取余额、合约代码、
//! ERC20 元数据与 ENS 反向解析。ABI 编解码使用 `ethers::abi`。

use ethers::{
    abi::{self, ParamType, Token},
    types::{Address, U256},
    utils::{id, keccak256},
};
use serde_json::{json, Value};

use super::provider::{ProviderRpcError, RpcTransport};
use crate::{
    domain::{account::TokenInfo, chain_config::ENS_CHAIN_IDS},
    utils::units::{format_units, parse_hex_quantity},
};

/// ENS 注册表（主网与 Sepolia 同址）
pub const ENS_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// ERC20 元数据查询失败时的默认值
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;
pub const UNKNOWN_TOKEN_SYMBOL: &str = "UNKNOWN";
pub const UNKNOWN_TOKEN_NAME: &str = "Unknown Token";

/// 解析 0x 地址
pub fn parse_address(address: &str) -> Option<Address> {
    let hex_part = address.trim().strip_prefix("0x")?;
    let bytes = hex::decode(hex_part).ok()?;
    (bytes.len() == 20).then(|| Address::from_slice(&bytes))
}

/// 地址的小写 0x 表示
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend(abi::encode(args));
    data
}

/// `transfer(address,uint256)` 调用数据
pub fn encode_transfer(to: Address, amount: U256) -> Vec<u8> {
    encode_call(
        "transfer(address,uint256)",
        &[Token::Address(to), Token::Uint(amount)],
    )
}

pub fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// ENS namehash
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&node);
        buf[32..].copy_from_slice(&keccak256(label.as_bytes()));
        node = keccak256(buf);
    }
    node
}

/// 兼容 `string` 与 `bytes32` 两种返回编码
fn decode_string(bytes: &[u8]) -> Option<String> {
    if let Ok(tokens) = abi::decode(&[ParamType::String], bytes) {
        if let Some(s) = tokens.into_iter().next().and_then(Token::into_string) {
            return Some(s);
        }
    }

    if bytes.len() >= 32 {
        let raw = &bytes[..32];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(32);
        let text = std::str::from_utf8(&raw[..end]).ok()?;
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    None
}

fn decode_uint(bytes: &[u8]) -> Result<U256, ProviderRpcError> {
    abi::decode(&[ParamType::Uint(256)], bytes)
        .ok()
        .and_then(|tokens| tokens.into_iter().next())
        .and_then(Token::into_uint)
        .ok_or_else(|| ProviderRpcError::other("Failed to decode uint256 return value"))
}

fn decode_address(bytes: &[u8]) -> Result<Address, ProviderRpcError> {
    abi::decode(&[ParamType::Address], bytes)
        .ok()
        .and_then(|tokens| tokens.into_iter().next())
        .and_then(Token::into_address)
        .ok_or_else(|| ProviderRpcError::other("Failed to decode address return value"))
}

/// 一次代币查询的结果（元数据已应用默认值）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub raw_balance: U256,
}

impl TokenSnapshot {
    pub fn into_token_info(self) -> TokenInfo {
        TokenInfo {
            balance: format_units(self.raw_balance, self.decimals),
            address: self.address,
            symbol: self.symbol,
            name: self.name,
            decimals: self.decimals,
            chain_id: None,
            network_name: None,
        }
    }
}

/// EVM 只读查询器
pub struct EvmReader<'a, T: RpcTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: RpcTransport + ?Sized> EvmReader<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// eth_getBalance（wei）
    pub async fn native_balance(&self, address: &str) -> Result<U256, ProviderRpcError> {
        let result = self
            .transport
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ProviderRpcError::other("Invalid eth_getBalance response"))?;
        parse_hex_quantity(raw).map_err(|e| ProviderRpcError::other(e.to_string()))
    }

    /// eth_chainId（规范十六进制）
    pub async fn chain_id(&self) -> Result<String, ProviderRpcError> {
        let result = self.transport.request("eth_chainId", json!([])).await?;
        let raw = match &result {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Err(ProviderRpcError::other("Invalid eth_chainId response")),
        };
        crate::utils::chain_normalizer::normalize_chain_id(&raw)
            .map_err(|e| ProviderRpcError::other(e.to_string()))
    }

    /// 地址上是否部署了合约
    pub async fn has_code(&self, address: &str) -> Result<bool, ProviderRpcError> {
        let result = self
            .transport
            .request("eth_getCode", json!([address, "latest"]))
            .await?;
        let code = result.as_str().unwrap_or("");
        Ok(!matches!(code, "" | "0x" | "0x0"))
    }

    /// eth_call，返回原始字节
    pub async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ProviderRpcError> {
        let result = self
            .transport
            .request(
                "eth_call",
                json!([{ "to": to, "data": to_hex_data(data) }, "latest"]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ProviderRpcError::other("Invalid eth_call response"))?;
        hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| ProviderRpcError::other(format!("Invalid eth_call hex: {}", e)))
    }

    pub async fn balance_of(&self, token: &str, owner: &str) -> Result<U256, ProviderRpcError> {
        let owner = parse_address(owner)
            .ok_or_else(|| ProviderRpcError::other(format!("Invalid address: {}", owner)))?;
        let bytes = self
            .call(token, &encode_call("balanceOf(address)", &[Token::Address(owner)]))
            .await?;
        decode_uint(&bytes)
    }

    pub async fn decimals(&self, token: &str) -> Result<u8, ProviderRpcError> {
        let bytes = self.call(token, &encode_call("decimals()", &[])).await?;
        let value = decode_uint(&bytes)?;
        if value > U256::from(u8::MAX) {
            return Err(ProviderRpcError::other("decimals out of range"));
        }
        Ok(value.low_u32() as u8)
    }

    pub async fn symbol(&self, token: &str) -> Result<String, ProviderRpcError> {
        let bytes = self.call(token, &encode_call("symbol()", &[])).await?;
        decode_string(&bytes).ok_or_else(|| ProviderRpcError::other("Failed to decode symbol"))
    }

    pub async fn name(&self, token: &str) -> Result<String, ProviderRpcError> {
        let bytes = self.call(token, &encode_call("name()", &[])).await?;
        decode_string(&bytes).ok_or_else(|| ProviderRpcError::other("Failed to decode name"))
    }

    /// 四项元数据并发查询，各自独立回落默认值
    pub async fn token_snapshot(&self, token: &str, owner: &str) -> TokenSnapshot {
        let (balance, decimals, symbol, name) = futures::join!(
            self.balance_of(token, owner),
            self.decimals(token),
            self.symbol(token),
            self.name(token),
        );

        if let Err(e) = &balance {
            tracing::debug!(%token, %owner, error = %e, "balanceOf failed, treating as zero");
        }

        TokenSnapshot {
            address: token.to_lowercase(),
            symbol: symbol.unwrap_or_else(|_| UNKNOWN_TOKEN_SYMBOL.to_string()),
            name: name.unwrap_or_else(|_| UNKNOWN_TOKEN_NAME.to_string()),
            decimals: decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
            raw_balance: balance.unwrap_or_default(),
        }
    }

    async fn ens_resolver(&self, node: [u8; 32]) -> Result<Option<Address>, ProviderRpcError> {
        let bytes = self
            .call(
                ENS_REGISTRY,
                &encode_call("resolver(bytes32)", &[Token::FixedBytes(node.to_vec())]),
            )
            .await?;
        let resolver = decode_address(&bytes)?;
        Ok((!resolver.is_zero()).then_some(resolver))
    }

    /// ENS 反向解析（仅部署 ENS 的链），并做正向校验
    pub async fn lookup_ens_name(&self, address: &str, chain_id: &str) -> Option<String> {
        if !ENS_CHAIN_IDS.contains(&chain_id) {
            return None;
        }
        let expected = parse_address(address)?;

        let reverse = format!("{}.addr.reverse", hex::encode(expected.as_bytes()));
        let node = namehash(&reverse);
        let resolver = self.ens_resolver(node).await.ok()??;

        let bytes = self
            .call(
                &format_address(&resolver),
                &encode_call("name(bytes32)", &[Token::FixedBytes(node.to_vec())]),
            )
            .await
            .ok()?;
        let name = decode_string(&bytes).filter(|n| !n.is_empty())?;

        let forward_node = namehash(&name);
        let forward_resolver = self.ens_resolver(forward_node).await.ok()??;
        let bytes = self
            .call(
                &format_address(&forward_resolver),
                &encode_call("addr(bytes32)", &[Token::FixedBytes(forward_node.to_vec())]),
            )
            .await
            .ok()?;
        let resolved = decode_address(&bytes).ok()?;

        (resolved == expected).then_some(name)
    }
}
