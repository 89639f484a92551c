//! 账户与余额视图模型

use serde::{Deserialize, Serialize};

use super::network::Network;

/// 代币持仓
///
/// `chain_id` / `network_name` 只在跨链聚合结果中填充。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub balance: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
}

/// 账户信息（代币按需加载）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub name: String,
    pub address: String,
    pub native_balance: String,
    pub tokens: Vec<TokenInfo>,
}

impl AccountInfo {
    /// 1-based 默认账户名
    pub fn default_name(index: usize) -> String {
        format!("Account {}", index + 1)
    }

    /// 刚连接时的最小账户记录
    pub fn placeholder(index: usize, address: &str) -> Self {
        Self {
            name: Self::default_name(index),
            address: address.to_string(),
            native_balance: "0".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// 聚合结果中的一行（每条链一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBalanceInfo {
    pub chain_id: String,
    pub network: Network,
    pub native_balance: String,
    pub tokens: Vec<TokenInfo>,
}

impl NetworkBalanceInfo {
    /// 查询失败时的降级行
    pub fn empty(network: &Network) -> Self {
        Self {
            chain_id: network.chain_id.clone(),
            network: network.clone(),
            native_balance: "0".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// 候选代币
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenListEntry {
    pub address: String,
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}
