//! 网络描述
//!
//! `Network` 构造后不可变；注册表整体替换而不是原地修改。

use serde::{Deserialize, Serialize};

/// "所有网络"伪链，只用于展示聚合数据，不触发钱包切链
pub const ALL_NETWORKS_CHAIN_ID: &str = "all";
/// Solana 主网（非 EVM，不参与 wallet_switchEthereumChain）
pub const SOLANA_CHAIN_ID: &str = "solana";
/// Bitcoin 主网（非 EVM，不参与 wallet_switchEthereumChain）
pub const BITCOIN_CHAIN_ID: &str = "bitcoin";

/// 是否为哨兵 chainId（所有网络 / Solana / Bitcoin）
pub fn is_sentinel_chain_id(chain_id: &str) -> bool {
    matches!(
        chain_id,
        ALL_NETWORKS_CHAIN_ID | SOLANA_CHAIN_ID | BITCOIN_CHAIN_ID
    )
}

/// 是否为非 EVM 链族
pub fn is_non_evm_chain_id(chain_id: &str) -> bool {
    matches!(chain_id, SOLANA_CHAIN_ID | BITCOIN_CHAIN_ID)
}

/// 链族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Solana,
    Bitcoin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    pub fn new(name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }
}

/// 网络配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub chain_id: String,
    pub chain_name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer_urls: Option<Vec<String>>,
    pub icon_key: String,
    pub icon_color: String,
    pub is_testnet: bool,
}

impl Network {
    pub fn family(&self) -> ChainFamily {
        match self.chain_id.as_str() {
            SOLANA_CHAIN_ID => ChainFamily::Solana,
            BITCOIN_CHAIN_ID => ChainFamily::Bitcoin,
            _ => ChainFamily::Evm,
        }
    }

    pub fn is_evm(&self) -> bool {
        self.family() == ChainFamily::Evm
    }

    /// 下拉框展示名
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.short_name)
    }

    /// `wallet_addEthereumChain` 的参数体
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::json!({
            "chainId": self.chain_id,
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        })
    }
}
