//! 链标识符标准化模块
//!
//! 统一 chainId 的内部表示：EVM 链一律为小写 `0x` 十六进制（无前导零），
//! 非 EVM 链与"所有网络"使用哨兵字符串。

use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::domain::network::{ALL_NETWORKS_CHAIN_ID, BITCOIN_CHAIN_ID, SOLANA_CHAIN_ID};

/// 常用别名 -> 规范 chainId
static CHAIN_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let entries: &[(&[&str], &str)] = &[
        (&["eth", "ethereum", "mainnet"], "0x1"),
        (&["bsc", "bnb", "binance"], "0x38"),
        (&["polygon", "matic", "pol"], "0x89"),
        (&["arbitrum", "arb"], "0xa4b1"),
        (&["optimism", "op"], "0xa"),
        (&["base"], "0x2105"),
        (&["avalanche", "avax"], "0xa86a"),
        (&["zksync"], "0x144"),
        (&["linea"], "0xe708"),
        (&["sepolia"], "0xaa36a7"),
        (&["sol", SOLANA_CHAIN_ID], SOLANA_CHAIN_ID),
        (&["btc", BITCOIN_CHAIN_ID], BITCOIN_CHAIN_ID),
        (&[ALL_NETWORKS_CHAIN_ID], ALL_NETWORKS_CHAIN_ID),
    ];

    let mut map = HashMap::new();
    for (aliases, canonical) in entries {
        for alias in aliases.iter() {
            map.insert(*alias, *canonical);
        }
    }
    map
});

/// 标准化链标识符
///
/// # 示例
/// ```rust
/// # use ironwallet::utils::chain_normalizer::normalize_chain_id;
/// assert_eq!(normalize_chain_id("0x01").unwrap(), "0x1");
/// assert_eq!(normalize_chain_id("137").unwrap(), "0x89");
/// assert_eq!(normalize_chain_id("Solana").unwrap(), "solana");
/// ```
pub fn normalize_chain_id(input: &str) -> Result<String> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        anyhow::bail!("Empty chain identifier");
    }

    if let Some(canonical) = CHAIN_ALIASES.get(trimmed.as_str()) {
        return Ok((*canonical).to_string());
    }

    if let Some(hex_part) = trimmed.strip_prefix("0x") {
        let value = u64::from_str_radix(hex_part, 16)
            .map_err(|_| anyhow::anyhow!("Invalid hex chain id: {}", input))?;
        return Ok(format!("0x{:x}", value));
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let value: u64 = trimmed
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid chain id: {}", input))?;
        return Ok(format!("0x{:x}", value));
    }

    anyhow::bail!("Unknown chain identifier: {}", input)
}

/// 数字 chainId -> 规范十六进制
pub fn chain_id_hex(chain_id: u64) -> String {
    format!("0x{:x}", chain_id)
}

/// 规范十六进制 -> 数字（哨兵返回 None）
pub fn chain_id_number(chain_id: &str) -> Option<u64> {
    chain_id
        .strip_prefix("0x")
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
}

/// 是否为具体的 EVM 链
pub fn is_evm_chain_id(chain_id: &str) -> bool {
    chain_id_number(chain_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hex_and_decimal() {
        assert_eq!(normalize_chain_id("0x1").unwrap(), "0x1");
        assert_eq!(normalize_chain_id("0X0A4B1").unwrap(), "0xa4b1");
        assert_eq!(normalize_chain_id("42161").unwrap(), "0xa4b1");
        assert_eq!(normalize_chain_id(" 11155111 ").unwrap(), "0xaa36a7");
    }

    #[test]
    fn test_normalize_aliases_and_sentinels() {
        assert_eq!(normalize_chain_id("ETH").unwrap(), "0x1");
        assert_eq!(normalize_chain_id("all").unwrap(), "all");
        assert_eq!(normalize_chain_id("BTC").unwrap(), "bitcoin");
        assert_eq!(normalize_chain_id("solana").unwrap(), "solana");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_chain_id("").is_err());
        assert!(normalize_chain_id("0xzz").is_err());
        assert!(normalize_chain_id("not-a-chain").is_err());
    }

    #[test]
    fn test_evm_chain_detection() {
        assert!(is_evm_chain_id("0x89"));
        assert!(!is_evm_chain_id("solana"));
        assert!(!is_evm_chain_id("all"));
        assert_eq!(chain_id_number("0x38"), Some(56));
        assert_eq!(chain_id_hex(8453), "0x2105");
    }
}
