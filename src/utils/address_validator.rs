//! 地址验证模块
//!
//! 按链族（EVM / Solana / Bitcoin）校验地址格式。

use anyhow::Result;

use crate::{
    domain::network::{BITCOIN_CHAIN_ID, SOLANA_CHAIN_ID},
    utils::chain_normalizer,
};

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式
    ///
    /// # 参数
    /// - `chain`: 链标识符（会自动标准化，EVM 链统一按 EVM 规则校验）
    /// - `address`: 待验证的地址
    ///
    /// # 返回
    /// - Ok(true): 地址有效
    /// - Ok(false): 地址无效
    /// - Err: 无法识别的链（包括"所有网络"哨兵）
    pub fn validate(chain: &str, address: &str) -> Result<bool> {
        let chain_id = chain_normalizer::normalize_chain_id(chain)?;

        match chain_id.as_str() {
            SOLANA_CHAIN_ID => Ok(Self::is_solana_address(address)),
            BITCOIN_CHAIN_ID => Ok(Self::is_bitcoin_address(address)),
            id if chain_normalizer::is_evm_chain_id(id) => Ok(Self::is_evm_address(address)),
            other => Err(anyhow::anyhow!(
                "Unsupported chain for address validation: {}",
                other
            )),
        }
    }

    /// 验证EVM地址（混合大小写时校验 EIP-55 Checksum）
    pub fn is_evm_address(address: &str) -> bool {
        let Some(hex_part) = address.strip_prefix("0x") else {
            return false;
        };

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(hex_part);
        }

        true
    }

    /// EIP-55 校验和地址
    pub fn to_checksum_address(address: &str) -> Option<String> {
        if !Self::is_evm_address(address) {
            return None;
        }
        let lower = address[2..].to_lowercase();
        let hash = keccak256(lower.as_bytes());

        let checksummed: String = lower
            .chars()
            .enumerate()
            .map(|(i, ch)| {
                if ch.is_ascii_alphabetic() && nibble(&hash, i) >= 8 {
                    ch.to_ascii_uppercase()
                } else {
                    ch
                }
            })
            .collect();

        Some(format!("0x{}", checksummed))
    }

    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        let hash = keccak256(hex_part.to_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            ch.is_ascii_uppercase() == (nibble(&hash, i) >= 8)
        })
    }

    /// 验证Solana地址（Base58编码，32字节）
    pub fn is_solana_address(address: &str) -> bool {
        if address.len() < 32 || address.len() > 44 {
            return false;
        }

        if !address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return false;
        }

        matches!(bs58::decode(address).into_vec(), Ok(decoded) if decoded.len() == 32)
    }

    /// 验证Bitcoin地址（主网与测试网）
    pub fn is_bitcoin_address(address: &str) -> bool {
        if address.is_empty() {
            return false;
        }

        let lower = address.to_lowercase();
        if lower.starts_with("bc1") || lower.starts_with("tb1") {
            return Self::is_bech32_address(address);
        }

        // P2PKH: 1 / m / n，P2SH: 3 / 2
        if address.starts_with(['1', '3', 'm', 'n', '2']) {
            return Self::is_base58_bitcoin_address(address);
        }

        false
    }

    fn is_base58_bitcoin_address(address: &str) -> bool {
        if address.len() < 26 || address.len() > 35 {
            return false;
        }

        if !address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return false;
        }

        // 版本字节 + 20 字节哈希 + 4 字节校验
        matches!(bs58::decode(address).into_vec(), Ok(decoded) if decoded.len() == 25)
    }

    fn is_bech32_address(address: &str) -> bool {
        if address.len() < 42 || address.len() > 62 {
            return false;
        }

        // 不允许大小写混用
        if address != address.to_lowercase() && address != address.to_uppercase() {
            return false;
        }

        let lower = address.to_lowercase();
        lower[3..].chars().all(|c| BECH32_CHARSET.contains(c))
    }
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};

    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn nibble(hash: &[u8; 32], index: usize) -> u8 {
    let byte = hash[index / 2];
    if index % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0f
    }
}
