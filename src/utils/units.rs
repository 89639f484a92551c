//! 金额单位换算
//!
//! 链上最小单位 <-> 十进制字符串。

use anyhow::Result;
use ethers::types::U256;

/// 最小单位格式化为十进制字符串，去掉小数尾零但至少保留一位小数
///
/// `1000000000000000000 (18)` -> `1.0`，`1500000 (6)` -> `1.5`
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;

    let (int_part, frac_part) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
    };

    let trimmed = frac_part.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{}.0", int_part)
    } else {
        format!("{}.{}", int_part, trimmed)
    }
}

/// 固定小数位格式化（Solana 9 位、Bitcoin 8 位）
pub fn format_fixed(value: u128, decimals: u8) -> String {
    let scale = 10u128.pow(decimals as u32);
    let int_part = value / scale;
    let frac_part = value % scale;
    if decimals == 0 {
        return int_part.to_string();
    }
    format!(
        "{}.{:0>width$}",
        int_part,
        frac_part,
        width = decimals as usize
    )
}

/// 解析用户输入的金额为最小单位（拒绝负数与零）
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Amount is required");
    }
    if trimmed.starts_with('-') {
        anyhow::bail!("Amount must be positive: {}", trimmed);
    }

    let parsed = ethers::utils::parse_units(trimmed, decimals as u32)
        .map_err(|e| anyhow::anyhow!("Invalid amount {}: {}", trimmed, e))?;
    let value: U256 = parsed.into();

    if value.is_zero() {
        anyhow::bail!("Amount must be greater than zero");
    }

    Ok(value)
}

/// 解析 JSON-RPC 返回的十六进制数量（`0x` 视为 0）
pub fn parse_hex_quantity(raw: &str) -> Result<U256> {
    let hex = raw.trim().trim_start_matches("0x");
    if hex.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(hex, 16).map_err(|e| anyhow::anyhow!("Invalid hex quantity {}: {:?}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        let one_eth = U256::exp10(18);
        assert_eq!(format_units(one_eth, 18), "1.0");
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::zero(), 18), "0.0");
        assert_eq!(format_units(U256::from(1_234_000_001u64), 6), "1234.000001");
        assert_eq!(format_units(U256::from(42u64), 0), "42.0");
    }

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(1_500_000_000, 9), "1.500000000");
        assert_eq!(format_fixed(12_345, 8), "0.00012345");
        assert_eq!(format_fixed(0, 8), "0.00000000");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(parse_amount(" 2 ", 18).unwrap(), U256::exp10(18) * 2);
        assert!(parse_amount("-1", 18).is_err());
        assert!(parse_amount("0", 18).is_err());
        assert!(parse_amount("abc", 18).is_err());
        assert!(parse_amount("", 18).is_err());
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), U256::zero());
        assert_eq!(parse_hex_quantity("0x").unwrap(), U256::zero());
        assert_eq!(parse_hex_quantity("0xde0b6b3a7640000").unwrap(), U256::exp10(18));
        assert!(parse_hex_quantity("0xzz").is_err());
    }
}
