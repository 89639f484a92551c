//! 钱包品牌识别
//!
//! 注入的 provider 会同时暴露多个 `isXxx` 标记（OKX 同时带 `isMetaMask`），
//! 所以 OKX 必须先于 MetaMask 判断。

use serde::{Deserialize, Serialize};

/// provider 对象上的品牌标记快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFlags {
    pub is_metamask: bool,
    /// `isOKExWallet` / `isOkxWallet`
    pub is_okx_wallet: bool,
    pub is_coinbase_wallet: bool,
    pub is_trust: bool,
    pub is_token_pocket: bool,
    pub is_imtoken: bool,
    pub is_bitkeep: bool,
    pub is_rabby: bool,
    pub is_brave_wallet: bool,
    /// `provider.constructor.name`
    pub constructor_name: Option<String>,
}

impl ProviderFlags {
    pub fn metamask() -> Self {
        Self {
            is_metamask: true,
            ..Self::default()
        }
    }

    pub fn okx() -> Self {
        Self {
            is_metamask: true,
            is_okx_wallet: true,
            ..Self::default()
        }
    }

    /// 置位的品牌标记数量（OKX 自带的 isMetaMask 不计）
    fn brand_flag_count(&self) -> usize {
        [
            self.is_metamask && !self.is_okx_wallet,
            self.is_okx_wallet,
            self.is_coinbase_wallet,
            self.is_trust,
            self.is_token_pocket,
            self.is_imtoken,
            self.is_bitkeep,
            self.is_rabby,
            self.is_brave_wallet,
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// 钱包品牌（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletBrand {
    MetaMask,
    Okx,
    Coinbase,
    Trust,
    TokenPocket,
    ImToken,
    BitKeep,
    Rabby,
    Brave,
    Unknown,
}

impl WalletBrand {
    /// 按标记识别品牌，标记缺失时参考构造函数名
    pub fn probe(flags: &ProviderFlags) -> Self {
        if flags.is_okx_wallet {
            return WalletBrand::Okx;
        }
        if flags.is_metamask {
            return WalletBrand::MetaMask;
        }
        if flags.is_coinbase_wallet {
            return WalletBrand::Coinbase;
        }
        if flags.is_trust {
            return WalletBrand::Trust;
        }
        if flags.is_token_pocket {
            return WalletBrand::TokenPocket;
        }
        if flags.is_imtoken {
            return WalletBrand::ImToken;
        }
        if flags.is_bitkeep {
            return WalletBrand::BitKeep;
        }
        if flags.is_rabby {
            return WalletBrand::Rabby;
        }
        if flags.is_brave_wallet {
            return WalletBrand::Brave;
        }

        if let Some(name) = flags.constructor_name.as_deref() {
            if name.contains("OKX") || name.contains("Okx") || name.contains("OKEx") {
                return WalletBrand::Okx;
            }
            if name.contains("MetaMask") {
                return WalletBrand::MetaMask;
            }
        }

        WalletBrand::Unknown
    }

    /// 只有恰好一个品牌标记时才认为品牌明确，用于目录去重
    pub fn unambiguous(flags: &ProviderFlags) -> Option<Self> {
        if flags.brand_flag_count() != 1 {
            return None;
        }
        Some(Self::probe(flags))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WalletBrand::MetaMask => "MetaMask",
            WalletBrand::Okx => "OKEx Wallet",
            WalletBrand::Coinbase => "Coinbase Wallet",
            WalletBrand::Trust => "Trust Wallet",
            WalletBrand::TokenPocket => "TokenPocket",
            WalletBrand::ImToken => "imToken",
            WalletBrand::BitKeep => "BitKeep",
            WalletBrand::Rabby => "Rabby",
            WalletBrand::Brave => "Brave Wallet",
            WalletBrand::Unknown => "Unknown Wallet",
        }
    }

    /// 旧式注入 provider 的 id 前缀
    pub fn id_prefix(&self) -> &'static str {
        match self {
            WalletBrand::MetaMask => "metamask",
            WalletBrand::Okx => "okx",
            WalletBrand::Coinbase => "coinbase",
            WalletBrand::Trust => "trust",
            WalletBrand::TokenPocket => "tokenpocket",
            WalletBrand::ImToken => "imtoken",
            WalletBrand::BitKeep => "bitkeep",
            WalletBrand::Rabby => "rabby",
            WalletBrand::Brave => "brave",
            WalletBrand::Unknown => "wallet",
        }
    }

    /// 旧式注入 provider 的 id（只看标记，不看构造函数名）
    pub fn legacy_id(flags: &ProviderFlags, index: usize) -> String {
        let mut by_flags = flags.clone();
        by_flags.constructor_name = None;
        match Self::probe(&by_flags) {
            WalletBrand::Unknown => format!("wallet-{}-unknown", index),
            brand => format!("{}-{}", brand.id_prefix(), index),
        }
    }
}
