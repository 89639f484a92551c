//! Domain 模块
//!
//! 网络、账户、会话等领域模型

pub mod account;
pub mod chain_config;
pub mod network;
pub mod session;
pub mod wallet_brand;

// 重新导出常用类型
pub use account::{AccountInfo, NetworkBalanceInfo, TokenInfo, TokenListEntry};
pub use network::{
    ChainFamily, NativeCurrency, Network, ALL_NETWORKS_CHAIN_ID, BITCOIN_CHAIN_ID, SOLANA_CHAIN_ID,
};
pub use session::{ProviderOrigin, Session, SessionStatus, WalletProvider};
pub use wallet_brand::{ProviderFlags, WalletBrand};
