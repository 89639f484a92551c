//! IronWallet - 浏览器多链钱包客户端核心
//!
//! 非托管：所有签名都交给用户的钱包扩展，本库只负责发现、会话、余额与转账编排

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use error::{WalletError, WalletResult};

pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{AccountInfo, Network, NetworkBalanceInfo, Session, SessionStatus, WalletProvider},
        error::{WalletError, WalletResult},
        service::{
            BalanceAggregator, ChainRegistry, NetworkRegistry, ProviderDetector,
            TransferDispatcher, TransferForm, WalletSession, WalletView,
        },
    };
}
