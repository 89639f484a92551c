//! 钱包会话错误类型
//!
//! 所有会话迁移、余额聚合、转账失败都收敛到 `WalletError`。
//! 内部管道（配置、HTTP、JSON）继续使用 `anyhow::Result`。

use thiserror::Error;

use crate::infrastructure::provider::ProviderRpcError;

/// 会话层错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Please connect your wallet first")]
    NotConnected,

    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Wallet mismatch: Selected {selected} but detected {detected}")]
    ProviderMismatch { selected: String, detected: String },

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Failed to switch network: {0}")]
    SwitchFailed(String),

    /// 用户在钱包中取消切链，属于良性结果
    #[error("Network switch cancelled by user")]
    SwitchCancelled,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("Transaction rejected by user")]
    UserRejected,

    #[error("{0}")]
    ProviderError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Another wallet operation is in progress")]
    OperationInProgress,
}

pub type WalletResult<T> = std::result::Result<T, WalletError>;

impl WalletError {
    /// 稳定的错误码（供 UI 做分支判断）
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::NotConnected => "not_connected",
            WalletError::ConnectionRejected(_) => "connection_rejected",
            WalletError::ProviderMismatch { .. } => "provider_mismatch",
            WalletError::UnsupportedNetwork(_) => "unsupported_network",
            WalletError::SwitchFailed(_) => "switch_failed",
            WalletError::SwitchCancelled => "switch_cancelled",
            WalletError::InvalidToken(_) => "invalid_token",
            WalletError::InsufficientFunds => "insufficient_funds",
            WalletError::UserRejected => "user_rejected",
            WalletError::ProviderError(_) => "provider_error",
            WalletError::InvalidInput(_) => "invalid_input",
            WalletError::OperationInProgress => "operation_in_progress",
        }
    }

    /// 良性结果不以错误级别提示
    pub fn is_benign(&self) -> bool {
        matches!(self, WalletError::SwitchCancelled)
    }

    /// 面向用户的提示文案
    pub fn user_message(&self) -> String {
        match self {
            WalletError::ProviderError(msg) if msg.is_empty() => "Unknown error".to_string(),
            WalletError::InvalidToken(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ProviderRpcError> for WalletError {
    fn from(err: ProviderRpcError) -> Self {
        WalletError::ProviderError(err.detail_message())
    }
}
