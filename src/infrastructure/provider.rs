//! 钱包 provider 抽象（EIP-1193）
//!
//! 浏览器里的 `window.ethereum` 等对象通过这些 trait 接入：
//! - `RpcTransport`：`request(method, params)`，公共只读 RPC 也实现它
//! - `WalletHandle`：注入钱包，额外提供品牌标记与事件订阅
//!
//! 事件回调统一改为向 `mpsc` 通道推送 `ProviderEvent`，由会话侧单点分发。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::domain::wallet_brand::ProviderFlags;

/// provider 返回的 JSON-RPC 错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ProviderRpcError {
    pub code: Option<i64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderRpcError {
    /// 用户拒绝
    pub const USER_REJECTED: i64 = 4001;
    /// 钱包未添加该链
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    /// 无错误码的本地错误（网络、解析）
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// 错误码；部分钱包把真实错误码包在 `data.originalError.code`
    pub fn effective_code(&self) -> Option<i64> {
        self.code.or_else(|| {
            self.data
                .as_ref()
                .and_then(|d| d.get("originalError"))
                .and_then(|e| e.get("code"))
                .and_then(Value::as_i64)
        })
    }

    pub fn has_code(&self, code: i64) -> bool {
        self.code == Some(code)
            || self
                .data
                .as_ref()
                .and_then(|d| d.get("originalError"))
                .and_then(|e| e.get("code"))
                .and_then(Value::as_i64)
                == Some(code)
    }

    pub fn is_user_rejected(&self) -> bool {
        if self.has_code(Self::USER_REJECTED) {
            return true;
        }
        let lower = self.message.to_lowercase();
        self.message.contains("ACTION_REJECTED")
            || lower.contains("user rejected")
            || lower.contains("user denied")
    }

    /// 展示用的错误详情：message 为空时取 data（字符串或 data.message）
    pub fn detail_message(&self) -> String {
        if !self.message.trim().is_empty() {
            return self.message.clone();
        }
        match &self.data {
            Some(Value::String(s)) => s.clone(),
            Some(data) => data
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default(),
            None => String::new(),
        }
    }
}

/// JSON-RPC 请求通道
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;
}

/// provider 推送的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(String),
    Disconnect,
}

pub type ProviderEventSink = mpsc::UnboundedSender<ProviderEvent>;

/// 注入的钱包 provider
pub trait WalletHandle: RpcTransport {
    /// 品牌标记（每次调用重新读取）
    fn flags(&self) -> ProviderFlags;

    /// `typeof provider.request === 'function'`
    fn has_request(&self) -> bool {
        true
    }

    /// 注册 accountsChanged / chainChanged / disconnect 监听，返回是否支持事件
    fn subscribe(&self, sink: ProviderEventSink) -> bool {
        let _ = sink;
        false
    }

    fn remove_all_listeners(&self) {}
}

pub type SharedHandle = Arc<dyn WalletHandle>;

/// provider 身份按引用判等
pub fn same_handle(a: &SharedHandle, b: &SharedHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// 由钱包代签的签名者
#[derive(Clone)]
pub struct ProviderSigner {
    pub handle: SharedHandle,
    pub address: String,
    pub chain_id: String,
}

impl ProviderSigner {
    pub fn new(handle: SharedHandle, address: &str, chain_id: &str) -> Self {
        Self {
            handle,
            address: address.to_string(),
            chain_id: chain_id.to_string(),
        }
    }

    /// `eth_sendTransaction`，自动补 `from`，返回交易哈希
    pub async fn send_transaction(&self, mut tx: Value) -> Result<String, ProviderRpcError> {
        if let Some(obj) = tx.as_object_mut() {
            obj.entry("from")
                .or_insert_with(|| Value::String(self.address.clone()));
        }
        let result = self
            .handle
            .request("eth_sendTransaction", json!([tx]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderRpcError::other("eth_sendTransaction returned no hash"))
    }
}

impl std::fmt::Debug for ProviderSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSigner")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl PartialEq for ProviderSigner {
    fn eq(&self, other: &Self) -> bool {
        same_handle(&self.handle, &other.handle)
            && self.address == other.address
            && self.chain_id == other.chain_id
    }
}

/// 把 JSON 数组解析为地址列表
pub fn parse_accounts(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
