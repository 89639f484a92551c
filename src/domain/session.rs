//! 钱包会话模型

use serde::{Deserialize, Serialize};

use super::{network::is_sentinel_chain_id, wallet_brand::WalletBrand};
use crate::infrastructure::provider::{same_handle, ProviderSigner, SharedHandle};

/// provider 的发现渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderOrigin {
    /// EIP-6963 公告
    Announced,
    /// 旧式 `window.ethereum` 注入
    Injected,
}

/// 目录中的钱包条目
#[derive(Clone)]
pub struct WalletProvider {
    pub id: String,
    pub name: String,
    pub handle: SharedHandle,
    pub origin: ProviderOrigin,
    /// 发现时识别的品牌（缓存）
    pub brand: WalletBrand,
}

impl WalletProvider {
    pub fn same_handle_as(&self, other: &WalletProvider) -> bool {
        same_handle(&self.handle, &other.handle)
    }
}

impl std::fmt::Debug for WalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletProvider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("brand", &self.brand)
            .finish()
    }
}

impl PartialEq for WalletProvider {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.same_handle_as(other)
    }
}

/// 会话状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// 会话：当前连接的钱包、链与账户
///
/// `Session::default()` 即规范空会话。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub status: SessionStatus,
    pub provider: Option<WalletProvider>,
    pub active_address: String,
    pub active_chain_id: String,
    pub display_chain_id: String,
    pub signer: Option<ProviderSigner>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    pub fn active_handle(&self) -> Option<&SharedHandle> {
        self.provider.as_ref().map(|p| &p.handle)
    }

    /// 会话不变式
    ///
    /// - Connected ⇔ provider 与 active_address 均非空
    /// - Disconnected 时 provider、地址、签名者全部清空
    /// - display_chain_id 只在哨兵值时可以和 active_chain_id 不同
    pub fn check_invariants(&self) -> Result<(), String> {
        let has_identity = self.provider.is_some() && !self.active_address.is_empty();
        match self.status {
            SessionStatus::Connected if !has_identity => {
                return Err("connected session without provider or address".into());
            }
            SessionStatus::Disconnected
                if self.provider.is_some()
                    || !self.active_address.is_empty()
                    || self.signer.is_some() =>
            {
                return Err("disconnected session still holds a provider".into());
            }
            SessionStatus::Connecting if self.provider.is_some() => {
                return Err("connecting session already holds a provider".into());
            }
            _ => {}
        }

        if self.display_chain_id != self.active_chain_id
            && !self.display_chain_id.is_empty()
            && !is_sentinel_chain_id(&self.display_chain_id)
        {
            return Err(format!(
                "display chain {} diverges from active chain {}",
                self.display_chain_id, self.active_chain_id
            ));
        }

        Ok(())
    }
}
