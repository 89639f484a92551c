//! 钱包发现
//!
//! 两个渠道：
//! - EIP-6963 公告：发出请求事件后在固定窗口内收集 `{info.name, provider}`
//! - 旧式注入：`window.ethereum.providers` 或 `[window.ethereum]`
//!
//! 两路结果按名称键合并（公告优先），再按 provider 引用与明确品牌去重，
//! 得到整体替换的目录快照。发现过程从不报错，失败的渠道直接忽略。

use std::{
    collections::HashSet,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;

use crate::{
    config::DiscoveryConfig,
    domain::{ProviderOrigin, WalletBrand, WalletProvider},
    infrastructure::provider::{same_handle, SharedHandle},
};

/// EIP-6963 公告
#[derive(Clone)]
pub struct AnnouncedProvider {
    pub name: String,
    pub handle: SharedHandle,
}

impl AnnouncedProvider {
    pub fn new(name: impl Into<String>, handle: SharedHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

/// 宿主环境（浏览器窗口）的发现端口
pub trait DiscoveryHost: Send + Sync {
    /// 注册公告监听并发出 `eip6963:requestProvider`
    fn request_providers(&self, sink: mpsc::UnboundedSender<AnnouncedProvider>);

    /// 移除公告监听
    fn stop_listening(&self);

    /// 旧式注入的 provider 列表
    fn injected_providers(&self) -> Vec<SharedHandle>;

    /// `window.okxwallet`
    fn okx_global(&self) -> Option<SharedHandle> {
        None
    }
}

static OKX_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^okx\s*wallet$").unwrap());

/// 展示名规范化：OKX 的各种写法统一为 `OKEx Wallet`
pub fn normalize_wallet_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.eq_ignore_ascii_case("okx") || OKX_NAME_RE.is_match(&collapsed) {
        return WalletBrand::Okx.display_name().to_string();
    }
    collapsed
}

/// 目录去重键：小写，空白替换为 `-`
pub fn wallet_key(name: &str) -> String {
    normalize_wallet_name(name)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// 合并两路发现结果，先到先得
pub fn merge_catalog(
    announced: Vec<WalletProvider>,
    legacy: Vec<WalletProvider>,
) -> Vec<WalletProvider> {
    let mut catalog: Vec<WalletProvider> = Vec::new();
    let mut keys: HashSet<String> = HashSet::new();

    for candidate in announced.into_iter().chain(legacy) {
        let key = wallet_key(&candidate.name);
        if keys.contains(&key) {
            continue;
        }
        if catalog.iter().any(|p| p.same_handle_as(&candidate)) {
            continue;
        }
        if let Some(brand) = WalletBrand::unambiguous(&candidate.handle.flags()) {
            let duplicate_brand = catalog
                .iter()
                .any(|p| WalletBrand::unambiguous(&p.handle.flags()) == Some(brand));
            if duplicate_brand {
                tracing::debug!(name = %candidate.name, ?brand, "skipping duplicate wallet brand");
                continue;
            }
        }
        keys.insert(key);
        catalog.push(candidate);
    }

    catalog
}

/// 钱包发现服务
pub struct ProviderDetector {
    host: Arc<dyn DiscoveryHost>,
    config: DiscoveryConfig,
    catalog: RwLock<Arc<Vec<WalletProvider>>>,
}

impl ProviderDetector {
    pub fn new(host: Arc<dyn DiscoveryHost>, config: DiscoveryConfig) -> Self {
        Self {
            host,
            config,
            catalog: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// 重新发现并替换目录
    pub async fn discover(&self) -> Vec<WalletProvider> {
        let announced = self.collect_announced().await;
        let legacy = self.detect_legacy();
        let catalog = merge_catalog(announced, legacy);

        if catalog.is_empty() {
            tracing::warn!("No wallet provider detected");
        } else {
            tracing::info!(
                count = catalog.len(),
                wallets = ?catalog.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
                "Wallet providers discovered"
            );
        }

        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(catalog.clone());
        catalog
    }

    /// 最近一次发现的目录
    pub fn catalog(&self) -> Arc<Vec<WalletProvider>> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn collect_announced(&self) -> Vec<WalletProvider> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.host.request_providers(tx);
        tokio::time::sleep(Duration::from_millis(self.config.announce_window_ms)).await;
        self.host.stop_listening();

        let mut providers = Vec::new();
        while let Ok(announced) = rx.try_recv() {
            let name = normalize_wallet_name(&announced.name);
            if name.is_empty() {
                continue;
            }
            let brand = WalletBrand::probe(&announced.handle.flags());
            providers.push(WalletProvider {
                id: format!("eip6963-{}", wallet_key(&name)),
                name,
                handle: announced.handle,
                origin: ProviderOrigin::Announced,
                brand,
            });
        }
        providers
    }

    /// 旧式注入 provider（自身先去重）
    fn detect_legacy(&self) -> Vec<WalletProvider> {
        let okx_global = self.host.okx_global();
        let mut seen: Vec<SharedHandle> = Vec::new();
        let mut providers = Vec::new();

        for (index, handle) in self.host.injected_providers().into_iter().enumerate() {
            if seen.iter().any(|h| same_handle(h, &handle)) {
                continue;
            }

            let flags = handle.flags();
            let is_plain_metamask = flags.is_metamask && !flags.is_okx_wallet;
            let duplicate = seen.iter().any(|h| {
                let other = h.flags();
                (is_plain_metamask && other.is_metamask && !other.is_okx_wallet)
                    || (flags.is_okx_wallet && other.is_okx_wallet)
            });
            if duplicate {
                continue;
            }

            let mut brand = WalletBrand::probe(&flags);
            if brand == WalletBrand::Unknown
                && okx_global
                    .as_ref()
                    .is_some_and(|okx| same_handle(okx, &handle))
            {
                brand = WalletBrand::Okx;
            }

            providers.push(WalletProvider {
                id: WalletBrand::legacy_id(&flags, index),
                name: brand.display_name().to_string(),
                handle: handle.clone(),
                origin: ProviderOrigin::Injected,
                brand,
            });
            seen.push(handle);
        }

        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_wallet_name() {
        assert_eq!(normalize_wallet_name("OKX Wallet"), "OKEx Wallet");
        assert_eq!(normalize_wallet_name("  okx   wallet "), "OKEx Wallet");
        assert_eq!(normalize_wallet_name("OKX"), "OKEx Wallet");
        assert_eq!(normalize_wallet_name("OKXWallet"), "OKEx Wallet");
        assert_eq!(normalize_wallet_name("MetaMask"), "MetaMask");
        assert_eq!(normalize_wallet_name(" Coinbase  Wallet "), "Coinbase Wallet");
    }

    #[test]
    fn test_wallet_key() {
        assert_eq!(wallet_key("Coinbase Wallet"), "coinbase-wallet");
        assert_eq!(wallet_key("okx wallet"), "okex-wallet");
        assert_eq!(wallet_key("MetaMask"), "metamask");
    }
}
