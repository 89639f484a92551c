//! 钱包发现集成测试

mod common;

use std::sync::{atomic::Ordering, Arc};

use common::*;
use ironwallet::{
    config::DiscoveryConfig,
    domain::{ProviderFlags, ProviderOrigin, WalletBrand},
    infrastructure::provider::SharedHandle,
    service::ProviderDetector,
};

fn detector(host: Arc<MockDiscoveryHost>) -> ProviderDetector {
    ProviderDetector::new(
        host,
        DiscoveryConfig {
            announce_window_ms: 10,
        },
    )
}

fn shared(handle: &Arc<MockWalletHandle>) -> SharedHandle {
    handle.clone()
}

#[tokio::test]
async fn test_announced_and_injected_are_merged() {
    let metamask = MockWalletHandle::metamask();
    let okx = MockWalletHandle::okx();
    let coinbase = Arc::new(MockWalletHandle::new(ProviderFlags {
        is_coinbase_wallet: true,
        ..ProviderFlags::default()
    }));
    let host = Arc::new(MockDiscoveryHost {
        announced: vec![
            ("MetaMask".into(), shared(&metamask)),
            ("OKX Wallet".into(), shared(&okx)),
        ],
        injected: vec![shared(&metamask), shared(&okx), shared(&coinbase)],
        ..MockDiscoveryHost::default()
    });
    let detector = detector(host.clone());

    let catalog = detector.discover().await;

    let ids: Vec<&str> = catalog.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["eip6963-metamask", "eip6963-okex-wallet", "coinbase-2"]);
    let names: Vec<&str> = catalog.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["MetaMask", "OKEx Wallet", "Coinbase Wallet"]);
    assert_eq!(catalog[0].origin, ProviderOrigin::Announced);
    assert_eq!(catalog[2].origin, ProviderOrigin::Injected);
    assert_eq!(catalog[1].brand, WalletBrand::Okx);

    assert_eq!(detector.catalog().len(), 3);
    assert_eq!(host.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_multi_flag_wallet_does_not_hide_metamask() {
    let rabby = Arc::new(MockWalletHandle::new(ProviderFlags {
        is_metamask: true,
        is_rabby: true,
        ..ProviderFlags::default()
    }));
    let metamask = MockWalletHandle::metamask();
    let host = Arc::new(MockDiscoveryHost {
        announced: vec![("Rabby Wallet".into(), shared(&rabby))],
        injected: vec![shared(&metamask)],
        ..MockDiscoveryHost::default()
    });

    let catalog = detector(host).discover().await;

    let names: Vec<&str> = catalog.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Rabby Wallet", "MetaMask"]);
}

#[tokio::test]
async fn test_second_injected_metamask_is_dropped() {
    let first = MockWalletHandle::metamask();
    let second = MockWalletHandle::metamask();
    let host = Arc::new(MockDiscoveryHost {
        injected: vec![shared(&first), shared(&second), shared(&first)],
        ..MockDiscoveryHost::default()
    });

    let catalog = detector(host).discover().await;

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].id, "metamask-0");
    assert!(catalog[0].same_handle_as(&catalog[0].clone()));
}

#[tokio::test]
async fn test_flagless_okx_global_is_recognised() {
    let okx_without_flags = Arc::new(MockWalletHandle::new(ProviderFlags::default()));
    let host = Arc::new(MockDiscoveryHost {
        injected: vec![shared(&okx_without_flags)],
        okx_global: Some(shared(&okx_without_flags)),
        ..MockDiscoveryHost::default()
    });

    let catalog = detector(host).discover().await;

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].brand, WalletBrand::Okx);
    assert_eq!(catalog[0].name, "OKEx Wallet");
    assert_eq!(catalog[0].id, "wallet-0-unknown");
}

#[tokio::test]
async fn test_blank_announcements_are_ignored() {
    let metamask = MockWalletHandle::metamask();
    let host = Arc::new(MockDiscoveryHost {
        announced: vec![("   ".into(), shared(&metamask))],
        ..MockDiscoveryHost::default()
    });

    let detector = detector(host);
    assert!(detector.discover().await.is_empty());
    assert!(detector.catalog().is_empty());
}

#[tokio::test]
async fn test_single_announced_wallet_without_legacy_global() {
    let coinbase = Arc::new(MockWalletHandle::new(ProviderFlags {
        is_coinbase_wallet: true,
        ..ProviderFlags::default()
    }));
    let host = Arc::new(MockDiscoveryHost {
        announced: vec![("Coinbase Wallet".into(), shared(&coinbase))],
        ..MockDiscoveryHost::default()
    });

    let catalog = detector(host).discover().await;

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].id, "eip6963-coinbase-wallet");
    assert_eq!(catalog[0].name, "Coinbase Wallet");
}

#[tokio::test]
async fn test_repeated_discovery_is_stable() {
    let metamask = MockWalletHandle::metamask();
    let okx = MockWalletHandle::okx();
    let host = Arc::new(MockDiscoveryHost {
        announced: vec![("MetaMask".into(), shared(&metamask))],
        injected: vec![shared(&okx), shared(&metamask)],
        ..MockDiscoveryHost::default()
    });
    let detector = detector(host);

    let pairs = |catalog: &[ironwallet::domain::WalletProvider]| -> Vec<(String, String)> {
        catalog
            .iter()
            .map(|p| (p.name.clone(), p.id.clone()))
            .collect()
    };
    let first = pairs(&detector.discover().await);
    let second = pairs(&detector.discover().await);

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}
