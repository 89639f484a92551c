//! 基准测试 - 钱包目录合并与链列表转换
//!
//! 测试场景:
//! 1. 公告 + 注入 provider 合并（含重复项）
//! 2. chains.json 全量转换为网络注册表

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ironwallet::{
    domain::{ProviderFlags, ProviderOrigin, WalletBrand, WalletProvider},
    infrastructure::provider::{ProviderRpcError, RpcTransport, WalletHandle},
    service::{
        chain_registry::{build_registry_from_chain_list, ChainListEntry},
        provider_detector::merge_catalog,
    },
};
use serde_json::{json, Value};

struct BenchHandle(ProviderFlags);

#[async_trait]
impl RpcTransport for BenchHandle {
    async fn request(&self, _method: &str, _params: Value) -> Result<Value, ProviderRpcError> {
        Ok(Value::Null)
    }
}

impl WalletHandle for BenchHandle {
    fn flags(&self) -> ProviderFlags {
        self.0.clone()
    }
}

fn brand_flags(index: usize) -> ProviderFlags {
    let mut flags = ProviderFlags::default();
    match index % 5 {
        0 => flags.is_metamask = true,
        1 => {
            flags.is_metamask = true;
            flags.is_okx_wallet = true;
        }
        2 => flags.is_coinbase_wallet = true,
        3 => flags.is_trust = true,
        _ => {}
    }
    flags
}

fn providers(count: usize, origin: ProviderOrigin) -> Vec<WalletProvider> {
    (0..count)
        .map(|i| {
            let flags = brand_flags(i);
            let brand = WalletBrand::probe(&flags);
            WalletProvider {
                id: format!("wallet-{}", i),
                name: format!("{} {}", brand.display_name(), i % 7),
                handle: Arc::new(BenchHandle(flags)),
                origin,
                brand,
            }
        })
        .collect()
}

fn bench_merge_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_catalog");

    for size in [4usize, 16, 64] {
        let announced = providers(size, ProviderOrigin::Announced);
        let legacy = providers(size, ProviderOrigin::Injected);
        group.throughput(Throughput::Elements((size * 2) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| merge_catalog(black_box(announced.clone()), black_box(legacy.clone())))
        });
    }

    group.finish();
}

fn bench_chain_list_conversion(c: &mut Criterion) {
    let entries: Vec<ChainListEntry> = (1..=2_000u64)
        .map(|chain_id| {
            serde_json::from_value(json!({
                "name": format!("Chain {}", chain_id),
                "chain": "ETH",
                "chainId": chain_id,
                "shortName": format!("c{}", chain_id),
                "networkId": chain_id,
                "nativeCurrency": { "name": "Ether", "symbol": "ETH", "decimals": 18 },
                "rpc": [format!("https://rpc.chain{}.example/", chain_id)],
            }))
            .unwrap()
        })
        .collect();

    c.bench_function("build_registry_from_chain_list_2000", |b| {
        b.iter(|| build_registry_from_chain_list(black_box(&entries)))
    });
}

criterion_group!(benches, bench_merge_catalog, bench_chain_list_conversion);
criterion_main!(benches);
