//! 测试辅助模块
//! 脚本化的钱包 provider、发现宿主与只读 RPC

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use ironwallet::{
    config::AggregationConfig,
    domain::{ProviderFlags, ProviderOrigin, WalletBrand, WalletProvider},
    infrastructure::{
        event_bus::InMemoryEventBus,
        provider::{
            ProviderEvent, ProviderEventSink, ProviderRpcError, RpcTransport, SharedHandle,
            WalletHandle,
        },
        rpc_client::{NonEvmBalanceSource, TransportFactory},
        session_storage::InMemorySessionStorage,
    },
    service::{
        provider_detector::{AnnouncedProvider, DiscoveryHost},
        BalanceAggregator, ChainRegistry, NetworkRegistry, NonEvmSessions, WalletSession,
    },
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};

pub const ALICE: &str = "0x1111111111111111111111111111111111111111";
pub const BOB: &str = "0x2222222222222222222222222222222222222222";
pub const SOL_ADDRESS: &str = "So11111111111111111111111111111111111111112";
pub const BTC_ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

/// 1 ETH
pub const ONE_ETHER_HEX: &str = "0xde0b6b3a7640000";

/// 脚本化的注入钱包
pub struct MockWalletHandle {
    flags: Mutex<ProviderFlags>,
    defaults: Mutex<HashMap<String, Value>>,
    scripted: Mutex<HashMap<String, VecDeque<Result<Value, ProviderRpcError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
    sinks: Mutex<Vec<ProviderEventSink>>,
    removals: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    contracts: Mutex<Vec<String>>,
    supports_events: bool,
}

impl MockWalletHandle {
    pub fn new(flags: ProviderFlags) -> Self {
        let defaults = HashMap::from([
            ("eth_chainId".to_string(), json!("0x1")),
            ("eth_accounts".to_string(), json!([ALICE])),
            ("eth_requestAccounts".to_string(), json!([ALICE])),
            ("eth_getBalance".to_string(), json!(ONE_ETHER_HEX)),
        ]);
        Self {
            flags: Mutex::new(flags),
            defaults: Mutex::new(defaults),
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
            removals: AtomicUsize::new(0),
            gate: Mutex::new(None),
            contracts: Mutex::new(Vec::new()),
            supports_events: true,
        }
    }

    pub fn metamask() -> Arc<Self> {
        Arc::new(Self::new(ProviderFlags::metamask()))
    }

    pub fn okx() -> Arc<Self> {
        Arc::new(Self::new(ProviderFlags::okx()))
    }

    pub fn without_events(mut self) -> Self {
        self.supports_events = false;
        self
    }

    pub fn set_flags(&self, flags: ProviderFlags) {
        *self.flags.lock().unwrap() = flags;
    }

    pub fn set_default(&self, method: &str, value: Value) {
        self.defaults.lock().unwrap().insert(method.to_string(), value);
    }

    /// 下一次调用 `method` 的结果（先进先出）
    pub fn push_response(&self, method: &str, result: Result<Value, ProviderRpcError>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    /// `eth_getCode` 对该地址返回非空字节码
    pub fn mark_contract(&self, address: &str) {
        self.contracts.lock().unwrap().push(address.to_lowercase());
    }

    /// 让 `eth_requestAccounts` 挂起，直到返回的 Notify 被触发
    pub fn hold_account_requests(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls(method).len()
    }

    /// 向当前监听者推送事件，返回收到事件的监听者数量
    pub fn emit(&self, event: ProviderEvent) -> usize {
        self.sinks
            .lock()
            .unwrap()
            .iter()
            .filter(|sink| sink.send(event.clone()).is_ok())
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn removal_count(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcTransport for MockWalletHandle {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        if method == "eth_requestAccounts" {
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        let result = match scripted {
            Some(result) => result,
            None if method == "eth_getCode" => {
                let target = params[0].as_str().unwrap_or_default().to_lowercase();
                let is_contract = self.contracts.lock().unwrap().contains(&target);
                Ok(json!(if is_contract { "0x6080604052" } else { "0x" }))
            }
            None => self
                .defaults
                .lock()
                .unwrap()
                .get(method)
                .cloned()
                .ok_or_else(|| ProviderRpcError::new(-32601, format!("{} not supported", method))),
        };

        // 切链成功后钱包的 eth_chainId 随之变化
        if result.is_ok()
            && matches!(method, "wallet_switchEthereumChain" | "wallet_addEthereumChain")
        {
            if let Some(chain_id) = params[0].get("chainId").cloned() {
                self.set_default("eth_chainId", chain_id);
            }
        }

        result
    }
}

impl WalletHandle for MockWalletHandle {
    fn flags(&self) -> ProviderFlags {
        self.flags.lock().unwrap().clone()
    }

    fn subscribe(&self, sink: ProviderEventSink) -> bool {
        if !self.supports_events {
            return false;
        }
        self.sinks.lock().unwrap().push(sink);
        true
    }

    fn remove_all_listeners(&self) {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().clear();
    }
}

/// 构造目录条目
pub fn wallet_provider(
    id: &str,
    handle: Arc<MockWalletHandle>,
    origin: ProviderOrigin,
) -> WalletProvider {
    let brand = WalletBrand::probe(&handle.flags());
    WalletProvider {
        id: id.to_string(),
        name: brand.display_name().to_string(),
        handle,
        origin,
        brand,
    }
}

/// 发现宿主：一次性公告 + 固定的注入列表
#[derive(Default)]
pub struct MockDiscoveryHost {
    pub announced: Vec<(String, SharedHandle)>,
    pub injected: Vec<SharedHandle>,
    pub okx_global: Option<SharedHandle>,
    pub stopped: AtomicUsize,
}

impl DiscoveryHost for MockDiscoveryHost {
    fn request_providers(&self, sink: mpsc::UnboundedSender<AnnouncedProvider>) {
        for (name, handle) in &self.announced {
            let _ = sink.send(AnnouncedProvider::new(name.clone(), handle.clone()));
        }
    }

    fn stop_listening(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn injected_providers(&self) -> Vec<SharedHandle> {
        self.injected.clone()
    }

    fn okx_global(&self) -> Option<SharedHandle> {
        self.okx_global.clone()
    }
}

/// 只读 RPC：固定原生余额，eth_call 一律失败
pub struct StaticTransport {
    pub balance_hex: String,
}

#[async_trait]
impl RpcTransport for StaticTransport {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, ProviderRpcError> {
        match method {
            "eth_getBalance" => Ok(json!(self.balance_hex)),
            _ => Err(ProviderRpcError::other("execution reverted")),
        }
    }
}

pub struct FailingTransport;

#[async_trait]
impl RpcTransport for FailingTransport {
    async fn request(&self, _method: &str, _params: Value) -> Result<Value, ProviderRpcError> {
        Err(ProviderRpcError::other("connection refused"))
    }
}

/// 指定链失败，其余链返回 1 个原生币
pub struct MockTransportFactory {
    pub failing_chains: Vec<String>,
}

impl TransportFactory for MockTransportFactory {
    fn transport_for(&self, chain_id: &str, _url: &str) -> Arc<dyn RpcTransport> {
        if self.failing_chains.iter().any(|c| c == chain_id) {
            Arc::new(FailingTransport)
        } else {
            Arc::new(StaticTransport {
                balance_hex: ONE_ETHER_HEX.to_string(),
            })
        }
    }
}

pub struct MockBalances {
    pub lamports: u64,
    pub sats: u64,
}

#[async_trait]
impl NonEvmBalanceSource for MockBalances {
    async fn solana_lamports(&self, _address: &str) -> anyhow::Result<u64> {
        Ok(self.lamports)
    }

    async fn bitcoin_sats(&self, _address: &str) -> anyhow::Result<u64> {
        Ok(self.sats)
    }
}

/// 完整装配的会话
pub struct TestWallet {
    pub session: WalletSession,
    pub storage: Arc<InMemorySessionStorage>,
    pub events: Arc<InMemoryEventBus>,
}

pub fn test_aggregation_config() -> AggregationConfig {
    AggregationConfig {
        max_concurrent_chains: 4,
        per_chain_timeout_ms: 2_000,
        include_testnets: false,
    }
}

pub fn build_wallet(non_evm: NonEvmSessions) -> TestWallet {
    build_wallet_with_storage(non_evm, Arc::new(InMemorySessionStorage::new()))
}

pub fn build_wallet_with_storage(
    non_evm: NonEvmSessions,
    storage: Arc<InMemorySessionStorage>,
) -> TestWallet {
    let aggregator = Arc::new(BalanceAggregator::new(
        Arc::new(MockTransportFactory {
            failing_chains: Vec::new(),
        }),
        Arc::new(MockBalances {
            lamports: 1_500_000_000,
            sats: 50_000,
        }),
        test_aggregation_config(),
    ));
    let events = Arc::new(InMemoryEventBus::new());
    let session = WalletSession::new(
        Arc::new(ChainRegistry::with_registry(NetworkRegistry::builtin())),
        aggregator,
        Arc::new(non_evm),
        storage.clone(),
        events.clone(),
    );
    TestWallet {
        session,
        storage,
        events,
    }
}

pub fn default_non_evm() -> NonEvmSessions {
    NonEvmSessions::new(Arc::new(MockBalances {
        lamports: 1_500_000_000,
        sats: 50_000,
    }))
}

/// 等待事件转发任务处理完
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
