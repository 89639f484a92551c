//! 钱包会话状态机
//!
//! 会话是"连接了哪个钱包、在哪条链、哪个账户"的唯一数据源：
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──accounts──▶ Connected
//!       ▲                        │                      │
//!       └──────── failure ───────┘◀──── disconnect ─────┘
//! ```
//!
//! - 已连接时切换钱包保持 `Connected`，只置 `connecting` 忙标记
//! - 同一时刻只允许一个连接/切链操作，第二个直接返回 `OperationInProgress`
//! - 状态放在 `std::sync::Mutex` 中，锁从不跨 `.await`
//! - 每个异步结果只在 epoch（连接/断开时递增）与当前 provider 未变时生效
//! - provider 事件经 `mpsc` 通道进入每个连接独占的转发任务，统一由
//!   `dispatch_provider_event` 处理
//! - UI 通过 `watch` 通道读取 `WalletView` 快照（先发最小状态，再发补全状态）

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use serde_json::json;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    domain::{
        network::{is_non_evm_chain_id, is_sentinel_chain_id},
        AccountInfo, NetworkBalanceInfo, ProviderOrigin, Session, SessionStatus, TokenInfo,
        WalletBrand, WalletProvider, ALL_NETWORKS_CHAIN_ID,
    },
    error::{WalletError, WalletResult},
    infrastructure::{
        event_bus::{EventBus, NoticeLevel, WalletEvent},
        evm_reader::EvmReader,
        provider::{
            parse_accounts, same_handle, ProviderEvent, ProviderRpcError, ProviderSigner,
            SharedHandle,
        },
        session_storage::{SessionStorage, LAST_CONNECTED_KEY, MANUAL_DISCONNECT_KEY},
    },
    service::{
        balance_aggregator::{AddressSet, BalanceAggregator},
        chain_registry::ChainRegistry,
        non_evm::{NonEvmAccount, NonEvmSessions},
        transfer_dispatcher::{SignerSource, TransferObserver, TransferReceipt},
    },
    utils::{chain_normalizer::normalize_chain_id, units::format_units},
};

/// 发布给 UI 的不可变快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletView {
    pub session: Session,
    pub accounts: Vec<AccountInfo>,
    pub native_balance: Option<String>,
    pub connected_wallet_id: Option<String>,
    pub selected_account: usize,
    pub all_networks: Vec<NetworkBalanceInfo>,
    pub non_evm_accounts: Vec<AccountInfo>,
    pub connecting: bool,
    pub network_switching: bool,
    pub loading: bool,
}

#[derive(Default)]
struct SessionCell {
    session: Session,
    accounts: Vec<AccountInfo>,
    native_balance: Option<String>,
    connected_wallet_id: Option<String>,
    selected_account: usize,
    all_networks: Vec<NetworkBalanceInfo>,
    connecting: bool,
    network_switching: bool,
    loading: bool,
    epoch: u64,
    pump: Option<JoinHandle<()>>,
}

impl SessionCell {
    fn is_active(&self, epoch: u64, handle: &SharedHandle) -> bool {
        self.epoch == epoch
            && self
                .session
                .active_handle()
                .is_some_and(|h| same_handle(h, handle))
    }
}

struct SessionInner {
    registry: Arc<ChainRegistry>,
    aggregator: Arc<BalanceAggregator>,
    non_evm: Arc<NonEvmSessions>,
    storage: Arc<dyn SessionStorage>,
    events: Arc<dyn EventBus>,
    state: Mutex<SessionCell>,
    view_tx: watch::Sender<WalletView>,
}

#[derive(Debug, Clone, Copy)]
enum BusyFlag {
    Connecting,
    Switching,
}

/// 忙标记，离开作用域时清除
struct OperationGuard<'a> {
    session: &'a WalletSession,
    flag: BusyFlag,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        {
            let mut cell = self.session.lock();
            match self.flag {
                BusyFlag::Connecting => cell.connecting = false,
                BusyFlag::Switching => cell.network_switching = false,
            }
        }
        self.session.publish_view();
    }
}

/// 钱包会话（可廉价克隆，内部共享）
#[derive(Clone)]
pub struct WalletSession {
    inner: Arc<SessionInner>,
}

impl WalletSession {
    pub fn new(
        registry: Arc<ChainRegistry>,
        aggregator: Arc<BalanceAggregator>,
        non_evm: Arc<NonEvmSessions>,
        storage: Arc<dyn SessionStorage>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        let (view_tx, _) = watch::channel(WalletView::default());
        Self {
            inner: Arc::new(SessionInner {
                registry,
                aggregator,
                non_evm,
                storage,
                events,
                state: Mutex::new(SessionCell::default()),
                view_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionCell> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============ 快照与事件 ============

    fn publish_view(&self) {
        let non_evm_accounts = self.inner.non_evm.display_accounts();
        let view = {
            let cell = self.lock();
            if let Err(violation) = cell.session.check_invariants() {
                tracing::error!(%violation, "Session invariant violated");
            }
            WalletView {
                session: cell.session.clone(),
                accounts: cell.accounts.clone(),
                native_balance: cell.native_balance.clone(),
                connected_wallet_id: cell.connected_wallet_id.clone(),
                selected_account: cell.selected_account,
                all_networks: cell.all_networks.clone(),
                non_evm_accounts,
                connecting: cell.connecting,
                network_switching: cell.network_switching,
                loading: cell.loading,
            }
        };
        self.inner.view_tx.send_replace(view);
    }

    async fn emit(&self, event: WalletEvent) {
        if let Err(e) = self.inner.events.publish(event).await {
            tracing::error!(error = ?e, "Failed to publish wallet event");
        }
    }

    async fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(WalletEvent::notice(level, message)).await;
    }

    /// 失败提示后返回错误
    async fn fail<T>(&self, err: WalletError) -> WalletResult<T> {
        let level = if err.is_benign() {
            NoticeLevel::Info
        } else {
            NoticeLevel::Error
        };
        tracing::warn!(code = err.code(), error = %err, "Wallet operation failed");
        self.notice(level, err.user_message()).await;
        Err(err)
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletView> {
        self.inner.view_tx.subscribe()
    }

    pub fn view(&self) -> WalletView {
        self.inner.view_tx.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn non_evm(&self) -> &Arc<NonEvmSessions> {
        &self.inner.non_evm
    }

    fn begin(&self, flag: BusyFlag) -> WalletResult<OperationGuard<'_>> {
        {
            let mut cell = self.lock();
            if cell.connecting || cell.network_switching {
                return Err(WalletError::OperationInProgress);
            }
            match flag {
                BusyFlag::Connecting => cell.connecting = true,
                BusyFlag::Switching => cell.network_switching = true,
            }
        }
        self.publish_view();
        Ok(OperationGuard {
            session: self,
            flag,
        })
    }

    // ============ 连接 ============

    /// 连接目录中的钱包
    pub async fn connect(&self, provider: &WalletProvider) -> WalletResult<()> {
        if !provider.handle.has_request() {
            return self
                .fail(WalletError::ProviderError("Invalid wallet provider".into()))
                .await;
        }
        if let Err(e) = Self::check_brand(provider) {
            return self.fail(e).await;
        }

        let guard = self.begin(BusyFlag::Connecting)?;

        let (epoch, from_disconnected) = {
            let mut cell = self.lock();
            let from_disconnected = cell.session.status == SessionStatus::Disconnected;
            if from_disconnected {
                cell.session.status = SessionStatus::Connecting;
            }
            (cell.epoch, from_disconnected)
        };
        self.publish_view();

        tracing::info!(wallet = %provider.name, id = %provider.id, "Connecting wallet");
        let result = provider
            .handle
            .request("eth_requestAccounts", json!([]))
            .await;

        let accounts = match result {
            Ok(value) => parse_accounts(&value),
            Err(e) => {
                self.restore_after_failed_connect(epoch, from_disconnected);
                drop(guard);
                return self
                    .fail(WalletError::ProviderError(e.detail_message()))
                    .await;
            }
        };
        let Some(address) = accounts.into_iter().next() else {
            self.restore_after_failed_connect(epoch, from_disconnected);
            drop(guard);
            return self
                .fail(WalletError::ConnectionRejected(
                    "No accounts found. Please unlock your wallet.".into(),
                ))
                .await;
        };

        let previous = match self.adopt(provider, &address, epoch) {
            Ok(previous) => previous,
            Err(e) => {
                drop(guard);
                return self.fail(e).await;
            }
        };

        self.emit(WalletEvent::Connected {
            wallet_id: provider.id.clone(),
            wallet_name: provider.name.clone(),
            address: address.clone(),
        })
        .await;
        let message = match previous {
            Some(_) => format!("Switched to {}", provider.name),
            None => format!("Connected to {}", provider.name),
        };
        self.notice(NoticeLevel::Success, message).await;

        drop(guard);
        self.refresh_wallet_info().await;
        Ok(())
    }

    /// 连接前的品牌一致性校验（重新读取 provider 标记）
    fn check_brand(provider: &WalletProvider) -> WalletResult<()> {
        let flags = provider.handle.flags();

        if provider.origin == ProviderOrigin::Injected {
            let live = WalletBrand::probe(&flags);
            let detected = if live == WalletBrand::Unknown {
                provider.brand
            } else {
                live
            };
            if detected.display_name() != provider.name {
                return Err(WalletError::ProviderMismatch {
                    selected: provider.name.clone(),
                    detected: detected.display_name().to_string(),
                });
            }
            if provider.name == WalletBrand::MetaMask.display_name() && flags.is_okx_wallet {
                return Err(WalletError::ProviderMismatch {
                    selected: provider.name.clone(),
                    detected: WalletBrand::Okx.display_name().to_string(),
                });
            }
        }

        // EIP-6963 公告的 provider 自带身份，不做品牌校验
        Ok(())
    }

    fn restore_after_failed_connect(&self, epoch: u64, from_disconnected: bool) {
        if !from_disconnected {
            return;
        }
        let mut cell = self.lock();
        if cell.epoch == epoch && cell.session.status == SessionStatus::Connecting {
            cell.session.status = SessionStatus::Disconnected;
        }
    }

    /// 采用新 provider：拆除旧监听、递增 epoch、提交最小状态
    fn adopt(
        &self,
        provider: &WalletProvider,
        address: &str,
        epoch: u64,
    ) -> WalletResult<Option<WalletProvider>> {
        let (previous, old_pump, new_epoch) = {
            let mut cell = self.lock();
            if cell.epoch != epoch {
                return Err(WalletError::ConnectionRejected("connection superseded".into()));
            }

            cell.epoch += 1;
            let previous = cell.session.provider.take();
            let display_chain_id = if is_sentinel_chain_id(&cell.session.display_chain_id) {
                cell.session.display_chain_id.clone()
            } else {
                String::new()
            };
            cell.session = Session {
                status: SessionStatus::Connected,
                provider: Some(provider.clone()),
                active_address: address.to_string(),
                active_chain_id: String::new(),
                display_chain_id,
                signer: None,
            };
            cell.accounts = vec![AccountInfo::placeholder(0, address)];
            cell.selected_account = 0;
            cell.native_balance = None;
            cell.connected_wallet_id = Some(provider.id.clone());
            cell.loading = false;
            (previous, cell.pump.take(), cell.epoch)
        };

        if let Some(task) = old_pump {
            task.abort();
        }
        if let Some(prev) = &previous {
            prev.handle.remove_all_listeners();
        }

        self.inner.storage.remove(MANUAL_DISCONNECT_KEY);
        self.inner.storage.set(LAST_CONNECTED_KEY, &provider.id);

        self.attach_listeners(provider.handle.clone(), new_epoch);
        self.publish_view();
        tracing::info!(wallet = %provider.name, %address, "Wallet connected");
        Ok(previous)
    }

    /// 注册 provider 事件并启动转发任务
    fn attach_listeners(&self, handle: SharedHandle, epoch: u64) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ProviderEvent>();
        handle.remove_all_listeners();
        if !handle.subscribe(tx) {
            tracing::debug!("Provider does not support events");
            return;
        }

        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let source = handle.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let session = WalletSession { inner };
                session.dispatch_provider_event(&source, event).await;
                if !session.lock().is_active(epoch, &source) {
                    break;
                }
            }
        });

        let mut cell = self.lock();
        if cell.epoch == epoch {
            cell.pump = Some(task);
        } else {
            task.abort();
        }
    }

    /// 静默恢复上次连接的钱包（用户主动断开后不恢复）
    pub async fn auto_reconnect(&self, catalog: &[WalletProvider]) -> WalletResult<bool> {
        if self.inner.storage.get(MANUAL_DISCONNECT_KEY).is_some() {
            tracing::debug!("Auto-reconnect suppressed after manual disconnect");
            return Ok(false);
        }
        let Some(wallet_id) = self.inner.storage.get(LAST_CONNECTED_KEY) else {
            return Ok(false);
        };
        let Some(provider) = catalog.iter().find(|p| p.id == wallet_id) else {
            return Ok(false);
        };
        if self.lock().session.is_connected() {
            return Ok(false);
        }

        let guard = self.begin(BusyFlag::Connecting)?;
        let epoch = self.lock().epoch;

        let accounts = match provider.handle.request("eth_accounts", json!([])).await {
            Ok(value) => parse_accounts(&value),
            Err(e) => {
                tracing::debug!(error = %e, "eth_accounts failed during auto-reconnect");
                return Ok(false);
            }
        };
        let Some(address) = accounts.into_iter().next() else {
            return Ok(false);
        };

        self.adopt(provider, &address, epoch)?;
        self.emit(WalletEvent::Connected {
            wallet_id: provider.id.clone(),
            wallet_name: provider.name.clone(),
            address,
        })
        .await;

        drop(guard);
        self.refresh_wallet_info().await;
        Ok(true)
    }

    // ============ 断开 ============

    /// 用户主动断开
    pub async fn disconnect(&self) {
        self.teardown(true, true).await;
        self.notice(NoticeLevel::Info, "Wallet disconnected").await;
    }

    async fn teardown(&self, manual: bool, abort_pump: bool) {
        let (previous, pump, wallet_id) = {
            let mut cell = self.lock();
            cell.epoch += 1;
            let previous = cell.session.provider.take();
            cell.session = Session::default();
            cell.accounts.clear();
            cell.native_balance = None;
            cell.selected_account = 0;
            cell.all_networks.clear();
            cell.loading = false;
            (previous, cell.pump.take(), cell.connected_wallet_id.take())
        };

        if let Some(prev) = &previous {
            prev.handle.remove_all_listeners();
        }
        if let Some(task) = pump {
            // 事件任务内部触发的断开不能中止自身
            if abort_pump {
                task.abort();
            }
        }
        if manual {
            self.inner.storage.set(MANUAL_DISCONNECT_KEY, "1");
            self.inner.storage.remove(LAST_CONNECTED_KEY);
        }

        self.publish_view();
        tracing::info!(?wallet_id, manual, "Wallet disconnected");
        self.emit(WalletEvent::Disconnected { wallet_id }).await;
    }

    // ============ provider 事件 ============

    /// provider 事件统一入口；来自已替换 provider 的事件直接丢弃
    pub async fn dispatch_provider_event(&self, source: &SharedHandle, event: ProviderEvent) {
        let is_active = self
            .lock()
            .session
            .active_handle()
            .is_some_and(|h| same_handle(h, source));
        if !is_active {
            tracing::debug!(?event, "Ignoring event from inactive provider");
            return;
        }

        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.into_iter().next() {
                None => self.teardown(false, false).await,
                Some(address) => {
                    {
                        let mut cell = self.lock();
                        cell.session.active_address = address.clone();
                        cell.session.signer = None;
                        cell.accounts = vec![AccountInfo::placeholder(0, &address)];
                        cell.selected_account = 0;
                    }
                    self.publish_view();
                    self.emit(WalletEvent::AccountChanged { address }).await;
                    self.refresh_wallet_info().await;
                }
            },
            ProviderEvent::ChainChanged(raw) => {
                let chain_id = normalize_chain_id(&raw).unwrap_or_else(|_| raw.to_lowercase());
                {
                    let mut cell = self.lock();
                    cell.session.active_chain_id = chain_id.clone();
                    cell.session.display_chain_id = chain_id.clone();
                    cell.session.signer = None;
                }
                self.publish_view();
                self.emit(WalletEvent::ChainChanged {
                    chain_id: chain_id.clone(),
                })
                .await;

                let registry = self.inner.registry.snapshot();
                match registry.get(&chain_id) {
                    Some(network) => {
                        self.notice(
                            NoticeLevel::Info,
                            format!("Network changed to {}", network.label()),
                        )
                        .await;
                    }
                    None => {
                        self.notice(
                            NoticeLevel::Warning,
                            format!("Switched to unsupported network (Chain ID: {})", chain_id),
                        )
                        .await;
                    }
                }
                self.refresh_wallet_info().await;
            }
            ProviderEvent::Disconnect => self.teardown(false, false).await,
        }
    }

    // ============ 切链 ============

    pub async fn switch_network(&self, target: &str) -> WalletResult<()> {
        let target = match normalize_chain_id(target) {
            Ok(id) => id,
            Err(_) => {
                return self
                    .fail(WalletError::UnsupportedNetwork(target.to_string()))
                    .await
            }
        };

        if target == ALL_NETWORKS_CHAIN_ID {
            let has_non_evm = self.inner.non_evm.has_any();
            let accepted = {
                let mut cell = self.lock();
                let accepted = cell.session.is_connected() || has_non_evm;
                if accepted {
                    cell.session.display_chain_id = target.clone();
                }
                accepted
            };
            if !accepted {
                return self.fail(WalletError::NotConnected).await;
            }
            self.publish_view();
            self.emit(WalletEvent::NetworkSwitched { chain_id: target }).await;
            self.refresh_all_networks().await;
            return Ok(());
        }

        if is_non_evm_chain_id(&target) {
            self.lock().session.display_chain_id = target.clone();
            self.publish_view();
            self.emit(WalletEvent::NetworkSwitched { chain_id: target }).await;
            return Ok(());
        }

        let current = {
            let cell = self.lock();
            cell.session
                .active_handle()
                .cloned()
                .map(|handle| (handle, cell.epoch, cell.session.active_chain_id.clone()))
        };
        let Some((handle, epoch, active_chain_id)) = current else {
            return self.fail(WalletError::NotConnected).await;
        };

        if active_chain_id == target {
            self.lock().session.display_chain_id = target.clone();
            self.publish_view();
            self.emit(WalletEvent::NetworkSwitched { chain_id: target }).await;
            return Ok(());
        }

        let registry = self.inner.registry.snapshot();
        let Some(network) = registry.get(&target).cloned() else {
            return self.fail(WalletError::UnsupportedNetwork(target)).await;
        };

        let guard = self.begin(BusyFlag::Switching)?;
        tracing::info!(chain_id = %target, "Switching network");

        let outcome = match handle
            .request("wallet_switchEthereumChain", json!([{ "chainId": target }]))
            .await
        {
            Ok(_) => Ok(false),
            Err(e) if e.has_code(ProviderRpcError::UNRECOGNIZED_CHAIN) => {
                tracing::info!(chain_id = %target, "Chain unknown to wallet, adding it");
                match handle
                    .request("wallet_addEthereumChain", json!([network.add_chain_params()]))
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(e) if e.has_code(ProviderRpcError::USER_REJECTED) => {
                        Err(WalletError::SwitchCancelled)
                    }
                    Err(e) => Err(WalletError::SwitchFailed(format!(
                        "Failed to add network: {}",
                        e.detail_message()
                    ))),
                }
            }
            Err(e) if e.has_code(ProviderRpcError::USER_REJECTED) => {
                Err(WalletError::SwitchCancelled)
            }
            Err(e) => Err(WalletError::SwitchFailed(e.detail_message())),
        };

        let added = match outcome {
            Ok(added) => added,
            Err(e) => {
                drop(guard);
                return self.fail(e).await;
            }
        };

        let applied = {
            let mut cell = self.lock();
            if cell.is_active(epoch, &handle) {
                cell.session.active_chain_id = target.clone();
                cell.session.display_chain_id = target.clone();
                cell.session.signer = None;
                true
            } else {
                false
            }
        };
        if !applied {
            tracing::debug!(chain_id = %target, "Session changed during network switch, result discarded");
            return Ok(());
        }

        self.publish_view();
        self.emit(WalletEvent::NetworkSwitched {
            chain_id: target.clone(),
        })
        .await;
        let message = if added {
            format!("Added and switched to {}", network.chain_name)
        } else {
            format!("Switched to {}", network.chain_name)
        };
        self.notice(NoticeLevel::Success, message).await;

        drop(guard);
        self.refresh_wallet_info().await;
        Ok(())
    }

    // ============ 数据刷新 ============

    /// 重新读取链、余额、账户与签名者
    pub async fn refresh_wallet_info(&self) {
        let snapshot = {
            let mut cell = self.lock();
            let snapshot = cell.session.active_handle().cloned().map(|handle| {
                (
                    handle,
                    cell.session.active_address.clone(),
                    cell.session.active_chain_id.clone(),
                    cell.epoch,
                    cell.selected_account,
                )
            });
            if snapshot.is_some() {
                cell.loading = true;
            }
            snapshot
        };
        let Some((handle, address, known_chain, epoch, selected)) = snapshot else {
            return;
        };
        self.publish_view();

        let reader = EvmReader::new(handle.as_ref());
        let chain_id = match reader.chain_id().await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read chain id");
                None
            }
        };
        let chain = chain_id.clone().unwrap_or(known_chain);
        let decimals = self.inner.registry.snapshot().native_decimals(&chain);

        let balance = match reader.native_balance(&address).await {
            Ok(wei) => Some(format_units(wei, decimals)),
            Err(e) => {
                tracing::warn!(%address, error = %e, "Failed to read native balance");
                None
            }
        };
        let accounts = self
            .inner
            .aggregator
            .fetch_accounts(handle.as_ref(), &chain, selected)
            .await;

        let show_all = {
            let mut cell = self.lock();
            if !cell.is_active(epoch, &handle) {
                tracing::debug!("Session changed during refresh, result discarded");
                return;
            }
            if let Some(id) = chain_id {
                cell.session.active_chain_id = id.clone();
                if !is_sentinel_chain_id(&cell.session.display_chain_id) {
                    cell.session.display_chain_id = id;
                }
            }
            if balance.is_some() {
                cell.native_balance = balance;
            }
            match accounts {
                Ok(accounts) if !accounts.is_empty() => {
                    if cell.selected_account >= accounts.len() {
                        cell.selected_account = 0;
                    }
                    cell.accounts = accounts;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to fetch accounts"),
            }
            let signer = ProviderSigner::new(
                handle.clone(),
                &cell.session.active_address,
                &cell.session.active_chain_id,
            );
            cell.session.signer = Some(signer);
            cell.loading = false;
            cell.session.display_chain_id == ALL_NETWORKS_CHAIN_ID
        };
        self.publish_view();

        if show_all {
            self.refresh_all_networks().await;
        }
    }

    /// 选中账户并加载其代币
    pub async fn select_account(&self, index: usize) -> WalletResult<Vec<TokenInfo>> {
        {
            let mut cell = self.lock();
            if index >= cell.accounts.len() {
                return Err(WalletError::InvalidInput(format!(
                    "Account index {} out of range",
                    index
                )));
            }
            cell.selected_account = index;
        }
        self.publish_view();
        self.fetch_tokens_for_account(index).await
    }

    pub async fn fetch_tokens_for_account(&self, index: usize) -> WalletResult<Vec<TokenInfo>> {
        let target = {
            let cell = self.lock();
            let handle = cell.session.active_handle().cloned();
            let address = cell.accounts.get(index).map(|a| a.address.clone());
            match (handle, address) {
                (Some(handle), Some(address)) => Some((
                    handle,
                    address,
                    cell.session.active_chain_id.clone(),
                    cell.epoch,
                )),
                _ => None,
            }
        };
        let Some((handle, address, chain_id, epoch)) = target else {
            return Err(WalletError::NotConnected);
        };

        let tokens = self
            .inner
            .aggregator
            .fetch_account_tokens(handle.as_ref(), &address, &chain_id)
            .await;

        {
            let mut cell = self.lock();
            if cell.is_active(epoch, &handle) {
                if let Some(account) = cell
                    .accounts
                    .get_mut(index)
                    .filter(|a| a.address == address)
                {
                    account.tokens = tokens.clone();
                }
            }
        }
        self.publish_view();
        Ok(tokens)
    }

    /// "所有网络"聚合：EVM 账户 + Solana + Bitcoin
    pub async fn refresh_all_networks(&self) -> Vec<NetworkBalanceInfo> {
        let (evm, epoch) = {
            let cell = self.lock();
            let mut evm: Vec<String> = Vec::new();
            if cell.session.is_connected() {
                let addresses = cell
                    .accounts
                    .iter()
                    .map(|a| a.address.clone())
                    .chain(std::iter::once(cell.session.active_address.clone()));
                for address in addresses {
                    if !address.is_empty()
                        && !evm.iter().any(|a| a.eq_ignore_ascii_case(&address))
                    {
                        evm.push(address);
                    }
                }
            }
            (evm, cell.epoch)
        };
        self.inner.non_evm.refresh_balances().await;
        let (solana, bitcoin) = self.inner.non_evm.addresses();
        let addresses = AddressSet {
            evm,
            solana,
            bitcoin,
        };

        if addresses.is_empty() {
            self.lock().all_networks.clear();
            self.publish_view();
            return Vec::new();
        }

        self.lock().loading = true;
        self.publish_view();

        let registry = self.inner.registry.snapshot();
        let rows = self
            .inner
            .aggregator
            .fetch_all_networks(&registry, &addresses)
            .await;

        {
            let mut cell = self.lock();
            if cell.epoch == epoch {
                cell.all_networks = rows.clone();
            }
            cell.loading = false;
        }
        self.publish_view();
        rows
    }

    // ============ 非 EVM ============

    pub async fn connect_solana(&self) -> WalletResult<NonEvmAccount> {
        match self.inner.non_evm.connect_solana().await {
            Ok(account) => {
                self.publish_view();
                self.notice(NoticeLevel::Success, "Solana wallet connected").await;
                Ok(account)
            }
            Err(e) => self.fail(e).await,
        }
    }

    pub async fn connect_bitcoin(&self) -> WalletResult<NonEvmAccount> {
        match self.inner.non_evm.connect_bitcoin().await {
            Ok(account) => {
                self.publish_view();
                self.notice(NoticeLevel::Success, "Bitcoin wallet connected").await;
                Ok(account)
            }
            Err(e) => self.fail(e).await,
        }
    }

    pub async fn disconnect_solana(&self) {
        self.inner.non_evm.disconnect_solana().await;
        self.publish_view();
    }

    pub async fn disconnect_bitcoin(&self) {
        self.inner.non_evm.disconnect_bitcoin();
        self.publish_view();
    }
}

impl SignerSource for WalletSession {
    fn active_signer(&self) -> Option<ProviderSigner> {
        let cell = self.lock();
        if !cell.session.is_connected() {
            return None;
        }
        cell.session.signer.clone().or_else(|| {
            cell.session.active_handle().map(|handle| {
                ProviderSigner::new(
                    handle.clone(),
                    &cell.session.active_address,
                    &cell.session.active_chain_id,
                )
            })
        })
    }
}

#[async_trait]
impl TransferObserver for WalletSession {
    async fn on_transfer_confirmed(&self, receipt: &TransferReceipt) {
        tracing::debug!(tx_hash = %receipt.tx_hash, "Refreshing balances after transfer");
        self.refresh_wallet_info().await;
    }
}
