// Event Bus
// 会话事件发布/订阅：UI 提示（Notice）与状态变化通知都走这里

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

// ============ 事件类型定义 ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum WalletEvent {
    Connected {
        wallet_id: String,
        wallet_name: String,
        address: String,
    },
    Disconnected {
        wallet_id: Option<String>,
    },
    AccountChanged {
        address: String,
    },
    ChainChanged {
        chain_id: String,
    },
    NetworkSwitched {
        chain_id: String,
    },
    TransferSubmitted {
        tx_hash: String,
        token_address: String,
        to_address: String,
    },
    TransferConfirmed {
        tx_hash: String,
        block_number: Option<u64>,
    },
    /// 面向用户的提示
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

impl WalletEvent {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        WalletEvent::Notice {
            level,
            message: message.into(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            WalletEvent::Connected { .. } => "Connected",
            WalletEvent::Disconnected { .. } => "Disconnected",
            WalletEvent::AccountChanged { .. } => "AccountChanged",
            WalletEvent::ChainChanged { .. } => "ChainChanged",
            WalletEvent::NetworkSwitched { .. } => "NetworkSwitched",
            WalletEvent::TransferSubmitted { .. } => "TransferSubmitted",
            WalletEvent::TransferConfirmed { .. } => "TransferConfirmed",
            WalletEvent::Notice { .. } => "Notice",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: u64,
    pub event: WalletEvent,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

// ============ Event Handler Trait ============

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &WalletEvent) -> Result<()>;
    fn event_types(&self) -> Vec<&'static str>;
}

// ============ Event Bus 接口 ============

#[async_trait]
pub trait EventBus: Send + Sync {
    /// 发布事件
    async fn publish(&self, event: WalletEvent) -> Result<()>;

    /// 订阅事件
    async fn subscribe(&self, handler: Arc<dyn EventHandler>);

    /// 获取事件历史（最新在前）
    async fn get_event_history(&self, limit: usize, offset: usize) -> Result<Vec<EventEnvelope>>;
}

// ============ 内存 Event Bus 实现 ============

const DEFAULT_HISTORY_CAPACITY: usize = 256;

pub struct InMemoryEventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    history: Mutex<VecDeque<EventEnvelope>>,
    capacity: usize,
    next_id: AtomicU64,
    sender: broadcast::Sender<EventEnvelope>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: RwLock::new(Vec::new()),
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// 事件流（UI 订阅用，慢消费者会丢弃旧事件）
    pub fn listen(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// 历史中的提示文案（按发布顺序）
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|envelope| match &envelope.event {
                WalletEvent::Notice { level, message } => Some((*level, message.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: WalletEvent) -> Result<()> {
        let envelope = EventEnvelope {
            event_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            event,
            published_at: chrono::Utc::now(),
        };

        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(envelope.clone());
        }

        // 没有接收者时 send 返回 Err，忽略
        let _ = self.sender.send(envelope.clone());

        let handlers = self.handlers.read().await;
        let event_type = envelope.event.event_type();
        for handler in handlers.iter() {
            if handler.event_types().contains(&event_type) {
                if let Err(e) = handler.handle(&envelope.event).await {
                    tracing::error!(error = ?e, event_type, "Event handler error");
                }
            }
        }

        Ok(())
    }

    async fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    async fn get_event_history(&self, limit: usize, offset: usize) -> Result<Vec<EventEnvelope>> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(history
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============ 日志 Handler ============

/// 把提示与转账事件写入 tracing
pub struct TracingEventHandler;

#[async_trait]
impl EventHandler for TracingEventHandler {
    async fn handle(&self, event: &WalletEvent) -> Result<()> {
        match event {
            WalletEvent::Notice { level, message } => match level {
                NoticeLevel::Error => tracing::error!(%message, "wallet notice"),
                NoticeLevel::Warning => tracing::warn!(%message, "wallet notice"),
                _ => tracing::info!(%message, "wallet notice"),
            },
            WalletEvent::TransferSubmitted { tx_hash, .. } => {
                tracing::info!(%tx_hash, "transfer submitted");
            }
            WalletEvent::TransferConfirmed {
                tx_hash,
                block_number,
            } => {
                tracing::info!(%tx_hash, ?block_number, "transfer confirmed");
            }
            _ => {}
        }
        Ok(())
    }

    fn event_types(&self) -> Vec<&'static str> {
        vec!["Notice", "TransferSubmitted", "TransferConfirmed"]
    }
}
