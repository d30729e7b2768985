//! # 实时分发中心
//!
//! 每个观察者持有一个有界队列，广播使用 `try_send` 从不阻塞发布方；
//! 队列已满或已关闭的观察者会被移出分发集合，其余观察者不受影响。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use super::pagination::PaginationData;
use super::record::TraceRecord;
use crate::error::TraceError;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 默认的观察者队列长度
pub const DEFAULT_OBSERVER_BUFFER: usize = 256;

/// 观察者连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// 宿主进程中某个服务的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerRunState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub server: String,
    pub status: ServerRunState,
}

/// 完整列表消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBatch {
    pub traces: Vec<Arc<TraceRecord>>,
    pub pagination: PaginationData,
}

/// 推送给观察者的消息，序列化为 `{"type": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum HubMessage {
    NewTrace(Arc<TraceRecord>),
    Traces(TraceBatch),
    Status(ConnectionStatus),
    ServerStatus(ServerStatus),
}

impl HubMessage {
    /// 消息类型名（用于日志）
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewTrace(_) => "newTrace",
            Self::Traces(_) => "traces",
            Self::Status(_) => "status",
            Self::ServerStatus(_) => "serverStatus",
        }
    }
}

/// 分发统计
#[derive(Debug, Default)]
pub struct HubStats {
    connections_accepted: AtomicU64,
    active_connections: AtomicU64,
    messages_sent: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStatsSnapshot {
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub messages_sent: u64,
    pub evictions: u64,
}

impl HubStats {
    fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

struct ObserverHandle {
    tx: mpsc::Sender<Arc<HubMessage>>,
    status: watch::Sender<ConnectionStatus>,
}

pub struct DistributionHub {
    observers: DashMap<u64, ObserverHandle>,
    next_id: AtomicU64,
    buffer: usize,
    stats: HubStats,
}

impl std::fmt::Debug for DistributionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionHub")
            .field("observers", &self.observers.len())
            .field("buffer", &self.buffer)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl Default for DistributionHub {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVER_BUFFER)
    }
}

impl DistributionHub {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            stats: HubStats::default(),
        }
    }

    /// 注册新观察者，第一条消息为 `status: connected`
    pub fn connect(self: &Arc<Self>) -> Observer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        // 新建队列至少有一个空位
        let _ = tx.try_send(Arc::new(HubMessage::Status(ConnectionStatus::Connected)));
        status_tx.send_replace(ConnectionStatus::Connected);

        self.observers.insert(
            id,
            ObserverHandle {
                tx,
                status: status_tx,
            },
        );
        self.stats.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.stats.active_connections.fetch_add(1, Ordering::Relaxed);

        ldebug!(
            "system",
            LogStage::Distribution,
            LogComponent::Hub,
            "observer_connected",
            "观察者已连接",
            observer_id = id,
            observers = self.observers.len()
        );

        Observer {
            id,
            rx,
            status: status_rx,
            hub: Arc::downgrade(self),
        }
    }

    /// 向所有观察者发送消息，返回成功投递的数量
    pub fn broadcast(&self, message: HubMessage) -> usize {
        let message = Arc::new(message);
        let mut delivered = 0;
        let mut failed = Vec::new();

        for entry in &self.observers {
            match entry.tx.try_send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => failed.push((*entry.key(), "queue full")),
                Err(TrySendError::Closed(_)) => failed.push((*entry.key(), "queue closed")),
            }
        }
        // 迭代期间持有分片读锁，移除放到循环之后
        for (id, reason) in failed {
            if self.remove(id) {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                let err = TraceError::distribution(id, reason);
                lwarn!(
                    "system",
                    LogStage::Distribution,
                    LogComponent::Hub,
                    "observer_evicted",
                    "观察者投递失败，已移出分发集合",
                    kind = message.kind(),
                    error = err.to_string(),
                    category = err.category()
                );
            }
        }

        self.stats
            .messages_sent
            .fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    pub fn broadcast_new_record(&self, record: Arc<TraceRecord>) -> usize {
        self.broadcast(HubMessage::NewTrace(record))
    }

    pub fn broadcast_batch(&self, traces: Vec<Arc<TraceRecord>>, pagination: PaginationData) -> usize {
        self.broadcast(HubMessage::Traces(TraceBatch { traces, pagination }))
    }

    pub fn broadcast_server_status(&self, status: ServerStatus) -> usize {
        self.broadcast(HubMessage::ServerStatus(status))
    }

    /// 向单个观察者发送消息（用于连接时的初始快照）
    pub fn send_to(&self, id: u64, message: HubMessage) -> bool {
        let sent = self
            .observers
            .get(&id)
            .is_some_and(|handle| handle.tx.try_send(Arc::new(message)).is_ok());
        if sent {
            self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    /// 主动断开观察者
    pub fn disconnect(&self, id: u64) -> bool {
        let removed = self.remove(id);
        if removed {
            ldebug!(
                "system",
                LogStage::Distribution,
                LogComponent::Hub,
                "observer_disconnected",
                "观察者已断开",
                observer_id = id
            );
        }
        removed
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn stats(&self) -> HubStatsSnapshot {
        self.stats.snapshot()
    }

    fn remove(&self, id: u64) -> bool {
        match self.observers.remove(&id) {
            Some((_, handle)) => {
                handle.status.send_replace(ConnectionStatus::Disconnected);
                self.stats.active_connections.fetch_sub(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

/// 观察者句柄，drop 时自动注销
pub struct Observer {
    id: u64,
    rx: mpsc::Receiver<Arc<HubMessage>>,
    status: watch::Receiver<ConnectionStatus>,
    hub: Weak<DistributionHub>,
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Observer {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// 等待下一条消息；被移出分发集合且队列耗尽后返回 `None`
    pub async fn recv(&mut self) -> Option<Arc<HubMessage>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<HubMessage>> {
        self.rx.try_recv().ok()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.disconnect(self.id);
        }
    }
}
