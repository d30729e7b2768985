//! # 追踪系统
//!
//! 组合记录存储与分发中心。发布、清空和订阅共用一把发布锁，
//! 保证已连接的观察者按追加顺序看到之后的每一条记录，不重不漏。

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::hub::{DistributionHub, HubStatsSnapshot, Observer, ServerRunState, ServerStatus, TraceBatch};
use super::pagination::{PaginationData, PaginationParams};
use super::record::TraceRecord;
use super::store::TraceStore;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};

/// 新订阅：观察者句柄 + 订阅时刻的首页快照与服务状态
#[derive(Debug)]
pub struct Subscription {
    pub observer: Observer,
    pub initial: TraceBatch,
    pub servers: Vec<ServerStatus>,
}

#[derive(Debug)]
pub struct TraceSystem {
    store: TraceStore,
    hub: Arc<DistributionHub>,
    publish_lock: Mutex<()>,
    servers: DashMap<String, ServerRunState>,
}

impl TraceSystem {
    #[must_use]
    pub fn new(max_records: usize, observer_buffer: usize) -> Self {
        Self {
            store: TraceStore::new(max_records),
            hub: Arc::new(DistributionHub::new(observer_buffer)),
            publish_lock: Mutex::new(()),
            servers: DashMap::new(),
        }
    }

    /// 写入存储并推送 `newTrace`
    pub fn publish(&self, record: TraceRecord) -> Arc<TraceRecord> {
        let record = Arc::new(record);
        let _guard = self.publish_lock.lock();
        self.store.append(Arc::clone(&record));
        let delivered = self.hub.broadcast_new_record(Arc::clone(&record));

        ldebug!(
            &record.id,
            LogStage::Storage,
            LogComponent::Store,
            "record_published",
            "追踪记录已发布",
            method = record.method,
            path = record.path,
            status = record.status,
            complete = record.complete,
            observers = delivered
        );
        record
    }

    #[must_use]
    pub fn list(&self, params: PaginationParams) -> (Vec<Arc<TraceRecord>>, PaginationData) {
        self.store.list(params)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<TraceRecord>> {
        self.store.get(id)
    }

    /// 清空记录并向观察者推送空列表
    pub fn clear(&self) -> usize {
        let _guard = self.publish_lock.lock();
        let removed = self.store.clear();
        let (traces, pagination) = self.store.list(PaginationParams::default());
        self.hub.broadcast_batch(traces, pagination);

        linfo!(
            "system",
            LogStage::Storage,
            LogComponent::Store,
            "records_cleared",
            "追踪记录已清空",
            removed = removed
        );
        removed
    }

    /// 注册观察者并取得首页快照
    pub fn subscribe(&self, limit: u64) -> Subscription {
        let _guard = self.publish_lock.lock();
        let observer = self.hub.connect();
        let (traces, pagination) = self.store.list(PaginationParams::first(limit));
        Subscription {
            observer,
            initial: TraceBatch { traces, pagination },
            servers: self.server_statuses(),
        }
    }

    /// 记录宿主服务状态并推送 `serverStatus`
    pub fn report_server_status(&self, server: &str, status: ServerRunState) -> ServerStatus {
        let status = ServerStatus {
            server: server.to_string(),
            status,
        };
        // 写入与推送同在发布锁内，观察者收到的最后一条与查询结果一致
        {
            let _guard = self.publish_lock.lock();
            self.servers.insert(status.server.clone(), status.status);
            self.hub.broadcast_server_status(status.clone());
        }

        linfo!(
            "system",
            LogStage::Distribution,
            LogComponent::Hub,
            "server_status",
            "服务状态已更新",
            server = status.server,
            status = status.status
        );
        status
    }

    /// 当前已知的服务状态，按名称排序
    #[must_use]
    pub fn server_statuses(&self) -> Vec<ServerStatus> {
        let mut statuses: Vec<_> = self
            .servers
            .iter()
            .map(|entry| ServerStatus {
                server: entry.key().clone(),
                status: *entry.value(),
            })
            .collect();
        statuses.sort_by(|a, b| a.server.cmp(&b.server));
        statuses
    }

    /// 向所有观察者推送首页快照，返回投递数量
    pub fn broadcast_snapshot(&self, limit: u64) -> usize {
        let _guard = self.publish_lock.lock();
        let (traces, pagination) = self.store.list(PaginationParams::first(limit));
        self.hub.broadcast_batch(traces, pagination)
    }

    /// 周期性推送首页快照；没有观察者时跳过，系统释放后任务自动退出
    pub fn spawn_snapshot_task(self: &Arc<Self>, interval: Duration, limit: u64) -> JoinHandle<()> {
        let system: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(system) = system.upgrade() else {
                    break;
                };
                if system.hub.observer_count() > 0 {
                    system.broadcast_snapshot(limit);
                }
            }
        })
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.hub.observer_count()
    }

    #[must_use]
    pub fn hub_stats(&self) -> HubStatsSnapshot {
        self.hub.stats()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::hub::HubMessage;
    use pretty_assertions::assert_eq;

    fn record(path: &str) -> TraceRecord {
        TraceRecord::pending("POST", path, path)
    }

    #[test]
    fn subscribe_returns_initial_page_and_servers() {
        let system = TraceSystem::new(100, 16);
        system.publish(record("/proxy/a"));
        system.publish(record("/proxy/b"));
        system.report_server_status("sse", ServerRunState::Running);

        let subscription = system.subscribe(1);
        assert_eq!(subscription.initial.traces.len(), 1);
        assert_eq!(subscription.initial.traces[0].path, "/proxy/b");
        assert_eq!(subscription.initial.pagination.total, 2);
        assert_eq!(
            subscription.servers,
            vec![ServerStatus {
                server: "sse".into(),
                status: ServerRunState::Running
            }]
        );
    }

    #[test]
    fn clear_broadcasts_empty_batch() {
        let system = TraceSystem::new(100, 16);
        system.publish(record("/proxy/a"));
        let mut subscription = system.subscribe(50);
        let _ = subscription.observer.try_recv();

        assert_eq!(system.clear(), 1);
        assert!(system.is_empty());
        match subscription.observer.try_recv().as_deref() {
            Some(HubMessage::Traces(batch)) => {
                assert!(batch.traces.is_empty());
                assert_eq!(batch.pagination.total, 0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn concurrent_status_reports_end_consistent() {
        let system = TraceSystem::new(100, 1024);
        let mut subscription = system.subscribe(50);
        let _ = subscription.observer.try_recv();

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let system = &system;
                scope.spawn(move || {
                    for i in 0..50 {
                        let state = if (worker + i) % 2 == 0 {
                            ServerRunState::Running
                        } else {
                            ServerRunState::Stopped
                        };
                        system.report_server_status("mcp", state);
                    }
                });
            }
        });

        let mut last = None;
        while let Some(message) = subscription.observer.try_recv() {
            if let HubMessage::ServerStatus(status) = message.as_ref() {
                last = Some(status.clone());
            }
        }
        assert_eq!(system.server_statuses(), vec![last.unwrap()]);
    }

    #[tokio::test]
    async fn snapshot_task_pushes_periodic_batches() {
        let system = Arc::new(TraceSystem::new(100, 16));
        system.publish(record("/proxy/a"));
        let mut subscription = system.subscribe(50);
        let _ = subscription.observer.try_recv();

        let handle = system.spawn_snapshot_task(Duration::from_millis(20), 50);
        let message = subscription.observer.recv().await;
        assert!(matches!(message.as_deref(), Some(HubMessage::Traces(batch)) if batch.traces.len() == 1));
        handle.abort();
    }
}
