//! # 追踪记录存储
//!
//! 有界的最近记录列表，最新记录在前，超出容量时淘汰最旧的记录。

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use super::pagination::{PaginationData, PaginationParams, build_page};
use super::record::TraceRecord;
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 默认保留的记录数
pub const DEFAULT_MAX_RECORDS: usize = 1000;

#[derive(Debug)]
pub struct TraceStore {
    records: RwLock<VecDeque<Arc<TraceRecord>>>,
    max_records: usize,
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS)
    }
}

impl TraceStore {
    /// `max_records` 至少为 1
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        let max_records = max_records.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(max_records.min(DEFAULT_MAX_RECORDS))),
            max_records,
        }
    }

    /// 追加一条记录，返回被淘汰的记录数
    pub fn append(&self, record: Arc<TraceRecord>) -> usize {
        let mut records = self.records.write();
        records.push_front(record);

        let mut evicted = 0;
        while records.len() > self.max_records {
            records.pop_back();
            evicted += 1;
        }
        drop(records);

        if evicted > 0 {
            ldebug!(
                "system",
                LogStage::Storage,
                LogComponent::Store,
                "evict_records",
                "追踪记录超出容量，已淘汰最旧记录",
                evicted = evicted,
                max_records = self.max_records
            );
        }
        evicted
    }

    /// 分页读取，最新记录在前
    #[must_use]
    pub fn list(&self, params: PaginationParams) -> (Vec<Arc<TraceRecord>>, PaginationData) {
        let records = self.records.read();
        let pagination = build_page(records.len() as u64, params);

        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(pagination.limit).unwrap_or(usize::MAX);
        let page = records.iter().skip(offset).take(limit).cloned().collect();
        (page, pagination)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<TraceRecord>> {
        self.records
            .read()
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    /// 清空，返回被删除的记录数
    pub fn clear(&self) -> usize {
        let mut records = self.records.write();
        let removed = records.len();
        records.clear();
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_records
    }
}
