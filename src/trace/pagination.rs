//! # 分页计算

use serde::{Deserialize, Serialize};

/// 默认每页条数
pub const DEFAULT_LIMIT: u64 = 50;
/// 每页条数上限
pub const MAX_LIMIT: u64 = 500;

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// 请求的页码（>= 1，超出范围时在 `build_page` 中收敛）
    pub page: u64,
    /// 每页条数（1..=500）
    pub limit: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl PaginationParams {
    /// 根据可选参数创建分页配置，并应用默认值与上限。
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Self { page, limit }
    }

    /// 首页，`limit` 同样受上限约束
    #[must_use]
    pub fn first(limit: u64) -> Self {
        Self::new(Some(1), Some(limit))
    }
}

/// 分页信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationData {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl PaginationData {
    /// 当前页在完整列表中的偏移
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

/// 根据总数和分页参数计算分页信息，页码收敛到 `1..=max(pages, 1)`。
#[must_use]
pub fn build_page(total: u64, params: PaginationParams) -> PaginationData {
    let limit = params.limit.clamp(1, MAX_LIMIT);
    let pages = if total == 0 { 0 } else { total.div_ceil(limit) };
    let page = params.page.clamp(1, pages.max(1));
    PaginationData {
        total,
        page,
        limit,
        pages,
    }
}
