//! # 路径/负载过滤
//!
//! 纯函数式的采集决策：路径是否追踪、请求体是否详细采集、响应是否按流式采集。
//! 所有决策都基于调用时取得的一份 `PolicySnapshot`，不跨配置更新缓存结果。

use std::collections::HashSet;

use axum::http::{HeaderMap, header};
use serde::{Deserialize, Serialize};

use super::policy::PolicySnapshot;

/// 允许追踪的路径前缀（代理出口 API 命名空间与 MCP SSE 端点）
pub const INCLUDE_PREFIXES: &[&str] = &["/proxy/", "/sse", "/messages"];

/// 流式响应识别规则
///
/// 许多流式 LLM 接口把增量输出标成 `application/json`，因此除了
/// event-stream 媒体类型外，还需要按 URL 特征判断。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamingHeuristics {
    /// 直接视为流的媒体类型
    pub event_stream_types: Vec<String>,
    /// 需要结合 URL 判断的 JSON 媒体类型
    pub json_types: Vec<String>,
    /// URL 中出现即视为流式 LLM 接口的片段
    pub url_markers: Vec<String>,
}

impl Default for StreamingHeuristics {
    fn default() -> Self {
        Self {
            event_stream_types: vec!["text/event-stream".to_string()],
            json_types: vec!["application/json".to_string()],
            url_markers: [
                "/proxy/gemini",
                "/proxy/openai",
                "/proxy/claude",
                "streamGenerateContent",
                "chat/completions",
                "stream",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

impl StreamingHeuristics {
    /// 内容类型是否为 event-stream
    #[must_use]
    pub fn is_event_stream(&self, content_type: &str) -> bool {
        contains_any_ignore_case(content_type, &self.event_stream_types)
    }

    /// 内容类型是否为 JSON
    #[must_use]
    pub fn is_json(&self, content_type: &str) -> bool {
        contains_any_ignore_case(content_type, &self.json_types)
    }

    /// URL 是否命中流式接口特征
    #[must_use]
    pub fn is_streaming_url(&self, url: &str) -> bool {
        self.url_markers
            .iter()
            .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
    }
}

fn contains_any_ignore_case(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_ascii_lowercase();
    needles
        .iter()
        .any(|needle| !needle.is_empty() && haystack.contains(&needle.to_ascii_lowercase()))
}

/// 预编译的排除列表
///
/// 条目 `e` 命中路径 `p` 的条件：`p == e`；或 `p` 以 `e + "/"` 开头；
/// 或 `e` 以 `/` 结尾且 `p` 以 `e` 开头。查询只探测 `p` 在 `/` 边界上的前缀，
/// 开销与路径长度成正比，与条目数量无关。
#[derive(Debug, Clone, Default)]
pub struct ExcludeMatcher {
    /// 不以 `/` 结尾的条目：精确匹配或作为目录前缀
    exact: HashSet<String>,
    /// 以 `/` 结尾的条目：纯前缀匹配
    directories: HashSet<String>,
}

impl ExcludeMatcher {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        for entry in entries {
            let entry = entry.as_ref();
            if entry.ends_with('/') {
                matcher.directories.insert(entry.to_string());
            } else {
                matcher.exact.insert(entry.to_string());
            }
        }
        matcher
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.directories.is_empty()
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.exact.contains(path) {
            return true;
        }
        for (idx, _) in path.match_indices('/') {
            if self.exact.contains(&path[..idx]) || self.directories.contains(&path[..=idx]) {
                return true;
            }
        }
        false
    }
}

/// 路径是否位于允许追踪的命名空间
#[must_use]
pub fn is_included_path(path: &str) -> bool {
    INCLUDE_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// 读取声明的 `content-length`，缺失或无法解析时视为 0
#[must_use]
pub fn declared_content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

impl PolicySnapshot {
    /// 路径是否应被排除（不产生任何追踪记录）
    #[must_use]
    pub fn should_exclude_path(&self, path: &str) -> bool {
        if !self.config().enabled {
            return true;
        }
        if !is_included_path(path) {
            return true;
        }
        self.excludes().matches(path)
    }

    /// 请求是否需要详细采集请求体
    #[must_use]
    pub fn should_capture_detailed_body(&self, headers: &HeaderMap) -> bool {
        let config = self.config();
        if !config.detailed_body_capture {
            return false;
        }
        declared_content_length(headers) <= config.max_body_size
    }

    /// 响应是否按流式分块采集
    #[must_use]
    pub fn should_capture_detailed_sse(&self, headers: &HeaderMap, url: &str) -> bool {
        if !self.config().detailed_sse_capture {
            return false;
        }

        let content_type = content_type(headers);
        let heuristics = self.heuristics();
        if heuristics.is_event_stream(content_type) {
            return true;
        }
        heuristics.is_json(content_type) && heuristics.is_streaming_url(url)
    }
}
