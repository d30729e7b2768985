//! # 采集管道
//!
//! 代理在每次交换的各个阶段调用这里的钩子。开始时取一次策略快照决定
//! 是否追踪以及是否采集请求体；完成时再取一次快照决定响应的采集方式。
//! 采集失败只降级为元数据记录，从不影响代理本身。

use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::http::HeaderMap;
use bytes::Bytes;
use futures::Stream;

use super::policy::PolicyStore;
use super::record::{CapturedPayload, StreamChunk, TraceRecord, complete_utf8_len, redact_headers};
use super::system::TraceSystem;
use crate::error::TraceError;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 交换开始时的元数据
#[derive(Debug, Clone, Copy)]
pub struct ExchangeStart<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub url: &'a str,
    pub headers: &'a HeaderMap,
}

/// 采集入口
#[derive(Debug, Clone)]
pub struct CaptureService {
    policy: Arc<PolicyStore>,
    traces: Arc<TraceSystem>,
}

impl CaptureService {
    #[must_use]
    pub const fn new(policy: Arc<PolicyStore>, traces: Arc<TraceSystem>) -> Self {
        Self { policy, traces }
    }

    /// 交换开始；路径被排除时返回 `None`，之后不再有任何钩子
    #[must_use]
    pub fn on_start(&self, start: ExchangeStart<'_>) -> Option<ExchangeCapture> {
        let snapshot = self.policy.snapshot();
        if snapshot.should_exclude_path(start.path) {
            return None;
        }

        let mut record = TraceRecord::pending(start.method, start.path, start.url);
        let request = if snapshot.should_capture_detailed_body(start.headers) {
            record.request_headers = Some(redact_headers(start.headers));
            Some(BodyBuffer::new(snapshot.config().max_body_size))
        } else {
            None
        };

        ldebug!(
            &record.id,
            LogStage::Capture,
            LogComponent::Capture,
            "capture_started",
            "开始采集交换",
            method = start.method,
            path = start.path,
            body_capture = request.is_some()
        );

        Some(ExchangeCapture {
            policy: Arc::clone(&self.policy),
            traces: Arc::clone(&self.traces),
            record,
            started: Instant::now(),
            state: ExchangeState::Started,
            request,
            response: ResponseCapture::Pending,
            published: false,
        })
    }
}

/// 交换所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Started,
    BodyCaptured,
    Completed,
}

#[derive(Debug)]
struct BodyBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl BodyBuffer {
    fn new(limit: u64) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let remaining = self.limit.saturating_sub(self.bytes.len());
        let take = remaining.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
        if take < chunk.len() {
            self.truncated = true;
        }
    }

    fn into_payload(self) -> CapturedPayload {
        CapturedPayload::from_bytes(&self.bytes, self.truncated)
    }
}

#[derive(Debug)]
struct StreamBuffer {
    chunks: Vec<StreamChunk>,
    total: u64,
    limit: u64,
    truncated: bool,
    /// 上一分块末尾不完整的 UTF-8 字节，拼到下一分块前面
    carry: Vec<u8>,
    last_offset_ms: u64,
}

impl StreamBuffer {
    const fn new(limit: u64) -> Self {
        Self {
            chunks: Vec::new(),
            total: 0,
            limit,
            truncated: false,
            carry: Vec::new(),
            last_offset_ms: 0,
        }
    }

    fn push(&mut self, chunk: &[u8], offset_ms: u64) {
        if chunk.is_empty() || self.truncated {
            return;
        }
        self.last_offset_ms = offset_ms;
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(chunk);

        let remaining = usize::try_from(self.limit.saturating_sub(self.total)).unwrap_or(usize::MAX);
        if remaining == 0 {
            self.truncated = true;
            return;
        }

        let take = remaining.min(data.len());
        let partial = take < data.len();
        let end = if partial {
            take
        } else {
            complete_utf8_len(&data)
        };
        if !partial {
            self.carry = data[end..].to_vec();
        }
        if end == 0 {
            return;
        }
        self.emit(&data[..end], partial);
    }

    fn emit(&mut self, bytes: &[u8], partial: bool) {
        let captured = StreamChunk::from_bytes(self.chunks.len(), self.last_offset_ms, bytes, partial);
        self.total += captured.size;
        self.chunks.push(captured);
        if partial {
            self.truncated = true;
        }
    }

    /// 流结束：残留的不完整字节按原样作为最后一个分块
    fn into_chunks(mut self) -> (Vec<StreamChunk>, bool) {
        let carry = std::mem::take(&mut self.carry);
        if !carry.is_empty() && !self.truncated {
            self.emit(&carry, false);
        }
        (self.chunks, self.truncated)
    }
}

#[derive(Debug)]
enum ResponseCapture {
    /// 尚未收到响应头
    Pending,
    Disabled,
    Single(BodyBuffer),
    Stream(StreamBuffer),
}

/// 单次交换的采集状态
///
/// 调用 `finish` 发布完整记录；未 `finish` 就被释放时发布 `complete=false` 的记录。
#[derive(Debug)]
pub struct ExchangeCapture {
    policy: Arc<PolicyStore>,
    traces: Arc<TraceSystem>,
    record: TraceRecord,
    started: Instant,
    state: ExchangeState,
    request: Option<BodyBuffer>,
    response: ResponseCapture,
    published: bool,
}

impl ExchangeCapture {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.id
    }

    #[must_use]
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// 请求体分片，超出上限的部分被丢弃
    pub fn on_request_body(&mut self, chunk: &[u8]) {
        if let Some(buffer) = &mut self.request {
            buffer.push(chunk);
            if self.state == ExchangeState::Started {
                self.state = ExchangeState::BodyCaptured;
            }
        }
    }

    /// 代理报告完成：状态码、耗时与响应头
    pub fn on_complete(&mut self, status: u16, duration_ms: f64, headers: &HeaderMap) {
        self.record.status = Some(status);
        self.record.duration = Some(duration_ms);
        self.state = ExchangeState::Completed;

        if self.record.capture_error.is_some() {
            self.response = ResponseCapture::Disabled;
            return;
        }

        let snapshot = self.policy.snapshot();
        let config = snapshot.config();
        if config.detailed_body_capture {
            self.record.response_headers = Some(redact_headers(headers));
        }
        self.response = if snapshot.should_capture_detailed_sse(headers, &self.record.url) {
            ResponseCapture::Stream(StreamBuffer::new(config.max_stream_size))
        } else if config.detailed_body_capture {
            ResponseCapture::Single(BodyBuffer::new(config.max_response_size))
        } else {
            ResponseCapture::Disabled
        };
    }

    /// 响应体分片：流模式下为一个分块，单体模式下为正文片段
    pub fn on_response_body(&mut self, chunk: &[u8]) {
        match &mut self.response {
            ResponseCapture::Single(buffer) => buffer.push(chunk),
            ResponseCapture::Stream(buffer) => {
                let offset_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
                buffer.push(chunk, offset_ms);
            }
            ResponseCapture::Pending | ResponseCapture::Disabled => {}
        }
    }

    /// 采集失败：丢弃已采集的正文，仅保留元数据
    pub fn fail_capture(&mut self, err: &TraceError) {
        let message = err.to_string();
        lwarn!(
            &self.record.id,
            LogStage::Capture,
            LogComponent::Capture,
            "capture_failed",
            "正文采集失败，记录降级为元数据",
            error = message
        );

        self.request = None;
        self.response = ResponseCapture::Disabled;
        self.record.request_headers = None;
        self.record.response_headers = None;
        self.record.capture_error = Some(message);
    }

    /// 发布记录
    pub fn finish(mut self) -> Arc<TraceRecord> {
        let complete = self.state == ExchangeState::Completed;
        self.publish(complete)
    }

    fn publish(&mut self, complete: bool) -> Arc<TraceRecord> {
        self.published = true;
        let mut record = std::mem::take(&mut self.record);

        if let Some(buffer) = self.request.take() {
            record.request_body = Some(buffer.into_payload());
        }
        match std::mem::replace(&mut self.response, ResponseCapture::Disabled) {
            ResponseCapture::Single(buffer) => record.response_body = Some(buffer.into_payload()),
            ResponseCapture::Stream(buffer) => {
                let (chunks, truncated) = buffer.into_chunks();
                record.stream_truncated = truncated;
                record.stream_chunks = Some(chunks);
            }
            ResponseCapture::Pending | ResponseCapture::Disabled => {}
        }
        record.complete = complete;

        self.traces.publish(record)
    }
}

impl Drop for ExchangeCapture {
    fn drop(&mut self) {
        if !self.published {
            self.publish(false);
        }
    }
}

/// 包装响应体流：原样转发每一项，同时喂给采集器
///
/// `Err` 项转为 `fail_capture`，流结束时发布记录。
pub struct ResponseTap<S> {
    inner: S,
    capture: Option<ExchangeCapture>,
}

impl<S> std::fmt::Debug for ResponseTap<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseTap")
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

impl<S> ResponseTap<S> {
    pub const fn new(inner: S, capture: ExchangeCapture) -> Self {
        Self {
            inner,
            capture: Some(capture),
        }
    }
}

impl<S, E> Stream for ResponseTap<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(capture) = &mut this.capture {
                    capture.on_response_body(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(capture) = &mut this.capture {
                    capture.fail_capture(&TraceError::capture(format!("响应体读取中断: {err}")));
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if let Some(capture) = this.capture.take() {
                    capture.finish();
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
