//! # 实时推送处理器
//!
//! WebSocket 连接建立后依次发送：`status: connected`、首页 `traces`、
//! 已知的 `serverStatus`，之后转发分发中心的每一条消息。

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};

use crate::logging::{LogComponent, LogStage};
use crate::management::middleware::RequestId;
use crate::management::server::AppState;
use crate::trace::{HubMessage, Subscription};
use crate::{ldebug, linfo, lwarn};

/// 升级为 WebSocket
pub async fn live_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, request_id))
}

fn encode(request_id: &str, message: &HubMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            lwarn!(
                request_id,
                LogStage::Distribution,
                LogComponent::Management,
                "encode_failed",
                "推送消息序列化失败",
                kind = message.kind(),
                error = e.to_string()
            );
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, request_id: RequestId) {
    let Subscription {
        mut observer,
        initial,
        servers,
    } = state.traces.subscribe(state.snapshot_limit());
    let observer_id = observer.id();
    let (mut sender, mut receiver) = socket.split();

    linfo!(
        &request_id,
        LogStage::Distribution,
        LogComponent::Management,
        "live_connected",
        "实时推送连接已建立",
        observer_id = observer_id
    );

    // 队列中的第一条是 status: connected，其后才是订阅之后发布的记录
    let mut opening = Vec::with_capacity(servers.len() + 2);
    if let Some(status) = observer.try_recv() {
        opening.push((*status).clone());
    }
    opening.push(HubMessage::Traces(initial));
    opening.extend(servers.into_iter().map(HubMessage::ServerStatus));

    for message in &opening {
        let Some(frame) = encode(&request_id, message) else {
            continue;
        };
        if sender.send(frame).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            message = observer.recv() => {
                let Some(message) = message else {
                    // 被移出分发集合（队列已满）
                    lwarn!(
                        &request_id,
                        LogStage::Distribution,
                        LogComponent::Management,
                        "live_evicted",
                        "观察者已被移出分发集合，关闭连接",
                        observer_id = observer_id
                    );
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let Some(frame) = encode(&request_id, &message) else {
                    continue;
                };
                if sender.send(frame).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    ldebug!(
        &request_id,
        LogStage::Distribution,
        LogComponent::Management,
        "live_closed",
        "实时推送连接已关闭",
        observer_id = observer_id
    );
}
