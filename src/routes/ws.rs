//! # 면접 웹소켓 게이트웨이
//!
//! `GET /api/v1/ws`: 핸드셰이크에서 토큰을 검증한 뒤 웹소켓으로 업그레이드합니다.
//! 토큰이 없거나 잘못되면 업그레이드 전에 HTTP 401로 거절되므로, 인증되지 않은 연결은
//! 방에 접근할 수 없습니다.
//!
//! ## 연결 하나의 구조
//! ```text
//!            ┌── reader 루프: 프레임 파싱 → SocketConnection::handle_event
//! WebSocket ─┤
//!            └── writer 태스크: mpsc 수신 → JSON 텍스트 프레임 전송
//!                  ▲
//!                  └── 방 브로드캐스트와 거절 응답이 모두 이 채널로 들어옵니다
//! ```
//!
//! 거절(권한 없음, 순서 위반 등)은 요청한 연결에만 보냅니다.
//! 처리 실패는 상태 머신이 방 전체에 이미 알렸으므로 여기서 다시 보내지 않습니다.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{
    error::InterviewError,
    middleware::auth::AuthUser,
    models::*,
    routes::AppState,
    services::interview::{registry::{self, ReplyReceiver}, SessionRegistry},
    services::rooms::ConnectionSender,
};

/// `GET /api/v1/ws`: 인증 후 웹소켓 업그레이드
pub async fn ws_handler(
    auth: AuthUser,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry, auth.user_id))
}

async fn handle_socket(socket: WebSocket, registry: SessionRegistry, user_id: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize server event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut conn = SocketConnection::new(registry, user_id, tx);
    tracing::info!(conn_id = %conn.conn_id(), user_id = %conn.user_id, "Socket connected");

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => conn.handle_text(text.as_str()).await,
            Message::Close(_) => break,
            // ping/pong은 axum이 처리, 바이너리는 사용하지 않음
            _ => {}
        }
    }

    conn.disconnect();
    writer.abort();
}

/// 소켓 연결 하나의 상태: 어떤 방에 들어가 있는지와 이벤트 송신 채널
pub struct SocketConnection {
    conn_id: String,
    user_id: String,
    joined: Option<String>,
    sender: ConnectionSender,
    registry: SessionRegistry,
}

impl SocketConnection {
    pub fn new(registry: SessionRegistry, user_id: String, sender: ConnectionSender) -> Self {
        Self {
            conn_id: uuid::Uuid::now_v7().to_string(),
            user_id,
            joined: None,
            sender,
            registry,
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn joined_room(&self) -> Option<&str> {
        self.joined.as_deref()
    }

    /// 텍스트 프레임 하나를 처리합니다. 파싱할 수 없으면 `INVALID_MESSAGE`로 거절합니다.
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                tracing::debug!(conn_id = %self.conn_id, error = %e, "Malformed socket message");
                self.reject(&InterviewError::InvalidMessage(e.to_string()));
            }
        }
    }

    pub async fn handle_event(&mut self, event: ClientEvent) {
        tracing::debug!(conn_id = %self.conn_id, event = event.name(), "Socket event received");

        match event {
            ClientEvent::JoinRoom(SessionRef { session_id }) => {
                // 이후 ready/submit-answer가 갈 방이 여기서 정해지므로 응답을 기다림
                let result = self
                    .registry
                    .join(&session_id, &self.user_id, &self.conn_id, self.sender.clone())
                    .await;
                match result {
                    Ok(()) => self.joined = Some(session_id),
                    Err(err) => {
                        tracing::warn!(conn_id = %self.conn_id, session_id = %session_id, error = %err, "Join rejected");
                        self.reject(&err);
                    }
                }
            }
            ClientEvent::Ready(SessionRef { session_id }) => {
                let Some(room) = self.room_for(&session_id, "ready") else {
                    return;
                };
                let rx = self.registry.enqueue_ready(&room, &self.conn_id).await;
                self.forward_rejection(rx);
            }
            ClientEvent::SubmitAnswer(payload) => {
                let Some(room) = self.joined.clone() else {
                    self.reject(&InterviewError::RoomNotJoined("submit-answer"));
                    return;
                };
                let rx = self.registry.enqueue_submit(&room, payload.into()).await;
                self.forward_rejection(rx);
            }
        }
    }

    /// 연결 종료: 방 멤버십만 정리하고 세션 상태는 건드리지 않습니다.
    pub fn disconnect(&self) {
        if let Some(room) = self.registry.engine().rooms().leave(&self.conn_id) {
            tracing::info!(conn_id = %self.conn_id, session_id = %room, "Socket left interview room");
        }
    }

    fn room_for(&self, session_id: &str, event: &'static str) -> Option<String> {
        match self.joined.as_deref() {
            Some(room) if room == session_id => Some(room.to_string()),
            _ => {
                self.reject(&InterviewError::RoomNotJoined(event));
                None
            }
        }
    }

    fn reject(&self, err: &InterviewError) {
        let _ = self.sender.send(ServerEvent::error(err));
    }

    /// 명령 결과를 기다렸다가 거절이면 이 연결에 알립니다.
    /// 리더 루프를 막지 않도록 별도 태스크에서 기다립니다.
    fn forward_rejection(&self, rx: ReplyReceiver) {
        let sender = self.sender.clone();
        let conn_id = self.conn_id.clone();
        tokio::spawn(async move {
            if let Err(err) = registry::wait(rx).await {
                if err.is_rejection() {
                    tracing::debug!(conn_id = %conn_id, code = err.code(), "Command rejected");
                    let _ = sender.send(ServerEvent::error(&err));
                }
            }
        });
    }
}
