//! # 방(room) 브로드캐스터
//!
//! 한 세션의 모든 소켓 연결을 "방"으로 묶고, 방 전체 또는 연결 하나에 이벤트를 보냅니다.
//!
//! 방 멤버십은 메모리에만 존재합니다. 서버가 재시작되면 클라이언트가 다시 `join-room`을 보내야 합니다.
//!
//! ```text
//! room "s-1" ─┬─ conn A  (mpsc 송신자)
//!             └─ conn B
//! conn index:  A → "s-1", B → "s-1"
//! ```
//!
//! 각 연결의 송신자는 소켓 writer 태스크로 이어지는 unbounded 채널이므로,
//! 한 연결이 받는 이벤트 순서는 `emit` 호출 순서와 같습니다.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::models::ServerEvent;

/// 소켓 연결 하나로 이벤트를 보내는 채널
pub type ConnectionSender = mpsc::UnboundedSender<ServerEvent>;

/// 방 브로드캐스터: 여러 프로세스로 확장할 때 다른 구현으로 교체할 수 있는 경계입니다.
pub trait RoomBroadcaster: Send + Sync {
    /// 연결을 방에 추가합니다. 이미 다른 방에 있으면 그 방에서 먼저 빠집니다.
    fn join(&self, room: &str, conn_id: &str, sender: ConnectionSender);

    /// 연결을 현재 방에서 제거하고, 있었던 방 이름을 반환합니다.
    fn leave(&self, conn_id: &str) -> Option<String>;

    /// 방의 모든 멤버에게 이벤트를 보내고, 전달된 멤버 수를 반환합니다.
    fn emit(&self, room: &str, event: ServerEvent) -> usize;

    /// 연결 하나에만 이벤트를 보냅니다. 연결이 없거나 닫혔으면 false.
    fn send_to(&self, conn_id: &str, event: ServerEvent) -> bool;
}

#[derive(Default)]
struct Rooms {
    members: HashMap<String, HashMap<String, ConnectionSender>>,
    conn_rooms: HashMap<String, String>,
}

impl Rooms {
    fn remove(&mut self, conn_id: &str) -> Option<String> {
        let room = self.conn_rooms.remove(conn_id)?;
        if let Some(members) = self.members.get_mut(&room) {
            members.remove(conn_id);
            if members.is_empty() {
                self.members.remove(&room);
            }
        }
        Some(room)
    }
}

/// 단일 프로세스용 메모리 브로드캐스터
#[derive(Default)]
pub struct InMemoryRooms {
    inner: RwLock<Rooms>,
}

impl InMemoryRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.inner
            .read()
            .map(|rooms| rooms.members.get(room).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

impl RoomBroadcaster for InMemoryRooms {
    fn join(&self, room: &str, conn_id: &str, sender: ConnectionSender) {
        let Ok(mut rooms) = self.inner.write() else {
            tracing::error!("Room registry lock poisoned");
            return;
        };

        if let Some(previous) = rooms.remove(conn_id) {
            if previous != room {
                tracing::debug!(conn_id, room = %previous, "Connection left previous room");
            }
        }

        rooms
            .members
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string(), sender);
        rooms
            .conn_rooms
            .insert(conn_id.to_string(), room.to_string());
    }

    fn leave(&self, conn_id: &str) -> Option<String> {
        self.inner.write().ok()?.remove(conn_id)
    }

    fn emit(&self, room: &str, event: ServerEvent) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;

        if let Ok(rooms) = self.inner.read() {
            if let Some(members) = rooms.members.get(room) {
                for (conn_id, sender) in members {
                    if sender.send(event.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        closed.push(conn_id.clone());
                    }
                }
            }
        }

        // 닫힌 연결 정리
        if !closed.is_empty() {
            if let Ok(mut rooms) = self.inner.write() {
                for conn_id in &closed {
                    rooms.remove(conn_id);
                }
            }
        }

        delivered
    }

    fn send_to(&self, conn_id: &str, event: ServerEvent) -> bool {
        let Ok(rooms) = self.inner.read() else {
            return false;
        };
        rooms
            .conn_rooms
            .get(conn_id)
            .and_then(|room| rooms.members.get(room))
            .and_then(|members| members.get(conn_id))
            .is_some_and(|sender| sender.send(event).is_ok())
    }
}
