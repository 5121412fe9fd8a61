//! 클라이언트-서버 프레즌스 메시지 프로토콜 정의

use crate::model::PresenceEntry;
use serde::{Deserialize, Serialize};

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Presence
    JoinRoom { room_id: String },
    LeaveRoom,
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    // Connection
    Connected { socket_id: String, user_id: String },
    HeartbeatAck,
    Error { code: String, message: String },

    // Presence
    PresenceSync {
        room_id: String,
        users: Vec<PresenceEntry>,
    },

    // Lobby
    LobbyUpdated { room_id: String },
    RoomClosed { room_id: String },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
