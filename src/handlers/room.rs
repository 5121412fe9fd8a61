//! 프레즌스 채널 핸들러

use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;

/// 프레즌스 참여 처리. 방에 앉아 있는 유저만 참여할 수 있다.
pub async fn handle_join_room(state: Arc<AppState>, peer_id: &str, room_id: &str) {
    let room_id = room_id.trim().to_string();

    let Some(session) = state.session(peer_id) else {
        return;
    };
    let user_id = session.user_id.clone();
    let current_room = session.room_id.read().await.clone();

    let seated = state
        .gateway
        .seat_of(&user_id)
        .is_some_and(|seat| seat.room_id == room_id);
    if !seated {
        state.send_to(
            peer_id,
            ServerMessage::error("NOT_IN_ROOM", "You are not in this room"),
        );
        tracing::warn!(
            peer_id = %peer_id,
            user_id = %user_id,
            room_id = %room_id,
            "Presence join rejected"
        );
        return;
    }

    // 다른 방 프레즌스에 있었다면 먼저 빠진다
    match current_room {
        Some(current) if current == room_id => {}
        Some(current) => leave_room_internal(&state, peer_id, &user_id, &current).await,
        None => {}
    }

    let users = state.presence.join(&room_id, &user_id, peer_id);
    *session.room_id.write().await = Some(room_id.clone());

    tracing::info!(
        peer_id = %peer_id,
        user_id = %user_id,
        room_id = %room_id,
        online = users.len(),
        "User joined presence"
    );

    broadcast_to_room(
        &state,
        &room_id,
        ServerMessage::PresenceSync {
            room_id: room_id.clone(),
            users,
        },
    );
}

/// 프레즌스 나가기 내부 로직
pub async fn leave_room_internal(state: &AppState, peer_id: &str, user_id: &str, room_id: &str) {
    let users = state.presence.leave(room_id, user_id, peer_id);

    tracing::info!(
        peer_id = %peer_id,
        user_id = %user_id,
        room_id = %room_id,
        remaining = users.len(),
        "User left presence"
    );

    if !users.is_empty() {
        broadcast_to_room(
            state,
            room_id,
            ServerMessage::PresenceSync {
                room_id: room_id.to_string(),
                users,
            },
        );
    }
}

/// 프레즌스 나가기 처리
pub async fn handle_leave_room(state: Arc<AppState>, peer_id: &str) {
    let Some(session) = state.session(peer_id) else {
        return;
    };

    let room_id = session.room_id.write().await.take();
    if let Some(room_id) = room_id {
        leave_room_internal(&state, peer_id, &session.user_id, &room_id).await;
    }
}

/// 방 프레즌스 피어 전체에 메시지 브로드캐스트
pub fn broadcast_to_room(state: &AppState, room_id: &str, message: ServerMessage) {
    for peer_id in state.presence.peers(room_id) {
        state.send_to(&peer_id, message.clone());
    }
}

/// 로비(슬롯 / 진행 상태)가 바뀌었음을 알린다
pub fn notify_lobby_updated(state: &AppState, room_id: &str) {
    broadcast_to_room(
        state,
        room_id,
        ServerMessage::LobbyUpdated {
            room_id: room_id.to_string(),
        },
    );
}

/// 방이 닫혔음을 알리고 프레즌스 채널을 정리한다
pub async fn notify_room_closed(state: &AppState, room_id: &str) {
    for peer_id in state.presence.remove_room(room_id) {
        if let Some(session) = state.session(&peer_id) {
            let _ = session.sender.send(ServerMessage::RoomClosed {
                room_id: room_id.to_string(),
            });
            *session.room_id.write().await = None;
        }
    }
}

/// 오래된 방 정리
pub async fn cleanup_old_rooms(state: Arc<AppState>) {
    let removed = state.gateway.sweep_stale_rooms(state.config.room.timeout_ms);

    for room_id in &removed {
        tracing::info!(room_id = %room_id, "Cleaned up stale room");
    }

    if !removed.is_empty() {
        tracing::info!(deleted_rooms = removed.len(), "Cleanup completed");
    }
}
