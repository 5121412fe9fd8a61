//! 연결 핸들러

use crate::handlers::room::leave_room_internal;
use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use uuid::Uuid;

/// 새 연결 처리
pub async fn handle_connection(
    state: Arc<AppState>,
    user_id: String,
    sender: UnboundedSender<ServerMessage>,
) -> String {
    let peer_id = Uuid::new_v4().to_string();

    let session = PeerSession {
        id: peer_id.clone(),
        user_id: user_id.clone(),
        room_id: RwLock::new(None),
        sender: sender.clone(),
        connected_at: Instant::now(),
    };

    state.peers.insert(peer_id.clone(), Arc::new(session));

    let _ = sender.send(ServerMessage::Connected {
        socket_id: peer_id.clone(),
        user_id: user_id.clone(),
    });

    tracing::info!(peer_id = %peer_id, user_id = %user_id, "New connection established");
    peer_id
}

/// 연결 해제 처리. 프레즌스에서 빠지면 남은 피어들에게 로스터를 다시 보낸다.
pub async fn handle_disconnect(state: Arc<AppState>, peer_id: &str) {
    if let Some((_, session)) = state.peers.remove(peer_id) {
        let room_id = session.room_id.read().await.clone();
        if let Some(room_id) = room_id {
            let user_id = session.user_id.as_str();
            leave_room_internal(&state, &session.id, user_id, &room_id).await;
        }
        tracing::info!(
            peer_id = %session.id,
            user_id = %session.user_id,
            connected_secs = session.connected_at.elapsed().as_secs(),
            "Connection closed"
        );
    }
}

/// Heartbeat 처리
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::StudySetStore;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_disconnect_resyncs_remaining_peers() {
        let state = Arc::new(AppState::new(Config::for_secret("secret"), StudySetStore::new()));
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (alice_tx, _alice_rx) = mpsc::unbounded_channel();

        let host_peer = handle_connection(state.clone(), "host".into(), host_tx).await;
        let alice_peer = handle_connection(state.clone(), "alice".into(), alice_tx).await;
        for (peer_id, user_id) in [(&host_peer, "host"), (&alice_peer, "alice")] {
            state.presence.join("ROOM0001", user_id, peer_id);
            let session = state.session(peer_id).unwrap();
            *session.room_id.write().await = Some("ROOM0001".into());
        }
        while host_rx.try_recv().is_ok() {}

        handle_disconnect(state.clone(), &alice_peer).await;

        assert!(state.session(&alice_peer).is_none());
        assert!(!state.presence.is_online("ROOM0001", "alice"));
        match host_rx.try_recv().unwrap() {
            ServerMessage::PresenceSync { room_id, users } => {
                assert_eq!(room_id, "ROOM0001");
                let online: Vec<_> = users.iter().map(|u| u.user_id.as_str()).collect();
                assert_eq!(online, vec!["host"]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
