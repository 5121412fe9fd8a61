//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::gateway::LobbyGateway;
use crate::presence::PresenceHub;
use crate::protocol::ServerMessage;
use crate::store::StudySetStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::UnboundedSender, RwLock};

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방 / 슬롯 액션
    pub gateway: Arc<LobbyGateway>,
    /// 방별 프레즌스 (room public_id -> 접속 유저)
    pub presence: Arc<PresenceHub>,
    /// 피어 세션 (peer_id -> PeerSession)
    pub peers: DashMap<String, Arc<PeerSession>>,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, study_sets: StudySetStore) -> Self {
        let presence = Arc::new(PresenceHub::new());
        let gateway = LobbyGateway::new(
            Arc::new(study_sets),
            presence.clone(),
            config.room.clone(),
        );
        Self {
            gateway: Arc::new(gateway),
            presence,
            peers: DashMap::new(),
            config: Arc::new(config),
        }
    }

    /// 맵 락을 잡지 않도록 세션을 복제해서 꺼낸다
    pub fn session(&self, peer_id: &str) -> Option<Arc<PeerSession>> {
        self.peers.get(peer_id).map(|session| session.clone())
    }

    /// 피어 하나에게 메시지 전송
    pub fn send_to(&self, peer_id: &str, message: ServerMessage) {
        if let Some(session) = self.peers.get(peer_id) {
            let _ = session.sender.send(message);
        }
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    pub id: String,
    /// 티켓으로 인증된 유저
    pub user_id: String,
    /// 프레즌스에 참여 중인 방
    pub room_id: RwLock<Option<String>>,
    pub sender: UnboundedSender<ServerMessage>,
    pub connected_at: Instant,
}
