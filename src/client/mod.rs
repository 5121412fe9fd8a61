//! 로비 클라이언트 (HTTP API + 프레즌스 WebSocket)

pub mod api;
pub mod presence;

pub use api::LobbyApiClient;
pub use presence::PresenceConnection;

use crate::coordinator::DISCONNECT_GRACE_PERIOD;
use anyhow::Context;
use std::env;
use std::time::Duration;

/// 클라이언트가 발급하는 티켓의 기본 유효 시간 (초)
pub const DEFAULT_TICKET_TTL: u64 = 3600;

/// 클라이언트 설정
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub user_id: String,
    pub secret: String,
    pub room_id: String,
    pub password: Option<String>,
    pub grace_period: Duration,
    /// 세션 티켓 유효 시간 (초). 서버의 TICKET_TTL 을 넘으면 거부된다.
    pub ticket_ttl: u64,
    pub log_level: String,
}

impl ClientConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let grace_period = var("DISCONNECT_GRACE_MS")
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DISCONNECT_GRACE_PERIOD);
        let ticket_ttl = var("TICKET_TTL")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_TICKET_TTL);

        Ok(Self {
            server_url: var("BATTLE_SERVER_URL")
                .unwrap_or_else(|| "http://127.0.0.1:5510".to_string()),
            user_id: var("BATTLE_USER_ID").context("BATTLE_USER_ID must be set")?,
            secret: var("LOBBY_SECRET").context("LOBBY_SECRET must be set")?,
            room_id: var("BATTLE_ROOM_ID").context("BATTLE_ROOM_ID must be set")?,
            password: var("BATTLE_ROOM_PASSWORD").filter(|s| !s.is_empty()),
            grace_period,
            ticket_ttl,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_ticket;
    use crate::config::Config;
    use crate::model::{SlotType, StudySet, Visibility};
    use crate::protocol::{CreateRoomRequest, LeaveOutcome, ServerMessage};
    use crate::state::AppState;
    use crate::store::StudySetStore;
    use crate::LobbyError;
    use std::sync::Arc;

    const SECRET: &str = "client-secret";

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_client_config_ticket_ttl() {
        let required = [
            ("BATTLE_USER_ID", "alice"),
            ("LOBBY_SECRET", SECRET),
            ("BATTLE_ROOM_ID", "ROOM0001"),
        ];
        let config = ClientConfig::from_vars(vars(&required)).unwrap();
        assert_eq!(config.ticket_ttl, DEFAULT_TICKET_TTL);
        assert_eq!(config.grace_period, DISCONNECT_GRACE_PERIOD);
        assert_eq!(config.password, None);

        let mut custom = required.to_vec();
        custom.push(("TICKET_TTL", "120"));
        let config = ClientConfig::from_vars(vars(&custom)).unwrap();
        assert_eq!(config.ticket_ttl, 120);

        assert!(ClientConfig::from_vars(vars(&required[..2])).is_err());
    }

    async fn spawn_server() -> String {
        let mut config = Config::for_secret(SECRET);
        config.room.password_cost = 4;
        let study_sets = StudySetStore::new();
        study_sets.insert(StudySet {
            id: "set-1".into(),
            title: "Cells".into(),
            question_ids: (1..=10).map(|i| format!("q{}", i)).collect(),
        });
        let app = crate::build_router(Arc::new(AppState::new(config, study_sets)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: &str, user_id: &str) -> LobbyApiClient {
        LobbyApiClient::new(base_url, issue_ticket(SECRET, user_id, 60).unwrap())
    }

    fn create_request() -> CreateRoomRequest {
        CreateRoomRequest {
            study_set_id: "set-1".into(),
            name: "Cell battle".into(),
            visibility: Visibility::Public,
            password: None,
            time_limit_seconds: 20,
            question_count: 5,
            slot_count: Some(4),
        }
    }

    async fn next_message(presence: &mut PresenceConnection) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(5), presence.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_api_client_round_trip() {
        let base_url = spawn_server().await;
        let host = client(&base_url, "host");
        let alice = client(&base_url, "alice");

        let public_id = host.create_room(&create_request()).await.unwrap();
        assert_eq!(host.list_rooms().await.unwrap().len(), 1);

        let seat = alice.join_room(&public_id, None).await.unwrap();
        assert_eq!(seat.slot_index, 1);

        let slot = host.update_slot(&public_id, 2, SlotType::Bot).await.unwrap();
        assert_eq!(slot.slot_type, SlotType::Bot);

        let err = alice.kick(&public_id, 0).await.unwrap_err();
        assert!(matches!(err, LobbyError::Remote(ref msg) if msg == "Only the host can do that"));

        assert!(matches!(
            alice.leave_room(&public_id).await.unwrap(),
            LeaveOutcome::Left(_)
        ));
        assert!(host.close(&public_id).await.unwrap());
        assert!(!host.close(&public_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_presence_sync_and_room_closed() {
        let base_url = spawn_server().await;
        let host = client(&base_url, "host");
        let alice = client(&base_url, "alice");

        let public_id = host.create_room(&create_request()).await.unwrap();
        alice.join_room(&public_id, None).await.unwrap();

        let mut presence = PresenceConnection::connect(&alice.presence_url().unwrap())
            .await
            .unwrap();
        assert!(matches!(
            next_message(&mut presence).await,
            ServerMessage::Connected { user_id, .. } if user_id == "alice"
        ));

        presence.join_room(&public_id).unwrap();
        match next_message(&mut presence).await {
            ServerMessage::PresenceSync { room_id, users } => {
                assert_eq!(room_id, public_id);
                assert_eq!(users.len(), 1);
                assert_eq!(users[0].user_id, "alice");
            }
            other => panic!("unexpected message: {:?}", other),
        }

        host.close(&public_id).await.unwrap();
        assert_eq!(
            next_message(&mut presence).await,
            ServerMessage::RoomClosed { room_id: public_id }
        );
        presence.close().await;
    }

    #[tokio::test]
    async fn test_presence_rejects_unseated_user() {
        let base_url = spawn_server().await;
        let host = client(&base_url, "host");
        let mallory = client(&base_url, "mallory");
        let public_id = host.create_room(&create_request()).await.unwrap();

        let mut presence = PresenceConnection::connect(&mallory.presence_url().unwrap())
            .await
            .unwrap();
        next_message(&mut presence).await;

        presence.join_room(&public_id).unwrap();
        assert!(matches!(
            next_message(&mut presence).await,
            ServerMessage::Error { code, .. } if code == "NOT_IN_ROOM"
        ));
    }

    #[tokio::test]
    async fn test_presence_rejects_bad_ticket() {
        let base_url = spawn_server().await;
        let forged = LobbyApiClient::new(&base_url, "alice:99999999999:AAAA");
        assert!(PresenceConnection::connect(&forged.presence_url().unwrap())
            .await
            .is_err());
    }
}
