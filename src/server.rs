//! 라우터 / WebSocket 엔드포인트

use crate::auth::verify_ticket;
use crate::error::LobbyError;
use crate::handlers::{self, battle};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderValue,
    response::{Html, Json, Response},
    routing::{get, patch, post},
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 전체 라우터 구성
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/rooms", get(battle::list_rooms).post(battle::create_room))
        .route(
            "/rooms/:public_id",
            get(battle::get_lobby).delete(battle::close_room),
        )
        .route("/rooms/:public_id/join", post(battle::join_room))
        .route("/rooms/:public_id/leave", post(battle::leave_room))
        .route("/rooms/:public_id/slots/:index", patch(battle::update_slot))
        .route("/rooms/:public_id/slots/:index/kick", post(battle::kick_player))
        .route("/rooms/:public_id/start", post(battle::start_game))
        .route("/rooms/:public_id/next", post(battle::advance_question));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .nest("/api/v1/battle", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if allowed.is_empty() || origins.iter().any(|origin| origin == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Battle Lobby Server</h1><p>HTTP API: /api/v1/battle, WebSocket endpoint: /ws</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "battle-lobby",
        "connections": state.peers.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
struct WsParams {
    ticket: String,
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, LobbyError> {
    let auth = &state.config.auth;
    let user_id = verify_ticket(&auth.secret, &params.ticket, auth.ticket_ttl)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리
    let peer_id = handlers::handle_connection(state.clone(), user_id, tx.clone()).await;

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&state, &peer_id, &tx, msg).await,
                Err(e) => {
                    tracing::debug!(peer_id = %peer_id, error = %e, "Unparseable client message");
                    let _ = tx.send(ServerMessage::error("BAD_MESSAGE", e.to_string()));
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(state, &peer_id).await;
    send_task.abort();
}

async fn handle_client_message(
    state: &Arc<AppState>,
    peer_id: &str,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(sender);
        }
        ClientMessage::JoinRoom { room_id } => {
            handlers::handle_join_room(state.clone(), peer_id, &room_id).await;
        }
        ClientMessage::LeaveRoom => {
            handlers::handle_leave_room(state.clone(), peer_id).await;
        }
    }
}
