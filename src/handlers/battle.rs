//! 배틀 로비 HTTP 핸들러
//!
//! 모든 요청은 `Authorization: Bearer <ticket>` 으로 인증한다. 상태를 바꾸는 액션은
//! 성공하면 방 프레즌스 피어에게 `LobbyUpdated` / `RoomClosed` 를 보낸다.

use crate::auth::AuthUser;
use crate::error::LobbyError;
use crate::handlers::room::{notify_lobby_updated, notify_room_closed};
use crate::model::BattleRoomSlot;
use crate::protocol::{
    ApiResponse, CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, LeaveOutcome,
    LobbyView, RoomSummary, UpdateSlotRequest,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

type ApiResult<T> = Result<Json<ApiResponse<T>>, LobbyError>;

pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    AuthUser(_user_id): AuthUser,
) -> ApiResult<Vec<RoomSummary>> {
    Ok(Json(ApiResponse::ok(state.gateway.list_public_rooms())))
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<CreateRoomRequest>,
) -> ApiResult<CreateRoomResponse> {
    let public_id = state.gateway.create_room(&user_id, request).await?;
    Ok(Json(ApiResponse::ok(CreateRoomResponse { public_id })))
}

pub async fn get_lobby(
    State(state): State<Arc<AppState>>,
    AuthUser(_user_id): AuthUser,
    Path(public_id): Path<String>,
) -> ApiResult<LobbyView> {
    Ok(Json(ApiResponse::ok(state.gateway.lobby(&public_id)?)))
}

pub async fn close_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(public_id): Path<String>,
) -> ApiResult<bool> {
    let closed = state.gateway.close_room(&user_id, &public_id)?;
    if closed {
        notify_room_closed(&state, &public_id).await;
    }
    Ok(Json(ApiResponse::ok(closed)))
}

pub async fn join_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(public_id): Path<String>,
    body: Option<Json<JoinRoomRequest>>,
) -> ApiResult<BattleRoomSlot> {
    let password = body.and_then(|Json(request)| request.password);
    let slot = state
        .gateway
        .join_room(&user_id, &public_id, password)
        .await?;
    notify_lobby_updated(&state, &public_id);
    Ok(Json(ApiResponse::ok(slot)))
}

pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(public_id): Path<String>,
) -> ApiResult<LeaveOutcome> {
    let outcome = state.gateway.leave_room(&user_id, &public_id)?;
    match outcome {
        LeaveOutcome::Left(_) => notify_lobby_updated(&state, &public_id),
        LeaveOutcome::RoomClosed => notify_room_closed(&state, &public_id).await,
    }
    Ok(Json(ApiResponse::ok(outcome)))
}

pub async fn update_slot(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path((public_id, slot_index)): Path<(String, usize)>,
    Json(request): Json<UpdateSlotRequest>,
) -> ApiResult<BattleRoomSlot> {
    let slot = state
        .gateway
        .update_slot(&user_id, &public_id, slot_index, request.slot_type)?;
    notify_lobby_updated(&state, &public_id);
    Ok(Json(ApiResponse::ok(slot)))
}

pub async fn kick_player(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path((public_id, slot_index)): Path<(String, usize)>,
) -> ApiResult<BattleRoomSlot> {
    let slot = state.gateway.kick_player(&user_id, &public_id, slot_index)?;
    notify_lobby_updated(&state, &public_id);
    Ok(Json(ApiResponse::ok(slot)))
}

pub async fn start_game(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(public_id): Path<String>,
) -> ApiResult<RoomSummary> {
    let room = state.gateway.start_game(&user_id, &public_id)?;
    notify_lobby_updated(&state, &public_id);
    Ok(Json(ApiResponse::ok(room)))
}

pub async fn advance_question(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(public_id): Path<String>,
) -> ApiResult<RoomSummary> {
    let room = state.gateway.advance_question(&user_id, &public_id)?;
    notify_lobby_updated(&state, &public_id);
    Ok(Json(ApiResponse::ok(room)))
}
