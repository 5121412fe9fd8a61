//! 배틀 로비 클라이언트
//!
//! 방에 참여하고 프레즌스를 구독하면서, 로스터 변화를 접속 끊김 코디네이터에 넘긴다.
//! 방이 닫히거나 ctrl-c 를 받으면 종료한다.

use anyhow::Context;
use battle_lobby::auth::issue_ticket;
use battle_lobby::client::{ClientConfig, LobbyApiClient, PresenceConnection};
use battle_lobby::protocol::{LobbyView, ServerMessage};
use battle_lobby::{CoordinatorEvent, DisconnectCoordinator, LobbyContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn context_for(config: &ClientConfig, lobby: LobbyView) -> LobbyContext {
    LobbyContext::new(
        &config.room_id,
        &config.user_id,
        lobby.room.host_user_id,
        lobby.slots,
    )
}

fn still_seated(config: &ClientConfig, lobby: &LobbyView) -> bool {
    lobby
        .slots
        .iter()
        .any(|slot| slot.holds_user(&config.user_id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?;

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ticket = issue_ticket(&config.secret, &config.user_id, config.ticket_ttl)?;
    let api = Arc::new(LobbyApiClient::new(&config.server_url, ticket));

    let seat = api
        .join_room(&config.room_id, config.password.clone())
        .await
        .with_context(|| format!("failed to join room {}", config.room_id))?;
    tracing::info!(
        room_id = %config.room_id,
        user_id = %config.user_id,
        slot_index = seat.slot_index,
        "Joined room"
    );

    let lobby = api.lobby(&config.room_id).await?;
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let mut coordinator =
        DisconnectCoordinator::new(api.clone(), context_for(&config, lobby), event_tx)
            .with_grace_period(config.grace_period);

    let mut presence = PresenceConnection::connect(&api.presence_url()?).await?;
    presence.join_room(&config.room_id)?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut should_leave = true;

    loop {
        tokio::select! {
            message = presence.recv() => match message {
                Some(ServerMessage::PresenceSync { room_id, users })
                    if room_id == config.room_id =>
                {
                    tracing::debug!(online = users.len(), "Presence sync");
                    match api.lobby(&config.room_id).await {
                        Ok(lobby) => coordinator.watch(&users, context_for(&config, lobby)),
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to refresh lobby");
                            coordinator.on_roster_changed(&users);
                        }
                    }
                }
                Some(ServerMessage::LobbyUpdated { room_id }) if room_id == config.room_id => {
                    match api.lobby(&config.room_id).await {
                        Ok(lobby) if !still_seated(&config, &lobby) => {
                            tracing::info!(room_id = %room_id, "Removed from room");
                            should_leave = false;
                            break;
                        }
                        Ok(lobby) => coordinator.update_context(context_for(&config, lobby)),
                        Err(e) => tracing::warn!(error = %e, "Failed to refresh lobby"),
                    }
                }
                Some(ServerMessage::RoomClosed { room_id }) => {
                    tracing::info!(room_id = %room_id, "Room closed");
                    should_leave = false;
                    break;
                }
                Some(ServerMessage::Error { code, message }) => {
                    tracing::warn!(code = %code, message = %message, "Server error");
                }
                Some(_) => {}
                None => {
                    tracing::warn!("Presence connection lost");
                    break;
                }
            },
            Some(event) = events.recv() => match event {
                CoordinatorEvent::PlayerKicked { slot_index } => {
                    tracing::info!(slot_index = slot_index, "Disconnected player removed");
                }
                CoordinatorEvent::RoomClosed => {
                    tracing::info!(room_id = %config.room_id, "Host left, room closed");
                    should_leave = false;
                    break;
                }
            },
            _ = heartbeat.tick() => {
                let _ = presence.heartbeat();
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    coordinator.dispose();

    if should_leave {
        match api.leave_room(&config.room_id).await {
            Ok(outcome) => tracing::info!(outcome = ?outcome, "Left room"),
            Err(e) => tracing::warn!(error = %e, "Failed to leave room"),
        }
    }

    let _ = presence.leave_room();
    presence.close().await;
    Ok(())
}
