//! 배틀 로비 서버

use anyhow::Context;
use battle_lobby::config::Config;
use battle_lobby::handlers;
use battle_lobby::state::AppState;
use battle_lobby::store::StudySetStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.auth.secret.is_empty() {
        anyhow::bail!("LOBBY_SECRET must be set");
    }

    let study_sets = match &config.study_sets_file {
        Some(path) => StudySetStore::load_from_file(path)?,
        None => {
            tracing::warn!("STUDY_SETS_FILE not set, no study sets loaded");
            StudySetStore::new()
        }
    };
    tracing::info!(study_sets = study_sets.count(), "Study sets loaded");

    let state = Arc::new(AppState::new(config.clone(), study_sets));

    // 방 정리 스케줄러
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            handlers::cleanup_old_rooms(cleanup_state.clone()).await;
        }
    });

    let app = battle_lobby::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Battle lobby server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("HTTP API: http://{}/api/v1/battle", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
