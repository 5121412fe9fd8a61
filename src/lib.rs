//! 배틀 로비 서버 / 클라이언트
//!
//! - `server`, `handlers`, `gateway`, `store`, `presence`: 로비 HTTP API 와 프레즌스 채널
//! - `coordinator`: 클라이언트 측 접속 끊김 정리
//! - `client`: 로비 API / 프레즌스 클라이언트

pub mod auth;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod model;
pub mod presence;
pub mod protocol;
pub mod server;
pub mod state;
pub mod store;

pub use coordinator::{
    CoordinatorEvent, DisconnectCoordinator, LobbyActions, LobbyContext, DISCONNECT_GRACE_PERIOD,
};
pub use error::LobbyError;
pub use server::build_router;
