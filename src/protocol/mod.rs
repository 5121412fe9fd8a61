//! 프로토콜 정의 (WebSocket 메시지 + HTTP 요청/응답)

pub mod api;
pub mod messages;

pub use api::*;
pub use messages::*;
