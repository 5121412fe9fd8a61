//! 핸들러 모듈

pub mod battle;
pub mod connection;
pub mod room;

pub use connection::*;
pub use room::*;
