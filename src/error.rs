//! 로비 에러 정의

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use crate::model::SlotType;
use crate::protocol::ApiResponse;

/// 로비 액션 / 저장소 / 클라이언트 공통 에러.
/// Display 문자열은 그대로 사용자에게 노출된다.
#[derive(Debug, Error)]
pub enum LobbyError {
    #[error("Study set not found")]
    StudySetNotFound,
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("Private rooms need a password")]
    PasswordRequired,
    #[error("Not enough questions available")]
    NotEnoughQuestions,
    #[error("Need at least two participants")]
    NotEnoughParticipants,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Only the host can do that")]
    NotHost,
    #[error("You are already in another room")]
    AlreadyInRoom,
    #[error("You are not in this room")]
    NotInRoom,
    #[error("The game has already started")]
    GameAlreadyStarted,
    #[error("The game is not running")]
    GameNotRunning,
    #[error("Slot not found")]
    SlotNotFound,
    #[error("Slot is occupied by a player")]
    SlotOccupied,
    #[error("Slot changed, try again")]
    SlotConflict { expected: SlotType, actual: SlotType },
    #[error("Invalid slot type")]
    InvalidSlotType,
    #[error("You cannot kick yourself")]
    CannotKickSelf,
    #[error("Room already exists")]
    RoomConflict,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Remote(String),
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("WebSocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LobbyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::StudySetNotFound | Self::RoomNotFound | Self::SlotNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::IncorrectPassword | Self::NotHost | Self::NotInRoom => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RoomFull
            | Self::AlreadyInRoom
            | Self::GameAlreadyStarted
            | Self::SlotConflict { .. }
            | Self::SlotOccupied
            | Self::RoomConflict => StatusCode::CONFLICT,
            Self::Transport(_) | Self::Socket(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<validator::ValidationErrors> for LobbyError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, detail)
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self::Invalid(message)
    }
}

impl From<bcrypt::BcryptError> for LobbyError {
    fn from(error: bcrypt::BcryptError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<tokio::task::JoinError> for LobbyError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl IntoResponse for LobbyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ApiResponse::<()>::failure(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(LobbyError::StudySetNotFound.to_string(), "Study set not found");
        assert_eq!(LobbyError::IncorrectPassword.to_string(), "Incorrect password");
        assert_eq!(
            LobbyError::NotEnoughQuestions.to_string(),
            "Not enough questions available"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LobbyError::RoomNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(LobbyError::NotHost.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(LobbyError::RoomFull.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            LobbyError::Invalid("name is too long".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
