//! HTTP 로비 API 요청/응답 타입

use crate::model::{BattleRoom, BattleRoomSlot, RoomStatus, SlotType, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// `{ success, value }` / `{ success: false, error }` 응답 형태
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.into()),
        }
    }
}

/// 방 생성 요청
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub study_set_id: String,
    #[validate(length(min = 1, max = 64, message = "must be between 1 and 64 characters"))]
    pub name: String,
    pub visibility: Visibility,
    #[serde(default)]
    #[validate(length(min = 4, max = 64, message = "must be between 4 and 64 characters"))]
    pub password: Option<String>,
    #[validate(range(min = 5, max = 120, message = "must be between 5 and 120 seconds"))]
    pub time_limit_seconds: u32,
    #[validate(range(min = 1, max = 50, message = "must be between 1 and 50"))]
    pub question_count: u32,
    #[serde(default)]
    pub slot_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub public_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub slot_type: SlotType,
}

/// 방 나가기 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "slot", rename_all = "snake_case")]
pub enum LeaveOutcome {
    Left(BattleRoomSlot),
    RoomClosed,
}

/// 방 목록 / 로비 화면용 요약 (비밀번호 해시 제외)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub public_id: String,
    pub host_user_id: String,
    pub study_set_id: String,
    pub name: String,
    pub visibility: Visibility,
    pub status: RoomStatus,
    pub time_limit_seconds: u32,
    pub question_count: u32,
    pub slot_count: usize,
    pub current_question_index: Option<usize>,
    pub current_question_started_at: Option<DateTime<Utc>>,
    pub question_ids: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl From<&BattleRoom> for RoomSummary {
    fn from(room: &BattleRoom) -> Self {
        Self {
            public_id: room.public_id.clone(),
            host_user_id: room.host_user_id.clone(),
            study_set_id: room.study_set_id.clone(),
            name: room.settings.name.clone(),
            visibility: room.settings.visibility,
            status: room.progress.status,
            time_limit_seconds: room.settings.time_limit_seconds,
            question_count: room.settings.question_count,
            slot_count: room.settings.slot_count,
            current_question_index: room.progress.current_question_index,
            current_question_started_at: room.progress.current_question_started_at,
            question_ids: room.progress.question_ids.clone(),
            created_at: room.created_at,
        }
    }
}

/// 방 + 슬롯 목록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyView {
    pub room: RoomSummary,
    pub slots: Vec<BattleRoomSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateRoomRequest {
        CreateRoomRequest {
            study_set_id: "set-1".into(),
            name: "Cell biology".into(),
            visibility: Visibility::Public,
            password: None,
            time_limit_seconds: 20,
            question_count: 10,
            slot_count: None,
        }
    }

    #[test]
    fn test_create_room_validation() {
        assert!(request().validate().is_ok());

        let mut bad = request();
        bad.name = String::new();
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.time_limit_seconds = 500;
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.password = Some("abc".into());
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_failure_shape() {
        let json = serde_json::to_value(ApiResponse::<()>::failure("Room not found")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Room not found");
        assert!(json.get("value").is_none());
    }
}
