//! 배틀 룸 / 슬롯 / 프레즌스 데이터 모델

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 방 공개 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// 방 상태 (waiting → in_game → finished)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}

/// 슬롯 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Player,
    Bot,
    Empty,
    Locked,
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Bot => write!(f, "bot"),
            Self::Empty => write!(f, "empty"),
            Self::Locked => write!(f, "locked"),
        }
    }
}

/// 생성 이후 변경되지 않는 방 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub name: String,
    pub visibility: Visibility,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub time_limit_seconds: u32,
    pub question_count: u32,
    pub slot_count: usize,
}

/// 게임 진행 상태 (방에서 유일하게 변경 가능한 부분)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomProgress {
    pub status: RoomStatus,
    pub current_question_index: Option<usize>,
    pub current_question_started_at: Option<DateTime<Utc>>,
    pub question_ids: Option<Vec<String>>,
}

impl RoomProgress {
    pub fn waiting() -> Self {
        Self {
            status: RoomStatus::Waiting,
            current_question_index: None,
            current_question_started_at: None,
            question_ids: None,
        }
    }
}

/// 배틀 룸
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRoom {
    pub id: Uuid,
    pub public_id: String,
    pub host_user_id: String,
    pub study_set_id: String,
    pub settings: RoomSettings,
    #[serde(flatten)]
    pub progress: RoomProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BattleRoom {
    pub fn new(
        public_id: String,
        host_user_id: String,
        study_set_id: String,
        settings: RoomSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            public_id,
            host_user_id,
            study_set_id,
            settings,
            progress: RoomProgress::waiting(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> RoomStatus {
        self.progress.status
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_user_id == user_id
    }
}

/// 슬롯에 앉힐 대상. 슬롯은 이 값을 통해서만 만들어지거나 바뀐다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAssignment {
    Player(String),
    Bot(String),
    Empty,
    Locked,
}

impl SlotAssignment {
    pub fn slot_type(&self) -> SlotType {
        match self {
            Self::Player(_) => SlotType::Player,
            Self::Bot(_) => SlotType::Bot,
            Self::Empty => SlotType::Empty,
            Self::Locked => SlotType::Locked,
        }
    }
}

/// 배틀 룸 슬롯
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRoomSlot {
    pub room_id: String,
    pub slot_index: usize,
    pub slot_type: SlotType,
    pub user_id: Option<String>,
    pub bot_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BattleRoomSlot {
    pub fn new(room_id: impl Into<String>, slot_index: usize, assignment: SlotAssignment) -> Self {
        let mut slot = Self {
            room_id: room_id.into(),
            slot_index,
            slot_type: SlotType::Empty,
            user_id: None,
            bot_name: None,
            created_at: Utc::now(),
        };
        slot.assign(assignment);
        slot
    }

    /// player 는 user 만, bot 은 이름만, empty/locked 는 둘 다 비운다
    pub fn assign(&mut self, assignment: SlotAssignment) {
        self.slot_type = assignment.slot_type();
        match assignment {
            SlotAssignment::Player(user_id) => {
                self.user_id = Some(user_id);
                self.bot_name = None;
            }
            SlotAssignment::Bot(name) => {
                self.user_id = None;
                self.bot_name = Some(name);
            }
            SlotAssignment::Empty | SlotAssignment::Locked => {
                self.user_id = None;
                self.bot_name = None;
            }
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self.slot_type, SlotType::Player | SlotType::Bot)
    }

    pub fn holds_user(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

/// 프레즌스 로스터 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: String,
    pub online_at: DateTime<Utc>,
}

impl PresenceEntry {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            online_at: Utc::now(),
        }
    }
}

/// 스터디 세트 (문제 생성 파이프라인의 결과물)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySet {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub question_ids: Vec<String>,
}
