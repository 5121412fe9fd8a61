//! 로비 액션 게이트웨이
//!
//! 방 생성 / 참여 / 나가기 / 슬롯 변경 / 강퇴 / 시작 / 닫기를 행위자(user_id) 기준으로
//! 수행한다. 모든 액션은 방 / 슬롯 저장소에 대한 한 번의 요청-응답이다.

use crate::config::RoomConfig;
use crate::coordinator::LobbyActions;
use crate::error::LobbyError;
use crate::model::{
    BattleRoom, BattleRoomSlot, RoomSettings, RoomStatus, SlotAssignment, SlotType, Visibility,
};
use crate::presence::PresenceHub;
use crate::protocol::{CreateRoomRequest, LeaveOutcome, LobbyView, RoomSummary};
use crate::store::{RoomStore, SlotStore, StudySetStore};
use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use validator::Validate;

const PUBLIC_ID_LEN: usize = 8;
const PUBLIC_ID_ATTEMPTS: usize = 5;

const BOT_NAMES: &[&str] = &[
    "Quizzy", "Recallio", "Flashbot", "Memo", "Cramster", "Synapse", "Brainy", "Sage",
];

fn generate_public_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_ID_LEN)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}

async fn hash_password(password: String, cost: u32) -> Result<String, LobbyError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: String, hash: String) -> Result<bool, LobbyError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}

pub struct LobbyGateway {
    rooms: RoomStore,
    slots: SlotStore,
    study_sets: Arc<StudySetStore>,
    presence: Arc<PresenceHub>,
    config: RoomConfig,
}

impl LobbyGateway {
    pub fn new(
        study_sets: Arc<StudySetStore>,
        presence: Arc<PresenceHub>,
        config: RoomConfig,
    ) -> Self {
        Self {
            rooms: RoomStore::new(),
            slots: SlotStore::new(),
            study_sets,
            presence,
            config,
        }
    }

    /// 방 생성. 0번 슬롯은 방장, 나머지는 empty.
    pub async fn create_room(
        &self,
        user_id: &str,
        request: CreateRoomRequest,
    ) -> Result<String, LobbyError> {
        request.validate()?;

        let slot_count = request
            .slot_count
            .unwrap_or(self.config.default_slot_count);
        if !(2..=self.config.max_slot_count).contains(&slot_count) {
            return Err(LobbyError::Invalid(format!(
                "slot_count must be between 2 and {}",
                self.config.max_slot_count
            )));
        }
        if !self.study_sets.contains(&request.study_set_id) {
            return Err(LobbyError::StudySetNotFound);
        }
        if self.slots.find_by_user(user_id).is_some() {
            return Err(LobbyError::AlreadyInRoom);
        }

        let password_hash = match (request.visibility, request.password) {
            (Visibility::Private, Some(password)) => {
                Some(hash_password(password, self.config.password_cost).await?)
            }
            (Visibility::Private, None) => return Err(LobbyError::PasswordRequired),
            (Visibility::Public, _) => None,
        };

        let settings = RoomSettings {
            name: request.name.trim().to_string(),
            visibility: request.visibility,
            password_hash,
            time_limit_seconds: request.time_limit_seconds,
            question_count: request.question_count,
            slot_count,
        };

        let mut attempt = 0;
        let room = loop {
            attempt += 1;
            let room = BattleRoom::new(
                generate_public_id(),
                user_id.to_string(),
                request.study_set_id.clone(),
                settings.clone(),
            );
            match self.rooms.create(room.clone()) {
                Ok(()) => break room,
                Err(LobbyError::RoomConflict) if attempt < PUBLIC_ID_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        };

        let slots = (0..slot_count)
            .map(|index| {
                let assignment = if index == 0 {
                    SlotAssignment::Player(user_id.to_string())
                } else {
                    SlotAssignment::Empty
                };
                BattleRoomSlot::new(&room.public_id, index, assignment)
            })
            .collect();
        if let Err(e) = self.slots.create_batch(&room.public_id, slots) {
            self.rooms.delete(&room.public_id);
            return Err(e);
        }

        tracing::info!(
            room_id = %room.public_id,
            host_user_id = %user_id,
            slot_count = slot_count,
            "Battle room created"
        );
        Ok(room.public_id)
    }

    /// 방 참여. 이미 이 방에 앉아 있으면 그 슬롯을 그대로 돌려준다.
    pub async fn join_room(
        &self,
        user_id: &str,
        public_id: &str,
        password: Option<String>,
    ) -> Result<BattleRoomSlot, LobbyError> {
        let room = self.rooms.find(public_id).ok_or(LobbyError::RoomNotFound)?;

        if let Some(seat) = self.slots.find_by_user(user_id) {
            if seat.room_id == public_id {
                return Ok(seat);
            }
            return Err(LobbyError::AlreadyInRoom);
        }
        if room.status() != RoomStatus::Waiting {
            return Err(LobbyError::GameAlreadyStarted);
        }

        if room.settings.visibility == Visibility::Private {
            let password = password.ok_or(LobbyError::IncorrectPassword)?;
            let hash = room
                .settings
                .password_hash
                .clone()
                .ok_or(LobbyError::IncorrectPassword)?;
            if !verify_password(password, hash).await? {
                tracing::warn!(room_id = %public_id, user_id = %user_id, "Incorrect room password");
                return Err(LobbyError::IncorrectPassword);
            }
        }

        let empty_slots = self
            .slots
            .find_by_room(public_id)
            .into_iter()
            .filter(|slot| slot.slot_type == SlotType::Empty);
        for slot in empty_slots {
            match self.slots.update(
                public_id,
                slot.slot_index,
                SlotAssignment::Player(user_id.to_string()),
                Some(SlotType::Empty),
            ) {
                Ok(seat) => {
                    tracing::info!(
                        room_id = %public_id,
                        user_id = %user_id,
                        slot_index = seat.slot_index,
                        "Player joined room"
                    );
                    return Ok(seat);
                }
                // 다른 유저가 먼저 앉았다
                Err(LobbyError::SlotConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(LobbyError::RoomFull)
    }

    /// 방 나가기. 방장이 나가면 방을 닫는다.
    pub fn leave_room(&self, user_id: &str, public_id: &str) -> Result<LeaveOutcome, LobbyError> {
        let room = self.rooms.find(public_id).ok_or(LobbyError::RoomNotFound)?;
        let seat = self
            .slots
            .find_by_user(user_id)
            .filter(|seat| seat.room_id == public_id)
            .ok_or(LobbyError::NotInRoom)?;

        if room.is_host(user_id) {
            self.delete_room(public_id);
            tracing::info!(room_id = %public_id, "Host left, room closed");
            return Ok(LeaveOutcome::RoomClosed);
        }

        let slot = self.slots.update(
            public_id,
            seat.slot_index,
            SlotAssignment::Empty,
            Some(SlotType::Player),
        )?;
        tracing::info!(room_id = %public_id, user_id = %user_id, "Player left room");
        Ok(LeaveOutcome::Left(slot))
    }

    /// 방장 전용: empty / locked / bot 슬롯 타입 변경
    pub fn update_slot(
        &self,
        user_id: &str,
        public_id: &str,
        slot_index: usize,
        slot_type: SlotType,
    ) -> Result<BattleRoomSlot, LobbyError> {
        let room = self.host_room(user_id, public_id)?;
        if room.status() != RoomStatus::Waiting {
            return Err(LobbyError::GameAlreadyStarted);
        }

        let current = self
            .slots
            .find_slot(public_id, slot_index)
            .ok_or(LobbyError::SlotNotFound)?;
        if current.slot_type == SlotType::Player {
            return Err(LobbyError::SlotOccupied);
        }

        let assignment = match slot_type {
            SlotType::Empty => SlotAssignment::Empty,
            SlotType::Locked => SlotAssignment::Locked,
            SlotType::Bot => SlotAssignment::Bot(self.pick_bot_name(public_id, slot_index)),
            SlotType::Player => return Err(LobbyError::InvalidSlotType),
        };

        let slot = self
            .slots
            .update(public_id, slot_index, assignment, Some(current.slot_type))?;
        tracing::info!(
            room_id = %public_id,
            slot_index = slot_index,
            slot_type = %slot.slot_type,
            "Slot updated"
        );
        Ok(slot)
    }

    /// 방장 전용: player 슬롯을 empty 로 되돌린다
    pub fn kick_player(
        &self,
        user_id: &str,
        public_id: &str,
        slot_index: usize,
    ) -> Result<BattleRoomSlot, LobbyError> {
        self.host_room(user_id, public_id)?;

        let current = self
            .slots
            .find_slot(public_id, slot_index)
            .ok_or(LobbyError::SlotNotFound)?;
        if current.holds_user(user_id) {
            return Err(LobbyError::CannotKickSelf);
        }

        let slot = self.slots.update(
            public_id,
            slot_index,
            SlotAssignment::Empty,
            Some(SlotType::Player),
        )?;
        tracing::info!(
            room_id = %public_id,
            slot_index = slot_index,
            kicked_user_id = ?current.user_id,
            "Player kicked"
        );
        Ok(slot)
    }

    /// 방 닫기. 이미 없는 방이면 false.
    /// 방장, 또는 방장이 프레즌스에 없을 때 방에 앉아 있는 멤버가 닫을 수 있다.
    pub fn close_room(&self, user_id: &str, public_id: &str) -> Result<bool, LobbyError> {
        let Some(room) = self.rooms.find(public_id) else {
            return Ok(false);
        };

        if !room.is_host(user_id) {
            let seated = self
                .slots
                .find_by_user(user_id)
                .is_some_and(|seat| seat.room_id == public_id);
            if !seated {
                return Err(LobbyError::NotInRoom);
            }
            if self.presence.is_online(public_id, &room.host_user_id) {
                return Err(LobbyError::NotHost);
            }
        }

        let closed = self.delete_room(public_id);
        if closed {
            tracing::info!(room_id = %public_id, closed_by = %user_id, "Room closed");
        }
        Ok(closed)
    }

    /// 방장 전용: 문제 계획을 뽑고 게임을 시작한다
    pub fn start_game(&self, user_id: &str, public_id: &str) -> Result<RoomSummary, LobbyError> {
        let room = self.host_room(user_id, public_id)?;
        if room.status() != RoomStatus::Waiting {
            return Err(LobbyError::GameAlreadyStarted);
        }

        let participants = self
            .slots
            .find_by_room(public_id)
            .iter()
            .filter(|slot| slot.is_occupied())
            .count();
        if participants < 2 {
            return Err(LobbyError::NotEnoughParticipants);
        }

        let study_set = self
            .study_sets
            .get(&room.study_set_id)
            .ok_or(LobbyError::StudySetNotFound)?;
        let needed = room.settings.question_count as usize;
        if study_set.question_ids.len() < needed {
            return Err(LobbyError::NotEnoughQuestions);
        }

        let plan: Vec<String> = study_set
            .question_ids
            .choose_multiple(&mut rand::thread_rng(), needed)
            .cloned()
            .collect();

        self.rooms.update_progress(public_id, |_, progress| {
            if progress.status != RoomStatus::Waiting {
                return Err(LobbyError::GameAlreadyStarted);
            }
            progress.status = RoomStatus::InGame;
            progress.current_question_index = Some(0);
            progress.current_question_started_at = Some(Utc::now());
            progress.question_ids = Some(plan);
            Ok(())
        })?;

        tracing::info!(
            room_id = %public_id,
            participants = participants,
            questions = needed,
            "Battle started"
        );
        self.summary(public_id)
    }

    /// 방장 전용: 다음 문제로 넘긴다. 마지막 문제 다음이면 finished.
    pub fn advance_question(
        &self,
        user_id: &str,
        public_id: &str,
    ) -> Result<RoomSummary, LobbyError> {
        self.host_room(user_id, public_id)?;

        let status = self.rooms.update_progress(public_id, |_, progress| {
            if progress.status != RoomStatus::InGame {
                return Err(LobbyError::GameNotRunning);
            }
            let total = progress.question_ids.as_ref().map(Vec::len).unwrap_or(0);
            let next = progress.current_question_index.map_or(0, |index| index + 1);
            if next >= total {
                progress.status = RoomStatus::Finished;
                progress.current_question_started_at = None;
            } else {
                progress.current_question_index = Some(next);
                progress.current_question_started_at = Some(Utc::now());
            }
            Ok(progress.status)
        })?;

        if status == RoomStatus::Finished {
            tracing::info!(room_id = %public_id, "Battle finished");
        }
        self.summary(public_id)
    }

    pub fn lobby(&self, public_id: &str) -> Result<LobbyView, LobbyError> {
        let room = self.rooms.find(public_id).ok_or(LobbyError::RoomNotFound)?;
        Ok(LobbyView {
            room: RoomSummary::from(&room),
            slots: self.slots.find_by_room(public_id),
        })
    }

    pub fn list_public_rooms(&self) -> Vec<RoomSummary> {
        self.rooms
            .find_by_status(RoomStatus::Waiting)
            .iter()
            .filter(|room| room.settings.visibility == Visibility::Public)
            .map(RoomSummary::from)
            .collect()
    }

    /// 유저가 앉아 있는 슬롯
    pub fn seat_of(&self, user_id: &str) -> Option<BattleRoomSlot> {
        self.slots.find_by_user(user_id)
    }

    pub fn room_status(&self, public_id: &str) -> Option<RoomStatus> {
        self.rooms.status(public_id)
    }

    /// 오래된 방 정리: 아무도 접속해 있지 않고, 끝났거나 timeout 을 넘긴 방
    pub fn sweep_stale_rooms(&self, timeout_ms: u64) -> Vec<String> {
        let now = Utc::now();
        let removed = self.rooms.remove_where(|room| {
            let age_ms = (now - room.created_at).num_milliseconds().max(0) as u64;
            !self.presence.has_members(&room.public_id)
                && (room.status() == RoomStatus::Finished || age_ms > timeout_ms)
        });

        removed
            .into_iter()
            .map(|room| {
                self.slots.delete_by_room(&room.public_id);
                room.public_id
            })
            .collect()
    }

    /// 이 게이트웨이를 특정 유저로서 호출하는 코디네이터 액션
    pub fn acting_as(self: &Arc<Self>, user_id: impl Into<String>) -> ActingUser {
        ActingUser {
            gateway: self.clone(),
            user_id: user_id.into(),
        }
    }

    fn host_room(&self, user_id: &str, public_id: &str) -> Result<BattleRoom, LobbyError> {
        let room = self.rooms.find(public_id).ok_or(LobbyError::RoomNotFound)?;
        if !room.is_host(user_id) {
            return Err(LobbyError::NotHost);
        }
        Ok(room)
    }

    fn summary(&self, public_id: &str) -> Result<RoomSummary, LobbyError> {
        self.rooms
            .find(public_id)
            .map(|room| RoomSummary::from(&room))
            .ok_or(LobbyError::RoomNotFound)
    }

    fn delete_room(&self, public_id: &str) -> bool {
        self.slots.delete_by_room(public_id);
        self.rooms.delete(public_id).is_some()
    }

    fn pick_bot_name(&self, public_id: &str, slot_index: usize) -> String {
        let taken: Vec<String> = self
            .slots
            .find_by_room(public_id)
            .into_iter()
            .filter_map(|slot| slot.bot_name)
            .collect();
        let free: Vec<&&str> = BOT_NAMES
            .iter()
            .filter(|name| !taken.iter().any(|t| t == **name))
            .collect();

        free.choose(&mut rand::thread_rng())
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Bot {}", slot_index + 1))
    }
}

/// 인프로세스 `LobbyActions` 구현
#[derive(Clone)]
pub struct ActingUser {
    gateway: Arc<LobbyGateway>,
    user_id: String,
}

#[async_trait]
impl LobbyActions for ActingUser {
    async fn kick_player(
        &self,
        public_id: &str,
        slot_index: usize,
    ) -> Result<Option<BattleRoomSlot>, LobbyError> {
        self.gateway
            .kick_player(&self.user_id, public_id, slot_index)
            .map(Some)
    }

    async fn close_room(&self, public_id: &str) -> Result<bool, LobbyError> {
        self.gateway.close_room(&self.user_id, public_id)
    }
}
