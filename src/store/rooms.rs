//! 배틀 룸 저장소

use crate::error::LobbyError;
use crate::model::{BattleRoom, RoomProgress, RoomStatus};
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};

/// public_id → BattleRoom
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: DashMap<String, BattleRoom>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, room: BattleRoom) -> Result<(), LobbyError> {
        match self.rooms.entry(room.public_id.clone()) {
            Entry::Occupied(_) => Err(LobbyError::RoomConflict),
            Entry::Vacant(entry) => {
                entry.insert(room);
                Ok(())
            }
        }
    }

    pub fn find(&self, public_id: &str) -> Option<BattleRoom> {
        self.rooms.get(public_id).map(|room| room.clone())
    }

    pub fn status(&self, public_id: &str) -> Option<RoomStatus> {
        self.rooms.get(public_id).map(|room| room.status())
    }

    pub fn find_by_status(&self, status: RoomStatus) -> Vec<BattleRoom> {
        let mut rooms: Vec<BattleRoom> = self
            .rooms
            .iter()
            .filter(|room| room.status() == status)
            .map(|room| room.clone())
            .collect();
        rooms.sort_by_key(|room| room.created_at);
        rooms
    }

    /// 진행 상태만 수정한다. 설정은 생성 이후 불변.
    /// 클로저가 에러를 돌려주면 변경 없이 그대로 전달한다.
    pub fn update_progress<T>(
        &self,
        public_id: &str,
        f: impl FnOnce(&BattleRoom, &mut RoomProgress) -> Result<T, LobbyError>,
    ) -> Result<T, LobbyError> {
        let mut room = self
            .rooms
            .get_mut(public_id)
            .ok_or(LobbyError::RoomNotFound)?;

        let mut progress = room.progress.clone();
        let result = f(room.value(), &mut progress)?;
        room.progress = progress;
        room.updated_at = Utc::now();
        Ok(result)
    }

    pub fn delete(&self, public_id: &str) -> Option<BattleRoom> {
        self.rooms.remove(public_id).map(|(_, room)| room)
    }

    /// 조건에 맞는 방을 제거하고 제거된 방 목록을 돌려준다
    pub fn remove_where(&self, mut predicate: impl FnMut(&BattleRoom) -> bool) -> Vec<BattleRoom> {
        let doomed: Vec<String> = self
            .rooms
            .iter()
            .filter(|room| predicate(room.value()))
            .map(|room| room.key().clone())
            .collect();

        doomed
            .iter()
            .filter_map(|public_id| self.delete(public_id))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RoomSettings, Visibility};

    fn make_room(public_id: &str) -> BattleRoom {
        BattleRoom::new(
            public_id.to_string(),
            "host".into(),
            "set-1".into(),
            RoomSettings {
                name: "Room".into(),
                visibility: Visibility::Public,
                password_hash: None,
                time_limit_seconds: 20,
                question_count: 5,
                slot_count: 4,
            },
        )
    }

    #[test]
    fn test_create_rejects_duplicate_public_id() {
        let store = RoomStore::new();
        store.create(make_room("AAAA0000")).unwrap();
        assert!(matches!(
            store.create(make_room("AAAA0000")),
            Err(LobbyError::RoomConflict)
        ));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_update_progress_keeps_settings() {
        let store = RoomStore::new();
        store.create(make_room("AAAA0000")).unwrap();

        store
            .update_progress("AAAA0000", |_, progress| {
                progress.status = RoomStatus::InGame;
                progress.current_question_index = Some(0);
                Ok(())
            })
            .unwrap();

        let room = store.find("AAAA0000").unwrap();
        assert_eq!(room.status(), RoomStatus::InGame);
        assert_eq!(room.settings.name, "Room");
        assert_eq!(store.find_by_status(RoomStatus::InGame).len(), 1);
        assert!(store.find_by_status(RoomStatus::Waiting).is_empty());
    }

    #[test]
    fn test_update_progress_error_leaves_room_untouched() {
        let store = RoomStore::new();
        store.create(make_room("AAAA0000")).unwrap();

        let result: Result<(), _> = store.update_progress("AAAA0000", |_, progress| {
            progress.status = RoomStatus::Finished;
            Err(LobbyError::NotHost)
        });

        assert!(matches!(result, Err(LobbyError::NotHost)));
        assert_eq!(store.status("AAAA0000"), Some(RoomStatus::Waiting));
    }

    #[test]
    fn test_remove_where() {
        let store = RoomStore::new();
        store.create(make_room("AAAA0000")).unwrap();
        store.create(make_room("BBBB0000")).unwrap();

        let removed = store.remove_where(|room| room.public_id.starts_with('A'));
        assert_eq!(removed.len(), 1);
        assert!(store.find("AAAA0000").is_none());
        assert!(store.find("BBBB0000").is_some());
    }
}
