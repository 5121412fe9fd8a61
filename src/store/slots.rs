//! 배틀 룸 슬롯 저장소
//!
//! 방마다 slot_index 순으로 정렬된 슬롯 목록을 가지고, 유저 → 방 인덱스로
//! "한 유저는 시스템 전체에서 슬롯 하나" 불변식을 지킨다.
//!
//! 락 순서: by_room 샤드를 잡은 상태에서만 by_user 에 접근한다. 반대 방향으로
//! 잡고 기다리는 경로는 없다.

use crate::error::LobbyError;
use crate::model::{BattleRoomSlot, SlotAssignment, SlotType};
use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct SlotStore {
    /// room public_id → 슬롯 목록 (slot_index 오름차순)
    by_room: DashMap<String, Vec<BattleRoomSlot>>,
    /// user_id → room public_id
    by_user: DashMap<String, String>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 방 생성 시 슬롯 묶음을 한 번에 만든다. 실패하면 아무것도 남기지 않는다.
    pub fn create_batch(
        &self,
        room_id: &str,
        mut slots: Vec<BattleRoomSlot>,
    ) -> Result<Vec<BattleRoomSlot>, LobbyError> {
        let mut indexes = HashSet::new();
        if !slots.iter().all(|slot| indexes.insert(slot.slot_index)) {
            return Err(LobbyError::Invalid("Duplicate slot index".to_string()));
        }
        if slots.iter().any(|slot| slot.room_id != room_id) {
            return Err(LobbyError::Invalid("Slot belongs to another room".to_string()));
        }
        if self.by_room.contains_key(room_id) {
            return Err(LobbyError::RoomConflict);
        }

        let mut claimed: Vec<String> = Vec::new();
        for user_id in slots.iter().filter_map(|slot| slot.user_id.as_deref()) {
            if !self.claim_user(user_id, room_id) {
                for user_id in &claimed {
                    self.by_user.remove(user_id);
                }
                return Err(LobbyError::AlreadyInRoom);
            }
            claimed.push(user_id.to_string());
        }

        slots.sort_by_key(|slot| slot.slot_index);
        match self.by_room.entry(room_id.to_string()) {
            Entry::Occupied(_) => {
                for user_id in &claimed {
                    self.by_user.remove(user_id);
                }
                Err(LobbyError::RoomConflict)
            }
            Entry::Vacant(entry) => {
                entry.insert(slots.clone());
                Ok(slots)
            }
        }
    }

    pub fn find_by_room(&self, room_id: &str) -> Vec<BattleRoomSlot> {
        self.by_room
            .get(room_id)
            .map(|slots| slots.clone())
            .unwrap_or_default()
    }

    pub fn find_slot(&self, room_id: &str, slot_index: usize) -> Option<BattleRoomSlot> {
        self.by_room.get(room_id).and_then(|slots| {
            slots
                .iter()
                .find(|slot| slot.slot_index == slot_index)
                .cloned()
        })
    }

    /// 유저가 앉아 있는 슬롯 (어느 방이든)
    pub fn find_by_user(&self, user_id: &str) -> Option<BattleRoomSlot> {
        let room_id = self.by_user.get(user_id).map(|room| room.clone())?;
        self.by_room.get(&room_id).and_then(|slots| {
            slots.iter().find(|slot| slot.holds_user(user_id)).cloned()
        })
    }

    /// 슬롯 하나를 갱신한다. `expected` 가 주어지면 현재 타입이 같을 때만 바꾼다.
    pub fn update(
        &self,
        room_id: &str,
        slot_index: usize,
        assignment: SlotAssignment,
        expected: Option<SlotType>,
    ) -> Result<BattleRoomSlot, LobbyError> {
        let mut slots = self
            .by_room
            .get_mut(room_id)
            .ok_or(LobbyError::RoomNotFound)?;
        let slot = slots
            .iter_mut()
            .find(|slot| slot.slot_index == slot_index)
            .ok_or(LobbyError::SlotNotFound)?;

        if let Some(expected) = expected {
            if slot.slot_type != expected {
                return Err(LobbyError::SlotConflict {
                    expected,
                    actual: slot.slot_type,
                });
            }
        }

        if let SlotAssignment::Player(user_id) = &assignment {
            if !slot.holds_user(user_id) && !self.claim_user(user_id, room_id) {
                return Err(LobbyError::AlreadyInRoom);
            }
        }

        let previous_user = slot.user_id.clone();
        slot.assign(assignment);
        if let Some(previous_user) = previous_user {
            if !slot.holds_user(&previous_user) {
                self.by_user.remove(&previous_user);
            }
        }

        Ok(slot.clone())
    }

    /// 방의 슬롯을 모두 지우고 앉아 있던 유저를 풀어준다
    pub fn delete_by_room(&self, room_id: &str) -> Vec<BattleRoomSlot> {
        let Some((_, slots)) = self.by_room.remove(room_id) else {
            return Vec::new();
        };

        for user_id in slots.iter().filter_map(|slot| slot.user_id.as_deref()) {
            self.by_user.remove_if(user_id, |_, room| room == room_id);
        }
        slots
    }

    fn claim_user(&self, user_id: &str, room_id: &str) -> bool {
        match self.by_user.entry(user_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(room_id.to_string());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_batch(room_id: &str, host: &str, count: usize) -> Vec<BattleRoomSlot> {
        (0..count)
            .map(|index| {
                let assignment = if index == 0 {
                    SlotAssignment::Player(host.to_string())
                } else {
                    SlotAssignment::Empty
                };
                BattleRoomSlot::new(room_id, index, assignment)
            })
            .collect()
    }

    #[test]
    fn test_create_batch_and_find() {
        let store = SlotStore::new();
        store.create_batch("ROOM0001", make_batch("ROOM0001", "host", 4)).unwrap();

        let slots = store.find_by_room("ROOM0001");
        assert_eq!(slots.len(), 4);
        assert_eq!(
            slots.iter().map(|s| s.slot_index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(store.find_by_user("host").unwrap().slot_index, 0);
        assert!(store.find_by_user("nobody").is_none());
    }

    #[test]
    fn test_user_occupies_one_slot_system_wide() {
        let store = SlotStore::new();
        store.create_batch("ROOM0001", make_batch("ROOM0001", "host", 3)).unwrap();
        store.create_batch("ROOM0002", make_batch("ROOM0002", "other", 3)).unwrap();

        store
            .update("ROOM0001", 1, SlotAssignment::Player("alice".into()), Some(SlotType::Empty))
            .unwrap();

        let second = store.update(
            "ROOM0002",
            1,
            SlotAssignment::Player("alice".into()),
            Some(SlotType::Empty),
        );
        assert!(matches!(second, Err(LobbyError::AlreadyInRoom)));
        assert_eq!(store.find_slot("ROOM0002", 1).unwrap().slot_type, SlotType::Empty);

        // 같은 방 다른 슬롯도 불가
        let same_room = store.update(
            "ROOM0001",
            2,
            SlotAssignment::Player("alice".into()),
            None,
        );
        assert!(matches!(same_room, Err(LobbyError::AlreadyInRoom)));

        // 배치 생성도 이미 앉은 유저는 거절하고 흔적을 남기지 않는다
        let batch = store.create_batch("ROOM0003", make_batch("ROOM0003", "alice", 2));
        assert!(matches!(batch, Err(LobbyError::AlreadyInRoom)));
        assert!(store.find_by_room("ROOM0003").is_empty());
    }

    #[test]
    fn test_expected_type_guard() {
        let store = SlotStore::new();
        store.create_batch("ROOM0001", make_batch("ROOM0001", "host", 2)).unwrap();

        let result = store.update("ROOM0001", 0, SlotAssignment::Empty, Some(SlotType::Empty));
        assert!(matches!(
            result,
            Err(LobbyError::SlotConflict {
                expected: SlotType::Empty,
                actual: SlotType::Player
            })
        ));
        assert!(store.find_slot("ROOM0001", 0).unwrap().holds_user("host"));
    }

    #[test]
    fn test_clearing_slot_releases_user() {
        let store = SlotStore::new();
        store.create_batch("ROOM0001", make_batch("ROOM0001", "host", 2)).unwrap();
        store
            .update("ROOM0001", 1, SlotAssignment::Player("alice".into()), None)
            .unwrap();

        let slot = store
            .update("ROOM0001", 1, SlotAssignment::Empty, Some(SlotType::Player))
            .unwrap();
        assert_eq!(slot.slot_type, SlotType::Empty);
        assert!(store.find_by_user("alice").is_none());

        // 풀려난 유저는 다시 앉을 수 있다
        store
            .update("ROOM0001", 1, SlotAssignment::Player("alice".into()), Some(SlotType::Empty))
            .unwrap();
    }

    #[test]
    fn test_delete_by_room() {
        let store = SlotStore::new();
        store.create_batch("ROOM0001", make_batch("ROOM0001", "host", 3)).unwrap();

        let removed = store.delete_by_room("ROOM0001");
        assert_eq!(removed.len(), 3);
        assert!(store.find_by_room("ROOM0001").is_empty());
        assert!(store.find_by_user("host").is_none());
        assert!(store.delete_by_room("ROOM0001").is_empty());
    }

    #[test]
    fn test_update_missing_slot() {
        let store = SlotStore::new();
        store.create_batch("ROOM0001", make_batch("ROOM0001", "host", 2)).unwrap();

        assert!(matches!(
            store.update("ROOM0001", 9, SlotAssignment::Locked, None),
            Err(LobbyError::SlotNotFound)
        ));
        assert!(matches!(
            store.update("MISSING0", 0, SlotAssignment::Locked, None),
            Err(LobbyError::RoomNotFound)
        ));
    }
}
