//! 방별 프레즌스 관리
//!
//! 한 유저가 여러 연결(탭)로 같은 방에 들어와 있을 수 있다. 유저는 마지막 연결이
//! 나갈 때까지 온라인으로 남고, `online_at` 은 첫 연결 시각을 유지한다.

use crate::model::PresenceEntry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct PresenceMember {
    online_at: DateTime<Utc>,
    peers: HashSet<String>,
}

#[derive(Debug, Default)]
struct PresenceChannel {
    members: HashMap<String, PresenceMember>,
}

impl PresenceChannel {
    fn roster(&self) -> Vec<PresenceEntry> {
        let mut users: Vec<PresenceEntry> = self
            .members
            .iter()
            .map(|(user_id, member)| PresenceEntry {
                user_id: user_id.clone(),
                online_at: member.online_at,
            })
            .collect();
        users.sort_by(|a, b| {
            a.online_at
                .cmp(&b.online_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users
    }

    fn peers(&self) -> Vec<String> {
        self.members
            .values()
            .flat_map(|member| member.peers.iter().cloned())
            .collect()
    }
}

/// room public_id → 프레즌스 채널
#[derive(Debug, Default)]
pub struct PresenceHub {
    rooms: DashMap<String, PresenceChannel>,
}

impl PresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 연결을 방에 추가하고 갱신된 로스터를 돌려준다
    pub fn join(&self, room_id: &str, user_id: &str, peer_id: &str) -> Vec<PresenceEntry> {
        let mut channel = self.rooms.entry(room_id.to_string()).or_default();
        channel
            .members
            .entry(user_id.to_string())
            .or_insert_with(|| PresenceMember {
                online_at: Utc::now(),
                peers: HashSet::new(),
            })
            .peers
            .insert(peer_id.to_string());
        channel.roster()
    }

    /// 연결을 방에서 제거한다. 채널이 비면 채널도 지운다.
    pub fn leave(&self, room_id: &str, user_id: &str, peer_id: &str) -> Vec<PresenceEntry> {
        let roster = {
            let Some(mut channel) = self.rooms.get_mut(room_id) else {
                return Vec::new();
            };
            let gone = match channel.members.get_mut(user_id) {
                Some(member) => {
                    member.peers.remove(peer_id);
                    member.peers.is_empty()
                }
                None => false,
            };
            if gone {
                channel.members.remove(user_id);
            }
            channel.roster()
        };

        if roster.is_empty() {
            self.rooms.remove_if(room_id, |_, channel| channel.members.is_empty());
        }
        roster
    }

    pub fn roster(&self, room_id: &str) -> Vec<PresenceEntry> {
        self.rooms
            .get(room_id)
            .map(|channel| channel.roster())
            .unwrap_or_default()
    }

    pub fn is_online(&self, room_id: &str, user_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|channel| channel.members.contains_key(user_id))
            .unwrap_or(false)
    }

    pub fn has_members(&self, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|channel| !channel.members.is_empty())
            .unwrap_or(false)
    }

    /// 방에 연결된 모든 피어 id
    pub fn peers(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|channel| channel.peers())
            .unwrap_or_default()
    }

    /// 채널을 통째로 제거하고 연결되어 있던 피어 id 를 돌려준다
    pub fn remove_room(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .remove(room_id)
            .map(|(_, channel)| channel.peers())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(roster: &[PresenceEntry]) -> Vec<&str> {
        roster.iter().map(|entry| entry.user_id.as_str()).collect()
    }

    #[test]
    fn test_join_and_leave() {
        let hub = PresenceHub::new();
        hub.join("ROOM0001", "host", "peer-1");
        let roster = hub.join("ROOM0001", "alice", "peer-2");
        assert_eq!(roster.len(), 2);
        assert!(hub.is_online("ROOM0001", "alice"));

        let roster = hub.leave("ROOM0001", "alice", "peer-2");
        assert_eq!(ids(&roster), vec!["host"]);
        assert!(!hub.is_online("ROOM0001", "alice"));
    }

    #[test]
    fn test_user_stays_online_while_any_connection_remains() {
        let hub = PresenceHub::new();
        let first = hub.join("ROOM0001", "alice", "tab-1");
        hub.join("ROOM0001", "alice", "tab-2");

        let roster = hub.leave("ROOM0001", "alice", "tab-1");
        assert_eq!(ids(&roster), vec!["alice"]);
        assert_eq!(roster[0].online_at, first[0].online_at);

        let roster = hub.leave("ROOM0001", "alice", "tab-2");
        assert!(roster.is_empty());
        assert!(!hub.has_members("ROOM0001"));
    }

    #[test]
    fn test_peers_and_remove_room() {
        let hub = PresenceHub::new();
        hub.join("ROOM0001", "host", "peer-1");
        hub.join("ROOM0001", "alice", "peer-2");
        hub.join("ROOM0002", "bob", "peer-3");

        let mut peers = hub.peers("ROOM0001");
        peers.sort();
        assert_eq!(peers, vec!["peer-1", "peer-2"]);

        let removed = hub.remove_room("ROOM0001");
        assert_eq!(removed.len(), 2);
        assert!(hub.roster("ROOM0001").is_empty());
        assert!(hub.is_online("ROOM0002", "bob"));
    }

    #[test]
    fn test_leave_unknown_room_is_noop() {
        let hub = PresenceHub::new();
        assert!(hub.leave("MISSING0", "alice", "peer-1").is_empty());
    }
}
