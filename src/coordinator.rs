//! 접속 끊김 정리 코디네이터
//!
//! 로비 클라이언트마다 하나씩 두고, 프레즌스 로스터 변화를 슬롯 배정 / 방장 정보와
//! 비교해서 끊긴 유저마다 유예 타이머를 건다. 유예 시간 안에 돌아오면 타이머를
//! 취소하고, 돌아오지 않으면 딱 한 번 복구 액션을 실행한다.
//!
//! - 방장이 끊김: 방장이 아닌 player 슬롯 중 slot_index 가 가장 작은 유저(지정 closer)만
//!   `close_room` 을 호출하고, 나머지 클라이언트는 `RoomClosed` 이벤트만 낸다.
//! - 일반 플레이어가 끊김: 로컬 클라이언트가 방장일 때만 `kick_player` 를 호출한다.
//! - 그 외: 아무것도 하지 않는다.
//!
//! 액션 주체를 메시지 순서가 아니라 정적인 데이터(is_host, 정렬된 slot_index)로
//! 정하기 때문에, 여러 클라이언트가 같은 끊김을 동시에 보더라도 중복 실행되지 않는다.
//! 액션 실패는 재시도하지 않고 로그만 남긴다.

use crate::error::LobbyError;
use crate::model::{BattleRoomSlot, PresenceEntry, SlotType};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio::task::JoinHandle;

/// 끊김을 확정하기 전 유예 시간
pub const DISCONNECT_GRACE_PERIOD: Duration = Duration::from_millis(5000);

/// 코디네이터가 호출하는 부수효과 액션
#[async_trait]
pub trait LobbyActions: Send + Sync + 'static {
    /// player 슬롯을 비운다. 실패하면 `Ok(None)` 또는 `Err`.
    async fn kick_player(
        &self,
        public_id: &str,
        slot_index: usize,
    ) -> Result<Option<BattleRoomSlot>, LobbyError>;

    /// 방을 닫는다. 이미 없는 방이면 `Ok(false)`.
    async fn close_room(&self, public_id: &str) -> Result<bool, LobbyError>;
}

/// 핸들러가 참고하는 로비 정보 (타이머가 터지는 시점의 최신 값을 읽는다)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyContext {
    pub public_id: String,
    pub user_id: String,
    pub host_user_id: String,
    pub is_host: bool,
    pub slots: Vec<BattleRoomSlot>,
}

impl LobbyContext {
    pub fn new(
        public_id: impl Into<String>,
        user_id: impl Into<String>,
        host_user_id: impl Into<String>,
        slots: Vec<BattleRoomSlot>,
    ) -> Self {
        let user_id = user_id.into();
        let host_user_id = host_user_id.into();
        Self {
            public_id: public_id.into(),
            is_host: user_id == host_user_id,
            user_id,
            host_user_id,
            slots,
        }
    }
}

/// 코디네이터 알림
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorEvent {
    PlayerKicked { slot_index: usize },
    RoomClosed,
}

/// 끊긴 유저 하나에 대해 이 클라이언트가 할 일
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 지정 closer 로서 방을 닫는다
    CloseRoom,
    /// 방이 닫혔다고만 알린다
    ReportRoomClosed,
    /// 방장으로서 해당 슬롯을 비운다
    Kick { slot_index: usize },
    Ignore,
}

/// 방장이 아닌 player 슬롯 중 slot_index 가 가장 작은 슬롯의 유저
pub fn designated_closer<'a>(slots: &'a [BattleRoomSlot], host_user_id: &str) -> Option<&'a str> {
    let mut candidates: Vec<&BattleRoomSlot> = slots
        .iter()
        .filter(|slot| slot.slot_type == SlotType::Player)
        .filter(|slot| matches!(slot.user_id.as_deref(), Some(user_id) if user_id != host_user_id))
        .collect();
    candidates.sort_by_key(|slot| slot.slot_index);
    candidates.first().and_then(|slot| slot.user_id.as_deref())
}

pub fn plan_recovery(context: &LobbyContext, disconnected_user_id: &str) -> RecoveryAction {
    if disconnected_user_id == context.host_user_id {
        return match designated_closer(&context.slots, &context.host_user_id) {
            Some(closer) if closer == context.user_id => RecoveryAction::CloseRoom,
            _ => RecoveryAction::ReportRoomClosed,
        };
    }

    if !context.is_host {
        return RecoveryAction::Ignore;
    }

    context
        .slots
        .iter()
        .find(|slot| slot.holds_user(disconnected_user_id))
        .map(|slot| RecoveryAction::Kick {
            slot_index: slot.slot_index,
        })
        .unwrap_or(RecoveryAction::Ignore)
}

struct PendingTimer {
    id: u64,
    handle: JoinHandle<()>,
}

pub struct DisconnectCoordinator<A: LobbyActions + ?Sized> {
    actions: Arc<A>,
    context_tx: watch::Sender<LobbyContext>,
    context_rx: watch::Receiver<LobbyContext>,
    events: UnboundedSender<CoordinatorEvent>,
    grace_period: Duration,
    previous_online_ids: Option<HashSet<String>>,
    pending_timers: Arc<DashMap<String, PendingTimer>>,
    next_timer_id: u64,
    disposed: bool,
}

impl<A: LobbyActions + ?Sized> DisconnectCoordinator<A> {
    pub fn new(
        actions: Arc<A>,
        context: LobbyContext,
        events: UnboundedSender<CoordinatorEvent>,
    ) -> Self {
        let (context_tx, context_rx) = watch::channel(context);
        Self {
            actions,
            context_tx,
            context_rx,
            events,
            grace_period: DISCONNECT_GRACE_PERIOD,
            previous_online_ids: None,
            pending_timers: Arc::new(DashMap::new()),
            next_timer_id: 0,
            disposed: false,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn context(&self) -> LobbyContext {
        self.context_rx.borrow().clone()
    }

    /// 슬롯 / 방장 정보만 바뀐 경우
    pub fn update_context(&self, context: LobbyContext) {
        self.context_tx.send_replace(context);
    }

    /// 최신 로비 정보를 반영하고 로스터를 비교한다
    pub fn watch(&mut self, roster: &[PresenceEntry], context: LobbyContext) {
        self.update_context(context);
        self.on_roster_changed(roster);
    }

    pub fn on_roster_changed(&mut self, roster: &[PresenceEntry]) {
        if self.disposed {
            return;
        }
        let current: HashSet<String> = roster.iter().map(|entry| entry.user_id.clone()).collect();

        // 첫 로스터는 비교 대상이 없다
        let Some(previous) = self.previous_online_ids.take() else {
            self.previous_online_ids = Some(current);
            return;
        };

        for user_id in &current {
            if self.cancel_timer(user_id) {
                tracing::debug!(user_id = %user_id, "User reconnected within grace period");
            }
        }

        for user_id in previous.difference(&current) {
            self.schedule_timer(user_id);
        }

        self.previous_online_ids = Some(current);
    }

    pub fn pending_count(&self) -> usize {
        self.pending_timers.len()
    }

    pub fn has_pending(&self, user_id: &str) -> bool {
        self.pending_timers.contains_key(user_id)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// 대기 중인 타이머를 모두 취소한다. 이후 로스터 변화는 무시되고
    /// 복구 액션은 실행되지 않는다.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.previous_online_ids = None;
        let mut cancelled = 0;
        self.pending_timers.retain(|_, timer| {
            timer.handle.abort();
            cancelled += 1;
            false
        });
        if cancelled > 0 {
            tracing::debug!(cancelled = cancelled, "Disconnect coordinator disposed");
        }
    }

    fn cancel_timer(&self, user_id: &str) -> bool {
        match self.pending_timers.remove(user_id) {
            Some((_, timer)) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    fn schedule_timer(&mut self, user_id: &str) {
        if self.disposed {
            return;
        }
        // 엔트리 락을 잡은 채로 spawn 해서, 타이머가 자기 엔트리를 찾기 전에
        // 등록이 끝나도록 한다
        let Entry::Vacant(entry) = self.pending_timers.entry(user_id.to_string()) else {
            return;
        };

        let id = self.next_timer_id;
        self.next_timer_id += 1;

        let pending_timers = self.pending_timers.clone();
        let actions = self.actions.clone();
        let context = self.context_rx.clone();
        let events = self.events.clone();
        let grace_period = self.grace_period;
        let user = user_id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;

            // 취소와 경합하면 먼저 엔트리를 지운 쪽이 이긴다
            if pending_timers
                .remove_if(&user, |_, timer| timer.id == id)
                .is_none()
            {
                return;
            }

            let context = context.borrow().clone();
            handle_disconnect(actions.as_ref(), &context, &user, &events).await;
        });

        tracing::debug!(
            user_id = %user_id,
            grace_ms = grace_period.as_millis() as u64,
            "User went offline, grace timer started"
        );
        entry.insert(PendingTimer { id, handle });
    }
}

impl<A: LobbyActions + ?Sized> Drop for DisconnectCoordinator<A> {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn handle_disconnect<A: LobbyActions + ?Sized>(
    actions: &A,
    context: &LobbyContext,
    user_id: &str,
    events: &UnboundedSender<CoordinatorEvent>,
) {
    let public_id = context.public_id.as_str();

    match plan_recovery(context, user_id) {
        RecoveryAction::CloseRoom => {
            tracing::info!(
                room_id = %public_id,
                host_user_id = %user_id,
                "Host disconnected, closing room as designated closer"
            );
            match actions.close_room(public_id).await {
                Ok(closed) => {
                    if !closed {
                        tracing::debug!(room_id = %public_id, "Room was already closed");
                    }
                    let _ = events.send(CoordinatorEvent::RoomClosed);
                }
                Err(e) => {
                    tracing::warn!(room_id = %public_id, error = %e, "Failed to close room");
                }
            }
        }
        RecoveryAction::ReportRoomClosed => {
            tracing::info!(room_id = %public_id, host_user_id = %user_id, "Host disconnected");
            let _ = events.send(CoordinatorEvent::RoomClosed);
        }
        RecoveryAction::Kick { slot_index } => {
            match actions.kick_player(public_id, slot_index).await {
                Ok(Some(_)) => {
                    tracing::info!(
                        room_id = %public_id,
                        user_id = %user_id,
                        slot_index = slot_index,
                        "Kicked disconnected player"
                    );
                    let _ = events.send(CoordinatorEvent::PlayerKicked { slot_index });
                }
                Ok(None) => {
                    tracing::warn!(
                        room_id = %public_id,
                        slot_index = slot_index,
                        "Kick had no effect"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        room_id = %public_id,
                        slot_index = slot_index,
                        error = %e,
                        "Failed to kick disconnected player"
                    );
                }
            }
        }
        RecoveryAction::Ignore => {
            tracing::debug!(room_id = %public_id, user_id = %user_id, "Disconnect left to host");
        }
    }
}
