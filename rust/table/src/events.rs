use crate::session::SessionId;
use holdem_engine::events::HandEvent;
use holdem_engine::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

// A subscriber whose buffer fills up is dropped rather than awaited
const EVENT_CHANNEL_BUFFER: usize = 1000;

pub type EventSender = mpsc::Sender<GameEvent>;
pub type EventReceiver = mpsc::Receiver<GameEvent>;

/// What subscribers of a session receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    SessionCreated {
        session_id: SessionId,
        players: Vec<PlayerId>,
    },
    /// An engine event, tagged with the state version its transition produced
    Table {
        session_id: SessionId,
        state_version: u64,
        event: HandEvent,
    },
    ActionRejected {
        session_id: SessionId,
        player_id: PlayerId,
        reason: String,
    },
    SessionEnded {
        session_id: SessionId,
        reason: String,
    },
}

impl GameEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            GameEvent::SessionCreated { session_id, .. }
            | GameEvent::Table { session_id, .. }
            | GameEvent::ActionRejected { session_id, .. }
            | GameEvent::SessionEnded { session_id, .. } => session_id,
        }
    }
}

pub struct EventSubscription {
    bus: EventBus,
    session_id: SessionId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }

    /// Every event already delivered, without waiting.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.session_id, self.subscriber_id);
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

type SubscriberMap = HashMap<SessionId, Vec<(usize, EventSender)>>;

#[derive(Debug, Default)]
struct EventBusInner {
    subscribers: RwLock<SubscriberMap>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SubscriberMap> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SubscriberMap> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, session_id: SessionId) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(session_id.clone());
        EventSubscription {
            bus: self.clone(),
            session_id,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, session_id: SessionId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        self.write()
            .entry(session_id.clone())
            .or_default()
            .push((id, tx));

        tracing::info!(
            session_id = %session_id,
            subscriber_id = id,
            "subscribed to session events"
        );

        (id, rx)
    }

    pub fn broadcast(&self, session_id: &SessionId, event: GameEvent) {
        let Some(list) = self.read().get(session_id).cloned() else {
            tracing::trace!(session_id = %session_id, "no subscribers for session");
            return;
        };

        tracing::trace!(
            session_id = %session_id,
            subscriber_count = list.len(),
            "broadcasting game event"
        );

        let mut failed = Vec::new();
        for (id, sender) in list {
            if let Err(e) = sender.try_send(event.clone()) {
                tracing::warn!(
                    session_id = %session_id,
                    subscriber_id = id,
                    error = %e,
                    "dropping subscriber that cannot take events"
                );
                failed.push(id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(session_id, &failed);
        }
    }

    /// Publishes a transition's engine events in order.
    pub fn publish_hand_events(&self, session_id: &SessionId, state_version: u64, events: &[HandEvent]) {
        for event in events {
            self.broadcast(
                session_id,
                GameEvent::Table {
                    session_id: session_id.clone(),
                    state_version,
                    event: event.clone(),
                },
            );
        }
    }

    pub fn unsubscribe(&self, session_id: &SessionId, subscriber_id: usize) {
        self.remove_subscribers(session_id, &[subscriber_id]);
    }

    pub fn drop_session(&self, session_id: &SessionId) {
        self.write().remove(session_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().values().map(|list| list.len()).sum()
    }

    fn remove_subscribers(&self, session_id: &SessionId, ids: &[usize]) {
        let mut guard = self.write();
        if let Some(list) = guard.get_mut(session_id) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ended(session: &SessionId) -> GameEvent {
        GameEvent::SessionEnded {
            session_id: session.clone(),
            reason: "ping".into(),
        }
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let bus = EventBus::new();
        let session = "s".to_string();
        {
            let _sub = bus.subscribe(session.clone());
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn broadcast_reaches_only_that_session() {
        let bus = EventBus::new();
        let session = "s".to_string();
        let mut sub1 = bus.subscribe(session.clone());
        let mut sub2 = bus.subscribe(session.clone());
        let mut other = bus.subscribe("t".to_string());

        bus.broadcast(&session, ended(&session));

        assert_eq!(sub1.drain(), vec![ended(&session)]);
        assert_eq!(sub2.drain(), vec![ended(&session)]);
        assert!(other.drain().is_empty());
    }

    #[test]
    fn hand_events_keep_order_and_version() {
        let bus = EventBus::new();
        let session = "s".to_string();
        let mut sub = bus.subscribe(session.clone());
        let events = vec![
            HandEvent::HoleCardsDealt {
                players: vec!["a".into(), "b".into()],
            },
            HandEvent::GameOver { winner: None },
        ];

        bus.publish_hand_events(&session, 4, &events);

        let received = sub.drain();
        assert_eq!(received.len(), 2);
        for (got, want) in received.iter().zip(&events) {
            match got {
                GameEvent::Table {
                    state_version,
                    event,
                    ..
                } => {
                    assert_eq!(*state_version, 4);
                    assert_eq!(event, want);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn stale_receiver_is_pruned() {
        let bus = EventBus::new();
        let session = "s".to_string();
        let (id, rx) = bus.subscribe_raw(session.clone());
        drop(rx);
        bus.broadcast(&session, ended(&session));
        assert_eq!(bus.subscriber_count(), 0);
        bus.unsubscribe(&session, id);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(ended(&"s".to_string())).expect("json");
        assert_eq!(json["type"], "session_ended");
        assert_eq!(json["session_id"], "s");
    }
}
