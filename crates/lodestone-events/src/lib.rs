#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Session lifecycle events and the in-process bus that carries them.
//!
//! The bus hands out sequential identifiers and keeps a bounded replay ring so
//! that SSE clients reconnecting with `Last-Event-ID` can catch up. Delivery
//! uses `tokio::broadcast`; slow subscribers skip the events they lagged on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, Receiver, Sender};
use uuid::Uuid;

/// Identifier assigned to each event published on the bus.
pub type EventId = u64;

/// Default size of the replay ring and broadcast channel.
pub const DEFAULT_REPLAY_CAPACITY: usize = 512;

/// Lifecycle states a download session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Admitted; the engine is still resolving metadata.
    Initializing,
    /// Metadata is known and content is transferring.
    Active,
    /// Every item finished; the session awaits deferred cleanup.
    Completed,
    /// Removed on request before finishing.
    Cancelled,
    /// The engine reported an unrecoverable error.
    Failed,
}

impl SessionState {
    /// Whether the session still occupies an admission slot.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Initializing | Self::Active)
    }

    /// Whether no further transitions are accepted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Stable lowercase label used in logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed events emitted by the session registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new session was admitted.
    SessionCreated {
        /// Identifier of the new session.
        session_id: Uuid,
        /// Canonical content fingerprint.
        fingerprint: String,
        /// Display name taken from the locator, when present.
        name: Option<String>,
    },
    /// A create request was answered with an in-flight session.
    SessionDeduplicated {
        /// Identifier of the existing session.
        session_id: Uuid,
    },
    /// The session moved to a new lifecycle state.
    StateChanged {
        /// Session whose state changed.
        session_id: Uuid,
        /// State after the transition.
        state: SessionState,
    },
    /// The engine reported transfer progress.
    Progress {
        /// Session being tracked.
        session_id: Uuid,
        /// Aggregate completion fraction reported by the engine.
        fraction: f64,
    },
    /// The session failed and is retained for inspection.
    SessionFailed {
        /// Session that failed.
        session_id: Uuid,
        /// Failure cause reported by the engine.
        message: String,
    },
    /// The session left the registry.
    SessionRemoved {
        /// Session that was removed.
        session_id: Uuid,
        /// Why it was removed (`cancelled`, `expired`, `shutdown`).
        reason: String,
    },
}

impl Event {
    /// Machine-friendly discriminator, used as the SSE event name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::SessionDeduplicated { .. } => "session_deduplicated",
            Self::StateChanged { .. } => "state_changed",
            Self::Progress { .. } => "progress",
            Self::SessionFailed { .. } => "session_failed",
            Self::SessionRemoved { .. } => "session_removed",
        }
    }

    /// Session the event refers to.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::SessionDeduplicated { session_id }
            | Self::StateChanged { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::SessionFailed { session_id, .. }
            | Self::SessionRemoved { session_id, .. } => *session_id,
        }
    }
}

/// Event plus its sequence number and emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

/// Cloneable publisher/subscriber handle.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    replay: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl EventBus {
    /// Build a bus whose replay ring and broadcast channel hold `capacity` events.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            replay: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity,
        }
    }

    /// Build a bus with [`DEFAULT_REPLAY_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event and return its identifier.
    ///
    /// Publishing never blocks; having no subscribers is not an error.
    pub fn publish(&self, event: Event) -> EventId {
        let envelope = {
            let mut replay = self.replay.lock().unwrap_or_else(PoisonError::into_inner);
            // Ids are assigned under the replay lock so the ring stays ordered.
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let envelope = EventEnvelope {
                id,
                timestamp: Utc::now(),
                event,
            };
            if replay.len() == self.capacity {
                replay.pop_front();
            }
            replay.push_back(envelope.clone());
            envelope
        };
        let id = envelope.id;
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to live events, first replaying buffered events newer than `since`.
    #[must_use]
    pub fn subscribe(&self, since: Option<EventId>) -> EventStream {
        let replay = self.replay.lock().unwrap_or_else(PoisonError::into_inner);
        let backlog = since.map_or_else(VecDeque::new, |since| {
            replay
                .iter()
                .filter(|envelope| envelope.id > since)
                .cloned()
                .collect()
        });
        // Subscribing while holding the replay lock closes the gap between
        // the backlog and the live receiver.
        let receiver = self.sender.subscribe();
        drop(replay);
        let last_seen = backlog.back().map(|envelope: &EventEnvelope| envelope.id);
        EventStream {
            backlog,
            receiver,
            last_seen: last_seen.or(since),
        }
    }

    /// Identifier of the most recently published event.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.replay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .map(|envelope| envelope.id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber that drains the replay backlog before live events.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    last_seen: Option<EventId>,
}

impl EventStream {
    /// Next event, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if self.last_seen.is_some_and(|seen| envelope.id <= seen) {
                        continue;
                    }
                    self.last_seen = Some(envelope.id);
                    return Some(envelope);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn progress(id: u128) -> Event {
        Event::Progress {
            session_id: Uuid::from_u128(id),
            fraction: 0.5,
        }
    }

    #[tokio::test]
    async fn replays_events_newer_than_last_seen() {
        let bus = EventBus::with_capacity(8);
        for i in 0..5 {
            let _ = bus.publish(progress(i));
        }
        assert_eq!(bus.last_event_id(), Some(5));

        let mut stream = bus.subscribe(Some(2));
        let mut ids = Vec::new();
        for _ in 0..3 {
            let envelope = stream.next().await.expect("replayed event");
            ids.push(envelope.id);
        }
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest() {
        let bus = EventBus::with_capacity(2);
        for i in 0..4 {
            let _ = bus.publish(progress(i));
        }
        let mut stream = bus.subscribe(Some(0));
        assert_eq!(stream.next().await.map(|e| e.id), Some(3));
        assert_eq!(stream.next().await.map(|e| e.id), Some(4));
    }

    #[tokio::test]
    async fn live_events_follow_backlog() {
        let bus = EventBus::new();
        let _ = bus.publish(progress(1));
        let mut stream = bus.subscribe(Some(0));
        let _ = bus.publish(progress(2));

        let first = stream.next().await.expect("backlog");
        let second = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("live event in time")
            .expect("live event");
        assert_eq!((first.id, second.id), (1, 2));
    }

    #[test]
    fn event_kind_and_session_id() {
        let id = Uuid::from_u128(7);
        let event = Event::SessionRemoved {
            session_id: id,
            reason: "expired".into(),
        };
        assert_eq!(event.kind(), "session_removed");
        assert_eq!(event.session_id(), id);

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "session_removed");
    }

    #[test]
    fn in_flight_states() {
        assert!(SessionState::Initializing.is_in_flight());
        assert!(SessionState::Active.is_in_flight());
        assert!(!SessionState::Completed.is_in_flight());
        assert!(SessionState::Failed.is_terminal());
        assert_eq!(SessionState::Cancelled.to_string(), "cancelled");
    }
}
