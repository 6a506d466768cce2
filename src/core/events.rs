//! Client event bus
//!
//! The EventBus decouples what happens inside the client (invalidations,
//! refetches, session changes) from whoever renders it. It uses
//! `tokio::sync::broadcast`, so any number of observers can follow along.
//!
//! # Architecture
//!
//! ```text
//! mutation success ──▶ QueryCache::invalidate ──┐
//! refetch task ─────────────────────────────────┼──▶ EventBus::publish() ──▶ UI observers
//! 401 / logout ──▶ SessionGate::clear ──────────┘                      ──▶ loggers, tests
//! ```
//!
//! A `SessionEvent::Cleared` with reason `Unauthorized` is the signal for an
//! embedding UI to route back to its login screen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the query cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CacheEvent {
    /// Entries carrying one of `tags` were marked stale
    Invalidated {
        tags: Vec<String>,
        keys: Vec<String>,
    },
    /// A subscribed entry was re-read after invalidation
    Refetched { key: String },
    /// A subscribed entry could not be re-read; prior data is kept
    RefetchFailed { key: String, message: String },
    /// Every entry was dropped (session change)
    Reset,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    /// The user logged out
    Logout,
    /// The backend answered 401
    Unauthorized,
    /// The token's expiry claim is in the past
    Expired,
}

/// Events emitted by the session gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was established by login or restored from storage
    Established { login: Option<String> },
    /// The session was cleared
    Cleared { reason: ClearReason },
}

/// Top-level client event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientEvent {
    Cache(CacheEvent),
    Session(SessionEvent),
}

impl ClientEvent {
    pub fn event_kind(&self) -> &str {
        match self {
            ClientEvent::Cache(_) => "cache",
            ClientEvent::Session(_) => "session",
        }
    }

    /// Get the action name (invalidated, refetched, cleared, ...)
    pub fn action(&self) -> &str {
        match self {
            ClientEvent::Cache(e) => match e {
                CacheEvent::Invalidated { .. } => "invalidated",
                CacheEvent::Refetched { .. } => "refetched",
                CacheEvent::RefetchFailed { .. } => "refetch_failed",
                CacheEvent::Reset => "reset",
            },
            ClientEvent::Session(e) => match e {
                SessionEvent::Established { .. } => "established",
                SessionEvent::Cleared { .. } => "cleared",
            },
        }
    }

    /// Whether this event asks the user to log in again
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientEvent::Session(SessionEvent::Cleared {
                reason: ClearReason::Unauthorized | ClearReason::Expired
            })
        )
    }
}

/// Envelope wrapping a client event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: ClientEvent,
}

impl EventEnvelope {
    pub fn new(event: ClientEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone (Arc internally) and shareable across tasks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// Slow receivers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Never fails. Returns the number of receivers that will see the event.
    pub fn publish(&self, event: ClientEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        // send() returns Err only if there are no receivers
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
