//! Notification channel: fan-out of intercept events to watching sessions.
//!
//! The coordinator only sees the [`NotificationChannel`] trait. [`LiveHub`] is the
//! in-process implementation used by the live session server: every session owns an
//! unbounded queue drained by its writer task, so `publish` never waits on a slow
//! socket and each session sees events in publish order.

use super::protocol::{ClientMessage, InterceptEvent, OverrideResponse, ServerMessage, UI_ROLE};
use crate::metrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifier of one connected live session.
pub type SessionId = u64;

/// Callback invoked for every override command: (correlation id, response).
pub type OverrideHandler = Arc<dyn Fn(&str, OverrideResponse) + Send + Sync>;

/// Result of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Event queued for this many sessions.
    Delivered(usize),
    /// Nobody is watching the client.
    NoWatchers,
}

/// Errors raised when handing data to a party that is no longer there.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("live session {0} is closed")]
    SessionClosed(SessionId),
    #[error("caller for interception {0} is gone")]
    CallerGone(String),
}

/// Transport-agnostic pub/sub used by the interception coordinator.
pub trait NotificationChannel: Send + Sync {
    /// Deliver `event` to every session watching `client_id`.
    fn publish(&self, client_id: &str, event: InterceptEvent) -> PublishOutcome;

    /// Number of sessions currently watching `client_id`.
    fn watcher_count(&self, client_id: &str) -> usize;

    /// Register the override callback. A later registration replaces the earlier one.
    fn on_override(&self, handler: OverrideHandler);

    /// Point `session` at `client_id`, replacing what it watched before.
    fn subscribe(&self, session: SessionId, client_id: &str) -> bool;

    /// Stop `session` from watching anything.
    fn unsubscribe(&self, session: SessionId);
}

struct Session {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    watching: Option<String>,
}

/// In-process notification hub backing live sessions.
#[derive(Default)]
pub struct LiveHub {
    sessions: RwLock<HashMap<SessionId, Session>>,
    next_session: AtomicU64,
    override_handler: RwLock<Option<OverrideHandler>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. The receiver yields messages to write to it.
    pub fn connect(&self) -> (SessionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.write().insert(
            id,
            Session {
                outbound: tx,
                watching: None,
            },
        );
        metrics::LIVE_SESSIONS.inc();
        debug!(session = id, "Live session connected");
        (id, rx)
    }

    /// Forget a session and its subscription.
    pub fn disconnect(&self, session: SessionId) {
        if let Some(removed) = self.sessions.write().remove(&session) {
            metrics::LIVE_SESSIONS.dec();
            debug!(
                session,
                watching = ?removed.watching,
                "Live session disconnected"
            );
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Client a session is currently watching.
    pub fn watching(&self, session: SessionId) -> Option<String> {
        self.sessions
            .read()
            .get(&session)
            .and_then(|s| s.watching.clone())
    }

    fn send(&self, session: SessionId, message: ServerMessage) -> Result<(), TransportError> {
        let sessions = self.sessions.read();
        let entry = sessions
            .get(&session)
            .ok_or(TransportError::SessionClosed(session))?;
        entry
            .outbound
            .send(message)
            .map_err(|_| TransportError::SessionClosed(session))
    }

    /// Apply one decoded message from `session`.
    pub fn handle_message(&self, session: SessionId, message: ClientMessage) {
        match message {
            ClientMessage::Register { role } if role == UI_ROLE => {
                let ack = ServerMessage::Registered {
                    role: UI_ROLE.to_string(),
                };
                if let Err(e) = self.send(session, ack) {
                    debug!(error = %e, "Could not acknowledge registration");
                }
            }
            ClientMessage::Register { role } => {
                debug!(session, role = %role, "Ignoring registration for unsupported role");
            }
            ClientMessage::Watch { client_id } => {
                self.subscribe(session, &client_id);
            }
            ClientMessage::Override {
                correlation_id,
                response,
            } => {
                let handler = self.override_handler.read().clone();
                match handler {
                    Some(handler) => handler(&correlation_id, response),
                    None => warn!(
                        correlation_id = %correlation_id,
                        "Override received but no handler is registered"
                    ),
                }
            }
        }
    }

    /// Decode and apply one raw line from `session`. Malformed input is logged and dropped.
    pub fn handle_line(&self, session: SessionId, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match ClientMessage::parse(line) {
            Ok(message) => self.handle_message(session, message),
            Err(e) => warn!(session, error = %e, "Ignoring malformed live message"),
        }
    }
}

impl NotificationChannel for LiveHub {
    fn publish(&self, client_id: &str, event: InterceptEvent) -> PublishOutcome {
        let sessions = self.sessions.read();
        let mut delivered = 0;
        for (id, session) in sessions.iter() {
            if session.watching.as_deref() != Some(client_id) {
                continue;
            }
            match session
                .outbound
                .send(ServerMessage::Intercept(event.clone()))
            {
                Ok(()) => delivered += 1,
                Err(_) => debug!(error = %TransportError::SessionClosed(*id), "Skipping closed watcher"),
            }
        }

        if delivered == 0 {
            PublishOutcome::NoWatchers
        } else {
            debug!(client_id, delivered, correlation_id = %event.correlation_id, "Published intercept event");
            PublishOutcome::Delivered(delivered)
        }
    }

    fn watcher_count(&self, client_id: &str) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.watching.as_deref() == Some(client_id))
            .count()
    }

    fn on_override(&self, handler: OverrideHandler) {
        *self.override_handler.write() = Some(handler);
    }

    fn subscribe(&self, session: SessionId, client_id: &str) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&session) {
            Some(entry) => {
                let previous = entry.watching.replace(client_id.to_string());
                debug!(session, client_id, previous = ?previous, "Session watching client");
                true
            }
            None => false,
        }
    }

    fn unsubscribe(&self, session: SessionId) {
        if let Some(entry) = self.sessions.write().get_mut(&session) {
            entry.watching = None;
        }
    }
}
