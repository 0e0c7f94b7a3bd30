//! Interception coordinator: suspends matched requests for live operators.
//!
//! Lifecycle of a pending interception:
//!
//! ```text
//! none --(client id + watcher present)--> pending --(override | deadline)--> completed
//! ```
//!
//! Completion is claimed with a compare-and-swap on the entry's `completed` flag.
//! Exactly one of the override handler, the deadline timer, or the caller's drop
//! guard wins the claim; the others do nothing. The winner removes the entry from
//! the pending table, so a second override for the same id finds nothing.

use super::channel::{NotificationChannel, PublishOutcome, TransportError};
use super::protocol::{InterceptEvent, OverrideResponse, ResponseEnvelope};
use crate::metrics;
use crate::request::NormalizedRequest;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Deadline used when none is configured.
pub const DEFAULT_INTERCEPT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Serializable record of a suspended request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInterception {
    pub correlation_id: String,
    pub client_id: String,
    pub request: NormalizedRequest,
    pub default_response: ResponseEnvelope,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// What the adapter should write for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Not intercepted: write the default after the variant's own delay.
    Passthrough(ResponseEnvelope),
    /// An operator supplied this response; write it after `delay`.
    Overridden {
        response: ResponseEnvelope,
        delay: Duration,
    },
    /// Deadline expired: write the default now.
    TimedOut(ResponseEnvelope),
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Passthrough(_) => "default",
            Resolution::Overridden { .. } => "override",
            Resolution::TimedOut(_) => "timeout",
        }
    }
}

/// Result of applying an override command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// This override completed the interception.
    Applied,
    /// Unknown or already completed correlation id.
    Discarded,
    /// The override payload cannot be written.
    Rejected(String),
}

struct PendingEntry {
    record: PendingInterception,
    completed: AtomicBool,
    override_tx: Mutex<Option<oneshot::Sender<OverrideResponse>>>,
}

pub struct InterceptionCoordinator {
    channel: Arc<dyn NotificationChannel>,
    pending: Mutex<HashMap<String, Arc<PendingEntry>>>,
    deadline: Duration,
}

impl InterceptionCoordinator {
    /// Create a coordinator and register it as the channel's override handler.
    pub fn new(channel: Arc<dyn NotificationChannel>, deadline: Duration) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            channel: Arc::clone(&channel),
            pending: Mutex::new(HashMap::new()),
            deadline,
        });

        let weak: Weak<Self> = Arc::downgrade(&coordinator);
        channel.on_override(Arc::new(move |correlation_id: &str, response: OverrideResponse| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.apply_override(correlation_id, response);
            }
        }));

        coordinator
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Records of all pending interceptions, oldest first.
    pub fn pending(&self) -> Vec<PendingInterception> {
        let mut records: Vec<PendingInterception> = self
            .pending
            .lock()
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Single-writer claim. Returns the entry only to the caller that completed it.
    fn claim(&self, correlation_id: &str) -> Option<Arc<PendingEntry>> {
        let entry = self.pending.lock().get(correlation_id).cloned()?;
        if entry
            .completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.pending.lock().remove(correlation_id);
        metrics::PENDING_INTERCEPTIONS.dec();
        Some(entry)
    }

    /// Decide what to write for a matched request.
    ///
    /// Without a client id or without a live watcher this returns immediately.
    /// Otherwise the request is suspended until an override arrives or the deadline
    /// passes, whichever claims completion first.
    pub async fn resolve(
        &self,
        client_id: Option<&str>,
        request: &NormalizedRequest,
        default_response: ResponseEnvelope,
    ) -> Resolution {
        let Some(client_id) = client_id.filter(|c| !c.is_empty()) else {
            return Resolution::Passthrough(default_response);
        };
        if self.channel.watcher_count(client_id) == 0 {
            metrics::record_interception("no_watchers");
            return Resolution::Passthrough(default_response);
        }

        let correlation_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let deadline_at = chrono::Duration::from_std(self.deadline)
            .ok()
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let (override_tx, mut override_rx) = oneshot::channel();

        let record = PendingInterception {
            correlation_id: correlation_id.clone(),
            client_id: client_id.to_string(),
            request: request.clone(),
            default_response: default_response.clone(),
            created_at,
            deadline: deadline_at,
        };
        let entry = Arc::new(PendingEntry {
            record,
            completed: AtomicBool::new(false),
            override_tx: Mutex::new(Some(override_tx)),
        });
        self.pending
            .lock()
            .insert(correlation_id.clone(), Arc::clone(&entry));
        metrics::PENDING_INTERCEPTIONS.inc();

        let mut guard = PendingGuard {
            coordinator: self,
            correlation_id: &correlation_id,
            armed: true,
        };

        let event = InterceptEvent {
            correlation_id: correlation_id.clone(),
            client_id: client_id.to_string(),
            request: request.clone(),
            default_response: default_response.clone(),
        };
        if self.channel.publish(client_id, event) == PublishOutcome::NoWatchers
            && self.claim(&correlation_id).is_some()
        {
            // Watchers left between the check and the publish.
            guard.disarm();
            metrics::record_interception("no_watchers");
            return Resolution::Passthrough(default_response);
        }

        info!(
            correlation_id = %correlation_id,
            client_id,
            method = %request.method,
            path = %request.path,
            "Request intercepted"
        );

        let timer = tokio::time::sleep(self.deadline);
        tokio::pin!(timer);

        let early = tokio::select! {
            received = &mut override_rx => Some(received),
            () = &mut timer => None,
        };

        let resolution = match early {
            Some(Ok(response)) => overridden(response),
            // The sender only goes away with the entry, which we still own a claim on.
            Some(Err(_)) => Resolution::TimedOut(default_response),
            None => {
                if self.claim(&correlation_id).is_some() {
                    Resolution::TimedOut(default_response)
                } else {
                    // An override claimed completion first; its response is on the way.
                    match override_rx.await {
                        Ok(response) => overridden(response),
                        Err(_) => Resolution::TimedOut(default_response),
                    }
                }
            }
        };
        guard.disarm();

        metrics::record_interception(match resolution {
            Resolution::Overridden { .. } => "override",
            _ => "timeout",
        });
        info!(
            correlation_id = %correlation_id,
            resolution = resolution.label(),
            "Interception completed"
        );
        resolution
    }

    /// Apply an override command. Only the first one for a correlation id has effect.
    pub fn apply_override(&self, correlation_id: &str, response: OverrideResponse) -> OverrideOutcome {
        if let Err(reason) = response.validate() {
            warn!(correlation_id, "Rejected malformed override: {}", reason);
            return OverrideOutcome::Rejected(reason);
        }

        let Some(entry) = self.claim(correlation_id) else {
            metrics::OVERRIDES_DISCARDED.inc();
            debug!(correlation_id, "Discarding override for unknown or completed interception");
            return OverrideOutcome::Discarded;
        };

        let sender = entry.override_tx.lock().take();
        match sender.map(|tx| tx.send(response)) {
            Some(Ok(())) => {
                debug!(correlation_id, client_id = %entry.record.client_id, "Override accepted");
            }
            _ => {
                let error = TransportError::CallerGone(correlation_id.to_string());
                warn!(error = %error, "Override could not be delivered");
            }
        }
        OverrideOutcome::Applied
    }
}

fn overridden(response: OverrideResponse) -> Resolution {
    Resolution::Overridden {
        delay: response.delay(),
        response: response.to_envelope(),
    }
}

/// Retires the pending entry if the awaiting caller is dropped mid-wait.
struct PendingGuard<'a> {
    coordinator: &'a InterceptionCoordinator,
    correlation_id: &'a str,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.coordinator.claim(self.correlation_id).is_some() {
            debug!(
                correlation_id = self.correlation_id,
                "Caller went away while intercepted; pending record retired"
            );
        }
    }
}
