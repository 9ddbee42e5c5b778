//! Incremental progress of a run
//!
//! Consumers either subscribe to the event stream or poll the latest
//! snapshot. Neither blocks workers: events go through a broadcast channel
//! and lagging receivers lose the oldest events.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::ErrorKind;
use crate::model::{Outcome, ScrapeResult};

const EVENT_CAPACITY: usize = 256;

/// Emitted once per completed target
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub target_id: usize,
    pub url: String,
    /// Targets with a terminal result so far, this one included
    pub completed: usize,
    pub total: usize,
    /// Failure kind, `None` on success
    pub kind: Option<ErrorKind>,
    /// Failure message, `None` on success
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub successes: usize,
    pub partial: usize,
    pub failures: usize,
    pub last_error: Option<String>,
}

pub(crate) struct ProgressTracker {
    sender: broadcast::Sender<ProgressEvent>,
    state: Mutex<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            state: Mutex::new(ProgressSnapshot::default()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().clone()
    }

    pub fn start(&self, total: usize) {
        *self.state.lock() = ProgressSnapshot {
            total,
            ..ProgressSnapshot::default()
        };
    }

    pub fn record(&self, result: &ScrapeResult) {
        // Sent under the lock so events arrive in `completed` order
        let mut state = self.state.lock();
        state.completed += 1;

        let (kind, message) = match &result.outcome {
            Outcome::Success { missing, .. } => {
                state.successes += 1;
                if !missing.is_empty() {
                    state.partial += 1;
                }
                (None, None)
            }
            Outcome::Failure { kind, message } => {
                state.failures += 1;
                state.last_error = Some(format!("{}: {message}", result.target.url));
                (Some(*kind), Some(message.clone()))
            }
        };

        let event = ProgressEvent {
            target_id: result.target.id,
            url: result.target.url.clone(),
            completed: state.completed,
            total: state.total,
            kind,
            message,
        };

        // No receivers is fine
        let _ = self.sender.send(event);
    }
}
