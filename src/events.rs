//! Structured run events and the observers that receive them.
//!
//! The supervisor never logs directly. It emits [`Event`]s to a
//! [`RunObserver`]; [`TracingObserver`] is the default sink and [`EventLog`]
//! keeps them in memory.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;

use keeper_common::{RunId, StreamKey};

use crate::supervisor::TaskState;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Run lifecycle -------------------------------------------------------
    RunStarted {
        source: PathBuf,
        tasks: usize,
    },
    ShutdownRequested {
        running: usize,
    },
    RunFinished {
        ok: usize,
        cancelled: usize,
        failed: usize,
    },

    // -- Task lifecycle ------------------------------------------------------
    TaskStarted {
        task: usize,
        key: StreamKey,
    },
    EncoderLaunched {
        task: usize,
        key: StreamKey,
        pid: Option<u32>,
    },
    TaskFinished {
        task: usize,
        key: StreamKey,
        state: TaskState,
        error: Option<String>,
        elapsed_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event belonging to one run.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Run the event belongs to.
    pub run_id: RunId,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event stamped with the current time.
    pub fn new(run_id: RunId, payload: EventPayload) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Receives every event of a run, from any task.
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> RunObserver for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Renders events as `tracing` records. Stream keys are redacted.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_event(&self, event: &Event) {
        let run_id = event.run_id;
        match &event.payload {
            EventPayload::RunStarted { source, tasks } => {
                tracing::info!(
                    %run_id,
                    tasks,
                    "Streaming {:?} to {} destination(s)",
                    source,
                    tasks
                );
            }
            EventPayload::ShutdownRequested { running } => {
                tracing::info!(%run_id, running, "Shutting down ffmpeg processes...");
            }
            EventPayload::RunFinished {
                ok,
                cancelled,
                failed,
            } => {
                tracing::info!(%run_id, ok, cancelled, failed, "All encoders stopped");
            }
            EventPayload::TaskStarted { task, key } => {
                tracing::info!(%run_id, task, key = %key.redacted(), "Starting ffmpeg");
            }
            EventPayload::EncoderLaunched { task, key, pid } => {
                tracing::debug!(
                    %run_id,
                    task,
                    key = %key.redacted(),
                    pid = ?pid,
                    "ffmpeg running"
                );
            }
            EventPayload::TaskFinished {
                task,
                key,
                state,
                error,
                elapsed_ms,
            } => match error {
                Some(error) => tracing::error!(
                    %run_id,
                    task,
                    key = %key.redacted(),
                    state = ?state,
                    elapsed_ms,
                    "Encoder failed: {}",
                    key.redact_in(error)
                ),
                None => tracing::info!(
                    %run_id,
                    task,
                    key = %key.redacted(),
                    state = ?state,
                    elapsed_ms,
                    "Encoder stopped"
                ),
            },
        }
    }
}

/// Collects events in memory, in emission order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Number of recorded events whose payload matches `pred`.
    pub fn count(&self, pred: impl Fn(&EventPayload) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(&e.payload)).count()
    }
}

impl RunObserver for EventLog {
    fn on_event(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}
