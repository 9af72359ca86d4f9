//! One encoder per destination, from launch to terminal state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use keeper_av::{EncoderCommand, ProcessExit};
use keeper_common::StreamKey;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::RunContext;
use crate::events::EventPayload;

/// Lifecycle of an encode task.
///
/// `Pending → Running → {CompletedOk | CompletedError | Cancelled}`; terminal
/// states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    CompletedOk,
    CompletedError,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CompletedOk | Self::CompletedError | Self::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        match self {
            Self::Pending => next == Self::Running,
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// Why a task ended in [`TaskState::CompletedError`].
#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    /// The encoder could not be launched or exited unsuccessfully.
    #[error(transparent)]
    Encoder(#[from] keeper_av::Error),

    /// The supervising task itself died before reporting.
    #[error("supervision task aborted: {0}")]
    Aborted(String),
}

/// Terminal record of one task.
#[derive(Debug)]
pub struct TaskReport {
    /// Position of the key in the input list.
    pub index: usize,
    pub key: StreamKey,
    pub state: TaskState,
    /// Set exactly when `state` is [`TaskState::CompletedError`].
    pub error: Option<TaskFailure>,
    pub elapsed: Duration,
}

pub(crate) struct EncodeTask {
    index: usize,
    key: StreamKey,
    command: EncoderCommand,
    state: TaskState,
}

impl EncodeTask {
    pub(crate) fn new(index: usize, key: StreamKey, command: EncoderCommand) -> Self {
        Self {
            index,
            key,
            command,
            state: TaskState::Pending,
        }
    }

    fn transition(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    pub(crate) async fn run(
        mut self,
        cancel: CancellationToken,
        ctx: Arc<RunContext>,
    ) -> TaskReport {
        let started = Instant::now();
        self.transition(TaskState::Running);
        ctx.emit(EventPayload::TaskStarted {
            task: self.index,
            key: self.key.clone(),
        });

        let (state, error) = if cancel.is_cancelled() {
            // Shutdown won the race against launch; nothing to start.
            (TaskState::Cancelled, None)
        } else {
            self.launch_and_wait(&cancel, &ctx).await
        };

        self.transition(state);
        let elapsed = started.elapsed();
        ctx.emit(EventPayload::TaskFinished {
            task: self.index,
            key: self.key.clone(),
            state,
            error: error.as_ref().map(ToString::to_string),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });

        TaskReport {
            index: self.index,
            key: self.key,
            state,
            error,
            elapsed,
        }
    }

    async fn launch_and_wait(
        &self,
        cancel: &CancellationToken,
        ctx: &RunContext,
    ) -> (TaskState, Option<TaskFailure>) {
        let process = match self.command.spawn() {
            Ok(process) => process,
            Err(e) => return (TaskState::CompletedError, Some(e.into())),
        };

        ctx.emit(EventPayload::EncoderLaunched {
            task: self.index,
            key: self.key.clone(),
            pid: process.pid(),
        });

        let tool = process.tool().to_string();
        match process.wait_or_kill(cancel).await {
            // The flag is read only now, after the exit has been observed.
            Ok(exit) => classify(exit, cancel.is_cancelled(), tool),
            Err(e) => (TaskState::CompletedError, Some(e.into())),
        }
    }
}

/// Map an observed exit onto a terminal state.
///
/// Any nonzero exit counts as [`TaskState::Cancelled`] once shutdown has been
/// requested, even if the process failed on its own just before. A process we
/// killed is always cancelled.
fn classify(
    exit: ProcessExit,
    cancel_requested: bool,
    tool: String,
) -> (TaskState, Option<TaskFailure>) {
    if exit.status.success() {
        (TaskState::CompletedOk, None)
    } else if exit.killed || cancel_requested {
        (TaskState::Cancelled, None)
    } else {
        (
            TaskState::CompletedError,
            Some(TaskFailure::Encoder(exit.into_error(tool))),
        )
    }
}
