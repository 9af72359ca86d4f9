//! Aggregate outcome of a run.

use keeper_common::RunId;

use super::{RunError, TaskReport, TaskState};

/// Every task of a cohort in input order, each in a terminal state.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    pub fn ok(&self) -> usize {
        self.count(TaskState::CompletedOk)
    }

    pub fn cancelled(&self) -> usize {
        self.count(TaskState::Cancelled)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskState::CompletedError)
    }

    /// True when no task ended in [`TaskState::CompletedError`].
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Tasks that ended in [`TaskState::CompletedError`].
    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::CompletedError)
    }

    /// One `key: error` entry per failed task, joined with `; `.
    pub fn failure_summary(&self) -> String {
        self.summarize(|t| match &t.error {
            Some(e) => format!("{}: {}", t.key, e),
            None => t.key.to_string(),
        })
    }

    /// [`Self::failure_summary`] with every key redacted, for logs.
    pub fn redacted_failure_summary(&self) -> String {
        self.summarize(|t| match &t.error {
            Some(e) => format!("{}: {}", t.key.redacted(), t.key.redact_in(&e.to_string())),
            None => t.key.redacted(),
        })
    }

    fn summarize(&self, entry: impl Fn(&TaskReport) -> String) -> String {
        self.failures().map(entry).collect::<Vec<_>>().join("; ")
    }

    /// `Ok(self)` on success, otherwise [`RunError::Failed`] carrying the
    /// whole report.
    pub fn into_result(self) -> Result<Self, RunError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RunError::Failed(self))
        }
    }
}
