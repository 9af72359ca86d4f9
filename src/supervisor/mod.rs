//! Runs one encoder per stream key and shuts the whole cohort down together.
//!
//! A run is sealed when it starts: every key gets exactly one task, all tasks
//! are launched at once, and [`Supervisor::run`] only returns after each of
//! them has reached a terminal state. Cancellation reaches every running
//! encoder through a single token; encoders that die because of it are
//! reported as [`TaskState::Cancelled`], not as failures.

mod report;
mod task;

pub use report::RunReport;
pub use task::{TaskFailure, TaskReport, TaskState};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use keeper_av::EncoderTemplate;
use keeper_common::{Error, RunId, StreamKey};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventPayload, RunObserver, TracingObserver};
use task::EncodeTask;

/// Default number of stderr lines kept per encoder.
const DEFAULT_STDERR_TAIL: usize = 8;

/// Why a run did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Preconditions failed; no encoder was started.
    #[error(transparent)]
    Config(#[from] Error),

    /// At least one encoder failed on its own.
    #[error(
        "{} of {} encoder(s) failed: {}",
        .0.failed(),
        .0.tasks.len(),
        .0.failure_summary()
    )]
    Failed(RunReport),
}

/// Shared by every task of one run.
pub(crate) struct RunContext {
    run_id: RunId,
    observer: Arc<dyn RunObserver>,
}

impl RunContext {
    pub(crate) fn emit(&self, payload: EventPayload) {
        self.observer.on_event(&Event::new(self.run_id, payload));
    }
}

/// Launches and supervises encoder cohorts.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
///
/// use keeper_av::PlaceholderStream;
/// use keeper_common::StreamKey;
/// use stream_keeper::supervisor::Supervisor;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), stream_keeper::supervisor::RunError> {
/// let supervisor = Supervisor::new(Arc::new(PlaceholderStream::discover(None)));
/// let keys = vec![StreamKey::new("abcd-efgh-ijkl")?];
/// let report = supervisor
///     .run(Path::new("placeholder.jpg"), &keys, &CancellationToken::new())
///     .await?;
/// println!("{} encoder(s) stopped cleanly", report.ok());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Supervisor {
    template: Arc<dyn EncoderTemplate>,
    observer: Arc<dyn RunObserver>,
    stderr_tail: usize,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("template", &self.template)
            .field("stderr_tail", &self.stderr_tail)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create a supervisor that reports through [`TracingObserver`].
    pub fn new(template: Arc<dyn EncoderTemplate>) -> Self {
        Self {
            template,
            observer: Arc::new(TracingObserver),
            stderr_tail: DEFAULT_STDERR_TAIL,
        }
    }

    /// Builder: send events to `observer` instead.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Builder: keep this many trailing stderr lines per encoder.
    pub fn with_stderr_tail(mut self, lines: usize) -> Self {
        self.stderr_tail = lines;
        self
    }

    /// Stream `source` to every key until the encoders exit or `cancel`
    /// fires, then report how each one ended.
    ///
    /// The run works in a child scope of `cancel`: cancelling the parent
    /// stops this cohort, and overlapping runs never cancel each other.
    ///
    /// # Errors
    ///
    /// - [`RunError::Config`] if `keys` is empty or `source` is not a
    ///   readable file. Nothing is launched.
    /// - [`RunError::Failed`] if any encoder failed without cancellation.
    ///   Cancelled encoders never cause this.
    pub async fn run(
        &self,
        source: &Path,
        keys: &[StreamKey],
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        if keys.is_empty() {
            return Err(Error::config("no stream keys supplied").into());
        }
        check_source(source).await?;

        let ctx = Arc::new(RunContext {
            run_id: RunId::new(),
            observer: Arc::clone(&self.observer),
        });
        let cancel = cancel.child_token();

        ctx.emit(EventPayload::RunStarted {
            source: source.to_path_buf(),
            tasks: keys.len(),
        });

        // Build the whole cohort before anything is launched.
        let cohort: Vec<EncodeTask> = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let mut command = self.template.command(source, key);
                command.stderr_tail(self.stderr_tail);
                EncodeTask::new(index, key.clone(), command)
            })
            .collect();

        let mut outstanding: BTreeMap<usize, StreamKey> =
            keys.iter().cloned().enumerate().collect();
        let mut set = JoinSet::new();
        for task in cohort {
            set.spawn(task.run(cancel.clone(), Arc::clone(&ctx)));
        }

        let mut tasks = Vec::with_capacity(keys.len());
        let mut shutdown_announced = false;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled(), if !shutdown_announced => {
                    shutdown_announced = true;
                    ctx.emit(EventPayload::ShutdownRequested { running: set.len() });
                }
                joined = set.join_next() => match joined {
                    Some(Ok(report)) => {
                        outstanding.remove(&report.index);
                        tasks.push(report);
                    }
                    Some(Err(e)) => {
                        // Attributed to its key once every other task is in.
                        tracing::error!("Encode task aborted: {e}");
                    }
                    None => break,
                },
            }
        }

        for (index, key) in outstanding {
            let failure = TaskFailure::Aborted("task panicked before reporting".into());
            ctx.emit(EventPayload::TaskFinished {
                task: index,
                key: key.clone(),
                state: TaskState::CompletedError,
                error: Some(failure.to_string()),
                elapsed_ms: 0,
            });
            tasks.push(TaskReport {
                index,
                key,
                state: TaskState::CompletedError,
                error: Some(failure),
                elapsed: Duration::ZERO,
            });
        }

        tasks.sort_by_key(|t| t.index);
        let report = RunReport {
            run_id: ctx.run_id,
            tasks,
        };
        ctx.emit(EventPayload::RunFinished {
            ok: report.ok(),
            cancelled: report.cancelled(),
            failed: report.failed(),
        });

        report.into_result()
    }
}

/// The placeholder must be a readable regular file.
async fn check_source(source: &Path) -> keeper_common::Result<()> {
    let meta = tokio::fs::metadata(source)
        .await
        .map_err(|e| Error::config(format!("cannot read image {:?}: {e}", source)))?;
    if !meta.is_file() {
        return Err(Error::config(format!("image {:?} is not a file", source)));
    }
    tokio::fs::File::open(source)
        .await
        .map_err(|e| Error::config(format!("cannot read image {:?}: {e}", source)))?;
    Ok(())
}
