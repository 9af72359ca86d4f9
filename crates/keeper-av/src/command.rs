//! Launching an encoder and waiting on it under a cancellation token.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Default number of stderr lines kept for error reporting.
const DEFAULT_STDERR_TAIL: usize = 8;

/// Longest stderr line kept, in bytes; the rest of the line is dropped.
pub const MAX_LINE_BYTES: usize = 1024;

/// How long to wait for the stderr pipe to close after the process is gone.
///
/// Grandchildren that inherited the pipe can hold it open indefinitely.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// A builder for an encoder invocation.
///
/// # Example
///
/// ```no_run
/// use keeper_av::EncoderCommand;
/// use std::path::PathBuf;
///
/// # fn example() -> keeper_av::Result<()> {
/// let process = EncoderCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-re")
///     .args(["-loop", "1"])
///     .spawn()?;
/// println!("started pid {:?}", process.pid());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EncoderCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stderr_tail: usize,
}

impl EncoderCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            stderr_tail: DEFAULT_STDERR_TAIL,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<OsString>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<OsString>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Keep this many trailing stderr lines (0 discards stderr entirely).
    pub fn stderr_tail(&mut self, lines: usize) -> &mut Self {
        self.stderr_tail = lines;
        self
    }

    /// The executable this command launches.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The argument vector, without the program.
    pub fn arg_list(&self) -> &[OsString] {
        &self.args
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Start the process.
    ///
    /// stdin and stdout are detached. The child is killed if the returned
    /// handle is dropped before it exits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the executable cannot be started.
    pub fn spawn(&self) -> Result<EncoderProcess> {
        let tool = self.tool_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(if self.stderr_tail > 0 {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| Error::launch(&tool, e))?;

        let stderr = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(drain_stderr(pipe, self.stderr_tail)));

        Ok(EncoderProcess {
            tool,
            pid: child.id(),
            child,
            stderr,
        })
    }
}

/// How a process ended.
#[derive(Debug)]
pub struct ProcessExit {
    /// Exit status reported by the OS.
    pub status: ExitStatus,
    /// Whether we killed the process because of cancellation.
    pub killed: bool,
    /// Last lines written to stderr.
    pub stderr_tail: Vec<String>,
}

impl ProcessExit {
    /// Convert an unsuccessful exit into [`Error::Exited`].
    pub fn into_error(self, tool: impl Into<String>) -> Error {
        Error::Exited {
            tool: tool.into(),
            status: self.status,
            stderr_tail: self.stderr_tail,
        }
    }
}

/// A running encoder.
#[derive(Debug)]
pub struct EncoderProcess {
    tool: String,
    pid: Option<u32>,
    child: Child,
    stderr: Option<JoinHandle<Vec<String>>>,
}

impl EncoderProcess {
    /// OS process id, if the process was running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Name of the executable, used in error messages.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Wait for the process to exit, killing it if `cancel` fires first.
    ///
    /// The kill is forceful; the process is always reaped before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wait`] if the OS refuses to report the exit status.
    pub async fn wait_or_kill(mut self, cancel: &CancellationToken) -> Result<ProcessExit> {
        let mut killed = false;

        let status = tokio::select! {
            biased;

            status = self.child.wait() => status,
            _ = cancel.cancelled() => {
                tracing::debug!(pid = ?self.pid, "Killing {}", self.tool);
                killed = true;
                if let Err(e) = self.child.start_kill() {
                    // Already exited between the select arms.
                    tracing::trace!(pid = ?self.pid, "kill failed: {e}");
                }
                self.child.wait().await
            }
        }
        .map_err(|e| Error::wait(&self.tool, e))?;

        let stderr_tail = match self.stderr.take() {
            Some(handle) => collect_stderr(handle).await,
            None => Vec::new(),
        };

        Ok(ProcessExit {
            status,
            killed,
            stderr_tail,
        })
    }
}

/// Read stderr until it closes, keeping the last `keep` lines.
///
/// Both `\r` and `\n` end a line: ffmpeg rewrites its progress report in
/// place with bare carriage returns for as long as it runs. Bytes are decoded
/// lossily and each line is capped at [`MAX_LINE_BYTES`]. The pipe is read
/// to the end regardless of content so the encoder never sees EPIPE.
async fn drain_stderr(pipe: ChildStderr, keep: usize) -> Vec<String> {
    let mut reader = BufReader::new(pipe);
    let mut tail = VecDeque::with_capacity(keep);
    let mut line = Vec::new();

    loop {
        let buf = match reader.fill_buf().await {
            Ok([]) => break,
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::trace!("stderr read error: {e}");
                break;
            }
        };

        let (used, line_ended) = match buf.iter().position(|b| matches!(b, b'\r' | b'\n')) {
            Some(pos) => {
                push_capped(&mut line, &buf[..pos]);
                (pos + 1, true)
            }
            None => {
                push_capped(&mut line, buf);
                (buf.len(), false)
            }
        };
        reader.consume(used);

        if line_ended {
            finish_line(&mut line, &mut tail, keep);
        }
    }
    finish_line(&mut line, &mut tail, keep);

    tail.into()
}

fn push_capped(line: &mut Vec<u8>, bytes: &[u8]) {
    let room = MAX_LINE_BYTES.saturating_sub(line.len());
    line.extend_from_slice(&bytes[..bytes.len().min(room)]);
}

fn finish_line(line: &mut Vec<u8>, tail: &mut VecDeque<String>, keep: usize) {
    if line.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(line).into_owned();
    line.clear();

    tracing::trace!(target: "keeper_av::stderr", "{text}");
    if tail.len() == keep {
        tail.pop_front();
    }
    tail.push_back(text);
}

async fn collect_stderr(mut handle: JoinHandle<Vec<String>>) -> Vec<String> {
    match tokio::time::timeout(STDERR_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(tail)) => tail,
        Ok(Err(e)) => {
            tracing::debug!("stderr drain task failed: {e}");
            Vec::new()
        }
        Err(_elapsed) => {
            handle.abort();
            Vec::new()
        }
    }
}
