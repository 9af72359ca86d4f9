//! Error types for keeper-av.

use std::process::ExitStatus;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running an encoder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The tool could not be started at all.
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a running tool failed.
    #[error("failed to wait for {tool}: {source}")]
    Wait {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited unsuccessfully.
    #[error("{tool} exited with {status}{}", render_tail(.stderr_tail))]
    Exited {
        tool: String,
        status: ExitStatus,
        /// Last lines the tool wrote to stderr before exiting.
        stderr_tail: Vec<String>,
    },
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a launch error.
    pub fn launch(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            tool: tool.into(),
            source,
        }
    }

    /// Create a wait error.
    pub fn wait(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Wait {
            tool: tool.into(),
            source,
        }
    }

    /// Exit code of the failed tool, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited { status, .. } => status.code(),
            _ => None,
        }
    }
}

fn render_tail(tail: &[String]) -> String {
    match tail.last() {
        Some(line) => format!(": {line}"),
        None => String::new(),
    }
}
