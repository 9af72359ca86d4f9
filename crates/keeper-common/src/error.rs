//! Common error types used throughout stream-keeper.
//!
//! Everything here is raised before any encoder is launched: bad flags,
//! unreadable key files, a missing placeholder image.

/// Common error type for stream-keeper.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The run was configured incorrectly.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
