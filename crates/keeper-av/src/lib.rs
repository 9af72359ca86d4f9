//! # keeper-av
//!
//! The media-tool side of stream-keeper. Nothing in here encodes video;
//! everything is delegated to an external `ffmpeg`.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`check_tool`], [`get_tool_path`]) -- find ffmpeg,
//!   honouring a configured override.
//! - **Argument template** ([`EncoderTemplate`], [`PlaceholderStream`]) --
//!   the fixed ffmpeg invocation that loops a still image with silent audio
//!   into an RTMP ingest.
//! - **Process control** ([`EncoderCommand`], [`EncoderProcess`]) -- spawn an
//!   encoder, drain its stderr, and wait for it or kill it on cancellation.
//!
//! ## Example
//!
//! ```no_run
//! use keeper_av::{EncoderTemplate, PlaceholderStream};
//! use keeper_common::StreamKey;
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> keeper_av::Result<()> {
//! let template = PlaceholderStream::discover(None);
//! let key = StreamKey::new("abcd-efgh-ijkl").unwrap();
//! let process = template.command(Path::new("placeholder.jpg"), &key).spawn()?;
//! let exit = process.wait_or_kill(&CancellationToken::new()).await?;
//! println!("ffmpeg exited with {}", exit.status);
//! # Ok(())
//! # }
//! ```

pub mod command;
mod error;
pub mod template;
pub mod tools;

// Re-exports
pub use command::{EncoderCommand, EncoderProcess, ProcessExit};
pub use error::{Error, Result};
pub use template::{destination_url, EncoderTemplate, PlaceholderStream, INGEST_URL_PREFIX};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, ToolInfo};
