//! The ffmpeg invocation that keeps a destination fed.
//!
//! The argument vector is a contract with deployed ingest settings and must
//! not drift: loop one still image at 10 fps, add a silent stereo track,
//! encode H.264 at a capped 1500k with a 300-frame GOP plus 128k AAC, and push
//! FLV over RTMP.

use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use keeper_common::StreamKey;

use crate::command::EncoderCommand;
use crate::tools;

/// RTMP ingest that every stream key is appended to.
pub const INGEST_URL_PREFIX: &str = "rtmp://a.rtmp.youtube.com/live2";

/// Ingest URL for one destination.
pub fn destination_url(key: &StreamKey) -> String {
    format!("{INGEST_URL_PREFIX}/{key}")
}

/// Builds the encoder command for one destination.
///
/// The supervisor only sees this trait, which keeps it runnable against
/// stand-in programs.
pub trait EncoderTemplate: Send + Sync + Debug {
    /// Executable to launch.
    fn program(&self) -> &Path;

    /// Arguments for streaming `source` to `key`.
    fn args(&self, source: &Path, key: &StreamKey) -> Vec<OsString>;

    /// Assemble the full command.
    fn command(&self, source: &Path, key: &StreamKey) -> EncoderCommand {
        let mut cmd = EncoderCommand::new(self.program().to_path_buf());
        cmd.args(self.args(source, key));
        cmd
    }
}

/// Loops a placeholder image into an RTMP ingest through ffmpeg.
#[derive(Debug, Clone)]
pub struct PlaceholderStream {
    ffmpeg: PathBuf,
}

impl PlaceholderStream {
    /// Use the given ffmpeg executable.
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Locate ffmpeg from a configured path or `PATH`.
    ///
    /// Falls back to the bare name when nothing is found, so a missing binary
    /// shows up as a per-destination launch error instead of aborting the run.
    pub fn discover(configured: Option<&Path>) -> Self {
        match tools::get_tool_path("ffmpeg", configured) {
            Ok(path) => Self::new(path),
            Err(e) => {
                tracing::warn!("{e}; launching by name");
                Self::new("ffmpeg")
            }
        }
    }
}

impl EncoderTemplate for PlaceholderStream {
    fn program(&self) -> &Path {
        &self.ffmpeg
    }

    fn args(&self, source: &Path, key: &StreamKey) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-re", "-loop", "1", "-f", "image2", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_owned());
        args.extend(
            [
                "-f",
                "lavfi",
                "-i",
                "anullsrc=r=44100:cl=stereo",
                "-vf",
                "format=yuv420p",
                "-r",
                "10",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-tune",
                "stillimage",
                "-b:v",
                "1500k",
                "-maxrate",
                "1500k",
                "-bufsize",
                "3000k",
                "-g",
                "300",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
                "-reconnect",
                "1",
                "-reconnect_streamed",
                "1",
                "-reconnect_delay_max",
                "5",
                "-f",
                "flv",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(destination_url(key).into());
        args
    }
}
