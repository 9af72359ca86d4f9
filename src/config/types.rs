use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; PATH is searched when unset or missing
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Trailing ffmpeg stderr lines kept per destination for error reports
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

fn default_stderr_tail_lines() -> usize {
    8
}
