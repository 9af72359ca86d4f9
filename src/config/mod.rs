mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Upper bound for `stream.stderr_tail_lines`.
const MAX_STDERR_TAIL_LINES: usize = 1000;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./stream-keeper.toml",
        "~/.config/stream-keeper/config.toml",
        "/etc/stream-keeper/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if let Some(ref ffmpeg) = config.tools.ffmpeg_path {
        if ffmpeg.is_dir() {
            anyhow::bail!("tools.ffmpeg_path points to a directory: {:?}", ffmpeg);
        }
        if !ffmpeg.exists() {
            tracing::warn!("Configured ffmpeg does not exist: {:?}", ffmpeg);
        }
    }

    if config.stream.stderr_tail_lines > MAX_STDERR_TAIL_LINES {
        anyhow::bail!(
            "stream.stderr_tail_lines must be at most {}, got {}",
            MAX_STDERR_TAIL_LINES,
            config.stream.stderr_tail_lines
        );
    }

    Ok(())
}
