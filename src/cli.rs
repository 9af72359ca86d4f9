use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stream-keeper")]
#[command(
    author,
    version,
    about = "Keep live streams alive by streaming placeholder content",
    long_about = "stream-keeper keeps live streams active by streaming placeholder content \
                  while the primary camera is offline, so the platform does not cut the \
                  stream and change its URL."
)]
pub struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream an image to one or more live streams using ffmpeg
    Stream {
        /// Path to the image file to stream
        #[arg(short, long, required = true)]
        image: PathBuf,

        /// Single stream key
        #[arg(short, long, conflicts_with = "csv", required_unless_present = "csv")]
        key: Option<String>,

        /// Path to CSV file with stream keys (first column)
        #[arg(short, long)]
        csv: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config or the defaults if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
