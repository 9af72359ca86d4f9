mod cli;

use stream_keeper::{
    config,
    resolver::KeySource,
    signal,
    supervisor::{RunError, Supervisor},
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use keeper_av::PlaceholderStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn stream(
    image: &Path,
    key: Option<String>,
    csv: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let keys = KeySource::from_options(key, csv)?.resolve()?;
    let redacted: Vec<String> = keys.iter().map(|k| k.redacted()).collect();
    tracing::info!("Resolved {} stream key(s): {:?}", keys.len(), redacted);

    let template = PlaceholderStream::discover(config.tools.ffmpeg_path.as_deref());
    let supervisor =
        Supervisor::new(Arc::new(template)).with_stderr_tail(config.stream.stderr_tail_lines);

    // Signals feed the cancellation token; `stop` retires the listener.
    let cancel = CancellationToken::new();
    let stop = CancellationToken::new();
    let listener = tokio::spawn(signal::forward_shutdown_signals(
        cancel.clone(),
        stop.clone(),
    ));

    let result = supervisor.run(image, &keys, &cancel).await;

    stop.cancel();
    let _ = listener.await;

    match result {
        Ok(report) => {
            tracing::info!(
                "Completed: {} finished, {} cancelled",
                report.ok(),
                report.cancelled()
            );
            Ok(())
        }
        // Encoder failures are reported, not turned into an exit code.
        Err(RunError::Failed(report)) => {
            tracing::error!("Completed with error(s): {}", report.redacted_failure_summary());
            Ok(())
        }
        Err(e @ RunError::Config(_)) => Err(e.into()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stream_keeper=trace,keeper_av=debug".to_string()
        } else {
            "stream_keeper=info,keeper_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Stream { image, key, csv } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(stream(&image, key, csv, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("stream-keeper {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = keeper_av::check_tools(config.tools.ffmpeg_path.as_deref());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to stream placeholders.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            match config.tools.ffmpeg_path {
                Some(ref ffmpeg) => println!("  ffmpeg: {}", ffmpeg.display()),
                None => println!("  ffmpeg: from PATH"),
            }
            println!("  stderr tail lines: {}", config.stream.stderr_tail_lines);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  ffmpeg: from PATH");
            println!("  stderr tail lines: {}", config.stream.stderr_tail_lines);
        }
    }

    Ok(())
}
