//! logdoc forwarder - mirrors an append-only log file into a Google Doc.
//!
//! # Commands
//!
//! - `logdoc-forwarder run`: Tail the log file and forward new entries
//! - `logdoc-forwarder generate`: Append synthetic entries to a log file
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use logdoc_forwarder::config::Config;
use logdoc_forwarder::forwarder::Forwarder;
use logdoc_forwarder::generator::{self, GeneratorConfig};
use logdoc_forwarder::sink::DocsClient;
use logdoc_forwarder::watcher::{resolve_log_path, FileWatcher};

/// logdoc forwarder - mirrors an append-only log file into a Google Doc.
#[derive(Parser, Debug)]
#[command(name = "logdoc-forwarder")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    LOGDOC_LOG_FILE            Log file to tail (default: app.txt)
    LOGDOC_CREDENTIALS_FILE    Service-account key (default: creds.json)
    LOGDOC_DOCUMENT_ID         Target document id
    LOGDOC_DOCS_API_URL        Docs API base URL (default: https://docs.googleapis.com)
    LOGDOC_SETTLE_MS           Delay after a write before reading (default: 100)
    LOGDOC_CHANNEL_CAPACITY    Watcher channel capacity (default: 1000)

EXAMPLES:
    # Mirror ./app.txt into the configured document
    logdoc-forwarder run

    # Write 10 entries, one every 200ms
    logdoc-forwarder generate --count 10 --delay-ms 200
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Tail the log file and forward new entries to the document.
    Run,

    /// Append randomly generated entries to a log file.
    Generate {
        /// File to append to (default: LOGDOC_LOG_FILE or app.txt).
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of entries to write.
        #[arg(short, long, default_value_t = generator::DEFAULT_COUNT)]
        count: usize,

        /// Pause between entries in milliseconds.
        #[arg(short, long, default_value_t = generator::DEFAULT_DELAY_MS)]
        delay_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    match cli.command {
        Command::Run => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_forwarder())
        }
        Command::Generate {
            file,
            count,
            delay_ms,
        } => run_generate(file, count, delay_ms),
    }
}

/// Runs the forwarder until a watcher channel closes or a shutdown signal arrives.
async fn run_forwarder() -> Result<()> {
    info!("Starting logdoc forwarder");

    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        log_file = %config.log_file.display(),
        credentials_file = %config.credentials_file.display(),
        document_id = %config.document_id,
        settle_ms = config.settle_delay.as_millis() as u64,
        "Configuration loaded"
    );

    let sink = DocsClient::from_config(&config).context("Unable to initialize docs service")?;

    let log_path = resolve_log_path(&config.log_file).context(format!(
        "Unable to resolve log file path {}",
        config.log_file.display()
    ))?;

    let (watcher, channels) = FileWatcher::new(&log_path, config.channel_capacity)
        .context(format!("Error watching {}", log_path.display()))?;

    info!(
        log_path = %watcher.log_path().display(),
        watch_dir = %watcher.watch_dir().display(),
        "File watcher initialized"
    );

    let mut forwarder = Forwarder::new(log_path, sink, config.settle_delay);
    forwarder.catch_up().await;

    info!("Forwarder running. Press Ctrl+C to stop.");

    tokio::select! {
        result = forwarder.run(channels.events, channels.errors) => {
            result.context("Error watching log file")?;
        }

        _ = wait_for_shutdown() => {
            info!("Shutdown signal received");
        }
    }

    drop(watcher);

    info!("Forwarder stopped");
    Ok(())
}

/// Runs the generate command.
fn run_generate(file: Option<PathBuf>, count: usize, delay_ms: u64) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => {
            Config::from_env()
                .context("Failed to load configuration")?
                .log_file
        }
    };

    let config = GeneratorConfig {
        path,
        count,
        delay: Duration::from_millis(delay_ms),
    };

    generator::write_logs(&config)
        .context(format!("Failed to write to {}", config.path.display()))?;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
