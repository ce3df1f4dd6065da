//! quill-send - Background daemon for scheduled publishing
//!
//! Sweeps the publication queue on a fixed interval and publishes due
//! posts and threads through the platform API.

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use libquillcast::credentials::CredentialBroker;
use libquillcast::media::FsMediaStore;
use libquillcast::platform::twitter::TwitterApi;
use libquillcast::{Config, Database, Publisher, Result, Scheduler, SweepTicker};

#[derive(Parser, Debug)]
#[command(name = "quill-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
quill-send - Background daemon for scheduled publishing

DESCRIPTION:
    quill-send is a long-running daemon that monitors the Quillcast queue
    and automatically publishes scheduled content when it comes due.

    It sweeps the database at a fixed interval, publishes due posts and
    reply-chain threads in order, and records terminal success/failure per
    item. One item's failure never blocks the rest of a sweep, and a failed
    sweep never stops the recurring timer.

USAGE:
    # Run in foreground (logs to stderr)
    quill-send

    # Run with a custom sweep interval
    quill-send --poll-interval 30

    # Run one sweep and exit (cron-style deployment)
    quill-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current sweep)

CONFIGURATION:
    Configuration file: ~/.config/quillcast/config.toml
    Override with: QUILLCAST_CONFIG

    [scheduling]
    poll_interval = 60  # seconds between sweeps

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Authentication error
    3 - Invalid input
")]
struct Cli {
    /// Sweep interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to sweep for due posts (default: from config)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run one sweep and exit
    #[arg(long)]
    #[arg(help = "Sweep due posts once and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    info!("quill-send daemon starting");

    let api = Arc::new(TwitterApi::new(&config.platform)?);
    let media_dir = shellexpand::tilde(&config.media.directory).to_string();
    let media = Arc::new(FsMediaStore::new(media_dir));
    let broker = CredentialBroker::new(Arc::new(db.clone()), api.clone());
    let publisher = Publisher::new(api, media, broker);
    let scheduler = Arc::new(Scheduler::new(Arc::new(db), publisher));

    if cli.once {
        let report = scheduler.run_sweep(chrono::Utc::now()).await?;
        info!(
            posts_published = report.posts_published,
            posts_failed = report.posts_failed,
            threads_published = report.threads_published,
            threads_failed = report.threads_failed,
            "quill-send: swept once, exiting"
        );
        return Ok(());
    }

    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.scheduling.poll_interval);
    info!("Sweep interval: {}s", poll_interval);

    let ticker = SweepTicker::start(scheduler, Duration::from_secs(poll_interval));
    setup_signal_handlers(ticker.shutdown_flag())?;
    ticker.join().await;

    info!("quill-send daemon stopped");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libquillcast::QuillcastError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
