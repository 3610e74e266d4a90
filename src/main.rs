use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::fs;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use xrelay::config::Config;
use xrelay::sink::TelegramSink;
use xrelay::source::{Credentials, HttpSourceClient, SessionManager};
use xrelay::store::{FileLedgerStore, FileSessionStore};
use xrelay::watcher::{Watcher, WatcherConfig};

// ============================================================================
// CLI Types
// ============================================================================

/// Xrelay - relay new posts from one watched account to a Telegram chat
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "xrelay.yaml")]
    config: PathBuf,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .await
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    fs::create_dir_all(&config.state_dir)
        .await
        .with_context(|| format!("creating state dir {}", config.state_dir.display()))?;

    let client = HttpSourceClient::new(&config.source.base_url)
        .context("building source client")?;
    let credentials = Credentials {
        username: config.source.username.clone(),
        password: config.source.password.clone(),
        email: config.source.email.clone(),
    };
    let session = SessionManager::new(
        Arc::new(client),
        FileSessionStore::new(&config.state_dir),
        credentials,
    );
    let ledger = FileLedgerStore::new(&config.state_dir);
    let sink = Arc::new(TelegramSink::new(&config.telegram));

    // Startup notification is best-effort; the watcher runs either way.
    let hello = format!("Watching @{} for new posts.", config.watch.account);
    if let Err(e) = sink.announce(&hello).await {
        warn!(error = %e, "could not notify admin chat");
    }

    info!(
        account = %config.watch.account,
        interval_minutes = config.watch.poll_interval_minutes,
        "starting watcher"
    );

    let watcher = Watcher::new(
        session,
        ledger,
        sink,
        WatcherConfig {
            account: config.watch.account.clone(),
            fetch_count: config.watch.fetch_count,
            poll_interval: config.watch.poll_interval(),
            cooldown: config.watch.cooldown(),
        },
    );

    tokio::select! {
        _ = watcher.run() => {}
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    Ok(())
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
