//! Lockslot GW - user-code slot reconciliation for networked door locks
//!
//! Keeps a durable name for every code slot on every lock, reconciles those
//! names against hardware occupancy reports, and fans operator commands out
//! across the whole fleet.

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod engine;
mod listener;
mod paths;
mod poller;
mod protocol;
mod transport;

use crate::config::AppConfig;
use crate::engine::{EngineActor, SlotStore};
use crate::listener::spawn_listener;
use crate::paths::AppPaths;
use crate::poller::spawn_poller;
use crate::transport::{spawn_pump, ConsoleTransport, LockTransport};
use std::sync::Arc;

/// Lockslot Gateway - reconcile named user codes across networked door locks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the detected app directory)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Path to the slot store file (overrides the configured location)
    #[arg(long)]
    store: Option<String>,

    /// Print the resolved application paths and exit
    #[arg(long)]
    show_paths: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Resolve application directories before logging so the file appender
    // has somewhere to write
    let paths = AppPaths::detect();

    if args.show_paths {
        println!("Config:   {}", paths.config.display());
        println!("State:    {}", paths.state_dir.display());
        println!("Logs:     {}", paths.logs_dir.display());
        println!("Portable: {}", paths.is_portable);
        return Ok(());
    }

    paths.ensure_directories()?;

    // Initialize logging; the guard flushes the file appender on drop
    let _log_guard = init_logging(&args.log_level, &paths)?;

    info!("Starting Lockslot GW...");

    // Explicit --config wins over the detected path
    let config_path = match &args.config {
        Some(path) => std::path::PathBuf::from(path),
        None => paths.config.clone(),
    };
    info!("Configuration file: {}", config_path.display());

    let config = if config_path.exists() {
        AppConfig::load(&config_path).await?
    } else {
        info!("No configuration found, writing defaults");
        let config = AppConfig::default();
        config.save(&config_path).await?;
        config
    };
    config.validate()?;
    info!("Configuration loaded successfully");

    // Explicit --store wins over the configured location
    let store_path = match &args.store {
        Some(path) => std::path::PathBuf::from(path),
        None => paths.store_path(&config.engine.store_file),
    };

    run_app(config, store_path).await?;

    info!("Lockslot GW shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig, store_path: std::path::PathBuf) -> Result<()> {
    // Durable slot store; a missing or corrupt file starts empty
    let store = SlotStore::load(&store_path);
    info!("Slot store: {}", store_path.display());

    // Outbound transport to the lock network
    let transport: Arc<dyn LockTransport> = match config.transport.kind.as_str() {
        "console" => Arc::new(ConsoleTransport::new("console")),
        other => anyhow::bail!("Unknown transport kind '{}'", other),
    };
    transport.init().await?;

    // Engine actor owns the store and feeds commands to the transport pump
    let (lock_tx, lock_rx) = mpsc::unbounded_channel();
    let pump_task = spawn_pump(transport.clone(), lock_rx);

    let engine = EngineActor::spawn(store, lock_tx);

    // Inbound network notifications flow through the listener
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let listener_task = spawn_listener(engine.clone(), event_rx);

    // Throttled refresh poller resolves unknown slots one query at a time
    let poller_task = spawn_poller(engine.clone(), config.refresh_interval());

    let status = engine.status();
    info!(
        "Ready: {} slot(s) known, {} awaiting refresh",
        status.total_slots, status.pending_refresh
    );

    // The console runs in the foreground until exit/quit or Ctrl-C
    cli::run_repl(engine.clone(), event_tx.clone()).await?;

    // Cleanup
    info!("Shutting down...");
    engine.shutdown();
    drop(event_tx);

    // The listener stops when the event channel closes and the pump when the
    // engine drops its sender; wait for both so their final logs land. The
    // poller would only notice on its next tick, so cancel it instead.
    let _ = listener_task.await;
    let _ = pump_task.await;
    poller_task.abort();

    transport.shutdown().await?;
    info!("All tasks stopped");

    Ok(())
}

fn init_logging(
    level: &str,
    paths: &AppPaths,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, "lockslot-gw.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .init();

    Ok(guard)
}
