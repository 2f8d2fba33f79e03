//! droidsync daemon - watches for devices and runs auto-sync pipelines

use anyhow::{Context, Result};
use clap::Parser;
use droidsync_core::clock::{Clock, SystemClock};
use droidsync_core::config::{ConfigOverrides, resolve_config};
use droidsync_core::store::{JsonPipelineFile, PipelineStore};
use droidsync_daemon::bridge::BridgeClient;
use droidsync_daemon::daemon;
use droidsync_daemon::monitor::DeviceMonitor;
use droidsync_daemon::plugin::PluginHost;
use droidsync_daemon::scheduler::AutoSyncScheduler;
use droidsync_daemon::sync::SyncExecutor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// droidsync daemon - watches for devices and runs auto-sync pipelines
#[derive(Parser, Debug)]
#[command(name = "dsync-daemon")]
#[command(about = "Watch for Android devices and run auto-sync pipelines")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the adb executable
    #[arg(long, value_name = "PATH")]
    adb: Option<String>,

    /// Device poll interval in seconds
    #[arg(long, value_name = "SECS")]
    poll_secs: Option<u64>,

    /// Watch devices but never start auto-sync runs
    #[arg(long)]
    no_auto_sync: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        droidsync_core::logging::init_with_level(tracing::Level::DEBUG);
    } else {
        droidsync_core::logging::init();
    }

    info!("droidsync daemon starting...");

    let home_dir = droidsync_core::home::get_home_dir()
        .context("Failed to determine home directory")?;

    let overrides = ConfigOverrides {
        adb_path: args.adb.clone(),
        poll_interval_secs: args.poll_secs,
        no_auto_sync: args.no_auto_sync,
        config_path: args.config.clone(),
        ..Default::default()
    };
    let config = resolve_config(&overrides, &home_dir).context("Failed to resolve configuration")?;

    let pipelines_file = config.pipelines_file(&home_dir);
    info!("Pipelines file: {}", pipelines_file.display());
    let store = Arc::new(
        PipelineStore::open(Box::new(JsonPipelineFile::new(&pipelines_file)))
            .context("Failed to load pipelines")?,
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = BridgeClient::adb(config.core.adb_path.clone(), &config.bridge);
    let plugins = Arc::new(PluginHost::from_config(&config, &home_dir));
    info!("Plugins available: {}", plugins.registry().list().join(", "));

    let executor = Arc::new(
        SyncExecutor::new(client.clone(), plugins, Arc::clone(&clock))
            .with_lock_dir(config.lock_dir(&home_dir)),
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let monitor = DeviceMonitor::new(client, config.monitor.poll_interval(), events_tx);

    let scheduler = if config.scheduler.enabled {
        Some(Arc::new(AutoSyncScheduler::new(
            store,
            executor,
            clock,
            config.scheduler.cooldown(),
        )))
    } else {
        None
    };

    let cancel_token = CancellationToken::new();

    let cancel_for_signals = cancel_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        cancel_for_signals.cancel();
    });

    daemon::run(monitor, events_rx, scheduler, cancel_token)
        .await
        .context("Daemon event loop failed")?;

    info!("droidsync daemon shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                if ctrl_c.await.is_ok() {
                    info!("Received SIGINT (Ctrl+C)");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        match ctrl_c.await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
        }
    }
}
