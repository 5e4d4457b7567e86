//! URL Disk Cache - maintenance daemon
//!
//! Opens a cache directory, keeps it within its capacity and expiration
//! bounds on a timer, and checkpoints it on shutdown.

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use url_disk_cache::{Config, DiskCache};

/// Main entry point for the cache maintenance daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the disk cache (loads and reconciles the index, starts periodic maintenance)
/// 4. Run a final maintenance pass on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "url_disk_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting URL disk cache maintenance daemon");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_dir={}, capacity={} bytes, min_cache_interval={}s, maintenance_interval={}s",
        config.cache_dir.display(),
        config.capacity_bytes,
        config.min_cache_interval,
        config.maintenance_interval
    );

    let cache = DiskCache::open(&config)
        .with_context(|| format!("failed to open cache at {}", config.cache_dir.display()))?;

    shutdown_signal().await;

    match cache.shutdown().await {
        Some(report) => info!(
            "Final maintenance: checkpointed={}, usage={} bytes",
            report.checkpointed, report.usage_after
        ),
        None => warn!("Final maintenance pass did not run"),
    }

    let stats = cache.stats();
    info!(
        "Shutdown complete: {} entries, {} bytes, hit rate {:.2}",
        stats.total_entries,
        stats.usage_bytes,
        stats.hit_rate()
    );
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
