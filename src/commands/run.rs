use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use planning_core::store::{EventStore, MemoryStore};
use planning_core::{Exit, UpdateController};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{load_settings, open_file_store};

pub async fn run(config: &Path, once: bool, dry_run: bool) -> Result<()> {
    let settings = load_settings(config)?;

    let store: Arc<dyn EventStore> = if dry_run {
        warn!("dry run, records are kept in memory only");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(open_file_store(&settings)?)
    };

    let mut controller = UpdateController::from_settings(&settings, store)
        .context("Could not prepare branch parsers")?;
    if once {
        controller = controller.with_interval(None);
    }

    info!(
        branches = controller.branches().len(),
        frequency = ?settings.updater.frequency,
        error_tolerance = settings.updater.error_tolerance,
        "starting updater"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    match controller.run(cancel).await? {
        Exit::Completed => info!("single cycle completed"),
        Exit::Cancelled => info!("shutdown requested, exiting"),
    }
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "could not listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
    cancel.cancel();
}
