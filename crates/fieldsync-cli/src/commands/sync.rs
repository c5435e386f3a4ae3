use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fieldsync_core::{BatchNote, NetworkState, SyncScheduler, SyncSummary};
use tokio::sync::mpsc;

use crate::commands::common::open_engine;
use crate::error::CliError;

/// The CLI gets no link events from the OS, so `watch` reports the link as
/// up on this cadence and lets the reachability probe decide.
const LINK_POLL_INTERVAL: Duration = Duration::from_secs(15);

pub fn format_summary_lines(summary: &SyncSummary) -> Vec<String> {
    if let Some(note) = summary.note {
        let line = match note {
            BatchNote::Offline => "Offline; nothing was sent.",
            BatchNote::AlreadyRunning => "A sync pass is already running.",
        };
        return vec![line.to_string()];
    }

    let mut lines = vec![format!(
        "Synced {} drafts and {} photos",
        summary.synced_drafts, summary.synced_photos
    )];
    for failure in &summary.errors {
        lines.push(format!(
            "  failed {} {}: {}",
            failure.entity_type, failure.entity_id, failure.message
        ));
    }
    lines
}

pub async fn run_sync(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    if !engine.sync_configured {
        return Err(CliError::SyncNotConfigured);
    }

    engine.queue.network().check_now().await;
    let summary = engine.queue.sync_all().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in format_summary_lines(&summary) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_watch(db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    if !engine.sync_configured {
        return Err(CliError::SyncNotConfigured);
    }

    let network = Arc::clone(engine.queue.network());
    network.check_now().await;

    let (signals, receiver) = mpsc::channel(8);
    let monitor = tokio::spawn({
        let network = Arc::clone(&network);
        async move { network.run(receiver).await }
    });
    let link_poller = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LINK_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if signals.send(NetworkState::Online).await.is_err() {
                break;
            }
        }
    });

    let scheduler = SyncScheduler::spawn(Arc::clone(&engine.queue), engine.config.sync_interval);
    scheduler.request_sync();
    println!(
        "Watching {} (every {}s); press Ctrl-C to stop",
        db_path.display(),
        engine.config.sync_interval.as_secs()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Stopping sync watcher");

    link_poller.abort();
    scheduler.shutdown().await;
    monitor.abort();
    Ok(())
}
