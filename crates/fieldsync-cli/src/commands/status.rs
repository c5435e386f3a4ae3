use std::path::Path;

use fieldsync_core::{AggregateStatus, Draft, NetworkState, PendingCounts, Photo};
use serde::Serialize;

use crate::commands::common::{
    format_draft_line, format_log_line, format_photo_line, now_millis, open_engine,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct PendingReport {
    pub counts: PendingCounts,
    pub drafts: Vec<Draft>,
    pub photos: Vec<Photo>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: AggregateStatus,
    pub network: NetworkState,
    pub sync_configured: bool,
    pub pending: PendingCounts,
    pub db_path: String,
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("Status:   {}", report.status),
        format!("Network:  {}", report.network),
        format!(
            "Pending:  {} drafts, {} photos",
            report.pending.drafts, report.pending.photos
        ),
        format!("Database: {}", report.db_path),
    ];
    if !report.sync_configured {
        lines.push("Sync is not configured; running in local-only mode.".to_string());
    }
    lines
}

pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    let queue = &engine.queue;

    let counts = queue.get_pending_counts().await?;
    let drafts = queue.get_pending_drafts().await?;
    let mut photos = Vec::new();
    for draft in queue.list_drafts().await? {
        photos.extend(queue.get_pending_photos(&draft.id).await?);
    }

    if as_json {
        let report = PendingReport {
            counts,
            drafts,
            photos,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if counts.total() == 0 {
        println!("Nothing waiting to sync.");
        return Ok(());
    }

    let now = now_millis();
    println!("Drafts ({}):", counts.drafts);
    for draft in &drafts {
        println!("  {}", format_draft_line(draft, now));
    }
    println!("Photos ({}):", counts.photos);
    for photo in &photos {
        println!("  {}  draft={}", format_photo_line(photo), photo.draft_id);
    }
    Ok(())
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    let network = engine.queue.network().check_now().await;

    let report = StatusReport {
        status: engine.queue.aggregate_status().await,
        network,
        sync_configured: engine.sync_configured,
        pending: engine.queue.get_pending_counts().await?,
        db_path: db_path.display().to_string(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_log(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    let entries = engine.queue.sync_log(limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No remote writes recorded yet.");
        return Ok(());
    }

    for entry in &entries {
        println!("{}", format_log_line(entry));
    }
    Ok(())
}
