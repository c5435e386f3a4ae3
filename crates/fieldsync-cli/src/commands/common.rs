use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fieldsync_core::models::SyncLogEntry;
use fieldsync_core::remote::{
    HttpMetadataApi, HttpRecordApi, MemoryBackend, R2BlobStorage, R2Config,
};
use fieldsync_core::{
    ConnectivityProbe, Draft, DraftId, EngineConfig, HttpProbe, LocalStore, NetworkMonitor,
    Payload, Photo, QueueManager, RemoteBackend, StaticProbe,
};
use serde_json::Value;

use crate::error::CliError;

/// A queue manager wired to the configured remote, or to an offline
/// in-memory backend when sync is not configured.
pub struct Engine {
    pub queue: Arc<QueueManager>,
    pub config: EngineConfig,
    pub sync_configured: bool,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FIELDSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldsync")
        .join("fieldsync.db")
}

pub async fn open_engine(db_path: &Path) -> Result<Engine, CliError> {
    let config = EngineConfig::from_env()?;
    let r2 = R2Config::from_env()?;
    let store = LocalStore::open_path(db_path).await?;

    let (remote, probe, sync_configured): (RemoteBackend, Arc<dyn ConnectivityProbe>, bool) =
        match (config.api_base_url.as_deref(), r2) {
            (Some(base_url), Some(r2)) => {
                let health_url = config
                    .health_url
                    .clone()
                    .unwrap_or_else(|| format!("{base_url}/health"));
                let remote = RemoteBackend::new(
                    Arc::new(HttpRecordApi::new(base_url, config.api_token.clone())?),
                    Arc::new(R2BlobStorage::new(&r2)),
                    Arc::new(HttpMetadataApi::new(base_url, config.api_token.clone())?),
                );
                (remote, Arc::new(HttpProbe::new(health_url)?), true)
            }
            (Some(_), None) => {
                tracing::warn!("FIELDSYNC_API_BASE_URL is set but R2 is not configured");
                offline_backend()
            }
            (None, _) => {
                tracing::debug!("Running in local-only mode (no sync config)");
                offline_backend()
            }
        };

    let network = Arc::new(NetworkMonitor::new(probe, config.debounce));
    let queue = QueueManager::new(store, remote, network).with_identity(config.identity.clone());

    Ok(Engine {
        queue: Arc::new(queue),
        config,
        sync_configured,
    })
}

fn offline_backend() -> (RemoteBackend, Arc<dyn ConnectivityProbe>, bool) {
    (
        MemoryBackend::new().backend(),
        Arc::new(StaticProbe::new(false)),
        false,
    )
}

pub fn parse_draft_id(id: &str) -> Result<DraftId, CliError> {
    Ok(id.parse()?)
}

pub async fn require_draft(queue: &QueueManager, id: &str) -> Result<Draft, CliError> {
    let draft_id = parse_draft_id(id)?;
    queue
        .get_draft(&draft_id)
        .await?
        .ok_or_else(|| CliError::DraftNotFound(draft_id.to_string()))
}

/// Merge an optional JSON object with `KEY=VALUE` overrides.
///
/// Values that parse as JSON keep their type; anything else is a string.
pub fn build_payload(base: Option<&str>, fields: &[String]) -> Result<Payload, CliError> {
    let mut payload = match base {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => return Err(CliError::PayloadNotObject),
        },
        None => Payload::new(),
    };

    for field in fields {
        let (key, value) = parse_field(field)?;
        payload.insert(key, value);
    }
    Ok(payload)
}

pub fn parse_field(raw: &str) -> Result<(String, Value), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidField(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidField(raw.to_string()));
    }

    let value = serde_json::from_str::<Value>(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms).single().map_or_else(
        || timestamp_ms.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_draft_line(draft: &Draft, now_ms: i64) -> String {
    let remote = draft.remote_id.as_ref().map_or("-", |id| id.as_str());
    let mut line = format!(
        "{}  {:<7}  parent={}  remote={}  {}",
        draft.id,
        draft.status().as_str(),
        draft.parent_id,
        remote,
        format_relative_time(draft.updated_at, now_ms),
    );
    if let Some(message) = draft.error_message() {
        line.push_str(&format!("  ({message})"));
    }
    line
}

pub fn format_photo_line(photo: &Photo) -> String {
    let mut line = format!(
        "{}  {:<7}  #{} {}  {}  {} bytes",
        photo.id,
        photo.status().as_str(),
        photo.order_index,
        photo.category,
        photo.group_key.as_deref().unwrap_or("ungrouped"),
        photo.size_bytes(),
    );
    if let Some(path) = &photo.remote_path {
        line.push_str(&format!("  -> {path}"));
    }
    if let Some(message) = photo.error_message() {
        line.push_str(&format!("  ({message})"));
    }
    line
}

pub fn format_log_line(entry: &SyncLogEntry) -> String {
    format!(
        "{}  {} {:<6} {}  remote={}",
        format_timestamp(entry.synced_at),
        entry.entity_type,
        entry.action.as_str(),
        entry.entity_id,
        entry.remote_id,
    )
}
