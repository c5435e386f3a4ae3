//! Queue manager: local capture operations and the sync pass.

mod path;
mod sync;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{
    Draft, DraftId, DraftInput, NewPhoto, Payload, Photo, PhotoId, SyncLogEntry,
};
use crate::network::NetworkMonitor;
use crate::remote::RemoteBackend;
use crate::services::LocalStore;
use crate::status::{AggregateStatus, PendingCounts};
use crate::Result;

pub use path::storage_path;
pub use sync::{BatchNote, SyncFailure, SyncSummary};

/// Owns the local queue and reconciles it with the remote backend.
///
/// Everything except [`QueueManager::sync_all`] is local-only and safe to
/// call while a pass is in flight.
pub struct QueueManager {
    store: LocalStore,
    remote: RemoteBackend,
    network: Arc<NetworkMonitor>,
    identity: Payload,
    syncing: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl QueueManager {
    pub fn new(store: LocalStore, remote: RemoteBackend, network: Arc<NetworkMonitor>) -> Self {
        Self {
            store,
            remote,
            network,
            identity: Payload::new(),
            syncing: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    /// Fields merged into the payload of every remote create, and never
    /// sent on update.
    #[must_use]
    pub fn with_identity(mut self, identity: Payload) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    #[must_use]
    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    /// Upsert a draft. Keeps `created_at` and `remote_id`, resets the status
    /// to `pending` and bumps `updated_at`.
    pub async fn save_draft(&self, input: &DraftInput) -> Result<Draft> {
        let draft = self.store.save_draft(input).await?;
        tracing::debug!("Saved draft {} (updated_at={})", draft.id, draft.updated_at);
        Ok(draft)
    }

    /// Queue a photo. The owning draft must exist locally but need not
    /// have synced yet.
    pub async fn queue_photo(&self, photo: &NewPhoto) -> Result<Photo> {
        let photo = self.store.insert_photo(photo).await?;
        tracing::debug!(
            "Queued photo {} for draft {} ({} bytes)",
            photo.id,
            photo.draft_id,
            photo.size_bytes()
        );
        Ok(photo)
    }

    /// Drafts in `pending` or `error`.
    pub async fn get_pending_drafts(&self) -> Result<Vec<Draft>> {
        self.store.retry_eligible_drafts().await
    }

    /// Photos of one draft in `pending` or `error`.
    pub async fn get_pending_photos(&self, draft_id: &DraftId) -> Result<Vec<Photo>> {
        self.store.retry_eligible_photos(draft_id).await
    }

    pub async fn get_pending_counts(&self) -> Result<PendingCounts> {
        self.store.pending_counts().await
    }

    pub async fn get_draft(&self, id: &DraftId) -> Result<Option<Draft>> {
        self.store.get_draft(id).await
    }

    pub async fn list_drafts(&self) -> Result<Vec<Draft>> {
        self.store.list_drafts().await
    }

    pub async fn list_photos(&self, draft_id: &DraftId) -> Result<Vec<Photo>> {
        self.store.list_photos(draft_id).await
    }

    /// Delete a draft together with its photos.
    pub async fn delete_draft(&self, id: &DraftId) -> Result<()> {
        self.store.delete_draft(id).await?;
        tracing::debug!("Deleted draft {id}");
        Ok(())
    }

    pub async fn delete_photo(&self, id: &PhotoId) -> Result<()> {
        self.store.delete_photo(id).await?;
        tracing::debug!("Deleted photo {id}");
        Ok(())
    }

    pub async fn sync_log(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        self.store.sync_log(limit).await
    }

    /// Most recent entity-level error recorded by a pass.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Badge status; `Error` only when the local store cannot be read.
    pub async fn aggregate_status(&self) -> AggregateStatus {
        if !self.network.is_online() {
            return AggregateStatus::Offline;
        }

        match self.store.pending_counts().await {
            Ok(counts) => AggregateStatus::resolve(true, counts, self.is_syncing()),
            Err(error) => {
                tracing::warn!("Failed to read pending counts: {error}");
                AggregateStatus::Error
            }
        }
    }

    fn set_last_error(&self, message: Option<String>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("QueueManager")
            .field("network", &self.network)
            .field("syncing", &self.is_syncing())
            .finish_non_exhaustive()
    }
}
