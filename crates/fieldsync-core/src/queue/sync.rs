//! The two-phase sync pass.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::db::DraftOutcome;
use crate::models::{
    Draft, EntityType, Payload, Photo, PhotoId, SyncAction, SyncLogEntry, SyncState, SyncStatus,
};
use crate::remote::PhotoMetadata;
use crate::util::now_millis;
use crate::{Error, Result};

use super::path::storage_path;
use super::QueueManager;

/// Batch-level condition that stopped a pass before it touched any entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchNote {
    AlreadyRunning,
    Offline,
}

/// One entity that failed during a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub message: String,
}

/// Result of [`QueueManager::sync_all`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Drafts that ended the pass `synced`. A draft edited mid-pass is
    /// written remotely but stays `pending` and is not counted.
    pub synced_drafts: usize,
    pub synced_photos: usize,
    pub errors: Vec<SyncFailure>,
    pub note: Option<BatchNote>,
}

impl SyncSummary {
    const fn skipped(note: BatchNote) -> Self {
        Self {
            synced_drafts: 0,
            synced_photos: 0,
            errors: Vec::new(),
            note: Some(note),
        }
    }

    fn fail(&mut self, entity_type: EntityType, entity_id: &str, message: String) {
        self.errors.push(SyncFailure {
            entity_type,
            entity_id: entity_id.to_string(),
            message,
        });
    }
}

/// Holds the single-flight flag for the lifetime of a pass.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl QueueManager {
    /// Drain the local queue against the remote backend.
    ///
    /// Drafts go first; a draft's photos follow only once that draft has a
    /// remote id. Entity failures are recorded on the entity and in the
    /// summary and never abort the pass. Only local store failures return
    /// `Err`.
    ///
    /// A call that overlaps a running pass returns immediately with
    /// [`BatchNote::AlreadyRunning`]; an offline call returns with
    /// [`BatchNote::Offline`] without touching any entity.
    pub async fn sync_all(&self) -> Result<SyncSummary> {
        let Some(_running) = RunningGuard::acquire(&self.syncing) else {
            tracing::debug!("Sync already in progress; skipping");
            return Ok(SyncSummary::skipped(BatchNote::AlreadyRunning));
        };

        if !self.network.is_online() {
            tracing::info!("Offline; deferring sync");
            return Ok(SyncSummary::skipped(BatchNote::Offline));
        }

        let mut summary = SyncSummary::default();
        let mut attempted: HashSet<PhotoId> = HashSet::new();

        for draft in self.store.retry_eligible_drafts().await? {
            let Some(synced) = self.sync_draft(draft, &mut summary).await? else {
                continue;
            };
            for photo in self.store.retry_eligible_photos(&synced.id).await? {
                attempted.insert(photo.id.clone());
                self.sync_photo(&synced, photo, &mut summary).await?;
            }
        }

        self.sync_stranded_photos(&attempted, &mut summary).await?;

        self.set_last_error(summary.errors.last().map(|failure| failure.message.clone()));
        tracing::info!(
            "Sync pass finished: {} draft(s), {} photo(s), {} error(s)",
            summary.synced_drafts,
            summary.synced_photos,
            summary.errors.len()
        );
        Ok(summary)
    }

    /// Returns the stored draft when the remote write succeeded.
    async fn sync_draft(&self, draft: Draft, summary: &mut SyncSummary) -> Result<Option<Draft>> {
        let syncing = draft.state.begin()?;
        if !found(self.store.set_draft_state(&draft.id, &syncing).await)? {
            return Ok(None);
        }
        tracing::debug!("Draft {} -> syncing", draft.id);

        let observed_updated_at = draft.updated_at;
        let (action, result) = match &draft.remote_id {
            None => (
                SyncAction::Create,
                self.remote.records.create(&self.create_payload(&draft)).await,
            ),
            Some(remote_id) => (
                SyncAction::Update,
                self.remote
                    .records
                    .update(remote_id, &draft.payload)
                    .await
                    .map(|()| remote_id.clone()),
            ),
        };

        match result {
            Ok(remote_id) => {
                syncing.complete()?;
                let synced_at = now_millis();
                let outcome = DraftOutcome::Synced {
                    remote_id: remote_id.clone(),
                    synced_at,
                };
                let Some(stored) = self
                    .store
                    .finish_draft_sync(&draft.id, &outcome, observed_updated_at)
                    .await?
                else {
                    tracing::warn!("Draft {} was deleted during sync", draft.id);
                    return Ok(None);
                };

                let remote_id = stored.remote_id.clone().unwrap_or(remote_id);
                self.store
                    .append_log(&SyncLogEntry::new(
                        EntityType::Draft,
                        draft.id.as_str(),
                        action,
                        remote_id.clone(),
                        synced_at,
                    ))
                    .await?;
                if stored.status() == SyncStatus::Synced {
                    summary.synced_drafts += 1;
                    tracing::debug!("Draft {} -> synced ({action} {remote_id})", draft.id);
                } else {
                    tracing::debug!(
                        "Draft {} edited during sync; stays {} ({action} {remote_id})",
                        draft.id,
                        stored.status()
                    );
                }
                Ok(Some(stored))
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!("Draft {} failed to sync: {message}", draft.id);
                self.store
                    .finish_draft_sync(
                        &draft.id,
                        &DraftOutcome::Failed {
                            message: message.clone(),
                        },
                        observed_updated_at,
                    )
                    .await?;
                summary.fail(EntityType::Draft, draft.id.as_str(), message);
                Ok(None)
            }
        }
    }

    async fn sync_photo(&self, owner: &Draft, photo: Photo, summary: &mut SyncSummary) -> Result<()> {
        let syncing = match photo.begin_sync(owner) {
            Ok(state) => state,
            Err(error) => {
                tracing::debug!("Photo {} not eligible this pass: {error}", photo.id);
                return Ok(());
            }
        };
        let Some(remote_id) = owner.remote_id.as_ref() else {
            return Ok(());
        };
        if !found(self.store.set_photo_state(&photo.id, &syncing).await)? {
            return Ok(());
        }
        tracing::debug!("Photo {} -> syncing", photo.id);

        let path = storage_path(remote_id, &photo, now_millis());
        let uploaded = match self
            .remote
            .blobs
            .put(&path, &photo.blob, &photo.content_type)
            .await
        {
            Ok(uploaded) => uploaded,
            Err(error) => {
                return self
                    .fail_photo(&photo, &syncing, error.to_string(), summary)
                    .await;
            }
        };

        let row = PhotoMetadata::for_photo(remote_id, &uploaded, &photo);
        let remote_photo_id = match self.remote.metadata.insert(&row).await {
            Ok(remote_photo_id) => remote_photo_id,
            Err(error) => {
                let mut message = error.to_string();
                if let Err(rollback) = self.remote.blobs.delete(&uploaded).await {
                    tracing::error!("Failed to remove orphaned blob {uploaded}: {rollback}");
                    message = format!("{message}; rollback of {uploaded} failed: {rollback}");
                }
                return self.fail_photo(&photo, &syncing, message, summary).await;
            }
        };

        syncing.complete()?;
        let synced_at = now_millis();
        let marked = self
            .store
            .mark_photo_synced(&photo.id, &remote_photo_id, &uploaded, synced_at)
            .await;
        if !found(marked)? {
            tracing::warn!(
                "Photo {} was deleted locally during sync; remote blob {uploaded} and metadata row {remote_photo_id} are left behind",
                photo.id
            );
            return Ok(());
        }
        self.store
            .append_log(&SyncLogEntry::new(
                EntityType::Photo,
                photo.id.as_str(),
                SyncAction::Create,
                remote_photo_id,
                synced_at,
            ))
            .await?;
        summary.synced_photos += 1;
        tracing::debug!("Photo {} -> synced at {uploaded}", photo.id);
        Ok(())
    }

    async fn fail_photo(
        &self,
        photo: &Photo,
        syncing: &SyncState,
        message: String,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        tracing::warn!("Photo {} failed to sync: {message}", photo.id);
        let failed = syncing.fail(message.clone())?;
        found(self.store.set_photo_state(&photo.id, &failed).await)?;
        summary.fail(EntityType::Photo, photo.id.as_str(), message);
        Ok(())
    }

    /// Pick up photos whose draft synced in an earlier pass.
    async fn sync_stranded_photos(
        &self,
        attempted: &HashSet<PhotoId>,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let mut owner: Option<Draft> = None;

        for photo in self.store.stranded_photos().await? {
            if attempted.contains(&photo.id) {
                continue;
            }
            if owner.as_ref().map(|draft| &draft.id) != Some(&photo.draft_id) {
                owner = self.store.get_draft(&photo.draft_id).await?;
            }
            if let Some(draft) = &owner {
                self.sync_photo(draft, photo, summary).await?;
            }
        }

        Ok(())
    }

    fn create_payload(&self, draft: &Draft) -> Payload {
        let mut payload = draft.payload.clone();
        payload.insert(
            "parent_id".to_string(),
            serde_json::Value::String(draft.parent_id.clone()),
        );
        for (key, value) in &self.identity {
            payload.insert(key.clone(), value.clone());
        }
        payload
    }
}

/// Treat a missing row as "deleted locally mid-pass" rather than a failure.
fn found(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(Error::NotFound(_)) => Ok(false),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn running_guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);

        let guard = RunningGuard::acquire(&flag).unwrap();
        assert!(RunningGuard::acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(RunningGuard::acquire(&flag).is_some());
    }

    #[test]
    fn found_swallows_only_not_found() {
        assert!(found(Ok(())).unwrap());
        assert!(!found(Err(Error::NotFound("p1".to_string()))).unwrap());
        assert!(found(Err(Error::InvalidInput("disk".to_string()))).is_err());
    }

    #[test]
    fn skipped_summary_reports_note_with_zero_counts() {
        let summary = SyncSummary::skipped(BatchNote::Offline);
        assert_eq!(summary.synced_drafts, 0);
        assert_eq!(summary.synced_photos, 0);
        assert!(summary.errors.is_empty());
        assert_eq!(
            serde_json::to_value(&summary).unwrap()["note"],
            json!("offline")
        );
    }

    #[test]
    fn failure_messages_keep_entity_identity() {
        let mut summary = SyncSummary::default();
        summary.fail(EntityType::Photo, "p1", "HTTP 500: boom".to_string());
        assert_eq!(summary.errors[0].entity_type, EntityType::Photo);
        assert_eq!(summary.errors[0].entity_id, "p1");
    }
}
