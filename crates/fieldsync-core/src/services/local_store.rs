//! Thread-safe handle to the local durable store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, DraftOutcome, DraftRepository, PhotoRepository, SqliteDraftRepository,
    SqlitePhotoRepository, SqliteSyncLogRepository, SyncLogRepository,
};
use crate::models::{
    Draft, DraftId, DraftInput, NewPhoto, Photo, PhotoId, RemoteId, SyncLogEntry, SyncState,
};
use crate::status::PendingCounts;
use crate::util::now_millis;
use crate::{Error, Result};

/// Cloneable service over one local database.
///
/// Every method takes the connection lock for a single statement (or a
/// single read), so UI writes and an in-flight sync pass interleave at entity
/// granularity.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh store is
    /// created in its place. Entities left `syncing` by a crashed pass are
    /// returned to `pending`.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        let db = match Database::open(&db_path) {
            Ok(db) => db,
            Err(error) if is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local store at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                quarantine_db_files(&db_path)?;
                Database::open(&db_path)?
            }
            Err(error) => return Err(error),
        };

        let store = Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        };
        store.recover_interrupted().await?;
        Ok(store)
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn recover_interrupted(&self) -> Result<()> {
        let db = self.db.lock().await;
        let drafts = SqliteDraftRepository::new(db.connection()).reset_interrupted()?;
        let photos = SqlitePhotoRepository::new(db.connection()).reset_interrupted()?;
        if drafts + photos > 0 {
            tracing::info!(
                "Recovered {drafts} draft(s) and {photos} photo(s) from an interrupted sync"
            );
        }
        Ok(())
    }

    /// Insert or update a draft, stamping it with the current time.
    pub async fn save_draft(&self, input: &DraftInput) -> Result<Draft> {
        let db = self.db.lock().await;
        SqliteDraftRepository::new(db.connection()).upsert(input, now_millis())
    }

    pub async fn get_draft(&self, id: &DraftId) -> Result<Option<Draft>> {
        let db = self.db.lock().await;
        SqliteDraftRepository::new(db.connection()).get(id)
    }

    /// List drafts, most recently edited first.
    pub async fn list_drafts(&self) -> Result<Vec<Draft>> {
        let db = self.db.lock().await;
        SqliteDraftRepository::new(db.connection()).list()
    }

    /// Drafts the next pass should pick up, oldest edit first.
    pub async fn retry_eligible_drafts(&self) -> Result<Vec<Draft>> {
        let db = self.db.lock().await;
        SqliteDraftRepository::new(db.connection()).list_retry_eligible()
    }

    pub async fn set_draft_state(&self, id: &DraftId, state: &SyncState) -> Result<()> {
        let db = self.db.lock().await;
        SqliteDraftRepository::new(db.connection()).set_state(id, state)
    }

    /// Apply a remote write result. Returns `None` if the draft was deleted.
    pub async fn finish_draft_sync(
        &self,
        id: &DraftId,
        outcome: &DraftOutcome,
        observed_updated_at: i64,
    ) -> Result<Option<Draft>> {
        let db = self.db.lock().await;
        SqliteDraftRepository::new(db.connection()).finish_sync(id, outcome, observed_updated_at)
    }

    pub async fn delete_draft(&self, id: &DraftId) -> Result<()> {
        let db = self.db.lock().await;
        SqliteDraftRepository::new(db.connection()).delete(id)
    }

    /// Queue a new photo, stamping it with the current time.
    pub async fn insert_photo(&self, photo: &NewPhoto) -> Result<Photo> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).insert(photo, now_millis())
    }

    pub async fn get_photo(&self, id: &PhotoId) -> Result<Option<Photo>> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).get(id)
    }

    /// List every photo of a draft in display order.
    pub async fn list_photos(&self, draft_id: &DraftId) -> Result<Vec<Photo>> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).list_for_draft(draft_id)
    }

    pub async fn retry_eligible_photos(&self, draft_id: &DraftId) -> Result<Vec<Photo>> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).list_retry_eligible(draft_id)
    }

    /// Retry-eligible photos whose draft is already synced.
    pub async fn stranded_photos(&self) -> Result<Vec<Photo>> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).list_stranded()
    }

    pub async fn set_photo_state(&self, id: &PhotoId, state: &SyncState) -> Result<()> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).set_state(id, state)
    }

    pub async fn mark_photo_synced(
        &self,
        id: &PhotoId,
        remote_photo_id: &RemoteId,
        remote_path: &str,
        synced_at: i64,
    ) -> Result<()> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).mark_synced(
            id,
            remote_photo_id,
            remote_path,
            synced_at,
        )
    }

    pub async fn delete_photo(&self, id: &PhotoId) -> Result<()> {
        let db = self.db.lock().await;
        SqlitePhotoRepository::new(db.connection()).delete(id)
    }

    /// Count retry-eligible drafts and photos.
    pub async fn pending_counts(&self) -> Result<PendingCounts> {
        let db = self.db.lock().await;
        Ok(PendingCounts {
            drafts: SqliteDraftRepository::new(db.connection()).count_retry_eligible()?,
            photos: SqlitePhotoRepository::new(db.connection()).count_retry_eligible()?,
        })
    }

    pub async fn append_log(&self, entry: &SyncLogEntry) -> Result<()> {
        let db = self.db.lock().await;
        SqliteSyncLogRepository::new(db.connection()).append(entry)
    }

    /// Most recent sync log entries, newest first.
    pub async fn sync_log(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let db = self.db.lock().await;
        SqliteSyncLogRepository::new(db.connection()).list(limit)
    }
}

fn is_corrupted_db_error(error: &Error) -> bool {
    matches!(
        error,
        Error::Database(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == rusqlite::ErrorCode::NotADatabase
    )
}

fn quarantine_db_files(db_path: &Path) -> Result<()> {
    if db_path.exists() {
        let timestamp = now_millis();
        let file_name = db_path
            .file_name()
            .map_or_else(|| "fieldsync.db".into(), |name| name.to_string_lossy());
        let backup_path = db_path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));

        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved unreadable local store from {} to {}",
            db_path.display(),
            backup_path.display()
        );
    }

    for suffix in ["-wal", "-shm"] {
        let mut sidecar = db_path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            std::fs::remove_file(&sidecar)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, Payload, SyncAction, SyncStatus};
    use tempfile::tempdir;

    fn input(id: &str) -> DraftInput {
        DraftInput::new(id.parse().unwrap(), "case-1", Payload::new()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_counts_cover_both_kinds() {
        let store = LocalStore::open_in_memory().await.unwrap();

        let draft = store.save_draft(&input("d1")).await.unwrap();
        store
            .insert_photo(&NewPhoto::new(draft.id.clone(), vec![1; 8], "image/png").unwrap())
            .await
            .unwrap();

        let counts = store.pending_counts().await.unwrap();
        assert_eq!(counts, PendingCounts { drafts: 1, photos: 1 });

        store.delete_draft(&draft.id).await.unwrap();
        assert_eq!(store.pending_counts().await.unwrap().total(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reopen_recovers_interrupted_pass() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("fieldsync.db");

        {
            let store = LocalStore::open_path(&db_path).await.unwrap();
            let draft = store.save_draft(&input("d1")).await.unwrap();
            store
                .set_draft_state(&draft.id, &SyncState::Syncing)
                .await
                .unwrap();
        }

        let store = LocalStore::open_path(&db_path).await.unwrap();
        let draft = store.get_draft(&"d1".parse().unwrap()).await.unwrap().unwrap();
        assert_eq!(draft.status(), SyncStatus::Pending);
        assert_eq!(store.path(), Some(db_path.as_path()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_moves_unreadable_file_aside() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("fieldsync.db");
        std::fs::write(&db_path, vec![b'x'; 4096]).unwrap();

        let store = LocalStore::open_path(&db_path).await.unwrap();
        assert!(store.list_drafts().await.unwrap().is_empty());

        let quarantined = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"));
        assert!(quarantined);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_log_is_listed_newest_first() {
        let store = LocalStore::open_in_memory().await.unwrap();
        for (index, entity) in ["d1", "d2"].iter().enumerate() {
            let entry = SyncLogEntry::new(
                EntityType::Draft,
                *entity,
                SyncAction::Create,
                "r1".parse().unwrap(),
                i64::try_from(index).unwrap(),
            );
            store.append_log(&entry).await.unwrap();
        }

        let log = store.sync_log(10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].entity_id, "d2");
    }
}
