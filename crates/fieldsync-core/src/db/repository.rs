//! Draft and photo repository implementation
//!
//! Every write is a single SQL statement, so each entity upsert is atomic and
//! no partially-written row is ever observable.

use crate::error::{Error, Result};
use crate::models::{
    Draft, DraftId, DraftInput, NewPhoto, Photo, PhotoId, RemoteId, SyncState, SyncStatus,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

const DRAFT_COLUMNS: &str = "d.id, d.parent_id, d.payload, d.status, d.error_message, \
     d.created_at, d.updated_at, d.synced_at, d.remote_id";

const PHOTO_COLUMNS: &str = "p.id, p.draft_id, p.blob, p.content_type, p.status, \
     p.error_message, p.category, p.group_key, p.caption, p.order_index, p.created_at, \
     p.synced_at, p.remote_photo_id, p.remote_path";

/// Outcome of a remote draft write, applied by [`DraftRepository::finish_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftOutcome {
    Synced { remote_id: RemoteId, synced_at: i64 },
    Failed { message: String },
}

/// Trait for draft storage operations
pub trait DraftRepository {
    /// Insert or update a draft; always leaves it `pending`
    fn upsert(&self, input: &DraftInput, now: i64) -> Result<Draft>;

    /// Get a draft by ID
    fn get(&self, id: &DraftId) -> Result<Option<Draft>>;

    /// List all drafts, most recently edited first
    fn list(&self) -> Result<Vec<Draft>>;

    /// List `pending` and `error` drafts, oldest edit first
    fn list_retry_eligible(&self) -> Result<Vec<Draft>>;

    /// Count `pending` and `error` drafts
    fn count_retry_eligible(&self) -> Result<usize>;

    /// Overwrite the sync state of a draft
    fn set_state(&self, id: &DraftId, state: &SyncState) -> Result<()>;

    /// Apply the result of a remote write.
    ///
    /// `observed_updated_at` is the `updated_at` read when the pass started.
    /// If the draft was edited since, it is left `pending` for the next pass;
    /// a newly assigned remote id is persisted either way.
    fn finish_sync(
        &self,
        id: &DraftId,
        outcome: &DraftOutcome,
        observed_updated_at: i64,
    ) -> Result<Option<Draft>>;

    /// Delete a draft and, by cascade, its photos
    fn delete(&self, id: &DraftId) -> Result<()>;

    /// Return drafts left `syncing` by an interrupted pass to `pending`
    fn reset_interrupted(&self) -> Result<usize>;
}

/// Trait for photo storage operations
pub trait PhotoRepository {
    /// Insert a new `pending` photo
    fn insert(&self, photo: &NewPhoto, now: i64) -> Result<Photo>;

    /// Get a photo by ID
    fn get(&self, id: &PhotoId) -> Result<Option<Photo>>;

    /// List every photo of a draft in display order
    fn list_for_draft(&self, draft_id: &DraftId) -> Result<Vec<Photo>>;

    /// List `pending` and `error` photos of a draft in display order
    fn list_retry_eligible(&self, draft_id: &DraftId) -> Result<Vec<Photo>>;

    /// List `pending` and `error` photos whose draft is already synced
    fn list_stranded(&self) -> Result<Vec<Photo>>;

    /// Count `pending` and `error` photos
    fn count_retry_eligible(&self) -> Result<usize>;

    /// Overwrite the sync state of a photo
    fn set_state(&self, id: &PhotoId, state: &SyncState) -> Result<()>;

    /// Mark a photo synced with its remote metadata id and storage path
    fn mark_synced(
        &self,
        id: &PhotoId,
        remote_photo_id: &RemoteId,
        remote_path: &str,
        synced_at: i64,
    ) -> Result<()>;

    /// Delete a single photo
    fn delete(&self, id: &PhotoId) -> Result<()>;

    /// Return photos left `syncing` by an interrupted pass to `pending`
    fn reset_interrupted(&self) -> Result<usize>;
}

/// `SQLite` implementation of `DraftRepository`
pub struct SqliteDraftRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDraftRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Draft>> {
        let mut stmt = self.conn.prepare(sql)?;
        let drafts = stmt
            .query_map(params, parse_draft)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(drafts)
    }
}

/// `SQLite` implementation of `PhotoRepository`
pub struct SqlitePhotoRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePhotoRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(sql)?;
        let photos = stmt
            .query_map(params, parse_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }
}

/// Parse a draft from a database row
fn parse_draft(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draft> {
    let id: String = row.get(0)?;
    let payload: String = row.get(2)?;
    let status: String = row.get(3)?;
    let remote_id: Option<String> = row.get(8)?;

    Ok(Draft {
        id: parse_column(0, &id)?,
        parent_id: row.get(1)?,
        payload: serde_json::from_str(&payload)
            .map_err(|error| conversion_error(2, Error::Serialization(error)))?,
        state: SyncState::from_columns(parse_column::<SyncStatus>(3, &status)?, row.get(4)?),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        synced_at: row.get(7)?,
        remote_id: remote_id
            .map(|value| parse_column(8, &value))
            .transpose()?,
    })
}

/// Parse a photo from a database row
fn parse_photo(row: &rusqlite::Row<'_>) -> rusqlite::Result<Photo> {
    let id: String = row.get(0)?;
    let draft_id: String = row.get(1)?;
    let status: String = row.get(4)?;
    let remote_photo_id: Option<String> = row.get(12)?;

    Ok(Photo {
        id: parse_column(0, &id)?,
        draft_id: parse_column(1, &draft_id)?,
        blob: row.get(2)?,
        content_type: row.get(3)?,
        state: SyncState::from_columns(parse_column::<SyncStatus>(4, &status)?, row.get(5)?),
        category: row.get(6)?,
        group_key: row.get(7)?,
        caption: row.get(8)?,
        order_index: row.get(9)?,
        created_at: row.get(10)?,
        synced_at: row.get(11)?,
        remote_photo_id: remote_photo_id
            .map(|value| parse_column(12, &value))
            .transpose()?,
        remote_path: row.get(13)?,
    })
}

fn count(conn: &Connection, sql: &str) -> Result<usize> {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
}

impl DraftRepository for SqliteDraftRepository<'_> {
    fn upsert(&self, input: &DraftInput, now: i64) -> Result<Draft> {
        let payload = serde_json::to_string(&input.payload)?;

        // `updated_at` strictly increases on every edit so an in-flight pass can
        // tell that the row changed underneath it.
        self.conn.execute(
            "INSERT INTO drafts (id, parent_id, payload, status, error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', NULL, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET
                parent_id = excluded.parent_id,
                payload = excluded.payload,
                status = 'pending',
                error_message = NULL,
                updated_at = MAX(excluded.updated_at, drafts.updated_at + 1)",
            params![input.id.as_str(), input.parent_id, payload, now],
        )?;

        self.get(&input.id)?.ok_or_else(|| Error::NotFound(input.id.to_string()))
    }

    fn get(&self, id: &DraftId) -> Result<Option<Draft>> {
        let draft = self
            .conn
            .query_row(
                &format!("SELECT {DRAFT_COLUMNS} FROM drafts d WHERE d.id = ?"),
                params![id.as_str()],
                parse_draft,
            )
            .optional()?;
        Ok(draft)
    }

    fn list(&self) -> Result<Vec<Draft>> {
        self.query(
            &format!("SELECT {DRAFT_COLUMNS} FROM drafts d ORDER BY d.updated_at DESC, d.id"),
            [],
        )
    }

    fn list_retry_eligible(&self) -> Result<Vec<Draft>> {
        self.query(
            &format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts d
                 WHERE d.status IN ('pending', 'error')
                 ORDER BY d.updated_at ASC, d.id"
            ),
            [],
        )
    }

    fn count_retry_eligible(&self) -> Result<usize> {
        count(self.conn, "SELECT COUNT(*) FROM drafts WHERE status IN ('pending', 'error')")
    }

    fn set_state(&self, id: &DraftId, state: &SyncState) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE drafts SET status = ?, error_message = ? WHERE id = ?",
            params![state.status().as_str(), state.message(), id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn finish_sync(
        &self,
        id: &DraftId,
        outcome: &DraftOutcome,
        observed_updated_at: i64,
    ) -> Result<Option<Draft>> {
        match outcome {
            DraftOutcome::Synced {
                remote_id,
                synced_at,
            } => {
                self.conn.execute(
                    "UPDATE drafts SET
                        remote_id = COALESCE(remote_id, ?1),
                        synced_at = ?2,
                        status = CASE WHEN updated_at = ?3 THEN 'synced' ELSE 'pending' END,
                        error_message = NULL
                     WHERE id = ?4",
                    params![remote_id.as_str(), synced_at, observed_updated_at, id.as_str()],
                )?;
            }
            DraftOutcome::Failed { message } => {
                self.conn.execute(
                    "UPDATE drafts SET
                        status = CASE WHEN updated_at = ?2 THEN 'error' ELSE 'pending' END,
                        error_message = CASE WHEN updated_at = ?2 THEN ?1 ELSE NULL END
                     WHERE id = ?3",
                    params![message, observed_updated_at, id.as_str()],
                )?;
            }
        }

        self.get(id)
    }

    fn delete(&self, id: &DraftId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM drafts WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn reset_interrupted(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE drafts SET status = 'pending', error_message = NULL WHERE status = 'syncing'",
            [],
        )?;
        Ok(rows)
    }
}

impl PhotoRepository for SqlitePhotoRepository<'_> {
    fn insert(&self, photo: &NewPhoto, now: i64) -> Result<Photo> {
        let owner_exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM drafts WHERE id = ?)",
            params![photo.draft_id.as_str()],
            |row| row.get(0),
        )?;
        if !owner_exists {
            return Err(Error::NotFound(photo.draft_id.to_string()));
        }

        self.conn.execute(
            "INSERT INTO photos (
                id, draft_id, blob, content_type, status, error_message, category,
                group_key, caption, order_index, created_at
             ) VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, ?6, ?7, ?8, ?9)",
            params![
                photo.id.as_str(),
                photo.draft_id.as_str(),
                photo.blob,
                photo.content_type,
                photo.category,
                photo.group_key,
                photo.caption,
                photo.order_index,
                now
            ],
        )?;

        self.get(&photo.id)?.ok_or_else(|| Error::NotFound(photo.id.to_string()))
    }

    fn get(&self, id: &PhotoId) -> Result<Option<Photo>> {
        let photo = self
            .conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.id = ?"),
                params![id.as_str()],
                parse_photo,
            )
            .optional()?;
        Ok(photo)
    }

    fn list_for_draft(&self, draft_id: &DraftId) -> Result<Vec<Photo>> {
        self.query(
            &format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p
                 WHERE p.draft_id = ?
                 ORDER BY p.order_index, p.created_at, p.id"
            ),
            params![draft_id.as_str()],
        )
    }

    fn list_retry_eligible(&self, draft_id: &DraftId) -> Result<Vec<Photo>> {
        self.query(
            &format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p
                 WHERE p.draft_id = ? AND p.status IN ('pending', 'error')
                 ORDER BY p.order_index, p.created_at, p.id"
            ),
            params![draft_id.as_str()],
        )
    }

    fn list_stranded(&self) -> Result<Vec<Photo>> {
        self.query(
            &format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p
                 JOIN drafts d ON d.id = p.draft_id
                 WHERE p.status IN ('pending', 'error')
                   AND d.status = 'synced'
                   AND d.remote_id IS NOT NULL
                 ORDER BY p.draft_id, p.order_index, p.created_at, p.id"
            ),
            [],
        )
    }

    fn count_retry_eligible(&self) -> Result<usize> {
        count(self.conn, "SELECT COUNT(*) FROM photos WHERE status IN ('pending', 'error')")
    }

    fn set_state(&self, id: &PhotoId, state: &SyncState) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE photos SET status = ?, error_message = ? WHERE id = ?",
            params![state.status().as_str(), state.message(), id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn mark_synced(
        &self,
        id: &PhotoId,
        remote_photo_id: &RemoteId,
        remote_path: &str,
        synced_at: i64,
    ) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE photos SET
                status = 'synced',
                error_message = NULL,
                synced_at = ?1,
                remote_photo_id = ?2,
                remote_path = ?3
             WHERE id = ?4",
            params![synced_at, remote_photo_id.as_str(), remote_path, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete(&self, id: &PhotoId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM photos WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn reset_interrupted(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE photos SET status = 'pending', error_message = NULL WHERE status = 'syncing'",
            [],
        )?;
        Ok(rows)
    }
}

fn parse_column<T>(index: usize, value: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    value.parse().map_err(|error| conversion_error(index, error))
}

fn conversion_error(index: usize, error: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}
