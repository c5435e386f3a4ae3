//! Append-only sync log repository

use crate::error::Result;
use crate::models::SyncLogEntry;
use rusqlite::types::Type;
use rusqlite::{params, Connection};

/// Trait for sync log storage operations
pub trait SyncLogRepository {
    /// Append a log entry. Entries are never mutated afterwards.
    fn append(&self, entry: &SyncLogEntry) -> Result<()>;

    /// List the most recent entries, newest first
    fn list(&self, limit: usize) -> Result<Vec<SyncLogEntry>>;
}

/// `SQLite` implementation of `SyncLogRepository`
pub struct SqliteSyncLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncLogRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncLogRepository for SqliteSyncLogRepository<'_> {
    fn append(&self, entry: &SyncLogEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_log (id, entity_type, entity_id, action, synced_at, remote_id)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.id,
                entry.entity_type.as_str(),
                entry.entity_id,
                entry.action.as_str(),
                entry.synced_at,
                entry.remote_id.as_str()
            ],
        )?;
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, action, synced_at, remote_id
             FROM sync_log
             ORDER BY synced_at DESC, id DESC
             LIMIT ?",
        )?;

        let entries = stmt
            .query_map(params![limit], parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncLogEntry> {
    let entity_type: String = row.get(1)?;
    let action: String = row.get(3)?;
    let remote_id: String = row.get(5)?;

    Ok(SyncLogEntry {
        id: row.get(0)?,
        entity_type: entity_type.parse().map_err(|error| invalid_text(1, error))?,
        entity_id: row.get(2)?,
        action: action.parse().map_err(|error| invalid_text(3, error))?,
        synced_at: row.get(4)?,
        remote_id: remote_id.parse().map_err(|error| invalid_text(5, error))?,
    })
}

fn invalid_text(index: usize, error: crate::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{EntityType, SyncAction};

    #[test]
    fn test_append_and_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncLogRepository::new(db.connection());

        let remote = "r1".parse().unwrap();
        let first = SyncLogEntry::new(EntityType::Draft, "d1", SyncAction::Create, remote, 10);
        let second = SyncLogEntry::new(
            EntityType::Photo,
            "p1",
            SyncAction::Create,
            "m1".parse().unwrap(),
            20,
        );
        repo.append(&first).unwrap();
        repo.append(&second).unwrap();

        let entries = repo.list(10).unwrap();
        assert_eq!(entries, vec![second, first]);
        assert_eq!(repo.list(1).unwrap().len(), 1);
    }
}
