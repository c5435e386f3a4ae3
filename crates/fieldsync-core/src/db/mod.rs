//! Local durable store

mod connection;
mod migrations;
mod repository;
mod sync_log_repository;

pub use connection::Database;
pub use repository::{
    DraftOutcome, DraftRepository, PhotoRepository, SqliteDraftRepository, SqlitePhotoRepository,
};
pub use sync_log_repository::{SqliteSyncLogRepository, SyncLogRepository};
