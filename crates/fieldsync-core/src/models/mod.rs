//! Data models for fieldsync

mod draft;
mod id;
mod photo;
mod status;
mod sync_log;

pub use draft::{Draft, DraftId, DraftInput, Payload, RemoteId};
pub use photo::{NewPhoto, Photo, PhotoId};
pub use status::{SyncState, SyncStatus};
pub use sync_log::{EntityType, SyncAction, SyncLogEntry};
