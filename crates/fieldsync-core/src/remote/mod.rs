//! Remote backend ports and adapters.
//!
//! The queue manager only talks to the three traits below; concrete
//! transports (HTTP, Cloudflare R2, in-memory) live in the submodules.

mod http;
mod memory;
mod r2;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Payload, Photo, PhotoId, RemoteId};

pub use http::{HttpMetadataApi, HttpRecordApi};
pub use memory::{MemoryBackend, RemoteCall, RemoteOp};
pub use r2::{R2BlobStorage, R2Config};

/// Failure reported by a remote collaborator.
///
/// These never escape a sync pass; the queue manager records them on the
/// entity that triggered them.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Structured record CRUD.
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// Create a record; the returned id becomes the draft's remote id.
    async fn create(&self, payload: &Payload) -> RemoteResult<RemoteId>;

    /// Update an existing record. Identity fields are never part of `payload`.
    async fn update(&self, remote_id: &RemoteId, payload: &Payload) -> RemoteResult<()>;
}

/// Binary object storage.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` at `path`, returning the path actually written.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> RemoteResult<String>;

    /// Remove the object at `path`.
    async fn delete(&self, path: &str) -> RemoteResult<()>;
}

/// Photo metadata rows.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn insert(&self, row: &PhotoMetadata) -> RemoteResult<RemoteId>;
}

/// Metadata row linking an uploaded blob to its remote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoMetadata {
    pub record_id: RemoteId,
    pub storage_path: String,
    pub category: String,
    pub group_key: Option<String>,
    pub caption: Option<String>,
    pub order_index: i64,
    pub client_photo_id: PhotoId,
    pub content_type: String,
    pub size_bytes: usize,
}

impl PhotoMetadata {
    #[must_use]
    pub fn for_photo(record_id: &RemoteId, storage_path: &str, photo: &Photo) -> Self {
        Self {
            record_id: record_id.clone(),
            storage_path: storage_path.to_string(),
            category: photo.category.clone(),
            group_key: photo.group_key.clone(),
            caption: photo.caption.clone(),
            order_index: photo.order_index,
            client_photo_id: photo.id.clone(),
            content_type: photo.content_type.clone(),
            size_bytes: photo.size_bytes(),
        }
    }
}

/// The three collaborators a sync pass writes to.
#[derive(Clone)]
pub struct RemoteBackend {
    pub records: Arc<dyn RecordApi>,
    pub blobs: Arc<dyn BlobStorage>,
    pub metadata: Arc<dyn MetadataApi>,
}

impl RemoteBackend {
    pub fn new(
        records: Arc<dyn RecordApi>,
        blobs: Arc<dyn BlobStorage>,
        metadata: Arc<dyn MetadataApi>,
    ) -> Self {
        Self {
            records,
            blobs,
            metadata,
        }
    }
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("RemoteBackend").finish_non_exhaustive()
    }
}
