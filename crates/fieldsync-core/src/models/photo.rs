//! Photo attachment model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::draft::{Draft, DraftId, RemoteId};
use super::id::client_id;
use super::status::{SyncState, SyncStatus};

client_id!(
    /// Client-generated photo identifier.
    PhotoId,
    "Photo id"
);

/// A captured attachment belonging to exactly one draft.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Unique photo identifier.
    pub id: PhotoId,
    /// Owning draft (local id, not the remote one).
    pub draft_id: DraftId,
    /// Already size-reduced image bytes.
    #[serde(skip_serializing, default)]
    pub blob: Vec<u8>,
    /// Content MIME type.
    pub content_type: String,
    /// Sync state machine position.
    #[serde(flatten)]
    pub state: SyncState,
    /// Business category (e.g. "defect", "overview").
    pub category: String,
    /// Optional grouping key (e.g. room or area).
    pub group_key: Option<String>,
    /// Optional operator caption.
    pub caption: Option<String>,
    /// Display order within the owning draft.
    pub order_index: i64,
    /// Capture timestamp (Unix ms).
    pub created_at: i64,
    /// Successful upload timestamp (Unix ms).
    pub synced_at: Option<i64>,
    /// Metadata row id returned by the remote metadata API.
    pub remote_photo_id: Option<RemoteId>,
    /// Storage path the blob was uploaded to.
    pub remote_path: Option<String>,
}

impl Photo {
    #[must_use]
    pub const fn status(&self) -> SyncStatus {
        self.state.status()
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.state.message()
    }

    /// Attempt `→ syncing` for this photo.
    ///
    /// A photo can only start syncing once its owning draft has a remote id:
    /// the storage path and the metadata row are both keyed by it.
    pub fn begin_sync(&self, owner: &Draft) -> Result<SyncState> {
        if owner.id != self.draft_id {
            return Err(Error::InvalidInput(format!(
                "Photo {} does not belong to draft {}",
                self.id, owner.id
            )));
        }
        if owner.remote_id.is_none() {
            return Err(Error::InvalidTransition(format!(
                "photo {} cannot sync before draft {} has a remote id",
                self.id, owner.id
            )));
        }
        self.state.begin()
    }

    /// Size of the stored blob in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.blob.len()
    }
}

impl fmt::Debug for Photo {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Photo")
            .field("id", &self.id)
            .field("draft_id", &self.draft_id)
            .field("blob", &format_args!("<{} bytes>", self.blob.len()))
            .field("content_type", &self.content_type)
            .field("state", &self.state)
            .field("category", &self.category)
            .field("group_key", &self.group_key)
            .field("order_index", &self.order_index)
            .field("remote_photo_id", &self.remote_photo_id)
            .finish_non_exhaustive()
    }
}

/// A freshly captured photo to queue.
#[derive(Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub id: PhotoId,
    pub draft_id: DraftId,
    pub blob: Vec<u8>,
    pub content_type: String,
    pub category: String,
    pub group_key: Option<String>,
    pub caption: Option<String>,
    pub order_index: i64,
}

impl NewPhoto {
    /// Create a new photo candidate for a draft.
    pub fn new(draft_id: DraftId, blob: Vec<u8>, content_type: impl Into<String>) -> Result<Self> {
        let content_type = content_type.into().trim().to_ascii_lowercase();

        if blob.is_empty() {
            return Err(Error::InvalidInput(
                "Photo blob cannot be empty".to_string(),
            ));
        }
        if content_type.is_empty() {
            return Err(Error::InvalidInput(
                "Photo content_type cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id: PhotoId::new(),
            draft_id,
            blob,
            content_type,
            category: "general".to_string(),
            group_key: None,
            caption: None,
            order_index: 0,
        })
    }

    #[must_use]
    pub fn with_id(mut self, id: PhotoId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into().trim().to_string();
        if !category.is_empty() {
            self.category = category;
        }
        self
    }

    #[must_use]
    pub fn with_group_key(mut self, group_key: impl Into<String>) -> Self {
        self.group_key = crate::util::normalize_text_option(Some(group_key.into()));
        self
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = crate::util::normalize_text_option(Some(caption.into()));
        self
    }

    #[must_use]
    pub const fn with_order_index(mut self, order_index: i64) -> Self {
        self.order_index = order_index;
        self
    }
}

impl fmt::Debug for NewPhoto {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NewPhoto")
            .field("id", &self.id)
            .field("draft_id", &self.draft_id)
            .field("blob", &format_args!("<{} bytes>", self.blob.len()))
            .field("content_type", &self.content_type)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}
