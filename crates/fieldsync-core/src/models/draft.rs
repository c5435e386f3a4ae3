//! Draft model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::id::{client_id, string_id};
use super::status::{SyncState, SyncStatus};

/// Opaque field map captured by the operator. The engine never validates it.
pub type Payload = serde_json::Map<String, serde_json::Value>;

client_id!(
    /// Client-generated draft identifier, immutable once created.
    DraftId,
    "Draft id"
);

string_id!(
    /// Server-assigned identifier returned by a remote create.
    RemoteId,
    "Remote id"
);

/// A locally captured structured record awaiting reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Client-generated identifier
    pub id: DraftId,
    /// Stable remote-domain reference (e.g. the owning case)
    pub parent_id: String,
    /// Captured fields
    pub payload: Payload,
    /// Sync state machine position
    #[serde(flatten)]
    pub state: SyncState,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local edit timestamp (Unix ms)
    pub updated_at: i64,
    /// Last successful sync timestamp (Unix ms)
    pub synced_at: Option<i64>,
    /// Remote identifier; written once by the first successful create
    pub remote_id: Option<RemoteId>,
}

impl Draft {
    #[must_use]
    pub const fn status(&self) -> SyncStatus {
        self.state.status()
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.state.message()
    }

    /// Whether the next pass should pick this draft up.
    #[must_use]
    pub const fn is_retry_eligible(&self) -> bool {
        self.status().is_retry_eligible()
    }
}

/// Operator-supplied content for [`crate::QueueManager::save_draft`].
#[derive(Debug, Clone, PartialEq)]
pub struct DraftInput {
    pub id: DraftId,
    pub parent_id: String,
    pub payload: Payload,
}

impl DraftInput {
    /// Build a draft candidate, rejecting an empty parent reference.
    pub fn new(id: DraftId, parent_id: impl Into<String>, payload: Payload) -> Result<Self> {
        let parent_id = parent_id.into().trim().to_string();
        if parent_id.is_empty() {
            return Err(Error::InvalidInput(
                "Draft parent_id cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id,
            parent_id,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_id_unique() {
        let id1 = DraftId::new();
        let id2 = DraftId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn draft_id_accepts_client_strings() {
        let id: DraftId = " d1 ".parse().unwrap();
        assert_eq!(id.as_str(), "d1");
        assert!("   ".parse::<DraftId>().is_err());
    }

    #[test]
    fn draft_input_requires_parent() {
        assert!(DraftInput::new(DraftId::new(), "  ", Payload::new()).is_err());

        let input = DraftInput::new(DraftId::new(), " case-7 ", Payload::new()).unwrap();
        assert_eq!(input.parent_id, "case-7");
    }

    #[test]
    fn draft_serializes_state_inline() {
        let draft = Draft {
            id: "d1".parse().unwrap(),
            parent_id: "case-1".to_string(),
            payload: Payload::new(),
            state: SyncState::Error {
                message: "HTTP 500".to_string(),
            },
            created_at: 1,
            updated_at: 2,
            synced_at: None,
            remote_id: None,
        };

        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "HTTP 500");
        assert_eq!(json["id"], "d1");
    }
}
