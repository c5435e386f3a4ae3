//! Append-only sync audit log model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::draft::RemoteId;

/// Kind of entity a log entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Draft,
    Photo,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Photo => "photo",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "photo" => Ok(Self::Photo),
            other => Err(Error::InvalidInput(format!("Unknown entity type: {other}"))),
        }
    }
}

/// Remote write performed for the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Update,
}

impl SyncAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            other => Err(Error::InvalidInput(format!("Unknown sync action: {other}"))),
        }
    }
}

/// Record of one successful remote write. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Log entry identifier (UUID v7)
    pub id: String,
    /// Kind of entity synced
    pub entity_type: EntityType,
    /// Local id of the synced entity
    pub entity_id: String,
    /// Remote write performed
    pub action: SyncAction,
    /// Completion timestamp (Unix ms)
    pub synced_at: i64,
    /// Remote identifier the write produced or targeted
    pub remote_id: RemoteId,
}

impl SyncLogEntry {
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        action: SyncAction,
        remote_id: RemoteId,
        synced_at: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            entity_type,
            entity_id: entity_id.into(),
            action,
            synced_at,
            remote_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_their_own_text() {
        assert_eq!("draft".parse::<EntityType>().unwrap(), EntityType::Draft);
        assert_eq!("photo".parse::<EntityType>().unwrap(), EntityType::Photo);
        assert_eq!("update".parse::<SyncAction>().unwrap(), SyncAction::Update);
        assert!("upsert".parse::<SyncAction>().is_err());
    }

    #[test]
    fn new_entries_get_distinct_ids() {
        let remote: RemoteId = "r1".parse().unwrap();
        let a = SyncLogEntry::new(EntityType::Draft, "d1", SyncAction::Create, remote.clone(), 1);
        let b = SyncLogEntry::new(EntityType::Draft, "d1", SyncAction::Update, remote, 2);
        assert_ne!(a.id, b.id);
    }
}
