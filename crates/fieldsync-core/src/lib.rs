//! fieldsync-core - offline-first sync engine for field drafts and photos
//!
//! Captured drafts and photos land in a local `SQLite` queue with no network
//! involved. A [`QueueManager`] pass later reconciles the queue with a remote
//! backend: draft text first, then the photos that depend on the remote id
//! the text sync produced.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod network;
pub mod queue;
pub mod remote;
pub mod scheduler;
pub mod services;
pub mod status;
mod util;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use models::{Draft, DraftId, DraftInput, NewPhoto, Payload, Photo, PhotoId, RemoteId};
pub use network::{ConnectivityProbe, HttpProbe, NetworkMonitor, NetworkState, StaticProbe};
pub use queue::{BatchNote, QueueManager, SyncFailure, SyncSummary};
pub use remote::{RemoteBackend, RemoteError};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use services::LocalStore;
pub use status::{AggregateStatus, PendingCounts};
