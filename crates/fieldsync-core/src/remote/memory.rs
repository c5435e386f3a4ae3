//! In-memory remote backend for tests and offline demos.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::models::{Payload, RemoteId};

use super::{
    BlobStorage, MetadataApi, PhotoMetadata, RecordApi, RemoteBackend, RemoteError, RemoteResult,
};

/// Remote operation kinds, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Create,
    Update,
    Put,
    Insert,
    Delete,
}

/// One recorded network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create { payload: Payload },
    Update { remote_id: RemoteId, payload: Payload },
    Put { path: String, size_bytes: usize },
    Insert { row: PhotoMetadata },
    Delete { path: String },
}

impl RemoteCall {
    #[must_use]
    pub const fn op(&self) -> RemoteOp {
        match self {
            Self::Create { .. } => RemoteOp::Create,
            Self::Update { .. } => RemoteOp::Update,
            Self::Put { .. } => RemoteOp::Put,
            Self::Insert { .. } => RemoteOp::Insert,
            Self::Delete { .. } => RemoteOp::Delete,
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<RemoteCall>,
    records: BTreeMap<RemoteId, Payload>,
    blobs: BTreeMap<String, (Vec<u8>, String)>,
    photos: BTreeMap<RemoteId, PhotoMetadata>,
    failures: HashMap<RemoteOp, VecDeque<RemoteError>>,
    next_record: u64,
    next_photo: u64,
}

#[derive(Default)]
struct Gate {
    armed: AtomicBool,
    entered: Notify,
    released: Notify,
}

/// Record API, blob storage and metadata API backed by process memory.
///
/// Records get ids `r1`, `r2`, ... and metadata rows `m1`, `m2`, ... in
/// creation order. Every call is recorded, including calls that fail.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    gate: Arc<Gate>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle this backend as all three remote collaborators.
    #[must_use]
    pub fn backend(&self) -> RemoteBackend {
        let shared = Arc::new(self.clone());
        RemoteBackend::new(shared.clone(), shared.clone(), shared)
    }

    /// Make the next call of `op` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Block the next call (of any kind) until [`Self::release`] is called.
    pub fn hold_next_call(&self) {
        self.gate.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until a held call has entered the backend.
    pub async fn wait_for_held_call(&self) {
        self.gate.entered.notified().await;
    }

    /// Let a held call proceed.
    pub fn release(&self) {
        self.gate.released.notify_one();
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    #[must_use]
    pub fn record(&self, remote_id: &RemoteId) -> Option<Payload> {
        self.lock().records.get(remote_id).cloned()
    }

    #[must_use]
    pub fn blob_paths(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    #[must_use]
    pub fn has_blob(&self, path: &str) -> bool {
        self.lock().blobs.contains_key(path)
    }

    #[must_use]
    pub fn photo_rows(&self) -> Vec<PhotoMetadata> {
        self.lock().photos.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, call: RemoteCall) -> RemoteResult<()> {
        if self.gate.armed.swap(false, Ordering::SeqCst) {
            self.gate.entered.notify_one();
            self.gate.released.notified().await;
        }

        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        formatter
            .debug_struct("MemoryBackend")
            .field("calls", &state.calls.len())
            .field("records", &state.records.len())
            .field("blobs", &state.blobs.len())
            .field("photos", &state.photos.len())
            .finish()
    }
}

#[async_trait]
impl RecordApi for MemoryBackend {
    async fn create(&self, payload: &Payload) -> RemoteResult<RemoteId> {
        self.enter(RemoteCall::Create {
            payload: payload.clone(),
        })
        .await?;

        let mut state = self.lock();
        state.next_record += 1;
        let remote_id = format!("r{}", state.next_record)
            .parse::<RemoteId>()
            .map_err(|error| RemoteError::InvalidResponse(error.to_string()))?;
        state.records.insert(remote_id.clone(), payload.clone());
        Ok(remote_id)
    }

    async fn update(&self, remote_id: &RemoteId, payload: &Payload) -> RemoteResult<()> {
        self.enter(RemoteCall::Update {
            remote_id: remote_id.clone(),
            payload: payload.clone(),
        })
        .await?;

        let mut state = self.lock();
        let record = state
            .records
            .get_mut(remote_id)
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))?;
        for (key, value) in payload {
            record.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStorage for MemoryBackend {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> RemoteResult<String> {
        self.enter(RemoteCall::Put {
            path: path.to_string(),
            size_bytes: bytes.len(),
        })
        .await?;

        self.lock()
            .blobs
            .insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(path.to_string())
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        self.enter(RemoteCall::Delete {
            path: path.to_string(),
        })
        .await?;

        self.lock()
            .blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl MetadataApi for MemoryBackend {
    async fn insert(&self, row: &PhotoMetadata) -> RemoteResult<RemoteId> {
        self.enter(RemoteCall::Insert { row: row.clone() }).await?;

        let mut state = self.lock();
        if !state.records.contains_key(&row.record_id) {
            return Err(RemoteError::NotFound(row.record_id.to_string()));
        }
        state.next_photo += 1;
        let remote_photo_id = format!("m{}", state.next_photo)
            .parse::<RemoteId>()
            .map_err(|error| RemoteError::InvalidResponse(error.to_string()))?;
        state.photos.insert(remote_photo_id.clone(), row.clone());
        Ok(remote_photo_id)
    }
}
