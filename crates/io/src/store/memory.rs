//! In-memory store.
//!
//! Backs tests and scratch sessions. Counts `save_projection` calls per
//! document so coalescing behavior can be asserted, and has knobs to
//! simulate slow or failing storage.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{DocumentId, SnapshotInfo, StorageBackend};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    projections: HashMap<DocumentId, Vec<u8>>,
    snapshots: Vec<StoredSnapshot>,
    save_calls: HashMap<DocumentId, usize>,
    fail_saves: bool,
    save_delay: Option<Duration>,
}

struct StoredSnapshot {
    info: SnapshotInfo,
    doc: DocumentId,
    bytes: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `save_projection` calls seen for a document.
    pub fn save_calls(&self, doc: &DocumentId) -> usize {
        self.lock().save_calls.get(doc).copied().unwrap_or(0)
    }

    /// The last saved projection bytes for a document.
    pub fn saved_projection(&self, doc: &DocumentId) -> Option<Vec<u8>> {
        self.lock().projections.get(doc).cloned()
    }

    /// Make every subsequent save fail with a backend error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Add latency to every save (simulates a slow disk or remote store).
    pub fn set_save_delay(&self, delay: Option<Duration>) {
        self.lock().save_delay = delay;
    }
}

impl StorageBackend for MemoryStore {
    fn load_projection(&self, doc: &DocumentId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().projections.get(doc).cloned())
    }

    fn save_projection(&self, doc: &DocumentId, bytes: &[u8]) -> Result<(), StoreError> {
        let delay = {
            let mut inner = self.lock();
            *inner.save_calls.entry(doc.clone()).or_insert(0) += 1;
            if inner.fail_saves {
                return Err(StoreError::Backend("simulated save failure".into()));
            }
            inner.save_delay
        };
        // Sleep outside the lock so parallel saves stay parallel
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.lock().projections.insert(doc.clone(), bytes.to_vec());
        Ok(())
    }

    fn list_snapshots(&self, doc: &DocumentId) -> Result<Vec<SnapshotInfo>, StoreError> {
        Ok(self
            .lock()
            .snapshots
            .iter()
            .filter(|s| &s.doc == doc)
            .map(|s| s.info.clone())
            .collect())
    }

    fn load_snapshot(&self, id: Uuid) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .snapshots
            .iter()
            .find(|s| s.info.id == id)
            .map(|s| s.bytes.clone())
            .ok_or(StoreError::NotFound)
    }

    fn create_snapshot(
        &self,
        doc: &DocumentId,
        name: &str,
        bytes: &[u8],
    ) -> Result<SnapshotInfo, StoreError> {
        let info = SnapshotInfo {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.lock().snapshots.push(StoredSnapshot {
            info: info.clone(),
            doc: doc.clone(),
            bytes: bytes.to_vec(),
        });
        Ok(info)
    }

    fn rename_snapshot(&self, id: Uuid, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let snapshot = inner
            .snapshots
            .iter_mut()
            .find(|s| s.info.id == id)
            .ok_or(StoreError::NotFound)?;
        snapshot.info.name = name.to_string();
        Ok(())
    }

    fn delete_snapshot(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let before = inner.snapshots.len();
        inner.snapshots.retain(|s| s.info.id != id);
        if inner.snapshots.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
