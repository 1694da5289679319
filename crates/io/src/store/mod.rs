//! Storage backends for projections and named snapshots.
//!
//! The backend trait is the seam between the editing core and durable
//! storage: the coordinator, checkpoint store, and session all talk to
//! `dyn StorageBackend` and never to a concrete database.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Stable identity of a document within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Metadata for one named snapshot. Content is immutable once created; only
/// the name may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for projections and named snapshots.
///
/// Implementations must be callable from multiple flush threads at once.
pub trait StorageBackend: Send + Sync {
    /// Read the current projection for a document. Ok(None) = never saved.
    fn load_projection(&self, doc: &DocumentId) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite the current projection for a document.
    fn save_projection(&self, doc: &DocumentId, bytes: &[u8]) -> Result<(), StoreError>;

    /// Snapshots for a document, in creation order.
    fn list_snapshots(&self, doc: &DocumentId) -> Result<Vec<SnapshotInfo>, StoreError>;

    /// Read a snapshot's content.
    fn load_snapshot(&self, id: Uuid) -> Result<Vec<u8>, StoreError>;

    fn create_snapshot(
        &self,
        doc: &DocumentId,
        name: &str,
        bytes: &[u8],
    ) -> Result<SnapshotInfo, StoreError>;

    fn rename_snapshot(&self, id: Uuid, name: &str) -> Result<(), StoreError>;

    fn delete_snapshot(&self, id: Uuid) -> Result<(), StoreError>;
}
