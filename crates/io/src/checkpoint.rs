//! Named checkpoints.
//!
//! A checkpoint is a user-created, durable projection independent of the
//! live history stack. Content never changes after creation; only the name
//! does. Restoring one replaces the document state and rebases the history
//! engine, so the stack starts empty at the restored state.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use uuid::Uuid;

use landforge_engine::document::GridDocument;
use landforge_engine::history::HistoryEngine;
use landforge_engine::tile_id::TileId;

use crate::error::{SessionError, StoreError};
use crate::projection;
use crate::store::{DocumentId, SnapshotInfo, StorageBackend};

pub struct CheckpointStore {
    backend: Arc<dyn StorageBackend>,
}

impl CheckpointStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Write the document's current state as a new named checkpoint.
    pub fn create(
        &self,
        doc_id: &DocumentId,
        name: &str,
        doc: &GridDocument,
    ) -> Result<SnapshotInfo, StoreError> {
        let bytes = projection::encode(&doc.snapshot())?;
        self.backend.create_snapshot(doc_id, name, &bytes)
    }

    /// Checkpoints for a document, in creation order.
    pub fn list(&self, doc_id: &DocumentId) -> Result<Vec<SnapshotInfo>, StoreError> {
        self.backend.list_snapshots(doc_id)
    }

    pub fn rename(&self, id: Uuid, name: &str) -> Result<(), StoreError> {
        self.backend.rename_snapshot(id, name)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.backend.delete_snapshot(id)
    }

    /// Restore a checkpoint: the document takes its state and the history
    /// stack is rebased onto it (index at the working base). Corrupt blobs
    /// propagate without touching the document.
    pub fn restore(
        &self,
        id: Uuid,
        doc: &mut GridDocument,
        history: &mut HistoryEngine,
    ) -> Result<FxHashSet<TileId>, SessionError> {
        let bytes = self.backend.load_snapshot(id)?;
        let state = projection::decode(&bytes)?;
        Ok(history.rebase(doc, state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use landforge_engine::tile::{Cell, CellCoord, CellEdit};
    use landforge_engine::tile_id::TileId;

    fn tile_id(x: i32, y: i32) -> TileId {
        TileId::new(x, y).unwrap()
    }

    fn set_height(doc: &mut GridDocument, history: &mut HistoryEngine, height: u8) {
        let edit = CellEdit::new(
            CellCoord::new(4, 4).unwrap(),
            Cell::new(height, 0, false),
        );
        let cmd = landforge_engine::command::EditCommand::capture(
            doc,
            tile_id(5, 5),
            &[edit],
            "edit",
        )
        .unwrap();
        history.execute(doc, cmd).unwrap();
    }

    #[test]
    fn test_restore_rebases_history() {
        let backend = Arc::new(MemoryStore::new());
        let checkpoints = CheckpointStore::new(backend);
        let doc_id = DocumentId::from("dereth");

        let mut doc = GridDocument::new();
        doc.materialize(tile_id(5, 5));
        let mut history = HistoryEngine::new(doc.snapshot());

        set_height(&mut doc, &mut history, 10);
        let saved_state = doc.snapshot();
        let info = checkpoints.create(&doc_id, "before ravine", &doc).unwrap();

        for h in [20, 30, 40] {
            set_height(&mut doc, &mut history, h);
        }
        assert_eq!(history.len(), 4);

        checkpoints.restore(info.id, &mut doc, &mut history).unwrap();
        assert_eq!(history.index(), None);
        assert_eq!(history.len(), 0);
        assert_eq!(doc.snapshot(), saved_state);
    }

    #[test]
    fn test_restore_missing_checkpoint() {
        let backend = Arc::new(MemoryStore::new());
        let checkpoints = CheckpointStore::new(backend);

        let mut doc = GridDocument::new();
        let mut history = HistoryEngine::new(doc.snapshot());
        let err = checkpoints
            .restore(Uuid::new_v4(), &mut doc, &mut history)
            .unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::NotFound)));
    }

    #[test]
    fn test_restore_corrupt_checkpoint_leaves_document() {
        let backend = Arc::new(MemoryStore::new());
        let doc_id = DocumentId::from("dereth");
        let info = backend.create_snapshot(&doc_id, "bad", b"not a projection").unwrap();
        let checkpoints = CheckpointStore::new(backend);

        let mut doc = GridDocument::new();
        doc.materialize(tile_id(1, 1));
        let before = doc.snapshot();
        let mut history = HistoryEngine::new(before.clone());

        let err = checkpoints.restore(info.id, &mut doc, &mut history).unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::Corrupt(_))));
        assert_eq!(doc.snapshot(), before);
    }
}
