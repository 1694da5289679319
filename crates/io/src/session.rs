//! Editor session: the tool-layer entry point.
//!
//! Ties a document, its history engine, the checkpoint store, and the
//! persistence coordinator together. Every mutating call returns the
//! modified-tile set for re-render and hands the coordinator a snapshot
//! taken synchronously, so background flushes never observe a half-applied
//! edit. History navigation never waits on storage.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use uuid::Uuid;

use landforge_config::Settings;
use landforge_engine::command::EditCommand;
use landforge_engine::document::GridDocument;
use landforge_engine::history::{HistoryEngine, HistoryItem};
use landforge_engine::tile_id::TileId;

use crate::checkpoint::CheckpointStore;
use crate::coordinator::{FlushSettings, PersistenceCoordinator};
use crate::error::SessionError;
use crate::projection;
use crate::store::{DocumentId, SnapshotInfo, StorageBackend};

pub struct EditorSession {
    doc_id: DocumentId,
    document: GridDocument,
    history: HistoryEngine,
    checkpoints: CheckpointStore,
    coordinator: PersistenceCoordinator,
}

impl EditorSession {
    /// Open a document from storage, or start a blank one if it was never
    /// saved. A corrupt stored projection is an error, not a silent reset.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        settings: &Settings,
        doc_id: DocumentId,
    ) -> Result<Self, SessionError> {
        let document = match backend.load_projection(&doc_id)? {
            Some(bytes) => GridDocument::from_state(projection::decode(&bytes)?)?,
            None => GridDocument::new(),
        };

        let history =
            HistoryEngine::with_capacity(document.snapshot(), settings.history.capacity);
        let coordinator = PersistenceCoordinator::new(
            Arc::clone(&backend),
            FlushSettings::from_config(&settings.autosave),
        );
        let checkpoints = CheckpointStore::new(backend);

        Ok(Self { doc_id, document, history, checkpoints, coordinator })
    }

    pub fn doc_id(&self) -> &DocumentId {
        &self.doc_id
    }

    pub fn document(&self) -> &GridDocument {
        &self.document
    }

    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    pub fn coordinator(&self) -> &PersistenceCoordinator {
        &self.coordinator
    }

    /// Create a blank tile to edit. Returns true if one was created.
    pub fn materialize_tile(&mut self, id: TileId) -> bool {
        let created = self.document.materialize(id);
        if created {
            self.persist();
        }
        created
    }

    /// Execute a command through history.
    pub fn submit(&mut self, command: EditCommand) -> Result<FxHashSet<TileId>, SessionError> {
        let tiles = self.history.execute(&mut self.document, command)?;
        self.persist();
        Ok(tiles)
    }

    pub fn undo(&mut self) -> Result<FxHashSet<TileId>, SessionError> {
        let tiles = self.history.undo(&mut self.document)?;
        self.persist();
        Ok(tiles)
    }

    pub fn redo(&mut self) -> Result<FxHashSet<TileId>, SessionError> {
        let tiles = self.history.redo(&mut self.document)?;
        self.persist();
        Ok(tiles)
    }

    pub fn jump_to(&mut self, target: usize) -> Result<FxHashSet<TileId>, SessionError> {
        let tiles = self.history.jump_to(&mut self.document, target)?;
        self.persist();
        Ok(tiles)
    }

    pub fn delete_from(&mut self, from: usize) -> Result<FxHashSet<TileId>, SessionError> {
        let tiles = self.history.delete_from(&mut self.document, from)?;
        self.persist();
        Ok(tiles)
    }

    pub fn reset_to_base(&mut self) -> Result<FxHashSet<TileId>, SessionError> {
        let tiles = self.history.reset_to_base(&mut self.document)?;
        self.persist();
        Ok(tiles)
    }

    /// History rows for display (pull-based refresh after every mutation).
    pub fn history_items(&self) -> Vec<HistoryItem> {
        self.history.items()
    }

    // ── Checkpoints ─────────────────────────────────────────────────

    /// Checkpoint the current state under a name. Written synchronously —
    /// an explicit user action, not part of the autosave stream.
    pub fn create_checkpoint(&self, name: &str) -> Result<SnapshotInfo, SessionError> {
        Ok(self.checkpoints.create(&self.doc_id, name, &self.document)?)
    }

    pub fn list_checkpoints(&self) -> Result<Vec<SnapshotInfo>, SessionError> {
        Ok(self.checkpoints.list(&self.doc_id)?)
    }

    pub fn rename_checkpoint(&self, id: Uuid, name: &str) -> Result<(), SessionError> {
        Ok(self.checkpoints.rename(id, name)?)
    }

    pub fn delete_checkpoint(&self, id: Uuid) -> Result<(), SessionError> {
        Ok(self.checkpoints.delete(id)?)
    }

    /// Restore a checkpoint: document takes its state, history rebases onto
    /// it (index at the working base).
    pub fn restore_checkpoint(&mut self, id: Uuid) -> Result<FxHashSet<TileId>, SessionError> {
        let tiles = self.checkpoints.restore(id, &mut self.document, &mut self.history)?;
        self.persist();
        Ok(tiles)
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Force the pending flush due now (e.g. before closing a world).
    pub fn flush(&self) {
        self.coordinator.flush_now(&self.doc_id);
    }

    /// Flush everything and wait for quiescence; false on timeout.
    pub fn drain(&self, timeout: std::time::Duration) -> bool {
        self.coordinator.drain(timeout)
    }

    /// Hand the coordinator a snapshot of the current state. Called after
    /// every successful mutation; later snapshots supersede earlier ones.
    fn persist(&self) {
        self.coordinator.notify_changed(self.doc_id.clone(), self.document.snapshot());
    }
}
