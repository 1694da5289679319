//! Test harness for document + history operations with event tracking.
//!
//! Wraps a `GridDocument` and `HistoryEngine` pair, collects emitted events,
//! and provides edit helpers so invariant tests stay short. Use this to test
//! cross-module properties without storage dependencies.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashSet;

use crate::command::EditCommand;
use crate::document::{DocumentState, GridDocument};
use crate::error::EngineError;
use crate::events::EventCollector;
use crate::history::HistoryEngine;
use crate::tile::{Cell, CellCoord, CellEdit};
use crate::tile_id::TileId;

pub struct EngineHarness {
    doc: GridDocument,
    history: HistoryEngine,
    events: Arc<Mutex<EventCollector>>,
}

impl EngineHarness {
    /// Harness over a document pre-loaded with the given tiles.
    pub fn with_tiles(ids: &[(i32, i32)]) -> Self {
        let mut doc = GridDocument::new();
        for &(x, y) in ids {
            doc.materialize(Self::tile(x, y));
        }
        let mut history = HistoryEngine::new(doc.snapshot());

        let events = Arc::new(Mutex::new(EventCollector::new()));
        let sink = Arc::clone(&events);
        history.subscribe(Box::new(move |event| {
            if let Ok(mut collector) = sink.lock() {
                collector.push(event.clone());
            }
        }));

        Self { doc, history, events }
    }

    pub fn tile(x: i32, y: i32) -> TileId {
        TileId::new(x, y).expect("test tile in bounds")
    }

    pub fn doc(&self) -> &GridDocument {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut GridDocument {
        &mut self.doc
    }

    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    pub fn events(&self) -> std::sync::MutexGuard<'_, EventCollector> {
        self.events.lock().expect("event collector lock")
    }

    pub fn snapshot(&self) -> DocumentState {
        self.doc.snapshot()
    }

    pub fn height_at(&self, tile: (i32, i32), x: u8, y: u8) -> u8 {
        self.doc
            .tile(Self::tile(tile.0, tile.1))
            .expect("tile loaded")
            .cell(CellCoord::new(x, y).expect("coord in range"))
            .height
    }

    /// Build and execute a single-cell height edit.
    pub fn set_height(
        &mut self,
        tile: (i32, i32),
        x: u8,
        y: u8,
        height: u8,
        label: &str,
    ) -> Result<FxHashSet<TileId>, EngineError> {
        let id = Self::tile(tile.0, tile.1);
        let edit = CellEdit::new(
            CellCoord::new(x, y).expect("coord in range"),
            Cell::new(height, 0, false),
        );
        let cmd = EditCommand::capture(&self.doc, id, &[edit], label)?;
        self.history.execute(&mut self.doc, cmd)
    }

    pub fn undo(&mut self) -> Result<FxHashSet<TileId>, EngineError> {
        self.history.undo(&mut self.doc)
    }

    pub fn redo(&mut self) -> Result<FxHashSet<TileId>, EngineError> {
        self.history.redo(&mut self.doc)
    }

    pub fn jump_to(&mut self, target: usize) -> Result<FxHashSet<TileId>, EngineError> {
        self.history.jump_to(&mut self.doc, target)
    }
}
