//! Undo/redo history with replayable navigation.
//!
//! The engine holds an ordered entry list, a current index, and the working
//! base: the document state the whole stack is defined relative to. Any
//! position in history is reproducible as restore(working base) followed by
//! executing entries up to that position. History is linear: executing a new
//! command from a non-tip position discards the redo candidates after it.
//!
//! Capacity trimming re-baselines: when the oldest entry is dropped, it is
//! first absorbed into the working base so every retained index still
//! replays to the correct state.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;

use crate::command::EditCommand;
use crate::document::{DocumentState, GridDocument};
use crate::error::EngineError;
use crate::events::{
    CommandAppliedEvent, DocumentEvent, EventCallback, HistoryMovedEvent, HistoryTruncatedEvent,
};
use crate::tile_id::TileId;

/// Default maximum number of retained history entries.
pub const DEFAULT_CAPACITY: usize = 50;

/// One applied command plus its display metadata.
pub struct HistoryEntry {
    command: EditCommand,
    description: String,
    timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn command(&self) -> &EditCommand {
        &self.command
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One row of the history list as shown to a UI (pull-based refresh).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub index: usize,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub is_current: bool,
}

/// Undo/redo engine over a [`GridDocument`].
///
/// The engine never touches storage; callers persist the document from the
/// modified-tile sets these methods return.
pub struct HistoryEngine {
    entries: Vec<HistoryEntry>,
    /// Position of the last applied command. None = at the working base.
    index: Option<usize>,
    base: DocumentState,
    capacity: usize,
    subscribers: Vec<EventCallback>,
}

impl HistoryEngine {
    pub fn new(base: DocumentState) -> Self {
        Self::with_capacity(base, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(base: DocumentState, capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            base,
            capacity: capacity.max(1),
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to document events. Delivery is synchronous, in
    /// subscription order, before the mutating call returns.
    pub fn subscribe(&mut self, callback: EventCallback) {
        self.subscribers.push(callback);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index.is_some()
    }

    pub fn can_redo(&self) -> bool {
        match self.index {
            Some(i) => i + 1 < self.entries.len(),
            None => !self.entries.is_empty(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// The projection the live stack is defined relative to.
    pub fn working_base(&self) -> &DocumentState {
        &self.base
    }

    /// History rows for display, tagged with the current position.
    pub fn items(&self) -> Vec<HistoryItem> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| HistoryItem {
                index: i,
                description: e.description.clone(),
                timestamp: e.timestamp,
                is_current: self.index == Some(i),
            })
            .collect()
    }

    /// Execute a command and append it to history. A failing command leaves
    /// history untouched and is not pushed. Executing from a non-tip
    /// position discards the entries after the current index.
    pub fn execute(
        &mut self,
        doc: &mut GridDocument,
        command: EditCommand,
    ) -> Result<FxHashSet<TileId>, EngineError> {
        let tiles = command.execute(doc)?;

        // Branch pruning: the redo tail is only dropped once the new command
        // has succeeded.
        match self.index {
            Some(i) => self.entries.truncate(i + 1),
            None => self.entries.clear(),
        }

        let description = command.describe().to_string();
        let timestamp = Utc::now();
        self.entries.push(HistoryEntry { command, description: description.clone(), timestamp });
        self.index = Some(self.entries.len() - 1);
        self.trim_to_capacity()?;

        self.emit(DocumentEvent::CommandApplied(CommandAppliedEvent {
            revision: doc.revision(),
            description,
            tiles: sorted_tiles(&tiles),
            timestamp,
        }));
        Ok(tiles)
    }

    /// Revert the entry at the current index and step back.
    pub fn undo(&mut self, doc: &mut GridDocument) -> Result<FxHashSet<TileId>, EngineError> {
        let i = self.index.ok_or(EngineError::NothingToUndo)?;
        let tiles = self.entries[i].command.revert(doc)?;
        self.index = i.checked_sub(1);
        self.emit(DocumentEvent::HistoryMoved(HistoryMovedEvent {
            index: self.index,
            tiles: sorted_tiles(&tiles),
        }));
        Ok(tiles)
    }

    /// Execute the entry after the current index and step forward.
    pub fn redo(&mut self, doc: &mut GridDocument) -> Result<FxHashSet<TileId>, EngineError> {
        let next = match self.index {
            Some(i) => i + 1,
            None => 0,
        };
        if next >= self.entries.len() {
            return Err(EngineError::NothingToRedo);
        }
        let tiles = self.entries[next].command.execute(doc)?;
        self.index = Some(next);
        self.emit(DocumentEvent::HistoryMoved(HistoryMovedEvent {
            index: self.index,
            tiles: sorted_tiles(&tiles),
        }));
        Ok(tiles)
    }

    /// Jump to an arbitrary history position: restore the working base, then
    /// replay entries 0..=target in order. A mid-replay failure falls back to
    /// the working base (index None) and surfaces `ReplayFailure`.
    pub fn jump_to(
        &mut self,
        doc: &mut GridDocument,
        target: usize,
    ) -> Result<FxHashSet<TileId>, EngineError> {
        if target >= self.entries.len() {
            return Err(EngineError::BadHistoryIndex { index: target, len: self.entries.len() });
        }

        let before = doc.snapshot();
        doc.restore(self.base.clone())?;
        for i in 0..=target {
            if let Err(err) = self.entries[i].command.execute(doc) {
                doc.restore(self.base.clone())?;
                self.index = None;
                let tiles = sorted_tiles(&before.diff(&doc.snapshot()));
                self.emit(DocumentEvent::HistoryMoved(HistoryMovedEvent { index: None, tiles }));
                return Err(EngineError::ReplayFailure { at: i, source: Box::new(err) });
            }
        }
        self.index = Some(target);

        let tiles = before.diff(&doc.snapshot());
        self.emit(DocumentEvent::HistoryMoved(HistoryMovedEvent {
            index: self.index,
            tiles: sorted_tiles(&tiles),
        }));
        Ok(tiles)
    }

    /// Return to the working base without altering it or the entry list.
    pub fn reset_to_base(
        &mut self,
        doc: &mut GridDocument,
    ) -> Result<FxHashSet<TileId>, EngineError> {
        let before = doc.snapshot();
        doc.restore(self.base.clone())?;
        self.index = None;

        let tiles = before.diff(&doc.snapshot());
        self.emit(DocumentEvent::HistoryMoved(HistoryMovedEvent {
            index: None,
            tiles: sorted_tiles(&tiles),
        }));
        Ok(tiles)
    }

    /// Delete entries from position `from` onward. If the current position is
    /// at or past `from`, the document is first undone down to `from - 1`.
    pub fn delete_from(
        &mut self,
        doc: &mut GridDocument,
        from: usize,
    ) -> Result<FxHashSet<TileId>, EngineError> {
        if from > self.entries.len() {
            return Err(EngineError::BadHistoryIndex { index: from, len: self.entries.len() });
        }

        let mut tiles = FxHashSet::default();
        while let Some(i) = self.index {
            if i < from {
                break;
            }
            tiles.extend(self.entries[i].command.revert(doc)?);
            self.index = i.checked_sub(1);
        }
        self.entries.truncate(from);

        self.emit(DocumentEvent::HistoryTruncated(HistoryTruncatedEvent {
            len: self.entries.len(),
        }));
        Ok(tiles)
    }

    /// Replace the working base (checkpoint restore / reload path): the
    /// document takes the new state and the stack is cleared.
    pub fn rebase(
        &mut self,
        doc: &mut GridDocument,
        state: DocumentState,
    ) -> Result<FxHashSet<TileId>, EngineError> {
        let before = doc.snapshot();
        doc.restore(state.clone())?;
        self.base = state;
        self.entries.clear();
        self.index = None;

        let tiles = before.diff(&doc.snapshot());
        self.emit(DocumentEvent::HistoryMoved(HistoryMovedEvent {
            index: None,
            tiles: sorted_tiles(&tiles),
        }));
        Ok(tiles)
    }

    /// Drop oldest entries past capacity, absorbing each into the working
    /// base so the retained range replays unchanged.
    fn trim_to_capacity(&mut self) -> Result<(), EngineError> {
        while self.entries.len() > self.capacity {
            let oldest = self.entries.remove(0);
            let mut scratch = GridDocument::from_state(self.base.clone())?;
            oldest
                .command
                .execute(&mut scratch)
                .map_err(|e| EngineError::ReplayFailure { at: 0, source: Box::new(e) })?;
            self.base = scratch.snapshot();
            self.index = self.index.and_then(|i| i.checked_sub(1));
        }
        Ok(())
    }

    fn emit(&mut self, event: DocumentEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }
}

fn sorted_tiles(tiles: &FxHashSet<TileId>) -> Vec<TileId> {
    let mut sorted: Vec<TileId> = tiles.iter().copied().collect();
    sorted.sort_unstable();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Cell, CellCoord, CellEdit};
    use crate::tile_id::TileId;

    fn tile_id(x: i32, y: i32) -> TileId {
        TileId::new(x, y).unwrap()
    }

    fn height_edit(x: u8, y: u8, height: u8) -> CellEdit {
        CellEdit::new(CellCoord::new(x, y).unwrap(), Cell::new(height, 0, false))
    }

    /// Document with one tile at (5, 5) and a history over it.
    fn setup() -> (GridDocument, HistoryEngine) {
        let mut doc = GridDocument::new();
        doc.materialize(tile_id(5, 5));
        let history = HistoryEngine::new(doc.snapshot());
        (doc, history)
    }

    fn raise(doc: &GridDocument, height: u8, label: &str) -> EditCommand {
        EditCommand::capture(doc, tile_id(5, 5), &[height_edit(4, 4, height)], label).unwrap()
    }

    fn exec(history: &mut HistoryEngine, doc: &mut GridDocument, height: u8, label: &str) {
        let cmd = raise(doc, height, label);
        history.execute(doc, cmd).unwrap();
    }

    fn height_at(doc: &GridDocument, x: u8, y: u8) -> u8 {
        doc.tile(tile_id(5, 5))
            .unwrap()
            .cell(CellCoord::new(x, y).unwrap())
            .height
    }

    #[test]
    fn test_execute_undo_redo() {
        let (mut doc, mut history) = setup();
        assert!(!history.can_undo());
        assert!(!history.can_redo());

        exec(&mut history, &mut doc, 10, "raise to 10");
        assert_eq!(height_at(&doc, 4, 4), 10);
        assert_eq!(history.index(), Some(0));

        history.undo(&mut doc).unwrap();
        assert_eq!(height_at(&doc, 4, 4), 0);
        assert_eq!(history.index(), None);
        assert!(history.can_redo());

        history.redo(&mut doc).unwrap();
        assert_eq!(height_at(&doc, 4, 4), 10);
        assert_eq!(history.index(), Some(0));
    }

    #[test]
    fn test_undo_redo_bounds() {
        let (mut doc, mut history) = setup();
        assert_eq!(history.undo(&mut doc).unwrap_err(), EngineError::NothingToUndo);

        exec(&mut history, &mut doc, 10, "raise");
        assert_eq!(history.redo(&mut doc).unwrap_err(), EngineError::NothingToRedo);
    }

    #[test]
    fn test_failed_command_not_pushed() {
        let (mut doc, mut history) = setup();
        exec(&mut history, &mut doc, 10, "c0");
        history.undo(&mut doc).unwrap();

        // A command targeting an unloaded tile fails; the redo tail survives.
        let mut other = GridDocument::new();
        other.materialize(tile_id(7, 7));
        let bad = EditCommand::capture(&other, tile_id(7, 7), &[height_edit(0, 0, 1)], "bad")
            .unwrap();
        let err = history.execute(&mut doc, bad).unwrap_err();
        assert_eq!(err, EngineError::MissingTile(tile_id(7, 7)));

        assert_eq!(history.len(), 1);
        assert!(history.can_redo());
    }

    #[test]
    fn test_branch_pruning() {
        let (mut doc, mut history) = setup();
        exec(&mut history, &mut doc, 10, "c0");
        exec(&mut history, &mut doc, 20, "c1");
        exec(&mut history, &mut doc, 30, "c2");
        assert_eq!(history.index(), Some(2));

        history.undo(&mut doc).unwrap();
        history.undo(&mut doc).unwrap();
        assert_eq!(history.index(), Some(0));

        exec(&mut history, &mut doc, 40, "c3");

        let descriptions: Vec<_> =
            history.entries().map(|e| e.description().to_string()).collect();
        assert_eq!(descriptions, vec!["c0", "c3"]);
        assert_eq!(history.index(), Some(1));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_jump_replay_determinism() {
        let (mut doc, mut history) = setup();
        for (h, label) in [(10, "c0"), (20, "c1"), (30, "c2")] {
            exec(&mut history, &mut doc, h, label);
        }

        history.jump_to(&mut doc, 0).unwrap();
        let at_zero = doc.snapshot();
        assert_eq!(height_at(&doc, 4, 4), 10);

        history.jump_to(&mut doc, 2).unwrap();
        assert_eq!(height_at(&doc, 4, 4), 30);

        history.jump_to(&mut doc, 0).unwrap();
        assert_eq!(doc.snapshot(), at_zero);
        assert_eq!(history.index(), Some(0));
    }

    #[test]
    fn test_jump_out_of_range() {
        let (mut doc, mut history) = setup();
        exec(&mut history, &mut doc, 10, "c0");
        let err = history.jump_to(&mut doc, 5).unwrap_err();
        assert_eq!(err, EngineError::BadHistoryIndex { index: 5, len: 1 });
    }

    #[test]
    fn test_replay_failure_falls_back_to_base() {
        let (mut doc, mut history) = setup();
        let base = history.working_base().clone();

        // Materialized outside history: absent from the working base, so
        // replay of this entry cannot succeed.
        doc.materialize(tile_id(9, 9));
        let cmd = EditCommand::capture(&doc, tile_id(9, 9), &[height_edit(0, 0, 5)], "orphan")
            .unwrap();
        history.execute(&mut doc, cmd).unwrap();

        let err = history.jump_to(&mut doc, 0).unwrap_err();
        assert!(matches!(err, EngineError::ReplayFailure { at: 0, .. }));
        assert_eq!(history.index(), None);
        assert_eq!(doc.snapshot(), base);
    }

    #[test]
    fn test_reset_to_base() {
        let (mut doc, mut history) = setup();
        let base = history.working_base().clone();
        exec(&mut history, &mut doc, 10, "c0");
        exec(&mut history, &mut doc, 20, "c1");

        history.reset_to_base(&mut doc).unwrap();
        assert_eq!(history.index(), None);
        assert_eq!(doc.snapshot(), base);

        // The entry list survives; redo walks forward again
        assert_eq!(history.len(), 2);
        history.redo(&mut doc).unwrap();
        assert_eq!(height_at(&doc, 4, 4), 10);
    }

    #[test]
    fn test_delete_from_undoes_first() {
        let (mut doc, mut history) = setup();
        for (h, label) in [(10, "c0"), (20, "c1"), (30, "c2")] {
            exec(&mut history, &mut doc, h, label);
        }

        history.delete_from(&mut doc, 1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.index(), Some(0));
        assert_eq!(height_at(&doc, 4, 4), 10);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_delete_from_below_current_keeps_position() {
        let (mut doc, mut history) = setup();
        for (h, label) in [(10, "c0"), (20, "c1"), (30, "c2")] {
            exec(&mut history, &mut doc, h, label);
        }
        history.undo(&mut doc).unwrap();
        history.undo(&mut doc).unwrap();
        assert_eq!(history.index(), Some(0));

        // Deleting the redo tail does not move the document
        history.delete_from(&mut doc, 1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.index(), Some(0));
        assert_eq!(height_at(&doc, 4, 4), 10);
    }

    #[test]
    fn test_capacity_trim_rebaselines() {
        let mut doc = GridDocument::new();
        doc.materialize(tile_id(5, 5));
        let mut history = HistoryEngine::with_capacity(doc.snapshot(), 2);

        exec(&mut history, &mut doc, 10, "c0");
        exec(&mut history, &mut doc, 20, "c1");
        exec(&mut history, &mut doc, 30, "c2");

        // c0 was absorbed into the working base
        assert_eq!(history.len(), 2);
        assert_eq!(history.index(), Some(1));
        let descriptions: Vec<_> =
            history.entries().map(|e| e.description().to_string()).collect();
        assert_eq!(descriptions, vec!["c1", "c2"]);

        // Undoing everything lands on the rebased base: the state after c0
        history.undo(&mut doc).unwrap();
        history.undo(&mut doc).unwrap();
        assert_eq!(height_at(&doc, 4, 4), 10);

        // And every retained index still replays correctly
        history.jump_to(&mut doc, 1).unwrap();
        assert_eq!(height_at(&doc, 4, 4), 30);
        history.jump_to(&mut doc, 0).unwrap();
        assert_eq!(height_at(&doc, 4, 4), 20);
    }

    #[test]
    fn test_rebase_clears_stack() {
        let (mut doc, mut history) = setup();
        exec(&mut history, &mut doc, 10, "c0");
        let checkpoint = doc.snapshot();
        exec(&mut history, &mut doc, 20, "c1");

        history.rebase(&mut doc, checkpoint.clone()).unwrap();
        assert_eq!(history.index(), None);
        assert_eq!(history.len(), 0);
        assert_eq!(doc.snapshot(), checkpoint);
        assert_eq!(history.working_base(), &checkpoint);
    }

    #[test]
    fn test_items_mark_current() {
        let (mut doc, mut history) = setup();
        exec(&mut history, &mut doc, 10, "c0");
        exec(&mut history, &mut doc, 20, "c1");
        history.undo(&mut doc).unwrap();

        let items = history.items();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_current);
        assert!(!items[1].is_current);
        assert_eq!(items[1].description, "c1");
    }

    #[test]
    fn test_events_delivered_in_order() {
        use std::sync::{Arc, Mutex};

        use crate::events::EventCollector;

        let (mut doc, mut history) = setup();
        let collector = Arc::new(Mutex::new(EventCollector::new()));
        let sink = Arc::clone(&collector);
        history.subscribe(Box::new(move |event| {
            if let Ok(mut c) = sink.lock() {
                c.push(event.clone());
            }
        }));

        exec(&mut history, &mut doc, 10, "c0");
        history.undo(&mut doc).unwrap();
        history.delete_from(&mut doc, 0).unwrap();

        let collector = collector.lock().unwrap();
        assert_eq!(collector.len(), 3);
        assert_eq!(collector.commands_applied().len(), 1);
        assert_eq!(collector.history_moved().len(), 1);
        assert_eq!(collector.history_truncated().len(), 1);
        assert_eq!(collector.commands_applied()[0].description, "c0");
        assert_eq!(collector.history_moved()[0].index, None);
    }
}
