//! Reversible edit commands.
//!
//! A command carries immutable before/after deltas captured at build time.
//! Execute applies the after values, revert the before values; both go
//! through `apply_cell_edits`, so boundary mirroring is identical in both
//! directions and execute followed by revert restores the document
//! bit-for-bit.
//!
//! Command kinds are a closed enum, so history display and dispatch never
//! need runtime type inspection.

use rustc_hash::FxHashSet;

use crate::document::GridDocument;
use crate::error::EngineError;
use crate::tile::{Cell, CellCoord, CellEdit};
use crate::tile_id::TileId;

/// Before/after values for one cell of the target tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellDelta {
    pub coord: CellCoord,
    pub before: Cell,
    pub after: Cell,
}

/// Cell edits against a single tile.
#[derive(Debug, Clone)]
pub struct CellEditCommand {
    tile: TileId,
    deltas: Vec<CellDelta>,
    label: String,
}

impl CellEditCommand {
    /// Build a command by snapshotting the current values of the edited
    /// cells. Fails with `MissingTile` if the target tile is not loaded.
    pub fn capture(
        doc: &GridDocument,
        tile: TileId,
        edits: &[CellEdit],
        label: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let current = doc.tile(tile).ok_or(EngineError::MissingTile(tile))?;
        let deltas = edits
            .iter()
            .map(|e| CellDelta {
                coord: e.coord,
                before: current.cell(e.coord),
                after: e.cell,
            })
            .collect();
        Ok(Self { tile, deltas, label: label.into() })
    }

    pub fn tile(&self) -> TileId {
        self.tile
    }

    pub fn deltas(&self) -> &[CellDelta] {
        &self.deltas
    }

    fn apply(&self, doc: &mut GridDocument, forward: bool) -> Result<FxHashSet<TileId>, EngineError> {
        let edits: Vec<CellEdit> = self
            .deltas
            .iter()
            .map(|d| CellEdit::new(d.coord, if forward { d.after } else { d.before }))
            .collect();
        doc.apply_cell_edits(self.tile, &edits)
    }
}

/// Ordered sub-commands applied as one undoable unit.
#[derive(Debug, Clone)]
pub struct CompositeCommand {
    commands: Vec<EditCommand>,
    label: String,
}

impl CompositeCommand {
    pub fn new(commands: Vec<EditCommand>, label: impl Into<String>) -> Self {
        Self { commands, label: label.into() }
    }

    pub fn commands(&self) -> &[EditCommand] {
        &self.commands
    }
}

/// A reversible, composable edit unit.
#[derive(Debug, Clone)]
pub enum EditCommand {
    CellEdits(CellEditCommand),
    Composite(CompositeCommand),
}

impl EditCommand {
    /// Convenience wrapper around [`CellEditCommand::capture`].
    pub fn capture(
        doc: &GridDocument,
        tile: TileId,
        edits: &[CellEdit],
        label: impl Into<String>,
    ) -> Result<Self, EngineError> {
        Ok(Self::CellEdits(CellEditCommand::capture(doc, tile, edits, label)?))
    }

    pub fn composite(commands: Vec<EditCommand>, label: impl Into<String>) -> Self {
        Self::Composite(CompositeCommand::new(commands, label))
    }

    /// Apply forward deltas. Returns the modified-tile set.
    pub fn execute(&self, doc: &mut GridDocument) -> Result<FxHashSet<TileId>, EngineError> {
        match self {
            Self::CellEdits(cmd) => cmd.apply(doc, true),
            Self::Composite(composite) => {
                let mut modified = FxHashSet::default();
                for (i, cmd) in composite.commands.iter().enumerate() {
                    match cmd.execute(doc) {
                        Ok(set) => modified.extend(set),
                        Err(err) => {
                            // All-or-nothing: unwind the executed prefix in
                            // reverse. Reverting a command that just executed
                            // cannot fail; its tiles are still loaded.
                            for done in composite.commands[..i].iter().rev() {
                                let _ = done.revert(doc);
                            }
                            return Err(err);
                        }
                    }
                }
                Ok(modified)
            }
        }
    }

    /// Apply inverse deltas. Returns the modified-tile set.
    pub fn revert(&self, doc: &mut GridDocument) -> Result<FxHashSet<TileId>, EngineError> {
        match self {
            Self::CellEdits(cmd) => cmd.apply(doc, false),
            Self::Composite(composite) => {
                let mut modified = FxHashSet::default();
                for cmd in composite.commands.iter().rev() {
                    modified.extend(cmd.revert(doc)?);
                }
                Ok(modified)
            }
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::CellEdits(cmd) => &cmd.label,
            Self::Composite(composite) => &composite.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_id(x: i32, y: i32) -> TileId {
        TileId::new(x, y).unwrap()
    }

    fn coord(x: u8, y: u8) -> CellCoord {
        CellCoord::new(x, y).unwrap()
    }

    fn height_edit(x: u8, y: u8, height: u8) -> CellEdit {
        CellEdit::new(coord(x, y), Cell::new(height, 0, false))
    }

    fn doc_with_block(ids: &[(i32, i32)]) -> GridDocument {
        let mut doc = GridDocument::new();
        for &(x, y) in ids {
            doc.materialize(tile_id(x, y));
        }
        doc
    }

    #[test]
    fn test_capture_requires_loaded_tile() {
        let doc = GridDocument::new();
        let err = EditCommand::capture(&doc, tile_id(1, 1), &[height_edit(0, 0, 5)], "raise")
            .unwrap_err();
        assert_eq!(err, EngineError::MissingTile(tile_id(1, 1)));
    }

    #[test]
    fn test_execute_then_revert_is_identity() {
        let mut doc = doc_with_block(&[(3, 4), (2, 4), (3, 3), (2, 3)]);
        let before = doc.snapshot();

        let cmd = EditCommand::capture(
            &doc,
            tile_id(3, 4),
            &[height_edit(0, 0, 20), height_edit(4, 4, 7)],
            "sculpt",
        )
        .unwrap();

        cmd.execute(&mut doc).unwrap();
        assert_ne!(doc.snapshot(), before);

        cmd.revert(&mut doc).unwrap();
        assert_eq!(doc.snapshot(), before);
    }

    #[test]
    fn test_describe() {
        let doc = doc_with_block(&[(1, 1)]);
        let cmd = EditCommand::capture(&doc, tile_id(1, 1), &[height_edit(2, 2, 1)], "raise hill")
            .unwrap();
        assert_eq!(cmd.describe(), "raise hill");
    }

    #[test]
    fn test_composite_runs_in_order_and_reverts_in_reverse() {
        let mut doc = doc_with_block(&[(1, 1)]);
        let before = doc.snapshot();

        // Both sub-commands touch the same cell; order matters.
        let first = EditCommand::capture(&doc, tile_id(1, 1), &[height_edit(3, 3, 10)], "a").unwrap();
        let mut staged = doc_with_block(&[(1, 1)]);
        first.execute(&mut staged).unwrap();
        let second =
            EditCommand::capture(&staged, tile_id(1, 1), &[height_edit(3, 3, 20)], "b").unwrap();

        let composite = EditCommand::composite(vec![first, second], "stacked edit");
        composite.execute(&mut doc).unwrap();
        assert_eq!(doc.tile(tile_id(1, 1)).unwrap().cell(coord(3, 3)).height, 20);

        composite.revert(&mut doc).unwrap();
        assert_eq!(doc.snapshot(), before);
    }

    #[test]
    fn test_composite_failure_rolls_back_prefix() {
        let mut doc = doc_with_block(&[(1, 1)]);
        let before = doc.snapshot();

        let good = EditCommand::capture(&doc, tile_id(1, 1), &[height_edit(3, 3, 10)], "good")
            .unwrap();
        // Built against a doc where (2, 2) exists, then executed against one
        // where it does not: fails with MissingTile mid-composite.
        let other = doc_with_block(&[(2, 2)]);
        let bad = EditCommand::capture(&other, tile_id(2, 2), &[height_edit(0, 0, 5)], "bad")
            .unwrap();

        let composite = EditCommand::composite(vec![good, bad], "broken");
        let err = composite.execute(&mut doc).unwrap_err();
        assert_eq!(err, EngineError::MissingTile(tile_id(2, 2)));

        // The successfully executed prefix was unwound
        assert_eq!(doc.snapshot(), before);
    }

    #[test]
    fn test_composite_reports_union_of_modified_tiles() {
        let mut doc = doc_with_block(&[(3, 4), (2, 4), (5, 5)]);
        let a = EditCommand::capture(&doc, tile_id(3, 4), &[height_edit(0, 5, 9)], "a").unwrap();
        let b = EditCommand::capture(&doc, tile_id(5, 5), &[height_edit(4, 4, 9)], "b").unwrap();

        let modified = EditCommand::composite(vec![a, b], "both")
            .execute(&mut doc)
            .unwrap();
        let expected: FxHashSet<TileId> =
            [tile_id(3, 4), tile_id(2, 4), tile_id(5, 5)].into_iter().collect();
        assert_eq!(modified, expected);
    }
}
