//! The terrain grid document.
//!
//! A sparse map of loaded tiles plus the cross-tile boundary synchronization
//! that keeps shared edge cells equal in every tile that stores them.
//!
//! Boundary ownership is asymmetric: a tile's west column (local x = 0) is
//! mirrored into its west neighbor's x = 8 column, its south row (local
//! y = 0) into the south neighbor's y = 8 row, and the (0, 0) corner
//! additionally into the southwest neighbor's (8, 8) cell. Writes never
//! propagate north or east, and never from interior cells. This is the
//! ownership partitioning of the storage format; both the edit path and the
//! validation path enforce exactly this rule.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::tile::{CellCoord, CellEdit, Tile, TILE_DIM};
use crate::tile_id::TileId;

const EDGE: u8 = (TILE_DIM - 1) as u8;

/// Deterministic point-in-time snapshot of a document.
///
/// Tiles are held in a BTreeMap so equal states always serialize to
/// identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    tiles: BTreeMap<TileId, Tile>,
}

impl DocumentState {
    pub fn tiles(&self) -> &BTreeMap<TileId, Tile> {
        &self.tiles
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles whose content differs between two states, including tiles
    /// present in only one of them.
    pub fn diff(&self, other: &DocumentState) -> FxHashSet<TileId> {
        let mut changed = FxHashSet::default();
        for (id, tile) in &self.tiles {
            if other.tiles.get(id) != Some(tile) {
                changed.insert(*id);
            }
        }
        for id in other.tiles.keys() {
            if !self.tiles.contains_key(id) {
                changed.insert(*id);
            }
        }
        changed
    }
}

/// The live, editable terrain document.
///
/// Single-writer: all mutation goes through one logical edit sequence.
/// Persistence reads cloned [`DocumentState`] snapshots, never the live map.
#[derive(Debug, Default)]
pub struct GridDocument {
    tiles: FxHashMap<TileId, Tile>,
    dirty: FxHashSet<TileId>,
    revision: u64,
}

impl GridDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a decoded snapshot, validating structure and
    /// boundary consistency.
    pub fn from_state(state: DocumentState) -> Result<Self, EngineError> {
        validate_state(&state)?;
        let mut doc = Self {
            tiles: state.tiles.into_iter().collect(),
            dirty: FxHashSet::default(),
            revision: 0,
        };
        doc.dirty = doc.tiles.keys().copied().collect();
        Ok(doc)
    }

    /// Get a loaded tile. None means not loaded; storage is authoritative
    /// for unloaded tiles.
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    pub fn is_loaded(&self, id: TileId) -> bool {
        self.tiles.contains_key(&id)
    }

    pub fn loaded_tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tiles.keys().copied()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Monotonic mutation counter. Bumped once per effective mutating call.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Insert a fully-formed tile (the load path).
    pub fn insert_tile(&mut self, id: TileId, tile: Tile) {
        self.tiles.insert(id, tile);
        self.dirty.insert(id);
        self.revision += 1;
    }

    /// Materialize a blank tile if absent. Returns true if a tile was created.
    pub fn materialize(&mut self, id: TileId) -> bool {
        if self.tiles.contains_key(&id) {
            return false;
        }
        self.insert_tile(id, Tile::new());
        true
    }

    /// Drop a clean tile from memory. Dirty tiles are retained (their edits
    /// have not reached storage yet). Returns true if the tile was evicted.
    pub fn evict(&mut self, id: TileId) -> bool {
        if self.dirty.contains(&id) {
            return false;
        }
        self.tiles.remove(&id).is_some()
    }

    /// Apply cell edits to the target tile and mirror boundary-owned values
    /// into loaded neighbors. Returns every tile whose stored values actually
    /// changed; an empty set means the edit was a no-op.
    pub fn apply_cell_edits(
        &mut self,
        id: TileId,
        edits: &[CellEdit],
    ) -> Result<FxHashSet<TileId>, EngineError> {
        if !self.tiles.contains_key(&id) {
            return Err(EngineError::MissingTile(id));
        }

        let mut changed = FxHashSet::default();
        for edit in edits {
            if let Some(tile) = self.tiles.get_mut(&id) {
                if tile.set_cell(edit.coord, edit.cell) {
                    changed.insert(id);
                }
            }
            for (neighbor, mirror) in mirror_targets(id, edit.coord) {
                if let Some(tile) = self.tiles.get_mut(&neighbor) {
                    if tile.set_cell(mirror, edit.cell) {
                        changed.insert(neighbor);
                    }
                }
            }
        }

        if !changed.is_empty() {
            self.dirty.extend(changed.iter().copied());
            self.revision += 1;
        }
        Ok(changed)
    }

    /// Full point-in-time projection of all loaded tiles.
    pub fn snapshot(&self) -> DocumentState {
        DocumentState {
            tiles: self.tiles.iter().map(|(id, t)| (*id, t.clone())).collect(),
        }
    }

    /// Replace all in-memory state atomically. On failure the document is
    /// left unchanged.
    pub fn restore(&mut self, state: DocumentState) -> Result<(), EngineError> {
        validate_state(&state)?;
        self.tiles = state.tiles.into_iter().collect();
        self.dirty = self.tiles.keys().copied().collect();
        self.revision += 1;
        Ok(())
    }

    /// Tiles mutated since the last `take_dirty`.
    pub fn dirty(&self) -> &FxHashSet<TileId> {
        &self.dirty
    }

    pub fn take_dirty(&mut self) -> FxHashSet<TileId> {
        std::mem::take(&mut self.dirty)
    }

    /// Check the boundary invariant over the currently loaded tiles.
    pub fn validate_boundaries(&self) -> Result<(), EngineError> {
        check_boundaries(self.tiles.keys().copied(), |id| self.tiles.get(&id))
    }
}

/// Mirror targets for a boundary-owned cell. Interior cells mirror nowhere.
fn mirror_targets(id: TileId, at: CellCoord) -> Vec<(TileId, CellCoord)> {
    let mut targets = Vec::new();
    let (x, y) = (at.x(), at.y());
    if x == 0 {
        if let Some(west) = id.west() {
            if let Ok(mirror) = CellCoord::new(EDGE, y) {
                targets.push((west, mirror));
            }
        }
    }
    if y == 0 {
        if let Some(south) = id.south() {
            if let Ok(mirror) = CellCoord::new(x, EDGE) {
                targets.push((south, mirror));
            }
        }
    }
    if x == 0 && y == 0 {
        if let Some(diagonal) = id.southwest() {
            if let Ok(mirror) = CellCoord::new(EDGE, EDGE) {
                targets.push((diagonal, mirror));
            }
        }
    }
    targets
}

fn validate_state(state: &DocumentState) -> Result<(), EngineError> {
    for (id, tile) in &state.tiles {
        if !tile.is_well_formed() {
            return Err(EngineError::CorruptProjection(format!(
                "tile {id} has a malformed cell grid"
            )));
        }
    }
    check_boundaries(state.tiles.keys().copied(), |id| state.tiles.get(&id))
}

/// Shared-edge cells must hold equal values in every tile that stores them.
fn check_boundaries<'a, F>(
    ids: impl Iterator<Item = TileId>,
    lookup: F,
) -> Result<(), EngineError>
where
    F: Fn(TileId) -> Option<&'a Tile>,
{
    // Walk every tile with a loaded west/south/southwest neighbor and
    // compare the mirrored cells directly.
    for id in ids {
        let tile = match lookup(id) {
            Some(t) => t,
            None => continue,
        };
        for edge in 0..TILE_DIM as u8 {
            for (neighbor, own, mirror) in [
                (id.west(), CellCoord::new(0, edge), CellCoord::new(EDGE, edge)),
                (id.south(), CellCoord::new(edge, 0), CellCoord::new(edge, EDGE)),
            ] {
                let (Some(nid), Ok(own), Ok(mirror)) = (neighbor, own, mirror) else {
                    continue;
                };
                if let Some(other) = lookup(nid) {
                    if tile.cell(own) != other.cell(mirror) {
                        return Err(EngineError::CorruptProjection(format!(
                            "boundary mismatch between tiles {id} and {nid}"
                        )));
                    }
                }
            }
        }
        if let (Some(nid), Ok(corner), Ok(mirror)) = (
            id.southwest(),
            CellCoord::new(0, 0),
            CellCoord::new(EDGE, EDGE),
        ) {
            if let Some(other) = lookup(nid) {
                if tile.cell(corner) != other.cell(mirror) {
                    return Err(EngineError::CorruptProjection(format!(
                        "corner mismatch between tiles {id} and {nid}"
                    )));
                }
            }
        }
    }
    Ok(())
}
