//! Tile identity for the terrain grid.
//!
//! A `TileId` uniquely identifies one landblock-sized tile in the world.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Tiles per world edge. The world is a square `WORLD_DIM` x `WORLD_DIM` grid.
pub const WORLD_DIM: i32 = 256;

/// Unique identifier for a tile in the world grid.
///
/// Packs a 2D coordinate into one id: high byte is x, low byte is y.
/// Constructed only through [`TileId::new`], so every held id is in bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(u16);

impl TileId {
    /// Create a new TileId, rejecting coordinates outside the world bounds.
    pub fn new(x: i32, y: i32) -> Result<Self, EngineError> {
        if x < 0 || y < 0 || x >= WORLD_DIM || y >= WORLD_DIM {
            return Err(EngineError::OutOfRange { x, y });
        }
        Ok(Self(((x as u16) << 8) | (y as u16)))
    }

    /// Reconstruct from a packed id (e.g. read back from storage).
    /// Every u16 value is a valid in-bounds id.
    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The packed id.
    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    /// World x coordinate.
    #[inline]
    pub fn x(self) -> i32 {
        (self.0 >> 8) as i32
    }

    /// World y coordinate.
    #[inline]
    pub fn y(self) -> i32 {
        (self.0 & 0xFF) as i32
    }

    /// Neighbor one tile west (x - 1), or None at the world edge.
    pub fn west(self) -> Option<Self> {
        TileId::new(self.x() - 1, self.y()).ok()
    }

    /// Neighbor one tile south (y - 1), or None at the world edge.
    pub fn south(self) -> Option<Self> {
        TileId::new(self.x(), self.y() - 1).ok()
    }

    /// Diagonal neighbor to the southwest (x - 1, y - 1), or None at the edge.
    pub fn southwest(self) -> Option<Self> {
        TileId::new(self.x() - 1, self.y() - 1).ok()
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Hex landblock notation: x byte then y byte, e.g. (3, 4) -> "0304"
        write!(f, "{:02X}{:02X}", self.x(), self.y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_equality() {
        let a = TileId::new(3, 4).unwrap();
        let b = TileId::new(3, 4).unwrap();
        let c = TileId::new(4, 3).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_tile_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(TileId::new(1, 1).unwrap());
        set.insert(TileId::new(1, 1).unwrap()); // duplicate
        set.insert(TileId::new(1, 2).unwrap());

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(TileId::new(-1, 0).is_err());
        assert!(TileId::new(0, -1).is_err());
        assert!(TileId::new(WORLD_DIM, 0).is_err());
        assert!(TileId::new(0, WORLD_DIM).is_err());
        assert!(TileId::new(WORLD_DIM - 1, WORLD_DIM - 1).is_ok());
    }

    #[test]
    fn test_raw_round_trip() {
        let id = TileId::new(0xAB, 0x12).unwrap();
        assert_eq!(id.raw(), 0xAB12);
        assert_eq!(TileId::from_raw(id.raw()), id);
    }

    #[test]
    fn test_neighbors() {
        let id = TileId::new(3, 4).unwrap();
        assert_eq!(id.west(), Some(TileId::new(2, 4).unwrap()));
        assert_eq!(id.south(), Some(TileId::new(3, 3).unwrap()));
        assert_eq!(id.southwest(), Some(TileId::new(2, 3).unwrap()));
    }

    #[test]
    fn test_neighbors_at_world_edge() {
        let origin = TileId::new(0, 0).unwrap();
        assert_eq!(origin.west(), None);
        assert_eq!(origin.south(), None);
        assert_eq!(origin.southwest(), None);

        let west_edge = TileId::new(0, 5).unwrap();
        assert_eq!(west_edge.west(), None);
        assert!(west_edge.south().is_some());
        assert_eq!(west_edge.southwest(), None);
    }

    #[test]
    fn test_display() {
        let id = TileId::new(3, 4).unwrap();
        assert_eq!(format!("{}", id), "0304");

        let id2 = TileId::new(0xC9, 0x5F).unwrap();
        assert_eq!(format!("{}", id2), "C95F");
    }
}
