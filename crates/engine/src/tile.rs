use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Cells per tile edge.
pub const TILE_DIM: usize = 9;

/// Total cells in one tile.
pub const CELLS_PER_TILE: usize = TILE_DIM * TILE_DIM;

/// One terrain sample: height index, texture type, road flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub height: u8,
    pub texture: u8,
    pub road: bool,
}

impl Cell {
    pub fn new(height: u8, texture: u8, road: bool) -> Self {
        Self { height, texture, road }
    }
}

/// Local cell coordinate within a tile. Always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    x: u8,
    y: u8,
}

impl CellCoord {
    /// Create a local coordinate, rejecting values outside the tile grid.
    pub fn new(x: u8, y: u8) -> Result<Self, EngineError> {
        if (x as usize) >= TILE_DIM || (y as usize) >= TILE_DIM {
            return Err(EngineError::BadCoord { x, y });
        }
        Ok(Self { x, y })
    }

    #[inline]
    pub fn x(self) -> u8 {
        self.x
    }

    #[inline]
    pub fn y(self) -> u8 {
        self.y
    }

    /// Row-major index into a tile's cell array.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.y as usize * TILE_DIM + self.x as usize
    }
}

/// Desired after-state for one cell of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellEdit {
    pub coord: CellCoord,
    pub cell: Cell,
}

impl CellEdit {
    pub fn new(coord: CellCoord, cell: Cell) -> Self {
        Self { coord, cell }
    }
}

/// One landblock-sized tile: a TILE_DIM x TILE_DIM grid of cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    cells: Vec<Cell>,
}

impl Default for Tile {
    fn default() -> Self {
        Self::new()
    }
}

impl Tile {
    /// A flat tile with all cells at their default sample.
    pub fn new() -> Self {
        Self { cells: vec![Cell::default(); CELLS_PER_TILE] }
    }

    pub fn cell(&self, at: CellCoord) -> Cell {
        self.cells[at.index()]
    }

    /// Write one cell. Returns true if the stored value actually changed.
    pub(crate) fn set_cell(&mut self, at: CellCoord, value: Cell) -> bool {
        let slot = &mut self.cells[at.index()];
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }

    /// Iterate all cells with their coordinates, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, Cell)> + '_ {
        self.cells.iter().enumerate().map(|(i, c)| {
            (
                CellCoord {
                    x: (i % TILE_DIM) as u8,
                    y: (i / TILE_DIM) as u8,
                },
                *c,
            )
        })
    }

    /// A decoded tile must hold exactly CELLS_PER_TILE cells.
    pub fn is_well_formed(&self) -> bool {
        self.cells.len() == CELLS_PER_TILE
    }
}
