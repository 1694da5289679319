use std::fmt;

use crate::tile_id::TileId;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Tile coordinate outside the world bounds.
    OutOfRange { x: i32, y: i32 },
    /// Local cell coordinate outside the tile grid.
    BadCoord { x: u8, y: u8 },
    /// A command referenced a tile that is not loaded in the document.
    MissingTile(TileId),
    /// A projection failed structural or boundary-consistency validation.
    CorruptProjection(String),
    /// Replay hit a failing command; the document fell back to the working base.
    ReplayFailure { at: usize, source: Box<EngineError> },
    /// Undo requested with no applied entries.
    NothingToUndo,
    /// Redo requested at the history tip.
    NothingToRedo,
    /// History index outside the entry list.
    BadHistoryIndex { index: usize, len: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { x, y } => write!(f, "tile coordinate ({x}, {y}) outside world bounds"),
            Self::BadCoord { x, y } => write!(f, "cell coordinate ({x}, {y}) outside tile grid"),
            Self::MissingTile(id) => write!(f, "tile {id} is not loaded"),
            Self::CorruptProjection(msg) => write!(f, "corrupt projection: {msg}"),
            Self::ReplayFailure { at, source } => {
                write!(f, "replay failed at entry {at}: {source}")
            }
            Self::NothingToUndo => write!(f, "nothing to undo"),
            Self::NothingToRedo => write!(f, "nothing to redo"),
            Self::BadHistoryIndex { index, len } => {
                write!(f, "history index {index} out of range (len {len})")
            }
        }
    }
}

impl std::error::Error for EngineError {}
