use std::fmt;

use landforge_engine::error::EngineError;

/// Storage-layer errors.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The requested projection or snapshot does not exist.
    NotFound,
    /// The stored blob failed validation (magic, version, checksum, payload).
    Corrupt(String),
    /// The backend itself failed (I/O, SQLite, encoding).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Corrupt(msg) => write!(f, "corrupt projection: {msg}"),
            Self::Backend(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors surfaced by the editor session glue: either the engine rejected
/// the operation or storage failed.
#[derive(Debug)]
pub enum SessionError {
    Engine(EngineError),
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
