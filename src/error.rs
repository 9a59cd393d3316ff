//! Error types for dataset loading and engine initialization.
//!
//! Queries never fail; every variant here belongs to an initialization path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The boundary dataset is malformed or violates a data model invariant.
    #[error("corrupt boundary data: {0}")]
    DataCorruption(String),

    /// Two countries share the same numeric id.
    #[error("numeric id {numeric_id} is assigned to more than one country")]
    IdCollision { numeric_id: u16 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The process-wide engine has already been published.
    #[error("the global engine is already initialized")]
    AlreadyInitialized,
}

impl Error {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Error::DataCorruption(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
