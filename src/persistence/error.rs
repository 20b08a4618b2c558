//! Error types for persistence operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing the durable documents.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure (create dir, read, write, rename).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid JSON for the expected shape.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying decode/encode error.
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a JSON error.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
