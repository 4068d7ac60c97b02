//! Error types for the storage layer and drafting seam.
//!
//! The store distinguishes "empty by design" (missing file, missing column)
//! from genuine failures: the former come back as empty data, the latter as
//! `StoreError`. Callers at the UI boundary decide whether to surface or
//! degrade; nothing in this crate panics on bad input.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the drafting collaborator seam.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The mail client (or its stand-in) is not reachable. The campaign
    /// engine skips the transition and retries on the next sweep.
    #[error("Drafting unavailable: {0}")]
    Unavailable(String),

    /// Two distinct leads resolved to the same truncated reference tag.
    /// Drafting is refused rather than silently merging their results.
    #[error("Reference tag collision on {tag}: already assigned to {existing}")]
    RefCollision { tag: String, existing: String },

    #[error("Draft I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
