//! Error types for the preset store.

use std::path::PathBuf;
use thiserror::Error;

use crate::preset::ValueType;

/// Errors returned by store operations.
///
/// A value that does not match its declared type is *not* an error: the store
/// coerces it and reports a [`crate::preset::ValidationWarning`] instead.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A collection, preset or key that had to exist does not.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// A title or key that can never be stored (empty, control characters).
    #[error("Invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    /// Renaming a preset onto a title that already exists.
    #[error("Preset '{title}' already exists")]
    TitleExists { title: String },

    /// Persistence failure. In-memory state was rolled back.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing document does not parse.
    #[error("Corrupt document {path}: {reason}")]
    CorruptDocument { path: PathBuf, reason: String },

    /// A stored value cannot be interpreted as its declared type.
    #[error("Cannot convert {raw:?} to {value_type} for key '{key}'")]
    InvalidValue {
        key: String,
        value_type: ValueType,
        raw: String,
    },
}

impl StoreError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound { what: what.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
