//! Error types for the task tree store

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::config_text::ConfigTextError;
use crate::domain::{AllocationError, NodeId, StatusError, TreeError};

/// Errors raised by [`TaskTreeStore`](super::TaskTreeStore) operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed configuration text (carries file, line and offending text)
    #[error(transparent)]
    Parse(ConfigTextError),

    #[error("Missing or invalid '{field}' in {}", path.display())]
    MissingMetadata { path: PathBuf, field: &'static str },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Task tree at {} is already open (lock file present)", .0.display())]
    Locked(PathBuf),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error(transparent)]
    InvalidStatus(#[from] StatusError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Task node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Task store is closed")]
    Closed,
}

impl StoreError {
    /// Returns true for usage errors that leave the tree untouched
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidMove(_) | StoreError::InvalidStatus(_) | StoreError::Locked(_)
        )
    }
}

impl From<ConfigTextError> for StoreError {
    fn from(err: ConfigTextError) -> Self {
        match err {
            ConfigTextError::Io { path, source } => StoreError::Io { path, source },
            other => StoreError::Parse(other),
        }
    }
}

impl From<TreeError> for StoreError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::UnknownNode(id) => StoreError::UnknownNode(id),
            TreeError::InvalidMove(reason) => StoreError::InvalidMove(reason),
        }
    }
}

/// Builds a `map_err` adapter that tags an I/O error with its path
pub(crate) fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
