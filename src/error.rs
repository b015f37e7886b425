//! Crate-wide error type.

use std::fmt;

use crate::state::StateId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by [`crate::store::Store`] and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Entry or sidecar absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Inode already present at the target location.
    #[error("already exists: {0}")]
    FileExists(String),

    /// The entry's current state was not in the accepted set.
    #[error(transparent)]
    FileState(#[from] FileStateError),

    /// Name violates the [`crate::factory::EntryFactory`]'s precondition.
    #[error("invalid name {0:?}")]
    InvalidName(String),

    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The same name was found live under more than one state on disk.
    #[error("corrupt: {name:?} present in multiple states: {states:?}")]
    Corrupt { name: String, states: Vec<StateId> },
}

impl Error {
    /// Reconstructs an equivalent, independently-owned `Error`.
    ///
    /// Not a `Clone` impl because `std::io::Error` doesn't implement
    /// `Clone`; used to turn the `Arc<Error>` that `moka::sync::Cache::
    /// try_get_with` hands every concurrent caller of a failed
    /// initializer back into a plain owned `Error`. `Io`'s kind survives
    /// the round-trip; the original `raw_os_error` does not.
    pub(crate) fn duplicate(&self) -> Error {
        match self {
            Error::NotFound(s) => Error::NotFound(s.clone()),
            Error::FileExists(s) => Error::FileExists(s.clone()),
            Error::FileState(e) => Error::FileState(e.clone()),
            Error::InvalidName(s) => Error::InvalidName(s.clone()),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            Error::Corrupt { name, states } => {
                Error::Corrupt { name: name.clone(), states: states.clone() }
            }
        }
    }
}

/// Raised when a [`crate::operation::FileOperation`] verb runs against an
/// entry whose current state is not in the declared accepted set.
///
/// Its `Display` impl is a stable contract (begins with the literal prefix
/// `"failed to perform"`) relied on by existing call sites.
#[derive(Debug, Clone)]
pub struct FileStateError {
    pub current: StateId,
    pub accepted: Vec<StateId>,
}

impl fmt::Display for FileStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to perform operation: entry in state {:?}, accepted {:?}",
            self.current, self.accepted
        )
    }
}

impl std::error::Error for FileStateError {}
