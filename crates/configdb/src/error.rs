use std::io;

use thiserror::Error;

/// Structured import/export failure, reported by the streaming engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("bad syntax")]
    BadSyntax,
    #[error("bad type")]
    BadType,
    #[error("bad selector")]
    BadSelector,
    #[error("bad index")]
    BadIndex,
    #[error("bad property")]
    BadProperty,
    #[error("not in schema")]
    NotInSchema,
    #[error("update conflict")]
    UpdateConflict,
}

/// The three outward error kinds of the core runtime.
///
/// Range, enum-index and alias misuses never surface here; they are clamped
/// or skipped locally so that partial loads remain useful.
#[derive(Debug, Error)]
pub enum Error {
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("file error")]
    File(#[source] io::Error),
    #[error("update conflict")]
    UpdateConflict,
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::File(source)
    }
}

impl Error {
    /// True when another writer held the store.
    pub fn is_update_conflict(&self) -> bool {
        matches!(
            self,
            Error::UpdateConflict | Error::Format(FormatError::UpdateConflict)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
