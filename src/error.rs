use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JailError {
    /// The jail root cannot confine anything.
    #[error("invalid jail root '{}': {reason}", root.display())]
    InvalidRoot { root: PathBuf, reason: &'static str },

    /// A path position received a value the strict policy refuses to forward.
    #[error("{operation}: argument {position} cannot be confined (got {kind})")]
    UnsupportedArgument {
        operation: &'static str,
        position: usize,
        kind: &'static str,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<JailError> for io::Error {
    fn from(err: JailError) -> Self {
        match err {
            JailError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

impl JailError {
    /// Recover a confinement rejection from an error returned by a bound surface.
    ///
    /// Returns `None` for errors produced by the provider itself.
    pub fn from_io(err: &io::Error) -> Option<&JailError> {
        err.get_ref()?.downcast_ref::<JailError>()
    }
}
