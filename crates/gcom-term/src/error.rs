// SPDX-License-Identifier: MIT
//
// Error type for display operations.
//
// Two things can go wrong at runtime: the backend fails to write or read
// (the terminal went away), or a markup string nests too deeply. Structural
// misuse of the panel stack is a bug in the caller and panics instead.

use std::io;

use thiserror::Error;

use crate::markup::MarkupError;

/// Errors returned by [`Display`](crate::display::Display) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend failed to write output or read input.
    #[error("backend I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A markup string could not be rendered.
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

impl Error {
    /// Whether this is the backend reporting that input has ended.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Result alias for display operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::MAX_DEPTH;

    #[test]
    fn io_errors_convert() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
        assert!(!err.is_eof());
    }

    #[test]
    fn eof_is_recognised() {
        let err: Error = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(err.is_eof());
    }

    #[test]
    fn markup_errors_keep_their_message() {
        let inner = MarkupError::TooDeep {
            limit: MAX_DEPTH,
            offset: 3,
        };
        let expected = inner.to_string();
        let err: Error = inner.into();
        assert_eq!(err.to_string(), expected);
    }
}
