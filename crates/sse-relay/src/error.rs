//! Error types for the relay library

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the application
#[derive(Error, Debug)]
pub enum Error {
    /// The connection was already closed when the operation ran
    #[error("connection already closed")]
    ConnectionClosed,

    /// A reply was already sent on this connection
    #[error("reply already sent")]
    AlreadyReplied,

    /// IO errors from the underlying transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
