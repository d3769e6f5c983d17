//! Error types for the distributed product.
//!
//! Every variant is fatal for the run: there is no retry and no partial
//! result. A coordinator that fails before distribution aborts the group so
//! that workers blocked in a receive fail with [`Error::Aborted`].

use thiserror::Error;

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed Matrix Market banner, size line or entry.
    #[error("parse error on line {line}: {message}")]
    InputParse { line: usize, message: String },

    /// Input is not a sparse coordinate matrix this crate can handle.
    #[error("unsupported matrix format: {0}")]
    UnsupportedFormat(String),

    /// Matrix is smaller than the configured minimum outside test mode.
    #[error("matrix dimensions {rows}x{cols} are below the minimum of {min}")]
    SizeConstraint { rows: usize, cols: usize, min: usize },

    /// A triple references a row or column outside the matrix.
    #[error("entry {entry} at ({row}, {col}) lies outside a {nrows}x{ncols} matrix")]
    IndexOutOfRange {
        entry: usize,
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },

    /// A received message disagrees with the declared metadata or the
    /// expected message order.
    #[error("protocol error from rank {rank}: {message}")]
    Protocol { rank: usize, message: String },

    /// Envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A peer left the group before the run finished.
    #[error("rank {0} disconnected")]
    Disconnected(usize),

    /// Another rank aborted the group.
    #[error("group aborted by rank {rank}: {reason}")]
    Aborted { rank: usize, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn protocol<S: Into<String>>(rank: usize, message: S) -> Self {
        Error::Protocol {
            rank,
            message: message.into(),
        }
    }

    pub(crate) fn parse<S: Into<String>>(line: usize, message: S) -> Self {
        Error::InputParse {
            line,
            message: message.into(),
        }
    }
}
