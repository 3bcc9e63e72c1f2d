use std::io;

use thiserror::Error;

/// Unified error type for the storage engine.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from disk operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data on disk could not be interpreted (truncated file, bad escape, etc).
    #[error("Corruption: {0}")]
    Corruption(String),

    /// Two membership filters with different bit counts cannot be combined.
    #[error("filter size mismatch: {left} bits vs {right} bits")]
    FilterMismatch { left: usize, right: usize },

    /// Caller supplied something the engine refuses to work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine was closed, or its flush worker is gone.
    #[error("engine is closed")]
    Closed,
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
