//! Error types for nettrace

use thiserror::Error;

/// Result type alias for nettrace operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Caller-side argument problem (empty interface set, missing path)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An interface could not be opened for capture
    #[error("cannot open capture on '{interface}': {reason}")]
    CaptureOpen { interface: String, reason: String },

    /// A capture handle failed mid-session
    #[error("capture failed on '{interface}': {reason}")]
    CaptureRuntime { interface: String, reason: String },

    /// The file is not a readable capture file, or contains no valid frames
    #[error("unreadable capture file: {0}")]
    FileFormat(String),

    /// Filesystem failure on read or write
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Save requested with nothing matching the selection
    #[error("no frames matched the requested selection")]
    NoData,
}
