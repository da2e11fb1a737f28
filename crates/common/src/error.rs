//! Central error types for the demuxing core (thiserror-based).

use thiserror::Error;

/// Demuxing errors — every failure the core can report.
///
/// "No packet because end-of-stream" is *not* an error; iteration signals
/// it with `Ok(None)`. Errors here are always distinguishable failure
/// kinds the embedding application can branch on.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source does not support seeking")]
    Unseekable,

    #[error("Seek target {offset} is beyond the source length {len}")]
    OutOfRange { offset: u64, len: u64 },

    #[error("No registered container format matched the stream content")]
    UnrecognizedFormat,

    #[error("Truncated stream at offset {offset}: {reason}")]
    TruncatedStream { offset: u64, reason: String },

    #[error("Corrupt container at offset {offset}: {reason}")]
    CorruptContainer { offset: u64, reason: String },

    #[error("Container has no seek index and linear scanning is disabled")]
    SeekIndexUnavailable,

    #[error("Unknown stream id {0}")]
    InvalidStream(u32),
}

/// Convenience Result type for demuxing operations.
pub type DemuxResult<T> = Result<T, DemuxError>;
