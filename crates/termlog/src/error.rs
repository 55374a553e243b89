//! Error types for log construction and claims.

use thiserror::Error;

/// Errors surfaced by the log substrate.
#[derive(Debug, Error)]
pub enum LogError {
    /// The requested term length is not usable.
    ///
    /// Term lengths must be a power of two within `[TERM_MIN_LENGTH,
    /// TERM_MAX_LENGTH]`, and the resulting file must fit a single mapping.
    #[error("invalid term length {requested}: must be a power of two in [{min}, {max}]")]
    InvalidTermLength {
        /// The term length that was requested.
        requested: usize,
        /// Smallest acceptable term length.
        min: usize,
        /// Largest acceptable term length.
        max: usize,
    },

    /// An existing log file does not match the requested term length.
    ///
    /// Processes sharing a log file must agree on the term length; the file
    /// size records it implicitly.
    #[error("log file length {actual} does not match term length {requested} (expected file length {expected})")]
    TermLengthMismatch {
        /// The term length requested by this open.
        requested: usize,
        /// File length implied by the requested term length.
        expected: u64,
        /// File length found on disk.
        actual: u64,
    },

    /// A claim was requested whose frame cannot fit in one term.
    #[error("invalid frame length: payload of {length} bytes exceeds max payload {max}")]
    InvalidFrameLength {
        /// The payload length that was requested.
        length: usize,
        /// Largest payload a single frame can carry in this log.
        max: usize,
    },

    /// File creation, sizing, or mapping failed.
    #[error("log i/o error: {0}")]
    Io(#[from] std::io::Error),
}
