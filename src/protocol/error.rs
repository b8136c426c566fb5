//! Wire protocol error types

use thiserror::Error;

/// Frame codec and payload decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A read would run past the declared body length
    #[error("frame truncated: need {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes requested by the read
        needed: usize,
        /// Bytes left before the end of the declared body
        remaining: usize,
    },

    /// Received buffer is shorter than the 4-byte length header
    #[error("invalid frame header: got {got} bytes, need {needed}")]
    InvalidHeader {
        /// Header size
        needed: usize,
        /// Bytes available
        got: usize,
    },

    /// Declared body length exceeds the accepted maximum
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared body size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// A value does not fit the wire field it is encoded into
    #[error("{field} out of range: {value}")]
    ValueOutOfRange {
        /// Field being encoded
        field: &'static str,
        /// Offending value
        value: i64,
    },

    /// A per-cell array does not match the grid size
    #[error("{what} has {got} entries, grid expects {expected}")]
    SizeMismatch {
        /// Array being checked
        what: &'static str,
        /// Expected number of entries
        expected: usize,
        /// Actual number of entries
        got: usize,
    },

    /// Tag byte not present in the message type table
    #[error("unknown message type: {tag:#x}")]
    UnknownMessageType {
        /// Tag byte
        tag: u8,
    },

    /// Frame body is empty, so there is no tag to dispatch on
    #[error("frame has an empty body")]
    EmptyBody,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
