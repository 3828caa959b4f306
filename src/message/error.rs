//! Errors produced by message construction and (de)serialization.

use thiserror::Error;

/// Failure modes for [`crate::message::Message`] canonical (de)serialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The frame ended before a declared length/field could be read.
    #[error("message frame truncated")]
    Truncated,

    /// A property name or value was not valid UTF-8.
    #[error("message frame contained invalid UTF-8")]
    InvalidUtf8,

    /// The 4-byte length prefix did not match the frame's actual length.
    #[error("frame length mismatch: header declared {declared}, actual {actual}")]
    LengthMismatch { declared: u32, actual: usize },
}
