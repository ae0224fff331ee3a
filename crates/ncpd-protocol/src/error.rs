//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with the NCP serial protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame is too long.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame checksum mismatch.
    #[error("frame checksum mismatch: expected 0x{expected:02X}, computed 0x{actual:02X}")]
    BadChecksum {
        /// Checksum byte carried by the frame.
        expected: u8,
        /// Checksum computed over the payload.
        actual: u8,
    },

    /// Channel mask longer than the bitmap capacity.
    #[error("channel mask too long: maximum {max} bytes, got {actual}")]
    MaskTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Unknown event code.
    #[error("unknown event code: 0x{0:02X}")]
    UnknownEvent(u8),

    /// UTF-8 decoding error.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}
