//! Core error types.

use thiserror::Error;

/// Errors surfaced by the command link between the dispatcher and the
/// transport writer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The transport writer is gone; nothing can be sent.
    #[error("command link closed")]
    Closed,
}

/// Errors from parsing the textual arguments of the address-cache call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    /// Parsed to the wrong number of bytes.
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Required byte count.
        expected: usize,
        /// Byte count the input produced.
        actual: usize,
    },

    /// Input is not valid hex data.
    #[error("invalid hex data: {0}")]
    InvalidHex(String),

    /// Input is not a valid textual address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
