//! Commands that can be sent to the NCP.

use crate::constants::*;
use crate::types::PropertyId;

/// Commands that can be sent to the NCP.
///
/// Every command carries a transaction id (1..=15) which the NCP echoes in
/// its reply so the host can correlate them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// No-operation; useful as a liveness probe.
    Noop {
        /// Transaction id.
        tid: u8,
    },

    /// Software-reset the NCP.
    Reset {
        /// Transaction id.
        tid: u8,
    },

    /// Read a property value.
    PropertyGet {
        /// Transaction id.
        tid: u8,
        /// Property to read.
        prop: PropertyId,
    },

    /// Write a property value.
    PropertySet {
        /// Transaction id.
        tid: u8,
        /// Property to write.
        prop: PropertyId,
        /// Raw value bytes.
        value: Vec<u8>,
    },

    /// Insert an entry into a list-valued property.
    PropertyInsert {
        /// Transaction id.
        tid: u8,
        /// Property to insert into.
        prop: PropertyId,
        /// Raw entry bytes.
        value: Vec<u8>,
    },

    /// Remove an entry from a list-valued property.
    PropertyRemove {
        /// Transaction id.
        tid: u8,
        /// Property to remove from.
        prop: PropertyId,
        /// Raw entry bytes.
        value: Vec<u8>,
    },
}

impl Command {
    /// Get the command code for this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::Noop { .. } => CMD_NOOP,
            Command::Reset { .. } => CMD_RESET,
            Command::PropertyGet { .. } => CMD_PROP_GET,
            Command::PropertySet { .. } => CMD_PROP_SET,
            Command::PropertyInsert { .. } => CMD_PROP_INSERT,
            Command::PropertyRemove { .. } => CMD_PROP_REMOVE,
        }
    }

    /// Get the transaction id carried by this command.
    pub fn tid(&self) -> u8 {
        match self {
            Command::Noop { tid }
            | Command::Reset { tid }
            | Command::PropertyGet { tid, .. }
            | Command::PropertySet { tid, .. }
            | Command::PropertyInsert { tid, .. }
            | Command::PropertyRemove { tid, .. } => *tid,
        }
    }

    /// Get the property this command addresses, if any.
    pub fn prop(&self) -> Option<PropertyId> {
        match self {
            Command::Noop { .. } | Command::Reset { .. } => None,
            Command::PropertyGet { prop, .. }
            | Command::PropertySet { prop, .. }
            | Command::PropertyInsert { prop, .. }
            | Command::PropertyRemove { prop, .. } => Some(*prop),
        }
    }

    /// Encode the command into a frame payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_FRAME_SIZE);

        match self {
            Command::Noop { tid } => {
                buf.push(CMD_NOOP);
                buf.push(*tid);
            }

            Command::Reset { tid } => {
                buf.push(CMD_RESET);
                buf.push(*tid);
            }

            Command::PropertyGet { tid, prop } => {
                buf.push(CMD_PROP_GET);
                buf.push(*tid);
                buf.extend_from_slice(&prop.to_u16().to_le_bytes());
            }

            Command::PropertySet { tid, prop, value } => {
                buf.push(CMD_PROP_SET);
                buf.push(*tid);
                buf.extend_from_slice(&prop.to_u16().to_le_bytes());
                buf.extend_from_slice(value);
            }

            Command::PropertyInsert { tid, prop, value } => {
                buf.push(CMD_PROP_INSERT);
                buf.push(*tid);
                buf.extend_from_slice(&prop.to_u16().to_le_bytes());
                buf.extend_from_slice(value);
            }

            Command::PropertyRemove { tid, prop, value } => {
                buf.push(CMD_PROP_REMOVE);
                buf.push(*tid);
                buf.extend_from_slice(&prop.to_u16().to_le_bytes());
                buf.extend_from_slice(value);
            }
        }

        buf
    }
}
