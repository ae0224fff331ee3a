//! Events received from the NCP.
//!
//! Everything the NCP sends is decoded into an [`Event`]: replies to host
//! commands (correlated by transaction id) and unsolicited occurrences
//! (property changes, scan beacons, scan completion, resets). Unsolicited
//! event codes have the high bit set.

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::{Beacon, PropertyId, ResetReason, StatusCode};

/// A reply to a host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Transaction id echoed from the command.
    pub tid: u8,
    /// Property the reply describes.
    pub prop: PropertyId,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

impl Reply {
    /// The wire status carried by a last-status reply, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        if self.prop == PropertyId::LastStatus && !self.value.is_empty() {
            Some(StatusCode::from_wire(self.value[0]))
        } else {
            None
        }
    }

    /// Whether this reply reports an error status.
    pub fn is_error(&self) -> bool {
        matches!(self.status(), Some(status) if !status.is_success())
    }
}

/// A decoded occurrence on the NCP serial channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Reply to a host command.
    Reply(Reply),

    /// Unsolicited property value change.
    PropertyChanged {
        /// Property that changed.
        prop: PropertyId,
        /// New raw value bytes.
        value: Vec<u8>,
    },

    /// A network beacon was heard during an active scan.
    BeaconFound(Beacon),

    /// The NCP finished sweeping every masked channel.
    ScanComplete,

    /// The NCP reset itself (or was reset).
    Reset {
        /// Why the NCP reset.
        reason: ResetReason,
    },
}

impl Event {
    /// Decode an event from a frame payload.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.is_empty() {
            return Err(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        }

        let code = frame[0];

        match code {
            EVT_REPLY => {
                if frame.len() < 4 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 4,
                        actual: frame.len(),
                    });
                }
                let tid = frame[1];
                let prop = PropertyId::from(u16::from_le_bytes([frame[2], frame[3]]));
                Ok(Event::Reply(Reply {
                    tid,
                    prop,
                    value: frame[4..].to_vec(),
                }))
            }

            EVT_PROP_CHANGED => {
                if frame.len() < 3 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 3,
                        actual: frame.len(),
                    });
                }
                let prop = PropertyId::from(u16::from_le_bytes([frame[1], frame[2]]));
                Ok(Event::PropertyChanged {
                    prop,
                    value: frame[3..].to_vec(),
                })
            }

            EVT_BEACON_FOUND => {
                let beacon = decode_beacon(&frame[1..])?;
                Ok(Event::BeaconFound(beacon))
            }

            EVT_SCAN_COMPLETE => Ok(Event::ScanComplete),

            EVT_RESET => {
                if frame.len() < 2 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 2,
                        actual: frame.len(),
                    });
                }
                Ok(Event::Reset {
                    reason: ResetReason::from(frame[1]),
                })
            }

            _ => {
                log::warn!("unknown event code 0x{:02X}", code);
                Err(ProtocolError::UnknownEvent(code))
            }
        }
    }
}

/// Beacon layout: channel, rssi, lqi, pan id (u16 LE), extended address,
/// extended PAN id, name length, name bytes.
fn decode_beacon(data: &[u8]) -> Result<Beacon, ProtocolError> {
    const FIXED_LEN: usize = 1 + 1 + 1 + 2 + EXT_ADDR_SIZE + XPAN_ID_SIZE + 1;

    if data.len() < FIXED_LEN {
        return Err(ProtocolError::FrameTooShort {
            expected: FIXED_LEN,
            actual: data.len(),
        });
    }

    let channel = data[0];
    let rssi = data[1] as i8;
    let lqi = data[2];
    let pan_id = u16::from_le_bytes([data[3], data[4]]);

    let mut ext_addr = [0u8; EXT_ADDR_SIZE];
    ext_addr.copy_from_slice(&data[5..5 + EXT_ADDR_SIZE]);

    let mut xpan_id = [0u8; XPAN_ID_SIZE];
    xpan_id.copy_from_slice(&data[13..13 + XPAN_ID_SIZE]);

    let name_len = data[21] as usize;
    if data.len() < FIXED_LEN + name_len {
        return Err(ProtocolError::FrameTooShort {
            expected: FIXED_LEN + name_len,
            actual: data.len(),
        });
    }

    let name = std::str::from_utf8(&data[22..22 + name_len])
        .map_err(|_| ProtocolError::InvalidUtf8)?
        .to_string();

    Ok(Beacon {
        channel,
        rssi,
        lqi,
        pan_id,
        ext_addr,
        xpan_id,
        name,
    })
}
