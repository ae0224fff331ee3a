//! Common types used in the protocol.

use crate::constants::*;
use crate::error::ProtocolError;

/// Status vocabulary shared by the task framework and the control surface.
///
/// The same codes travel on the wire in `PROP_LAST_STATUS` replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Operation completed successfully.
    Success,
    /// Malformed or out-of-range argument.
    BadArgument,
    /// The device cannot accept the operation right now.
    Busy,
    /// No terminal event within the operation deadline.
    Timeout,
    /// Structurally invalid traffic for the current phase.
    ProtocolError,
    /// Operation was force-terminated.
    Aborted,
}

impl StatusCode {
    /// Map a wire status byte into the host vocabulary.
    ///
    /// Codes this host does not know collapse to `ProtocolError`.
    pub fn from_wire(code: u8) -> Self {
        match code {
            STATUS_SUCCESS => StatusCode::Success,
            STATUS_BAD_ARGUMENT => StatusCode::BadArgument,
            STATUS_BUSY => StatusCode::Busy,
            STATUS_TIMEOUT => StatusCode::Timeout,
            STATUS_ABORTED => StatusCode::Aborted,
            _ => StatusCode::ProtocolError,
        }
    }

    /// The wire byte for this status.
    pub fn wire(&self) -> u8 {
        match self {
            StatusCode::Success => STATUS_SUCCESS,
            StatusCode::BadArgument => STATUS_BAD_ARGUMENT,
            StatusCode::Busy => STATUS_BUSY,
            StatusCode::Timeout => STATUS_TIMEOUT,
            StatusCode::ProtocolError => STATUS_PROTOCOL_ERROR,
            StatusCode::Aborted => STATUS_ABORTED,
        }
    }

    /// Whether this status reports success.
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCode::Success => write!(f, "success"),
            StatusCode::BadArgument => write!(f, "bad argument"),
            StatusCode::Busy => write!(f, "device busy"),
            StatusCode::Timeout => write!(f, "timed out waiting for the device"),
            StatusCode::ProtocolError => write!(f, "protocol error"),
            StatusCode::Aborted => write!(f, "operation aborted"),
        }
    }
}

/// Property ids understood by this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    /// Status of the most recent command.
    LastStatus,
    /// Protocol version implemented by the NCP.
    ProtocolVersion,
    /// NCP firmware version string.
    NcpVersion,
    /// Radio interface type.
    InterfaceType,
    /// Current radio channel.
    Channel,
    /// Scan state.
    ScanState,
    /// Channel mask bitmap used by the next scan.
    ScanMask,
    /// Per-channel dwell time in milliseconds.
    ScanPeriod,
    /// Network name.
    NetworkName,
    /// PAN id.
    PanId,
    /// Extended PAN id.
    XPanId,
    /// Whether the network interface is up.
    InterfaceUp,
    /// Whether the network stack is up.
    StackUp,
    /// Address cache table.
    AddressCache,
    /// A property id this host has no name for.
    Unknown(u16),
}

impl PropertyId {
    /// The wire id for this property.
    pub fn to_u16(&self) -> u16 {
        match self {
            PropertyId::LastStatus => PROP_LAST_STATUS,
            PropertyId::ProtocolVersion => PROP_PROTOCOL_VERSION,
            PropertyId::NcpVersion => PROP_NCP_VERSION,
            PropertyId::InterfaceType => PROP_INTERFACE_TYPE,
            PropertyId::Channel => PROP_CHANNEL,
            PropertyId::ScanState => PROP_SCAN_STATE,
            PropertyId::ScanMask => PROP_SCAN_MASK,
            PropertyId::ScanPeriod => PROP_SCAN_PERIOD,
            PropertyId::NetworkName => PROP_NETWORK_NAME,
            PropertyId::PanId => PROP_PAN_ID,
            PropertyId::XPanId => PROP_XPAN_ID,
            PropertyId::InterfaceUp => PROP_INTERFACE_UP,
            PropertyId::StackUp => PROP_STACK_UP,
            PropertyId::AddressCache => PROP_ADDRESS_CACHE,
            PropertyId::Unknown(id) => *id,
        }
    }
}

impl From<u16> for PropertyId {
    fn from(id: u16) -> Self {
        match id {
            PROP_LAST_STATUS => PropertyId::LastStatus,
            PROP_PROTOCOL_VERSION => PropertyId::ProtocolVersion,
            PROP_NCP_VERSION => PropertyId::NcpVersion,
            PROP_INTERFACE_TYPE => PropertyId::InterfaceType,
            PROP_CHANNEL => PropertyId::Channel,
            PROP_SCAN_STATE => PropertyId::ScanState,
            PROP_SCAN_MASK => PropertyId::ScanMask,
            PROP_SCAN_PERIOD => PropertyId::ScanPeriod,
            PROP_NETWORK_NAME => PropertyId::NetworkName,
            PROP_PAN_ID => PropertyId::PanId,
            PROP_XPAN_ID => PropertyId::XPanId,
            PROP_INTERFACE_UP => PropertyId::InterfaceUp,
            PROP_STACK_UP => PropertyId::StackUp,
            PROP_ADDRESS_CACHE => PropertyId::AddressCache,
            _ => PropertyId::Unknown(id),
        }
    }
}

/// Why the NCP reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Cold boot.
    PowerOn,
    /// Host- or self-requested software reset.
    Software,
    /// Watchdog expiry.
    Watchdog,
    /// Hardware fault.
    Fault,
    /// A reason code this host has no name for.
    Unknown(u8),
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetReason::PowerOn => write!(f, "power-on"),
            ResetReason::Software => write!(f, "software"),
            ResetReason::Watchdog => write!(f, "watchdog"),
            ResetReason::Fault => write!(f, "fault"),
            ResetReason::Unknown(code) => write!(f, "unknown (0x{:02X})", code),
        }
    }
}

impl From<u8> for ResetReason {
    fn from(code: u8) -> Self {
        match code {
            RESET_REASON_POWER_ON => ResetReason::PowerOn,
            RESET_REASON_SOFTWARE => ResetReason::Software,
            RESET_REASON_WATCHDOG => ResetReason::Watchdog,
            RESET_REASON_FAULT => ResetReason::Fault,
            _ => ResetReason::Unknown(code),
        }
    }
}

/// A scan channel selection: a 256-bit bitmap with an explicit length.
///
/// Bit `i` set means channel `i` is requested. Only the first `len` bytes
/// of the bitmap are meaningful and transmitted; `len` never exceeds
/// [`CHANNEL_MASK_CAPACITY`]. An all-zero mask is a valid selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMask {
    bytes: [u8; CHANNEL_MASK_CAPACITY],
    len: usize,
}

impl ChannelMask {
    /// An empty mask with zero meaningful bytes.
    pub fn new() -> Self {
        ChannelMask {
            bytes: [0u8; CHANNEL_MASK_CAPACITY],
            len: 0,
        }
    }

    /// Build a mask from raw bitmap bytes.
    ///
    /// Input longer than the bitmap capacity is rejected, never truncated.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() > CHANNEL_MASK_CAPACITY {
            return Err(ProtocolError::MaskTooLong {
                max: CHANNEL_MASK_CAPACITY,
                actual: bytes.len(),
            });
        }
        let mut mask = ChannelMask::new();
        mask.bytes[..bytes.len()].copy_from_slice(bytes);
        mask.len = bytes.len();
        Ok(mask)
    }

    /// Build a mask covering the given channels.
    pub fn from_channels<I: IntoIterator<Item = u8>>(channels: I) -> Self {
        let mut mask = ChannelMask::new();
        for channel in channels {
            mask.set(channel);
        }
        mask
    }

    /// Request a channel, growing the meaningful length as needed.
    pub fn set(&mut self, channel: u8) {
        let byte = channel as usize / 8;
        self.bytes[byte] |= 1 << (channel % 8);
        if byte + 1 > self.len {
            self.len = byte + 1;
        }
    }

    /// Whether a channel is requested.
    pub fn contains(&self, channel: u8) -> bool {
        let byte = channel as usize / 8;
        byte < self.len && self.bytes[byte] & (1 << (channel % 8)) != 0
    }

    /// Iterate the requested channels in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len * 8).filter_map(move |bit| {
            let channel = bit as u8;
            if self.contains(channel) {
                Some(channel)
            } else {
                None
            }
        })
    }

    /// Number of requested channels.
    pub fn count(&self) -> usize {
        self.bytes[..self.len]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum()
    }

    /// Number of meaningful bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no channel is requested.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The meaningful bitmap bytes, as transmitted.
    pub fn encode(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        ChannelMask::new()
    }
}

/// A discovered-network record reported during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    /// Channel the beacon was heard on.
    pub channel: u8,
    /// Received signal strength in dBm.
    pub rssi: i8,
    /// Link quality indicator.
    pub lqi: u8,
    /// PAN id of the advertising network.
    pub pan_id: u16,
    /// Extended address of the advertising node.
    pub ext_addr: [u8; EXT_ADDR_SIZE],
    /// Extended PAN id of the advertising network.
    pub xpan_id: [u8; XPAN_ID_SIZE],
    /// Network name.
    pub name: String,
}
