//! Protocol constants
//!
//! These constants define the command codes, event codes, property ids,
//! and other protocol-specific values used on the NCP serial channel.

// ============================================================================
// Framing
// ============================================================================

/// Start-of-frame marker byte.
pub const FRAME_SOF: u8 = 0x7E;
/// Maximum payload size of a single frame.
pub const MAX_FRAME_SIZE: usize = 512;

// ============================================================================
// Command Codes (host → NCP)
// ============================================================================

/// No-operation; the NCP replies with a last-status property.
pub const CMD_NOOP: u8 = 1;
/// Software-reset the NCP.
pub const CMD_RESET: u8 = 2;
/// Read a property value.
pub const CMD_PROP_GET: u8 = 3;
/// Write a property value.
pub const CMD_PROP_SET: u8 = 4;
/// Insert an entry into a list-valued property.
pub const CMD_PROP_INSERT: u8 = 5;
/// Remove an entry from a list-valued property.
pub const CMD_PROP_REMOVE: u8 = 6;

// ============================================================================
// Event Codes (NCP → host)
// ============================================================================
// Unsolicited events have the high bit set; replies do not.

/// Reply to a host command, correlated by transaction id.
pub const EVT_REPLY: u8 = 0x01;
/// Unsolicited property value change.
pub const EVT_PROP_CHANGED: u8 = 0x81;
/// A network beacon was heard during an active scan.
pub const EVT_BEACON_FOUND: u8 = 0x82;
/// The NCP finished sweeping every masked channel.
pub const EVT_SCAN_COMPLETE: u8 = 0x83;
/// The NCP reset itself (or was reset).
pub const EVT_RESET: u8 = 0x84;

// ============================================================================
// Status Codes
// ============================================================================

/// Operation completed successfully.
pub const STATUS_SUCCESS: u8 = 0;
/// Malformed or out-of-range argument.
pub const STATUS_BAD_ARGUMENT: u8 = 1;
/// The NCP cannot accept the operation right now.
pub const STATUS_BUSY: u8 = 2;
/// No terminal event arrived within the operation deadline.
pub const STATUS_TIMEOUT: u8 = 3;
/// Structurally invalid traffic for the current phase.
pub const STATUS_PROTOCOL_ERROR: u8 = 4;
/// Operation was force-terminated.
pub const STATUS_ABORTED: u8 = 5;

// ============================================================================
// Property Ids
// ============================================================================

/// Status of the most recent command (reply payload is one status byte).
pub const PROP_LAST_STATUS: u16 = 0x0000;
/// Protocol version implemented by the NCP.
pub const PROP_PROTOCOL_VERSION: u16 = 0x0001;
/// NCP firmware version string.
pub const PROP_NCP_VERSION: u16 = 0x0002;
/// Radio interface type.
pub const PROP_INTERFACE_TYPE: u16 = 0x0003;
/// Current radio channel.
pub const PROP_CHANNEL: u16 = 0x0100;
/// Scan state (see `SCAN_STATE_*`). Writing `SCAN_STATE_SCANNING` starts a scan.
pub const PROP_SCAN_STATE: u16 = 0x0101;
/// Channel mask bitmap used by the next scan.
pub const PROP_SCAN_MASK: u16 = 0x0102;
/// Per-channel dwell time in milliseconds (u16 LE).
pub const PROP_SCAN_PERIOD: u16 = 0x0103;
/// Network name (UTF-8, at most `MAX_NETWORK_NAME_LEN` bytes).
pub const PROP_NETWORK_NAME: u16 = 0x0200;
/// 802.15.4 PAN id (u16 LE).
pub const PROP_PAN_ID: u16 = 0x0201;
/// Extended PAN id (8 bytes).
pub const PROP_XPAN_ID: u16 = 0x0202;
/// Whether the network interface is up (one bool byte).
pub const PROP_INTERFACE_UP: u16 = 0x0300;
/// Whether the network stack is up (one bool byte).
pub const PROP_STACK_UP: u16 = 0x0301;
/// Address cache table (insert: 16-byte address + 8-byte IID + u16 BE locator).
pub const PROP_ADDRESS_CACHE: u16 = 0x0400;

// ============================================================================
// Property Values
// ============================================================================

/// Scan state: idle.
pub const SCAN_STATE_IDLE: u8 = 0;
/// Scan state: actively sweeping channels.
pub const SCAN_STATE_SCANNING: u8 = 1;

// ============================================================================
// Reset Reasons
// ============================================================================

/// Cold boot.
pub const RESET_REASON_POWER_ON: u8 = 0;
/// Host- or self-requested software reset.
pub const RESET_REASON_SOFTWARE: u8 = 1;
/// Watchdog expiry.
pub const RESET_REASON_WATCHDOG: u8 = 2;
/// Hardware fault.
pub const RESET_REASON_FAULT: u8 = 3;

// ============================================================================
// Sizes
// ============================================================================

/// Channel mask bitmap capacity in bytes (256 channels).
pub const CHANNEL_MASK_CAPACITY: usize = 32;
/// Extended (EUI-64) address size.
pub const EXT_ADDR_SIZE: usize = 8;
/// Extended PAN id size.
pub const XPAN_ID_SIZE: usize = 8;
/// Maximum network name length in bytes.
pub const MAX_NETWORK_NAME_LEN: usize = 16;
/// Highest valid transaction id; 0 is reserved for unsolicited traffic.
pub const MAX_TID: u8 = 15;
