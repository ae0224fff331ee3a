//! NCP Serial Control Protocol
//!
//! This crate provides types and utilities for communicating with a mesh
//! network co-processor (NCP) over its serial control channel. The channel
//! carries framed messages in both directions; each payload starts with a
//! command or event code byte.
//!
//! # Protocol Overview
//!
//! The NCP exposes a property-based control surface. Messages are either:
//!
//! - **Commands** (host → NCP): start with a `CMD_*` byte followed by a
//!   transaction id (1..=15) that the NCP echoes in its reply
//! - **Replies** (NCP → host): start with `EVT_REPLY` and carry the echoed
//!   transaction id
//! - **Unsolicited events** (NCP → host): start with an `EVT_*` byte with
//!   the high bit set (0x80+) and carry no transaction id
//!
//! # Example
//!
//! ```rust,ignore
//! use ncpd_protocol::{Command, Event, FrameCodec, PropertyId};
//!
//! // Build a command
//! let cmd = Command::PropertyGet { tid: 1, prop: PropertyId::NcpVersion };
//! let frame = FrameCodec::encode(&cmd.encode());
//!
//! // Parse an incoming payload
//! let event = Event::decode(&received_payload)?;
//! ```

mod commands;
mod constants;
mod error;
mod events;
mod frame;
mod types;

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use events::*;
pub use frame::*;
pub use types::*;
