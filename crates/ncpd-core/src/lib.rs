//! NCP operation framework.
//!
//! Everything the daemon does to the NCP is a *task*: a self-contained
//! state machine that drives one logical operation (scan, form, leave,
//! property access) through a sequence of outgoing commands and incoming
//! events, then terminates exactly once with a status and a result.
//!
//! The serial channel is half-duplex and cannot multiplex operations, so
//! the [`Dispatcher`] owns the channel and enforces the one rule that
//! keeps the protocol sound: at most one task is active at any instant.
//! Further tasks queue FIFO behind it. The dispatcher is purely reactive;
//! it advances only when the surrounding event loop feeds it decoded
//! events and timer ticks.

pub mod addr;
mod dispatcher;
mod error;
mod task;
mod tasks;

#[cfg(test)]
pub(crate) mod test_util;

pub use dispatcher::{Dispatcher, DispatcherStats};
pub use error::*;
pub use task::*;
pub use tasks::*;
