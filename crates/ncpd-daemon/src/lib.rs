//! # ncpd-daemon
//!
//! The NCP control daemon and its command-line client.
//!
//! `ncpd` owns one network co-processor attached over a serial device
//! (or a TCP endpoint, for bench setups) and exposes a JSON-lines
//! control socket; `ncpctl` is the thin client for that socket. In
//! between sit three groups of threads:
//!
//! - the transport reader/writer pair moving raw bytes ([`transport`])
//! - the control accept loop and its connection threads ([`control`])
//! - the instance event loop that owns all task state ([`instance`])
//!
//! The instance thread is the only one that touches the dispatcher, so
//! task state is never shared across threads; everything reaches the
//! instance over channels and comes back the same way.

pub mod config;
pub mod control;
pub mod error;
pub mod instance;
pub mod metrics;
pub mod transport;

pub use config::{load_config, DaemonConfig};
pub use control::{
    request_over_socket, ControlMessage, ControlReply, ControlRequest, ControlServer,
    DaemonStatus, NetworkRecord,
};
pub use error::DaemonError;
pub use instance::Instance;
pub use transport::{spawn_transport, Endpoint, Transport, TransportInput};
