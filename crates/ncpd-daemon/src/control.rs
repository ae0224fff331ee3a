//! Control socket: the client-facing RPC surface.
//!
//! One JSON request per line, one JSON reply per line, over a Unix
//! socket. The server side accepts connections on a dedicated thread
//! and forwards each parsed request to the instance loop; the
//! connection thread blocks (bounded) until the matching task
//! completes and the reply comes back.

use std::fs;
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use ncpd_core::TaskResult;
use ncpd_protocol::{Beacon, PropertyId, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DaemonError;

/// How long a connection waits for its task to complete before giving
/// up on the daemon.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on one request line.
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// Accept-loop sleep while the nonblocking listener has nothing.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

// ============================================================================
// Request / reply vocabulary
// ============================================================================

/// A request from a control client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum ControlRequest {
    /// Scan for nearby networks.
    Scan {
        /// Channel numbers to scan. Mutually exclusive with `mask`.
        channels: Option<Vec<u8>>,
        /// Raw channel mask bitmap as hex. Overrides `channels`.
        mask: Option<String>,
        /// Per-channel dwell period in milliseconds.
        period_ms: Option<u16>,
    },
    /// Form a new network.
    Form {
        /// Network name, at most 16 bytes.
        name: String,
        /// Optional fixed channel.
        channel: Option<u8>,
    },
    /// Leave the current network.
    Leave,
    /// Read a property value.
    Get {
        /// Property name (or `0x`-prefixed wire id).
        property: String,
    },
    /// Write a property value.
    Set {
        /// Property name (or `0x`-prefixed wire id).
        property: String,
        /// New value as hex.
        value: String,
    },
    /// Insert an entry into the NCP's address cache.
    AddCache {
        /// Full address: textual IPv6 or 32 hex digits.
        address: String,
        /// Interface identifier: 16 hex digits.
        iid: String,
        /// Mesh locator: 4 hex digits.
        rloc16: String,
    },
    /// Report daemon state. Answered without touching the NCP.
    Status,
}

/// A discovered network as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Channel the beacon was heard on.
    pub channel: u8,
    /// Received signal strength in dBm.
    pub rssi: i8,
    /// Link quality indicator.
    pub lqi: u8,
    /// PAN id, formatted `0xNNNN`.
    pub pan_id: String,
    /// Network name.
    pub name: String,
    /// Extended address, hex.
    pub ext_addr: String,
    /// Extended PAN id, hex.
    pub xpan_id: String,
}

impl From<&Beacon> for NetworkRecord {
    fn from(beacon: &Beacon) -> Self {
        NetworkRecord {
            channel: beacon.channel,
            rssi: beacon.rssi,
            lqi: beacon.lqi,
            pan_id: format!("0x{:04X}", beacon.pan_id),
            name: beacon.name.clone(),
            ext_addr: hex::encode(beacon.ext_addr),
            xpan_id: hex::encode(beacon.xpan_id),
        }
    }
}

/// Daemon state for the `status` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Configured device endpoint.
    pub device: String,
    /// Tasks accepted since startup.
    pub tasks_submitted: u64,
    /// Tasks that reached a terminal outcome.
    pub tasks_completed: u64,
    /// Tasks currently waiting behind the active one.
    pub tasks_pending: usize,
    /// Whether some task currently owns the channel.
    pub busy: bool,
}

/// Reply sent back over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    /// Outcome label, e.g. `success` or `bad-argument`.
    pub status: String,
    /// Human-readable diagnosis.
    pub message: String,
    /// Networks found, for scan replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<NetworkRecord>>,
    /// Raw property value as hex, for get replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Daemon state, for status replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon: Option<DaemonStatus>,
}

impl ControlReply {
    /// Build the reply for a finished task.
    pub fn from_completion(status: StatusCode, result: TaskResult) -> Self {
        let mut reply = ControlReply {
            status: status_label(status).to_string(),
            message: status.to_string(),
            networks: None,
            value: None,
            daemon: None,
        };
        match result {
            TaskResult::None => {}
            TaskResult::Networks(networks) => {
                reply.networks = Some(networks.iter().map(NetworkRecord::from).collect());
            }
            TaskResult::Bytes(bytes) => reply.value = Some(hex::encode(bytes)),
        }
        reply
    }

    /// Build a failure reply with a specific diagnosis.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        ControlReply {
            status: status_label(status).to_string(),
            message: message.into(),
            networks: None,
            value: None,
            daemon: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Stable wire label for a status code.
pub fn status_label(status: StatusCode) -> &'static str {
    match status {
        StatusCode::Success => "success",
        StatusCode::BadArgument => "bad-argument",
        StatusCode::Busy => "busy",
        StatusCode::Timeout => "timeout",
        StatusCode::ProtocolError => "protocol-error",
        StatusCode::Aborted => "aborted",
    }
}

/// Resolve a property argument: a friendly name, or a `0x`-prefixed
/// wire id for properties this host has no name for.
pub fn parse_property_name(name: &str) -> Option<PropertyId> {
    let id = match name.to_ascii_lowercase().as_str() {
        "last-status" => PropertyId::LastStatus,
        "protocol-version" => PropertyId::ProtocolVersion,
        "ncp-version" => PropertyId::NcpVersion,
        "interface-type" => PropertyId::InterfaceType,
        "channel" => PropertyId::Channel,
        "scan-state" => PropertyId::ScanState,
        "scan-mask" => PropertyId::ScanMask,
        "scan-period" => PropertyId::ScanPeriod,
        "network-name" => PropertyId::NetworkName,
        "pan-id" => PropertyId::PanId,
        "xpan-id" => PropertyId::XPanId,
        "interface-up" => PropertyId::InterfaceUp,
        "stack-up" => PropertyId::StackUp,
        "address-cache" => PropertyId::AddressCache,
        other => {
            let raw = other.strip_prefix("0x")?;
            let code = u16::from_str_radix(raw, 16).ok()?;
            PropertyId::from(code)
        }
    };
    Some(id)
}

// ============================================================================
// Server
// ============================================================================

/// A request paired with the channel its reply goes back on.
pub type ControlMessage = (ControlRequest, Sender<ControlReply>);

/// Accept-loop handle for the control socket.
pub struct ControlServer {
    socket_path: PathBuf,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind the socket and start accepting connections.
    ///
    /// A stale socket file left behind by a crashed daemon is removed;
    /// a socket another live daemon is serving is an error.
    pub fn bind(path: &Path, request_tx: Sender<ControlMessage>) -> Result<Self, DaemonError> {
        let listener = bind_unix(path).map_err(|source| DaemonError::ControlSocket {
            path: path.to_path_buf(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| DaemonError::ControlSocket {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Control: listening on {}", path.display());

        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_shutdown = Arc::clone(&shutdown);
        let accept_thread = thread::Builder::new()
            .name("ncpd-control".to_string())
            .spawn(move || accept_loop(listener, request_tx, accept_shutdown))
            .expect("Failed to spawn control accept thread");

        Ok(ControlServer {
            socket_path: path.to_path_buf(),
            shutdown,
            accept_thread: Some(accept_thread),
        })
    }

    /// Stop accepting, wait for the accept thread, remove the socket.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        let _ = fs::remove_file(&self.socket_path);
        debug!("Control: stopped");
    }
}

fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == ErrorKind::AddrInUse => {
            // Probe the existing socket: a live daemon answers the
            // connect, a stale file from a crashed run does not.
            if UnixStream::connect(path).is_ok() {
                return Err(err);
            }
            fs::remove_file(path)?;
            UnixListener::bind(path)
        }
        Err(err) => Err(err),
    }
}

fn accept_loop(
    listener: UnixListener,
    request_tx: Sender<ControlMessage>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                let request_tx = request_tx.clone();
                let spawned = thread::Builder::new()
                    .name("ncpd-control-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = handle_connection(stream, request_tx) {
                            debug!("Control: connection ended: {}", err);
                        }
                    });
                if let Err(err) = spawned {
                    warn!("Control: could not spawn connection thread: {}", err);
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_BACKOFF),
            Err(err) => {
                warn!("Control: accept failed: {}", err);
                thread::sleep(ACCEPT_BACKOFF);
            }
        }
    }
}

/// Serve one request/reply exchange, then close.
fn handle_connection(stream: UnixStream, request_tx: Sender<ControlMessage>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?).take(MAX_REQUEST_BYTES);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        // Client connected and left without asking anything.
        return Ok(());
    }

    let reply = match serde_json::from_str::<ControlRequest>(line.trim()) {
        Ok(request) => {
            debug!("Control: request {:?}", request);
            forward_request(request, &request_tx)
        }
        Err(err) => ControlReply::failure(
            StatusCode::BadArgument,
            format!("unparseable request: {}", err),
        ),
    };

    let json = serde_json::to_string(&reply).unwrap_or_else(|_| {
        r#"{"status":"protocol-error","message":"reply serialization failed"}"#.to_string()
    });
    let mut stream = stream;
    stream.write_all(json.as_bytes())?;
    stream.write_all(b"\n")?;
    Ok(())
}

/// Hand the request to the instance loop and wait (bounded) for the
/// matching task to finish.
fn forward_request(request: ControlRequest, request_tx: &Sender<ControlMessage>) -> ControlReply {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
    if request_tx.send((request, reply_tx)).is_err() {
        return ControlReply::failure(StatusCode::Aborted, "daemon is shutting down");
    }
    match reply_rx.recv_timeout(REPLY_TIMEOUT) {
        Ok(reply) => reply,
        Err(_) => ControlReply::failure(StatusCode::Timeout, "daemon did not answer in time"),
    }
}

// ============================================================================
// Client side
// ============================================================================

/// One request/reply exchange over the control socket. Used by
/// `ncpctl` and by tests.
pub fn request_over_socket(path: &Path, request: &ControlRequest) -> io::Result<ControlReply> {
    let mut stream = UnixStream::connect(path)?;
    stream.set_read_timeout(Some(REPLY_TIMEOUT + Duration::from_secs(5)))?;

    let mut json = serde_json::to_vec(request)?;
    json.push(b'\n');
    stream.write_all(&json)?;

    let mut reader = BufReader::new(stream).take(MAX_REQUEST_BYTES);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    serde_json::from_str(line.trim())
        .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))
}
