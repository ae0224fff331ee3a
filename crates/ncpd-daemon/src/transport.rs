//! Byte transport between the daemon and the NCP.
//!
//! The device is either a local serial port or a TCP endpoint (an NCP
//! behind a network bridge, or a simulator). Either way the instance
//! sees the same thing: a channel of received byte chunks and a channel
//! of outgoing framed bytes, bridged to the device by a reader thread
//! and a writer thread.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use crate::error::DaemonError;

/// Read timeout on the device; bounds how often the reader thread gets
/// to notice a shutdown request.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// What the reader thread delivers to the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportInput {
    /// A chunk of raw bytes from the device.
    Bytes(Vec<u8>),
    /// The device went away. Delivered at most once, after which the
    /// reader thread exits.
    Closed,
}

/// Where the NCP lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local serial device path.
    Serial(String),
    /// TCP host:port.
    Tcp(String),
}

impl Endpoint {
    /// Parse a device string: `tcp://host:port` selects TCP, anything
    /// else is a serial device path.
    pub fn parse(device: &str) -> Self {
        match device.strip_prefix("tcp://") {
            Some(addr) => Endpoint::Tcp(addr.to_string()),
            None => Endpoint::Serial(device.to_string()),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Serial(path) => write!(f, "{}", path),
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Running transport: two threads bridging the device to channels.
pub struct Transport {
    input_rx: Receiver<TransportInput>,
    output_tx: Sender<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Transport {
    /// Receiver side for the instance loop.
    pub fn input(&self) -> Receiver<TransportInput> {
        self.input_rx.clone()
    }

    /// Sender for outgoing framed bytes.
    pub fn output(&self) -> Sender<Vec<u8>> {
        self.output_tx.clone()
    }

    /// Stop both threads and wait for them.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
        debug!("Transport: stopped");
    }
}

/// Open the device and start the reader and writer threads.
pub fn spawn_transport(endpoint: &Endpoint, baud: u32) -> Result<Transport, DaemonError> {
    let (read_io, write_io) = open_endpoint(endpoint, baud)?;
    let (input_tx, input_rx) = crossbeam_channel::unbounded();
    let (output_tx, output_rx) = crossbeam_channel::unbounded::<Vec<u8>>();
    let shutdown = Arc::new(AtomicBool::new(false));

    let reader_shutdown = Arc::clone(&shutdown);
    let reader = thread::Builder::new()
        .name("ncp-read".to_string())
        .spawn(move || read_loop(read_io, input_tx, reader_shutdown))
        .expect("Failed to spawn transport reader thread");

    let writer_shutdown = Arc::clone(&shutdown);
    let writer = thread::Builder::new()
        .name("ncp-write".to_string())
        .spawn(move || write_loop(write_io, output_rx, writer_shutdown))
        .expect("Failed to spawn transport writer thread");

    Ok(Transport {
        input_rx,
        output_tx,
        shutdown,
        reader: Some(reader),
        writer: Some(writer),
    })
}

fn open_endpoint(
    endpoint: &Endpoint,
    baud: u32,
) -> Result<(Box<dyn Read + Send>, Box<dyn Write + Send>), DaemonError> {
    match endpoint {
        Endpoint::Serial(path) => {
            let port = serialport::new(path.as_str(), baud)
                .timeout(READ_TIMEOUT)
                .open()
                .map_err(|err| DaemonError::DeviceOpen {
                    device: path.clone(),
                    reason: err.to_string(),
                })?;
            let writer = port.try_clone().map_err(|err| DaemonError::DeviceOpen {
                device: path.clone(),
                reason: err.to_string(),
            })?;
            debug!("Transport: opened serial device {} at {} baud", path, baud);
            Ok((Box::new(port), Box::new(writer)))
        }
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr).map_err(|err| DaemonError::DeviceOpen {
                device: format!("tcp://{}", addr),
                reason: err.to_string(),
            })?;
            stream.set_read_timeout(Some(READ_TIMEOUT))?;
            stream.set_nodelay(true)?;
            let writer = stream.try_clone()?;
            debug!("Transport: connected to tcp://{}", addr);
            Ok((Box::new(stream), Box::new(writer)))
        }
    }
}

fn read_loop(
    mut device: Box<dyn Read + Send>,
    input_tx: Sender<TransportInput>,
    shutdown: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 512];
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        match device.read(&mut buf) {
            Ok(0) => {
                warn!("Transport: device closed the connection");
                let _ = input_tx.send(TransportInput::Closed);
                return;
            }
            Ok(n) => {
                trace!("Transport: read {} byte(s)", n);
                if input_tx.send(TransportInput::Bytes(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            // Timeouts just give us another look at the shutdown flag.
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                warn!("Transport: read failed: {}", err);
                let _ = input_tx.send(TransportInput::Closed);
                return;
            }
        }
    }
}

fn write_loop(
    mut device: Box<dyn Write + Send>,
    output_rx: Receiver<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        match output_rx.recv_timeout(READ_TIMEOUT) {
            Ok(frame) => {
                trace!("Transport: writing {} byte(s)", frame.len());
                if let Err(err) = device.write_all(&frame).and_then(|_| device.flush()) {
                    warn!("Transport: write failed: {}", err);
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
