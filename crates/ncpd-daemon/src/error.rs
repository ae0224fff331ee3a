//! Error types for the daemon.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while running the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Invalid config: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Configuration file could not be read.
    #[error("Cannot read config file {path}: {source}")]
    ConfigRead {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The device endpoint could not be opened.
    #[error("Cannot open device {device}: {reason}")]
    DeviceOpen {
        /// Configured device endpoint.
        device: String,
        /// What the transport layer reported.
        reason: String,
    },

    /// The connection to the device was lost while tasks may have been
    /// in flight.
    #[error("Device link lost ({0})")]
    LinkLost(String),

    /// The control socket could not be set up.
    #[error("Control socket error on {path}: {source}")]
    ControlSocket {
        /// Socket path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
