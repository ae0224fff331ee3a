//! Daemon configuration.

use std::path::{Path, PathBuf};

use ncpd_core::DEFAULT_SCAN_PERIOD_MS;
use serde::{Deserialize, Serialize};

use crate::error::DaemonError;

/// Configuration for one daemon instance.
///
/// Loaded from a YAML file; every field has a default so an empty file
/// (or no file at all) is a valid configuration. Command-line flags
/// override file values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Device endpoint: a serial device path, or `tcp://host:port` for
    /// an NCP reachable over the network (e.g. a simulator).
    pub device: String,

    /// Serial baud rate. Ignored for TCP endpoints.
    pub baud: u32,

    /// Path of the Unix control socket.
    pub socket: PathBuf,

    /// Per-channel dwell period for scans, in milliseconds.
    pub scan_period_ms: u16,

    /// Send a software reset to the NCP right after connecting.
    pub reset_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            device: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
            socket: PathBuf::from("/tmp/ncpd.sock"),
            scan_period_ms: DEFAULT_SCAN_PERIOD_MS,
            reset_on_start: false,
        }
    }
}

/// Load a configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<DaemonConfig, DaemonError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DaemonError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&contents)
}

/// Load a configuration from a YAML string.
pub fn load_config_from_str(contents: &str) -> Result<DaemonConfig, DaemonError> {
    if contents.trim().is_empty() {
        return Ok(DaemonConfig::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}
