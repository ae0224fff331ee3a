//! `ncpd`: the NCP control daemon.
//!
//! Owns one NCP device, serializes every operation onto it, and answers
//! clients on a Unix control socket. `ncpctl` is the matching client.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use crossbeam_channel::unbounded;
use ncpd_daemon::control::ControlServer;
use ncpd_daemon::transport::{spawn_transport, Endpoint};
use ncpd_daemon::{load_config, metrics, DaemonConfig, DaemonError, Instance};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ncpd", version)]
#[command(about = "NCP control daemon")]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial device path, or a tcp://host:port endpoint
    #[arg(long)]
    device: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Control socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Reset the NCP before serving requests
    #[arg(long)]
    reset: bool,
}

impl Cli {
    /// Load the configuration file and lay the command line over it.
    fn into_config(self) -> Result<DaemonConfig, DaemonError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => DaemonConfig::default(),
        };
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if let Some(socket) = self.socket {
            config.socket = socket;
        }
        config.reset_on_start |= self.reset;
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        error!("ncpd: {}", err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), DaemonError> {
    let config = cli.into_config()?;
    metrics::describe_metrics();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            info!("ncpd: interrupt received");
            shutdown.store(true, Ordering::SeqCst);
        })
        .expect("Failed to set Ctrl-C handler");
    }

    let endpoint = Endpoint::parse(&config.device);
    let transport = spawn_transport(&endpoint, config.baud)?;
    info!("ncpd: connected to {}", endpoint);

    let (control_tx, control_rx) = unbounded();
    let server = ControlServer::bind(&config.socket, control_tx)?;

    let mut instance = Instance::new(
        endpoint.to_string(),
        config.scan_period_ms,
        transport.output(),
        transport.input(),
        control_rx,
        Arc::clone(&shutdown),
    );
    if config.reset_on_start {
        instance.reset_ncp();
    }

    let result = instance.run();

    // Stop accepting before tearing the transport down so clients see
    // a vanished socket, not a daemon that answers and then dies.
    server.shutdown();
    transport.shutdown();
    info!("ncpd: stopped");
    result
}
