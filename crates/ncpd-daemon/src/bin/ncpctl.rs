//! `ncpctl`: command-line client for the ncpd control socket.
//!
//! Each invocation is one request/reply exchange. Exit status is 0 when
//! the daemon reports success and 1 for every failure, including not
//! reaching the daemon at all.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use ncpd_core::addr::CacheEntry;
use ncpd_daemon::control::{request_over_socket, ControlReply, ControlRequest, NetworkRecord};

#[derive(Parser, Debug)]
#[command(name = "ncpctl", version)]
#[command(about = "Command-line client for ncpd")]
struct Cli {
    /// Control socket path
    #[arg(long, default_value = "/tmp/ncpd.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: CtlCommand,
}

#[derive(Subcommand, Debug)]
enum CtlCommand {
    /// Scan for nearby networks
    Scan {
        /// Comma-separated channels to scan (defaults to the 2.4 GHz band)
        #[arg(long, value_delimiter = ',')]
        channels: Option<Vec<u8>>,
        /// Raw channel mask bitmap as hex, overrides --channels
        #[arg(long)]
        mask: Option<String>,
        /// Per-channel dwell period in milliseconds
        #[arg(long)]
        period_ms: Option<u16>,
    },
    /// Form a new network
    Form {
        /// Network name (at most 16 bytes)
        name: String,
        /// Fixed channel to form on
        #[arg(long)]
        channel: Option<u8>,
    },
    /// Leave the current network
    Leave,
    /// Read a property
    Get {
        /// Property name, or a 0x-prefixed property id
        property: String,
    },
    /// Write a property
    Set {
        /// Property name, or a 0x-prefixed property id
        property: String,
        /// New value as hex
        value: String,
    },
    /// Insert an entry into the NCP's address cache
    AddCache {
        /// Full address (textual IPv6 or 32 hex digits)
        address: String,
        /// Interface identifier (16 hex digits)
        iid: String,
        /// Mesh locator (4 hex digits)
        rloc16: String,
    },
    /// Show daemon state
    Status,
}

fn main() {
    let cli = Cli::parse();

    let request = match build_request(cli.command) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("ncpctl: {}", message);
            process::exit(1);
        }
    };

    let reply = match request_over_socket(&cli.socket, &request) {
        Ok(reply) => reply,
        Err(err) => {
            eprintln!(
                "ncpctl: cannot reach ncpd at {}: {}",
                cli.socket.display(),
                err
            );
            process::exit(1);
        }
    };

    render(&reply);
    if !reply.is_success() {
        eprintln!("ncpctl: {} ({})", reply.message, reply.status);
        process::exit(1);
    }
}

/// Map a subcommand to its wire request, catching locally detectable
/// mistakes before a connection is made.
fn build_request(command: CtlCommand) -> Result<ControlRequest, String> {
    match command {
        CtlCommand::Scan {
            channels,
            mask,
            period_ms,
        } => Ok(ControlRequest::Scan {
            channels,
            mask,
            period_ms,
        }),
        CtlCommand::Form { name, channel } => Ok(ControlRequest::Form { name, channel }),
        CtlCommand::Leave => Ok(ControlRequest::Leave),
        CtlCommand::Get { property } => Ok(ControlRequest::Get { property }),
        CtlCommand::Set { property, value } => Ok(ControlRequest::Set { property, value }),
        CtlCommand::AddCache {
            address,
            iid,
            rloc16,
        } => {
            // The daemon validates too; failing here just spares a
            // round-trip and gives the parse error verbatim.
            CacheEntry::parse(&address, &iid, &rloc16).map_err(|err| err.to_string())?;
            Ok(ControlRequest::AddCache {
                address,
                iid,
                rloc16,
            })
        }
        CtlCommand::Status => Ok(ControlRequest::Status),
    }
}

fn render(reply: &ControlReply) {
    if let Some(networks) = &reply.networks {
        if networks.is_empty() {
            println!("no networks found");
        } else {
            print_network_table(networks);
        }
        return;
    }
    if let Some(value) = &reply.value {
        println!("{}", value);
        return;
    }
    if let Some(daemon) = &reply.daemon {
        println!("device:          {}", daemon.device);
        println!("busy:            {}", if daemon.busy { "yes" } else { "no" });
        println!("tasks submitted: {}", daemon.tasks_submitted);
        println!("tasks completed: {}", daemon.tasks_completed);
        println!("tasks pending:   {}", daemon.tasks_pending);
        return;
    }
    if reply.is_success() {
        println!("{}", reply.message);
    }
}

fn print_network_table(networks: &[NetworkRecord]) {
    println!(
        "┌{}┬{}┬{}┬{}┬{}┬{}┐",
        "─".repeat(6),
        "─".repeat(20),
        "─".repeat(8),
        "─".repeat(18),
        "─".repeat(6),
        "─".repeat(5)
    );
    println!(
        "│ {:^4} │ {:^18} │ {:^6} │ {:^16} │ {:^4} │ {:^3} │",
        "Chan", "Name", "PAN Id", "XPAN Id", "RSSI", "LQI"
    );
    println!(
        "├{}┼{}┼{}┼{}┼{}┼{}┤",
        "─".repeat(6),
        "─".repeat(20),
        "─".repeat(8),
        "─".repeat(18),
        "─".repeat(6),
        "─".repeat(5)
    );

    for network in networks {
        println!(
            "│ {:4} │ {:18} │ {:6} │ {:16} │ {:4} │ {:3} │",
            network.channel, network.name, network.pan_id, network.xpan_id, network.rssi,
            network.lqi
        );
    }

    println!(
        "└{}┴{}┴{}┴{}┴{}┴{}┘",
        "─".repeat(6),
        "─".repeat(20),
        "─".repeat(8),
        "─".repeat(18),
        "─".repeat(6),
        "─".repeat(5)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_channels_parse_comma_separated() {
        let cli = Cli::try_parse_from(["ncpctl", "scan", "--channels", "11,15,20"])
            .expect("valid command line");
        let request = build_request(cli.command).expect("request builds");
        assert_eq!(
            request,
            ControlRequest::Scan {
                channels: Some(vec![11, 15, 20]),
                mask: None,
                period_ms: None,
            }
        );
    }

    #[test]
    fn test_add_cache_is_validated_before_connecting() {
        let cli = Cli::try_parse_from([
            "ncpctl",
            "add-cache",
            "2001:db8::1",
            "1122334455667788",
            "nope",
        ])
        .expect("valid command line");
        let err = build_request(cli.command).expect_err("locator must be rejected");
        assert!(err.contains("hex") || err.contains("bytes"), "got {}", err);
    }

    #[test]
    fn test_form_takes_name_and_optional_channel() {
        let cli = Cli::try_parse_from(["ncpctl", "form", "my-mesh", "--channel", "15"])
            .expect("valid command line");
        let request = build_request(cli.command).expect("request builds");
        assert_eq!(
            request,
            ControlRequest::Form {
                name: "my-mesh".to_string(),
                channel: Some(15),
            }
        );
    }
}
