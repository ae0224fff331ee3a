//! Integration tests for the control socket surface.
//!
//! These run a real `ControlServer` on a real Unix socket, with a
//! scripted stand-in for the instance loop on the far side of the
//! request channel, and talk to it the way `ncpctl` does.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use ncpd_daemon::control::{
    request_over_socket, ControlMessage, ControlReply, ControlRequest, ControlServer,
};
use serial_test::serial;

static SOCKET_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A socket path no other test (or leftover run) is using.
fn unique_socket_path(tag: &str) -> PathBuf {
    let seq = SOCKET_SEQ.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("ncpd-test-{}-{}-{}.sock", tag, std::process::id(), seq))
}

/// Answer requests the way the instance loop would, without an NCP.
fn spawn_scripted_instance(request_rx: Receiver<ControlMessage>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("scripted-instance".to_string())
        .spawn(move || {
            while let Ok((request, reply_tx)) = request_rx.recv() {
                let reply = match request {
                    ControlRequest::Leave => ControlReply {
                        status: "success".to_string(),
                        message: "success".to_string(),
                        networks: None,
                        value: None,
                        daemon: None,
                    },
                    ControlRequest::Get { property } => ControlReply {
                        status: "success".to_string(),
                        message: "success".to_string(),
                        networks: None,
                        value: Some(format!("{}-value", property)),
                        daemon: None,
                    },
                    other => ControlReply {
                        status: "busy".to_string(),
                        message: format!("not scripted: {:?}", other),
                        networks: None,
                        value: None,
                        daemon: None,
                    },
                };
                let _ = reply_tx.send(reply);
            }
        })
        .expect("Failed to spawn scripted instance thread")
}

// ============================================================================
// Request/reply round trips
// ============================================================================

#[test]
#[serial]
fn test_round_trip_over_the_socket() {
    let path = unique_socket_path("round-trip");
    let (request_tx, request_rx) = unbounded();
    let server = ControlServer::bind(&path, request_tx).expect("server binds");
    let instance = spawn_scripted_instance(request_rx);

    let reply =
        request_over_socket(&path, &ControlRequest::Leave).expect("exchange should succeed");
    assert!(reply.is_success(), "got {:?}", reply);

    let reply = request_over_socket(
        &path,
        &ControlRequest::Get {
            property: "channel".to_string(),
        },
    )
    .expect("exchange should succeed");
    assert_eq!(reply.value.as_deref(), Some("channel-value"));

    server.shutdown();
    assert!(
        !path.exists(),
        "shutdown should remove the socket file at {}",
        path.display()
    );
    instance.join().expect("scripted instance joins");
}

#[test]
#[serial]
fn test_each_connection_carries_one_request() {
    let path = unique_socket_path("one-shot");
    let (request_tx, request_rx) = unbounded();
    let server = ControlServer::bind(&path, request_tx).expect("server binds");
    let instance = spawn_scripted_instance(request_rx);

    // Several clients in a row, each on a fresh connection.
    for _ in 0..3 {
        let reply =
            request_over_socket(&path, &ControlRequest::Leave).expect("exchange should succeed");
        assert!(reply.is_success());
    }

    server.shutdown();
    instance.join().expect("scripted instance joins");
}

#[test]
#[serial]
fn test_malformed_request_is_answered_not_dropped() {
    let path = unique_socket_path("malformed");
    let (request_tx, request_rx) = unbounded();
    let server = ControlServer::bind(&path, request_tx).expect("server binds");
    let instance = spawn_scripted_instance(request_rx);

    let mut stream = UnixStream::connect(&path).expect("client connects");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout set");
    stream
        .write_all(b"this is not json\n")
        .expect("request written");

    let mut line = String::new();
    BufReader::new(&stream)
        .read_line(&mut line)
        .expect("server answers");
    let reply: ControlReply = serde_json::from_str(line.trim()).expect("reply parses");
    assert_eq!(reply.status, "bad-argument");
    assert!(
        reply.message.contains("unparseable"),
        "got {}",
        reply.message
    );

    drop(stream);
    server.shutdown();
    instance.join().expect("scripted instance joins");
}

// ============================================================================
// Socket file lifecycle
// ============================================================================

#[test]
#[serial]
fn test_stale_socket_file_is_reclaimed() {
    let path = unique_socket_path("stale");

    // A listener that goes away without cleaning up leaves the file
    // behind, exactly like a crashed daemon.
    let stale = UnixListener::bind(&path).expect("first bind succeeds");
    drop(stale);
    assert!(path.exists(), "stale socket file should remain");

    let (request_tx, request_rx) = unbounded();
    let server = ControlServer::bind(&path, request_tx).expect("stale file should be reclaimed");
    let instance = spawn_scripted_instance(request_rx);

    let reply =
        request_over_socket(&path, &ControlRequest::Leave).expect("exchange should succeed");
    assert!(reply.is_success());

    server.shutdown();
    instance.join().expect("scripted instance joins");
}

#[test]
#[serial]
fn test_live_socket_is_not_stolen() {
    let path = unique_socket_path("live");
    let (request_tx, request_rx) = unbounded();
    let server = ControlServer::bind(&path, request_tx).expect("first server binds");
    let instance = spawn_scripted_instance(request_rx);

    let (second_tx, _second_rx) = unbounded();
    assert!(
        ControlServer::bind(&path, second_tx).is_err(),
        "a second daemon must not take over a served socket"
    );

    // The first server is unharmed.
    let reply =
        request_over_socket(&path, &ControlRequest::Leave).expect("exchange should succeed");
    assert!(reply.is_success());

    server.shutdown();
    instance.join().expect("scripted instance joins");
}

#[test]
#[serial]
fn test_client_reports_an_absent_daemon() {
    let path = unique_socket_path("absent");
    let err = request_over_socket(&path, &ControlRequest::Leave)
        .expect_err("no daemon is listening there");
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}
