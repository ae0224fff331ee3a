//! The daemon instance: one NCP, one event loop.
//!
//! The instance owns the dispatcher, the frame codec, and the receiving
//! ends of the transport and control channels. Everything that mutates
//! task state happens on this one thread; the transport and control
//! threads only move bytes and parsed requests in and out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, tick, Receiver, Sender};
use ncpd_core::addr::CacheEntry;
use ncpd_core::{
    CommandSink, Dispatcher, FormTask, LeaveTask, LinkError, PropertyGetTask, PropertyWriteTask,
    ScanTask, Task,
};
use ncpd_protocol::{ChannelMask, Command, Event, FrameCodec, PropertyId, StatusCode};
use tracing::{debug, error, info, warn};

use crate::control::{
    parse_property_name, ControlMessage, ControlReply, ControlRequest, DaemonStatus,
};
use crate::error::DaemonError;
use crate::metrics::{
    CONTROL_REQUESTS, DECODE_ERRORS, FRAMES_RX, FRAMES_TX, TASKS_COMPLETED, TASKS_FLUSHED,
    TASKS_SUBMITTED,
};
use crate::transport::TransportInput;

/// Deadline resolution of the event loop.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Channels scanned when a request names neither channels nor a mask.
const DEFAULT_SCAN_CHANNELS: std::ops::RangeInclusive<u8> = 11..=26;

/// Frames commands and hands them to the transport writer.
struct LinkSink {
    output_tx: Sender<Vec<u8>>,
}

impl CommandSink for LinkSink {
    fn send_command(&mut self, command: Command) -> Result<(), LinkError> {
        let frame = FrameCodec::encode(&command.encode());
        self.output_tx.send(frame).map_err(|_| LinkError::Closed)?;
        metrics::counter!(FRAMES_TX).increment(1);
        Ok(())
    }
}

/// Event loop around one NCP.
pub struct Instance {
    dispatcher: Dispatcher,
    codec: FrameCodec,
    link: LinkSink,
    transport_rx: Receiver<TransportInput>,
    control_rx: Receiver<ControlMessage>,
    shutdown: Arc<AtomicBool>,
    scan_period_ms: u16,
    device: String,
}

impl Instance {
    pub fn new(
        device: impl Into<String>,
        scan_period_ms: u16,
        output_tx: Sender<Vec<u8>>,
        transport_rx: Receiver<TransportInput>,
        control_rx: Receiver<ControlMessage>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let sink = LinkSink {
            output_tx: output_tx.clone(),
        };
        Instance {
            dispatcher: Dispatcher::new(Box::new(sink)),
            codec: FrameCodec::new(),
            link: LinkSink { output_tx },
            transport_rx,
            control_rx,
            shutdown,
            scan_period_ms,
            device: device.into(),
        }
    }

    /// Ask the NCP for a software reset.
    ///
    /// Fire-and-forget: the acknowledgement is the unsolicited reset
    /// event, not a correlated reply, so the command travels on tid 0.
    pub fn reset_ncp(&mut self) {
        info!("Instance: resetting the NCP");
        if let Err(err) = self.link.send_command(Command::Reset { tid: 0 }) {
            warn!("Instance: reset not sent: {}", err);
        }
    }

    /// Run until shutdown is requested or the device channel is lost.
    ///
    /// Both exits flush every remaining task as aborted; device loss is
    /// additionally an error, since the daemon cannot keep its promises
    /// without a device.
    pub fn run(mut self) -> Result<(), DaemonError> {
        info!("Instance: serving {}", self.device);
        let ticker = tick(TICK_INTERVAL);

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Instance: shutting down");
                self.flush_remaining(StatusCode::Aborted);
                return Ok(());
            }

            select! {
                recv(self.transport_rx) -> input => match input {
                    Ok(TransportInput::Bytes(bytes)) => self.ingest(&bytes),
                    Ok(TransportInput::Closed) | Err(_) => {
                        error!("Instance: lost {}", self.device);
                        self.flush_remaining(StatusCode::Aborted);
                        return Err(DaemonError::LinkLost(self.device.clone()));
                    }
                },
                recv(self.control_rx) -> message => match message {
                    Ok((request, reply_tx)) => self.handle_control(request, reply_tx),
                    Err(_) => {
                        // Control server gone; stop selecting on a dead
                        // channel without spinning.
                        debug!("Instance: control channel closed");
                        self.control_rx = never();
                    }
                },
                recv(ticker) -> _ => self.dispatcher.tick(Instant::now()),
            }
        }
    }

    /// Feed raw transport bytes through the codec and dispatch every
    /// complete event.
    fn ingest(&mut self, bytes: &[u8]) {
        self.codec.push(bytes);
        loop {
            match self.codec.decode() {
                Ok(Some(payload)) => {
                    metrics::counter!(FRAMES_RX).increment(1);
                    match Event::decode(&payload) {
                        Ok(event) => {
                            if let Event::Reset { reason } = &event {
                                info!("Instance: NCP reset ({})", reason);
                            }
                            self.dispatcher.dispatch(&event);
                        }
                        Err(err) => {
                            metrics::counter!(DECODE_ERRORS).increment(1);
                            warn!("Instance: undecodable event: {}", err);
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    // The codec drops the offending bytes; keep draining
                    // whatever follows.
                    metrics::counter!(DECODE_ERRORS).increment(1);
                    warn!("Instance: framing error: {}", err);
                }
            }
        }
    }

    /// Turn one control request into a task submission or an immediate
    /// reply.
    fn handle_control(&mut self, request: ControlRequest, reply_tx: Sender<ControlReply>) {
        metrics::counter!(CONTROL_REQUESTS).increment(1);
        match request {
            ControlRequest::Scan {
                channels,
                mask,
                period_ms,
            } => match build_scan_mask(channels, mask) {
                Ok(mask) => {
                    let period = period_ms.unwrap_or(self.scan_period_ms);
                    self.submit_task(Box::new(ScanTask::new(mask, period)), reply_tx);
                }
                Err(message) => reject(reply_tx, message),
            },

            ControlRequest::Form { name, channel } => {
                self.submit_task(Box::new(FormTask::new(name, channel)), reply_tx);
            }

            ControlRequest::Leave => {
                self.submit_task(Box::new(LeaveTask::new()), reply_tx);
            }

            ControlRequest::Get { property } => match parse_property_name(&property) {
                Some(prop) => self.submit_task(Box::new(PropertyGetTask::new(prop)), reply_tx),
                None => reject(reply_tx, format!("unknown property '{}'", property)),
            },

            ControlRequest::Set { property, value } => {
                let prop = match parse_property_name(&property) {
                    Some(prop) => prop,
                    None => return reject(reply_tx, format!("unknown property '{}'", property)),
                };
                match decode_hex_argument(&value) {
                    Ok(value) => {
                        self.submit_task(Box::new(PropertyWriteTask::set(prop, value)), reply_tx)
                    }
                    Err(message) => reject(reply_tx, message),
                }
            }

            ControlRequest::AddCache {
                address,
                iid,
                rloc16,
            } => match CacheEntry::parse(&address, &iid, &rloc16) {
                Ok(entry) => self.submit_task(
                    Box::new(PropertyWriteTask::insert(
                        PropertyId::AddressCache,
                        entry.encode(),
                    )),
                    reply_tx,
                ),
                Err(err) => reject(reply_tx, err.to_string()),
            },

            // Answered from local state; the NCP is never consulted.
            ControlRequest::Status => {
                let stats = self.dispatcher.stats();
                let mut reply =
                    ControlReply::from_completion(StatusCode::Success, ncpd_core::TaskResult::None);
                reply.daemon = Some(DaemonStatus {
                    device: self.device.clone(),
                    tasks_submitted: stats.submitted,
                    tasks_completed: stats.completed,
                    tasks_pending: self.dispatcher.pending_len(),
                    busy: !self.dispatcher.is_idle(),
                });
                let _ = reply_tx.send(reply);
            }
        }
    }

    fn submit_task(&mut self, task: Box<dyn Task>, reply_tx: Sender<ControlReply>) {
        metrics::counter!(TASKS_SUBMITTED).increment(1);
        self.dispatcher.submit(
            task,
            Box::new(move |status, result| {
                metrics::counter!(TASKS_COMPLETED).increment(1);
                // The client may have timed out and gone; its loss.
                let _ = reply_tx.send(ControlReply::from_completion(status, result));
            }),
        );
    }

    fn flush_remaining(&mut self, status: StatusCode) {
        let before = self.dispatcher.stats().flushed;
        self.dispatcher.flush(status);
        let flushed = self.dispatcher.stats().flushed - before;
        if flushed > 0 {
            metrics::counter!(TASKS_FLUSHED).increment(flushed);
        }
    }
}

/// Immediate rejection without involving the dispatcher.
fn reject(reply_tx: Sender<ControlReply>, message: impl Into<String>) {
    let message = message.into();
    debug!("Instance: rejecting request: {}", message);
    let _ = reply_tx.send(ControlReply::failure(StatusCode::BadArgument, message));
}

/// Resolve a scan request's channel selection. A raw mask wins over a
/// channel list; a request naming neither gets the 2.4 GHz band.
fn build_scan_mask(
    channels: Option<Vec<u8>>,
    mask_hex: Option<String>,
) -> Result<ChannelMask, String> {
    if let Some(text) = mask_hex {
        let bytes = decode_hex_argument(&text)?;
        return ChannelMask::from_bytes(&bytes).map_err(|err| err.to_string());
    }
    if let Some(channels) = channels {
        if channels.is_empty() {
            return Err("channel list is empty".to_string());
        }
        return Ok(ChannelMask::from_channels(channels));
    }
    Ok(ChannelMask::from_channels(DEFAULT_SCAN_CHANNELS))
}

/// Decode a hex argument, tolerating an `0x` prefix.
fn decode_hex_argument(text: &str) -> Result<Vec<u8>, String> {
    let raw = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(raw).map_err(|_| format!("'{}' is not hex data", text))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crossbeam_channel::unbounded;
    use ncpd_protocol::{
        CMD_PROP_GET, CMD_PROP_INSERT, CMD_PROP_SET, EVT_BEACON_FOUND, EVT_REPLY,
        EVT_SCAN_COMPLETE, PROP_ADDRESS_CACHE, PROP_SCAN_MASK, PROP_SCAN_PERIOD, PROP_SCAN_STATE,
    };

    use super::*;

    const RECV_WAIT: Duration = Duration::from_secs(5);

    /// Everything a test needs to act as both the client and the NCP.
    struct Rig {
        instance: Option<Instance>,
        transport_tx: Sender<TransportInput>,
        output_rx: Receiver<Vec<u8>>,
        control_tx: Sender<ControlMessage>,
        shutdown: Arc<AtomicBool>,
    }

    impl Rig {
        fn new() -> Self {
            let (transport_tx, transport_rx) = unbounded();
            let (output_tx, output_rx) = unbounded();
            let (control_tx, control_rx) = unbounded();
            let shutdown = Arc::new(AtomicBool::new(false));
            let instance = Instance::new(
                "test-device",
                100,
                output_tx,
                transport_rx,
                control_rx,
                Arc::clone(&shutdown),
            );
            Rig {
                instance: Some(instance),
                transport_tx,
                output_rx,
                control_tx,
                shutdown,
            }
        }

        fn instance(&mut self) -> &mut Instance {
            self.instance.as_mut().expect("instance not yet moved")
        }

        /// Deframe the next outgoing command: (code, tid, prop, value).
        fn recv_command(&self) -> (u8, u8, u16, Vec<u8>) {
            let frame = self
                .output_rx
                .recv_timeout(RECV_WAIT)
                .expect("a command should have been sent");
            let mut codec = FrameCodec::new();
            codec.push(&frame);
            let payload = codec
                .decode()
                .expect("outgoing frame is well-formed")
                .expect("outgoing frame is complete");
            let prop = u16::from_le_bytes([payload[2], payload[3]]);
            (payload[0], payload[1], prop, payload[4..].to_vec())
        }

        /// Feed the instance a property-echo reply for `tid`.
        fn ack(&mut self, tid: u8, prop: u16, value: &[u8]) {
            let mut payload = vec![EVT_REPLY, tid];
            payload.extend_from_slice(&prop.to_le_bytes());
            payload.extend_from_slice(value);
            let frame = FrameCodec::encode(&payload);
            self.instance().ingest(&frame);
        }

        fn event(&mut self, payload: &[u8]) {
            let frame = FrameCodec::encode(payload);
            self.instance().ingest(&frame);
        }
    }

    fn request(
        rig: &mut Rig,
        request: ControlRequest,
    ) -> Receiver<ControlReply> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        rig.instance().handle_control(request, reply_tx);
        reply_rx
    }

    #[test]
    fn test_scan_request_drives_the_setup_sequence() {
        let mut rig = Rig::new();
        let reply_rx = request(
            &mut rig,
            ControlRequest::Scan {
                channels: Some(vec![11, 12]),
                mask: None,
                period_ms: Some(150),
            },
        );

        // Mask first, then period, then the start write.
        let (code, tid, prop, value) = rig.recv_command();
        assert_eq!(code, CMD_PROP_SET);
        assert_eq!(prop, PROP_SCAN_MASK);
        assert_eq!(value, vec![0x00, 0x18]); // channels 11 and 12 in byte 1
        rig.ack(tid, prop, &value);

        let (code, tid, prop, value) = rig.recv_command();
        assert_eq!(code, CMD_PROP_SET);
        assert_eq!(prop, PROP_SCAN_PERIOD);
        assert_eq!(value, 150u16.to_le_bytes().to_vec());
        rig.ack(tid, prop, &value);

        let (code, tid, prop, value) = rig.recv_command();
        assert_eq!(code, CMD_PROP_SET);
        assert_eq!(prop, PROP_SCAN_STATE);
        rig.ack(tid, prop, &value);

        // One beacon, then the sweep ends.
        let mut beacon = vec![EVT_BEACON_FOUND, 11, (-60i8) as u8, 200];
        beacon.extend_from_slice(&0x1234u16.to_le_bytes());
        beacon.extend_from_slice(&[0x11; 8]);
        beacon.extend_from_slice(&[0x22; 8]);
        beacon.push(4);
        beacon.extend_from_slice(b"mesh");
        rig.event(&beacon);
        rig.event(&[EVT_SCAN_COMPLETE]);

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("scan completes");
        assert!(reply.is_success());
        let networks = reply.networks.expect("networks present");
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].name, "mesh");
        assert_eq!(networks[0].pan_id, "0x1234");
    }

    #[test]
    fn test_scan_defaults_cover_the_2_4ghz_band() {
        let mut rig = Rig::new();
        let _reply_rx = request(
            &mut rig,
            ControlRequest::Scan {
                channels: None,
                mask: None,
                period_ms: None,
            },
        );

        let (_, _, prop, value) = rig.recv_command();
        assert_eq!(prop, PROP_SCAN_MASK);
        let mask = ChannelMask::from_bytes(&value).expect("mask decodes");
        let channels: Vec<u8> = mask.channels().collect();
        assert_eq!(channels, (11..=26).collect::<Vec<u8>>());
    }

    #[test]
    fn test_get_request_reports_the_value_as_hex() {
        let mut rig = Rig::new();
        let reply_rx = request(
            &mut rig,
            ControlRequest::Get {
                property: "ncp-version".to_string(),
            },
        );

        let (code, tid, prop, _) = rig.recv_command();
        assert_eq!(code, CMD_PROP_GET);
        rig.ack(tid, prop, b"OPENNCP/1.0");

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("get completes");
        assert!(reply.is_success());
        assert_eq!(reply.value.as_deref(), Some(hex::encode(b"OPENNCP/1.0").as_str()));
    }

    #[test]
    fn test_add_cache_request_sends_one_insert() {
        let mut rig = Rig::new();
        let reply_rx = request(
            &mut rig,
            ControlRequest::AddCache {
                address: "2001:db8::1".to_string(),
                iid: "1122334455667788".to_string(),
                rloc16: "ab12".to_string(),
            },
        );

        let (code, tid, prop, value) = rig.recv_command();
        assert_eq!(code, CMD_PROP_INSERT);
        assert_eq!(prop, PROP_ADDRESS_CACHE);
        assert_eq!(value.len(), 26);
        assert_eq!(&value[24..], &[0xAB, 0x12]);
        rig.ack(tid, prop, &value);

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("insert completes");
        assert!(reply.is_success());
    }

    #[test]
    fn test_add_cache_rejects_bad_arguments_locally() {
        let mut rig = Rig::new();
        let reply_rx = request(
            &mut rig,
            ControlRequest::AddCache {
                address: "2001:db8::1".to_string(),
                iid: "1122334455667788".to_string(),
                rloc16: "not-hex".to_string(),
            },
        );

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("rejected at once");
        assert_eq!(reply.status, "bad-argument");
        // Nothing reached the channel and nothing was queued.
        assert!(rig.output_rx.is_empty());
        assert_eq!(rig.instance().dispatcher.stats().submitted, 0);
    }

    #[test]
    fn test_unknown_property_is_rejected() {
        let mut rig = Rig::new();
        let reply_rx = request(
            &mut rig,
            ControlRequest::Get {
                property: "banana".to_string(),
            },
        );

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("rejected at once");
        assert_eq!(reply.status, "bad-argument");
        assert!(reply.message.contains("banana"));
        assert!(rig.output_rx.is_empty());
    }

    #[test]
    fn test_status_is_answered_without_touching_the_ncp() {
        let mut rig = Rig::new();
        let reply_rx = request(&mut rig, ControlRequest::Status);

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("answered inline");
        assert!(reply.is_success());
        let daemon = reply.daemon.expect("daemon state present");
        assert_eq!(daemon.device, "test-device");
        assert_eq!(daemon.tasks_submitted, 0);
        assert!(!daemon.busy);
        assert!(rig.output_rx.is_empty());
    }

    #[test]
    fn test_garbage_bytes_do_not_stall_later_frames() {
        let mut rig = Rig::new();
        let reply_rx = request(
            &mut rig,
            ControlRequest::Get {
                property: "channel".to_string(),
            },
        );
        let (_, tid, prop, _) = rig.recv_command();

        // Line noise, then a corrupted frame, then the real reply.
        let mut bytes = vec![0x00, 0xFF, 0x13];
        let mut broken = FrameCodec::encode(&[EVT_REPLY, tid, 0x00, 0x01, 0x0F]);
        let last = broken.len() - 1;
        broken[last] ^= 0xFF;
        bytes.extend_from_slice(&broken);
        let mut good = vec![EVT_REPLY, tid];
        good.extend_from_slice(&prop.to_le_bytes());
        good.push(15);
        bytes.extend_from_slice(&FrameCodec::encode(&good));
        rig.instance().ingest(&bytes);

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("get completes");
        assert!(reply.is_success());
        assert_eq!(reply.value.as_deref(), Some("0f"));
    }

    #[test]
    fn test_device_loss_aborts_queued_work_and_exits() {
        let mut rig = Rig::new();
        let reply_rx = request(&mut rig, ControlRequest::Leave);
        let _ = rig.recv_command();

        let instance = rig.instance.take().expect("instance available");
        let runner = thread::Builder::new()
            .name("instance-under-test".to_string())
            .spawn(move || instance.run())
            .expect("Failed to spawn instance thread");

        rig.transport_tx
            .send(TransportInput::Closed)
            .expect("instance is alive");

        let result = runner.join().expect("instance thread joins");
        assert!(matches!(result, Err(DaemonError::LinkLost(_))));
        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("task was flushed");
        assert_eq!(reply.status, "aborted");
    }

    #[test]
    fn test_shutdown_flushes_and_exits_cleanly() {
        let mut rig = Rig::new();

        let instance = rig.instance.take().expect("instance available");
        let runner = thread::Builder::new()
            .name("instance-under-test".to_string())
            .spawn(move || instance.run())
            .expect("Failed to spawn instance thread");

        // Activate a task through the loop, then pull the plug.
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        rig.control_tx
            .send((ControlRequest::Leave, reply_tx))
            .expect("instance is alive");
        let _ = rig
            .output_rx
            .recv_timeout(RECV_WAIT)
            .expect("leave reached the channel");

        rig.shutdown.store(true, Ordering::SeqCst);
        let result = runner.join().expect("instance thread joins");
        assert!(result.is_ok());

        let reply = reply_rx.recv_timeout(RECV_WAIT).expect("task was flushed");
        assert_eq!(reply.status, "aborted");
    }
}
