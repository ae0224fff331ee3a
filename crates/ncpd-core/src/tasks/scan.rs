//! Channel scan task.

use std::mem;
use std::time::{Duration, Instant};

use ncpd_protocol::{
    ChannelMask, Command, Event, PropertyId, Reply, StatusCode, SCAN_STATE_SCANNING,
};
use tracing::{debug, trace};

use crate::task::{Completion, EventOutcome, Task, TaskContext, TaskResult};
use crate::tasks::{ack_or_failure, send_or_fail};

/// Inter-channel dwell period used when the caller does not pick one.
pub const DEFAULT_SCAN_PERIOD_MS: u16 = 200;

/// Slack added on top of the per-channel dwell budget before a scan is
/// declared lost.
const DEADLINE_MARGIN: Duration = Duration::from_secs(2);

/// Where the task is in the set-mask / set-period / start sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SettingMask,
    SettingPeriod,
    Starting,
    Scanning,
}

/// Sweeps the masked channels and collects the beacons heard.
///
/// The NCP wants its scan parameters written before the scan state is
/// raised, so the task walks set-mask, set-period, start, each step
/// gated on the previous acknowledgement. Exactly one start command is
/// sent per task. Beacons arriving before the start has been
/// acknowledged belong to someone else's scan and are ignored.
pub struct ScanTask {
    mask: ChannelMask,
    period_ms: u16,
    phase: Phase,
    tid: u8,
    beacons: Vec<ncpd_protocol::Beacon>,
    deadline: Option<Instant>,
}

impl ScanTask {
    /// Scan the channels set in `mask`, dwelling `period_ms` on each.
    pub fn new(mask: ChannelMask, period_ms: u16) -> Self {
        ScanTask {
            mask,
            period_ms,
            phase: Phase::SettingMask,
            tid: 0,
            beacons: Vec::new(),
            deadline: None,
        }
    }

    fn begin(&mut self, ctx: &mut TaskContext<'_>) -> Result<EventOutcome, Completion> {
        // The whole budget is fixed up front: one dwell period per masked
        // channel plus slack for the setup round-trips.
        let budget = Duration::from_millis(self.mask.count() as u64 * u64::from(self.period_ms));
        self.deadline = Some(ctx.now() + budget + DEADLINE_MARGIN);
        debug!(
            "ScanTask: scanning {} channel(s), {} ms dwell",
            self.mask.count(),
            self.period_ms
        );

        self.tid = ctx.next_tid();
        send_or_fail(
            ctx,
            Command::PropertySet {
                tid: self.tid,
                prop: PropertyId::ScanMask,
                value: self.mask.encode().to_vec(),
            },
        )?;
        Ok(EventOutcome::Handled)
    }

    /// Advance the setup sequence on an acknowledging reply.
    fn advance(
        &mut self,
        reply: &Reply,
        ctx: &mut TaskContext<'_>,
    ) -> Result<EventOutcome, Completion> {
        ack_or_failure(reply)?;
        match self.phase {
            Phase::SettingMask => {
                self.tid = ctx.next_tid();
                send_or_fail(
                    ctx,
                    Command::PropertySet {
                        tid: self.tid,
                        prop: PropertyId::ScanPeriod,
                        value: self.period_ms.to_le_bytes().to_vec(),
                    },
                )?;
                self.phase = Phase::SettingPeriod;
            }
            Phase::SettingPeriod => {
                self.tid = ctx.next_tid();
                send_or_fail(
                    ctx,
                    Command::PropertySet {
                        tid: self.tid,
                        prop: PropertyId::ScanState,
                        value: vec![SCAN_STATE_SCANNING],
                    },
                )?;
                self.phase = Phase::Starting;
            }
            Phase::Starting => {
                trace!("ScanTask: scan is running");
                self.phase = Phase::Scanning;
            }
            // No command of ours is outstanding; a duplicate ack is noise.
            Phase::Scanning => {}
        }
        Ok(EventOutcome::Handled)
    }
}

impl Task for ScanTask {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn activate(&mut self, ctx: &mut TaskContext<'_>) -> EventOutcome {
        self.begin(ctx).unwrap_or_else(EventOutcome::Finished)
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut TaskContext<'_>) -> EventOutcome {
        match event {
            Event::Reply(reply) if reply.tid == self.tid => self
                .advance(reply, ctx)
                .unwrap_or_else(EventOutcome::Finished),
            Event::BeaconFound(beacon) if self.phase == Phase::Scanning => {
                trace!(
                    "ScanTask: beacon on channel {} ('{}')",
                    beacon.channel,
                    beacon.name
                );
                self.beacons.push(beacon.clone());
                EventOutcome::Handled
            }
            Event::ScanComplete if self.phase == Phase::Scanning => {
                debug!("ScanTask: complete, {} network(s) found", self.beacons.len());
                EventOutcome::Finished(Completion::success(TaskResult::Networks(mem::take(
                    &mut self.beacons,
                ))))
            }
            Event::Reset { reason } => {
                debug!("ScanTask: NCP reset ({}), aborting", reason);
                EventOutcome::Finished(Completion::status_only(StatusCode::Aborted))
            }
            _ => EventOutcome::Ignored,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn expire(&mut self) -> Completion {
        // Whatever was heard before the deadline still reaches the caller.
        Completion {
            status: StatusCode::Timeout,
            result: TaskResult::Networks(mem::take(&mut self.beacons)),
        }
    }
}
