//! Network-forming task.

use std::time::{Duration, Instant};

use ncpd_protocol::{Command, Event, PropertyId, Reply, StatusCode, MAX_NETWORK_NAME_LEN};
use tracing::debug;

use crate::task::{Completion, EventOutcome, Task, TaskContext};
use crate::tasks::{ack_or_failure, send_or_fail};

/// Forming waits on the NCP's channel selection and key generation, so
/// it gets a longer budget than the one-shot tasks.
const FORM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SettingName,
    SettingChannel,
    RaisingInterface,
    RaisingStack,
}

/// Forms a new network: write the name, optionally pin the channel,
/// then bring the interface and the stack up in that order.
pub struct FormTask {
    name: String,
    channel: Option<u8>,
    phase: Phase,
    tid: u8,
    deadline: Option<Instant>,
}

impl FormTask {
    /// Form a network called `name`, optionally pinned to `channel`.
    pub fn new(name: impl Into<String>, channel: Option<u8>) -> Self {
        FormTask {
            name: name.into(),
            channel,
            phase: Phase::SettingName,
            tid: 0,
            deadline: None,
        }
    }

    fn begin(&mut self, ctx: &mut TaskContext<'_>) -> Result<EventOutcome, Completion> {
        // The name travels as raw bytes with a one-byte length on the
        // wire; reject anything that cannot, before touching the channel.
        if self.name.is_empty() || self.name.len() > MAX_NETWORK_NAME_LEN {
            return Err(Completion::status_only(StatusCode::BadArgument));
        }
        self.deadline = Some(ctx.now() + FORM_TIMEOUT);
        debug!("FormTask: forming '{}'", self.name);

        self.tid = ctx.next_tid();
        send_or_fail(
            ctx,
            Command::PropertySet {
                tid: self.tid,
                prop: PropertyId::NetworkName,
                value: self.name.as_bytes().to_vec(),
            },
        )?;
        Ok(EventOutcome::Handled)
    }

    fn send_interface_up(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), Completion> {
        self.tid = ctx.next_tid();
        send_or_fail(
            ctx,
            Command::PropertySet {
                tid: self.tid,
                prop: PropertyId::InterfaceUp,
                value: vec![1],
            },
        )?;
        self.phase = Phase::RaisingInterface;
        Ok(())
    }

    fn advance(
        &mut self,
        reply: &Reply,
        ctx: &mut TaskContext<'_>,
    ) -> Result<EventOutcome, Completion> {
        ack_or_failure(reply)?;
        match self.phase {
            Phase::SettingName => match self.channel {
                Some(channel) => {
                    self.tid = ctx.next_tid();
                    send_or_fail(
                        ctx,
                        Command::PropertySet {
                            tid: self.tid,
                            prop: PropertyId::Channel,
                            value: vec![channel],
                        },
                    )?;
                    self.phase = Phase::SettingChannel;
                }
                None => self.send_interface_up(ctx)?,
            },
            Phase::SettingChannel => self.send_interface_up(ctx)?,
            Phase::RaisingInterface => {
                self.tid = ctx.next_tid();
                send_or_fail(
                    ctx,
                    Command::PropertySet {
                        tid: self.tid,
                        prop: PropertyId::StackUp,
                        value: vec![1],
                    },
                )?;
                self.phase = Phase::RaisingStack;
            }
            Phase::RaisingStack => {
                debug!("FormTask: network '{}' is up", self.name);
                return Ok(EventOutcome::Finished(Completion::status_only(
                    StatusCode::Success,
                )));
            }
        }
        Ok(EventOutcome::Handled)
    }
}

impl Task for FormTask {
    fn name(&self) -> &'static str {
        "form"
    }

    fn activate(&mut self, ctx: &mut TaskContext<'_>) -> EventOutcome {
        self.begin(ctx).unwrap_or_else(EventOutcome::Finished)
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut TaskContext<'_>) -> EventOutcome {
        match event {
            Event::Reply(reply) if reply.tid == self.tid => self
                .advance(reply, ctx)
                .unwrap_or_else(EventOutcome::Finished),
            Event::Reset { .. } => {
                EventOutcome::Finished(Completion::status_only(StatusCode::Aborted))
            }
            _ => EventOutcome::Ignored,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
