//! Graceful network detach.

use std::time::Instant;

use ncpd_protocol::{Command, Event, PropertyId, Reply, StatusCode};
use tracing::debug;

use crate::task::{Completion, EventOutcome, Task, TaskContext};
use crate::tasks::{ack_or_failure, send_or_fail, DEFAULT_TASK_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    LoweringStack,
    LoweringInterface,
}

/// Leaves the current network: stack down first, then the interface,
/// so the NCP gets a chance to announce its departure.
pub struct LeaveTask {
    phase: Phase,
    tid: u8,
    deadline: Option<Instant>,
}

impl LeaveTask {
    pub fn new() -> Self {
        LeaveTask {
            phase: Phase::LoweringStack,
            tid: 0,
            deadline: None,
        }
    }

    fn begin(&mut self, ctx: &mut TaskContext<'_>) -> Result<EventOutcome, Completion> {
        self.deadline = Some(ctx.now() + DEFAULT_TASK_TIMEOUT);
        self.tid = ctx.next_tid();
        send_or_fail(
            ctx,
            Command::PropertySet {
                tid: self.tid,
                prop: PropertyId::StackUp,
                value: vec![0],
            },
        )?;
        Ok(EventOutcome::Handled)
    }

    fn advance(
        &mut self,
        reply: &Reply,
        ctx: &mut TaskContext<'_>,
    ) -> Result<EventOutcome, Completion> {
        ack_or_failure(reply)?;
        match self.phase {
            Phase::LoweringStack => {
                self.tid = ctx.next_tid();
                send_or_fail(
                    ctx,
                    Command::PropertySet {
                        tid: self.tid,
                        prop: PropertyId::InterfaceUp,
                        value: vec![0],
                    },
                )?;
                self.phase = Phase::LoweringInterface;
                Ok(EventOutcome::Handled)
            }
            Phase::LoweringInterface => {
                debug!("LeaveTask: detached");
                Ok(EventOutcome::Finished(Completion::status_only(
                    StatusCode::Success,
                )))
            }
        }
    }
}

impl Default for LeaveTask {
    fn default() -> Self {
        LeaveTask::new()
    }
}

impl Task for LeaveTask {
    fn name(&self) -> &'static str {
        "leave"
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
