//! One-shot property read and write tasks.

use std::time::Instant;

use ncpd_protocol::{Command, Event, PropertyId, Reply, StatusCode};
use tracing::trace;

use crate::task::{Completion, EventOutcome, Task, TaskContext, TaskResult};
use crate::tasks::{ack_or_failure, send_or_fail, DEFAULT_TASK_TIMEOUT};

/// Reads one property value.
pub struct PropertyGetTask {
    prop: PropertyId,
    tid: u8,
    deadline: Option<Instant>,
}

impl PropertyGetTask {
    pub fn new(prop: PropertyId) -> Self {
        PropertyGetTask {
            prop,
            tid: 0,
            deadline: None,
        }
    }

    fn begin(&mut self, ctx: &mut TaskContext<'_>) -> Result<EventOutcome, Completion> {
        self.deadline = Some(ctx.now() + DEFAULT_TASK_TIMEOUT);
        self.tid = ctx.next_tid();
        send_or_fail(
            ctx,
            Command::PropertyGet {
                tid: self.tid,
                prop: self.prop,
            },
        )?;
        Ok(EventOutcome::Handled)
    }

    fn complete(&mut self, reply: &Reply) -> Result<EventOutcome, Completion> {
        ack_or_failure(reply)?;
        trace!(
            "PropertyGetTask: {:?} is {} byte(s)",
            self.prop,
            reply.value.len()
        );
        Ok(EventOutcome::Finished(Completion::success(
            TaskResult::Bytes(reply.value.clone()),
        )))
    }
}

impl Task for PropertyGetTask {
    fn name(&self) -> &'static str {
        "prop-get"
    }

    fn activate(&mut self, ctx: &mut TaskContext<'_>) -> EventOutcome {
        self.begin(ctx).unwrap_or_else(EventOutcome::Finished)
    }

    fn handle_event(&mut self, event: &Event, _ctx: &mut TaskContext<'_>) -> EventOutcome {
        match event {
            Event::Reply(reply) if reply.tid == self.tid => {
                self.complete(reply).unwrap_or_else(EventOutcome::Finished)
            }
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Set,
    Insert,
    Remove,
}

/// Writes one property value and waits for the acknowledgement.
///
/// Covers plain sets as well as the insert/remove pair used for
/// list-valued properties such as the address cache.
pub struct PropertyWriteTask {
    kind: WriteKind,
    prop: PropertyId,
    value: Vec<u8>,
    tid: u8,
    deadline: Option<Instant>,
}

impl PropertyWriteTask {
    pub fn set(prop: PropertyId, value: Vec<u8>) -> Self {
        PropertyWriteTask::with_kind(WriteKind::Set, prop, value)
    }

    pub fn insert(prop: PropertyId, value: Vec<u8>) -> Self {
        PropertyWriteTask::with_kind(WriteKind::Insert, prop, value)
    }

    pub fn remove(prop: PropertyId, value: Vec<u8>) -> Self {
        PropertyWriteTask::with_kind(WriteKind::Remove, prop, value)
    }

    fn with_kind(kind: WriteKind, prop: PropertyId, value: Vec<u8>) -> Self {
        PropertyWriteTask {
            kind,
            prop,
            value,
            tid: 0,
            deadline: None,
        }
    }

    fn begin(&mut self, ctx: &mut TaskContext<'_>) -> Result<EventOutcome, Completion> {
        self.deadline = Some(ctx.now() + DEFAULT_TASK_TIMEOUT);
        self.tid = ctx.next_tid();
        let command = match self.kind {
            WriteKind::Set => Command::PropertySet {
                tid: self.tid,
                prop: self.prop,
                value: self.value.clone(),
            },
            WriteKind::Insert => Command::PropertyInsert {
                tid: self.tid,
                prop: self.prop,
                value: self.value.clone(),
            },
            WriteKind::Remove => Command::PropertyRemove {
                tid: self.tid,
                prop: self.prop,
                value: self.value.clone(),
            },
        };
        send_or_fail(ctx, command)?;
        Ok(EventOutcome::Handled)
    }

    fn complete(&mut self, reply: &Reply) -> Result<EventOutcome, Completion> {
        ack_or_failure(reply)?;
        Ok(EventOutcome::Finished(Completion::status_only(
            StatusCode::Success,
        )))
    }
}

impl Task for PropertyWriteTask {
    fn name(&self) -> &'static str {
        match self.kind {
            WriteKind::Set => "prop-set",
            WriteKind::Insert => "prop-insert",
            WriteKind::Remove => "prop-remove",
        }
    }

    fn activate(&mut self, ctx: &mut TaskContext<'_>) -> EventOutcome {
        self.begin(ctx).unwrap_or_else(EventOutcome::Finished)
    }

    fn handle_event(&mut self, event: &Event, _ctx: &mut TaskContext<'_>) -> EventOutcome {
        match event {
            Event::Reply(reply) if reply.tid == self.tid => {
                self.complete(reply).unwrap_or_else(EventOutcome::Finished)
            }
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

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::task::TidAllocator;
    use crate::test_util::RecordingSink;

    #[test]
    fn test_get_returns_reply_value() {
        let (mut sink, sent) = RecordingSink::new();
        let mut tids = TidAllocator::new();
        let now = Instant::now();
        let mut task = PropertyGetTask::new(PropertyId::NcpVersion);

        let outcome = task.activate(&mut TaskContext::new(&mut sink, &mut tids, now));
        assert!(matches!(outcome, EventOutcome::Handled));
        assert_eq!(
            sent.lock().unwrap().as_slice(),
            &[Command::PropertyGet {
                tid: 1,
                prop: PropertyId::NcpVersion,
            }]
        );

        let event = Event::Reply(Reply {
            tid: 1,
            prop: PropertyId::NcpVersion,
            value: b"ncp 1.2.3".to_vec(),
        });
        let outcome =
            task.handle_event(&event, &mut TaskContext::new(&mut sink, &mut tids, now));
        match outcome {
            EventOutcome::Finished(completion) => {
                assert_eq!(completion.status, StatusCode::Success);
                assert_eq!(completion.result, TaskResult::Bytes(b"ncp 1.2.3".to_vec()));
            }
            other => panic!("Expected Finished, got {:?}", other),
        }
    }

    #[test]
    fn test_get_maps_error_reply() {
        let (mut sink, _sent) = RecordingSink::new();
        let mut tids = TidAllocator::new();
        let now = Instant::now();
        let mut task = PropertyGetTask::new(PropertyId::Channel);

        task.activate(&mut TaskContext::new(&mut sink, &mut tids, now));
        let event = Event::Reply(Reply {
            tid: 1,
            prop: PropertyId::LastStatus,
            value: vec![StatusCode::BadArgument.wire()],
        });
        let outcome =
            task.handle_event(&event, &mut TaskContext::new(&mut sink, &mut tids, now));

        assert!(matches!(
            outcome,
            EventOutcome::Finished(Completion {
                status: StatusCode::BadArgument,
                ..
            })
        ));
    }

    #[test]
    fn test_write_constructors_pick_the_command() {
        let cases: [(PropertyWriteTask, fn(&Command) -> bool); 3] = [
            (
                PropertyWriteTask::set(PropertyId::Channel, vec![15]),
                |command| matches!(command, Command::PropertySet { .. }),
            ),
            (
                PropertyWriteTask::insert(PropertyId::AddressCache, vec![1, 2]),
                |command| matches!(command, Command::PropertyInsert { .. }),
            ),
            (
                PropertyWriteTask::remove(PropertyId::AddressCache, vec![1, 2]),
                |command| matches!(command, Command::PropertyRemove { .. }),
            ),
        ];

        for (mut task, matches_kind) in cases {
            let (mut sink, sent) = RecordingSink::new();
            let mut tids = TidAllocator::new();
            task.activate(&mut TaskContext::new(&mut sink, &mut tids, Instant::now()));

            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert!(matches_kind(&sent[0]), "wrong command for {}", task.name());
        }
    }

    #[test]
    fn test_write_ack_completes_with_success() {
        let (mut sink, _sent) = RecordingSink::new();
        let mut tids = TidAllocator::new();
        let now = Instant::now();
        let mut task = PropertyWriteTask::set(PropertyId::Channel, vec![20]);

        task.activate(&mut TaskContext::new(&mut sink, &mut tids, now));
        let event = Event::Reply(Reply {
            tid: 1,
            prop: PropertyId::Channel,
            value: vec![20],
        });
        let outcome =
            task.handle_event(&event, &mut TaskContext::new(&mut sink, &mut tids, now));

        assert!(matches!(
            outcome,
            EventOutcome::Finished(Completion {
                status: StatusCode::Success,
                result: TaskResult::None,
            })
        ));
    }
}
