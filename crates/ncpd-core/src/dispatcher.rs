//! Task serialization over the half-duplex NCP channel.
//!
//! The dispatcher owns the command sink and at most one *active* task,
//! with further tasks queued FIFO. It is the sole router of decoded
//! events, which is what makes the single-flight invariant hold: no task
//! ever sees an event while another owns the channel, and no event is
//! ever routed to a finished task.

use std::collections::VecDeque;
use std::time::Instant;

use ncpd_protocol::{Event, StatusCode};
use tracing::{debug, trace, warn};

use crate::task::{
    Completion, CompletionFn, CommandSink, EventOutcome, Task, TaskContext, TaskState,
    TidAllocator,
};

/// Counters describing dispatcher activity since construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatcherStats {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks that reached a terminal outcome (any status).
    pub completed: u64,
    /// Tasks terminated by `flush`.
    pub flushed: u64,
    /// Events delivered to an active task.
    pub events_dispatched: u64,
    /// Events the active task reported as irrelevant.
    pub events_ignored: u64,
    /// Events that arrived with no active task.
    pub events_dropped: u64,
}

/// A submitted task plus the bookkeeping the dispatcher keeps for it.
struct TaskEntry {
    task: Box<dyn Task>,
    state: TaskState,
    on_complete: Option<CompletionFn>,
}

impl TaskEntry {
    fn new(task: Box<dyn Task>, on_complete: CompletionFn) -> Self {
        TaskEntry {
            task,
            state: TaskState::Pending,
            on_complete: Some(on_complete),
        }
    }

    /// Transition to Finished and fire the callback.
    ///
    /// Idempotent: finishing an already-finished entry is a no-op, so
    /// the first outcome wins and the callback never fires twice.
    fn finish(&mut self, completion: Completion) {
        if self.state == TaskState::Finished {
            return;
        }
        self.state = TaskState::Finished;
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(completion.status, completion.result);
        }
    }
}

/// Serializes tasks onto the NCP channel and routes events to the one
/// that is active.
pub struct Dispatcher {
    sink: Box<dyn CommandSink>,
    tids: TidAllocator,
    active: Option<TaskEntry>,
    pending: VecDeque<TaskEntry>,
    stats: DispatcherStats,
}

impl Dispatcher {
    /// Create a dispatcher writing commands into `sink`.
    pub fn new(sink: Box<dyn CommandSink>) -> Self {
        Dispatcher {
            sink,
            tids: TidAllocator::new(),
            active: None,
            pending: VecDeque::new(),
            stats: DispatcherStats::default(),
        }
    }

    /// Submit a task for execution.
    ///
    /// The task activates immediately when the channel is idle; otherwise
    /// it queues behind the tasks already waiting. FIFO order is never
    /// violated. The completion callback fires exactly once, from within
    /// one of `submit`, `dispatch`, `tick`, or `flush`.
    pub fn submit(&mut self, task: Box<dyn Task>, on_complete: CompletionFn) {
        self.stats.submitted += 1;
        debug!(
            "Dispatcher: submitted task '{}' ({} pending)",
            task.name(),
            self.pending.len()
        );
        self.pending.push_back(TaskEntry::new(task, on_complete));
        if self.active.is_none() {
            self.activate_next();
        }
    }

    /// Route one decoded event to the active task.
    ///
    /// Events arriving while no task is active are dropped with a trace
    /// log; the NCP pushes unsolicited traffic the daemon may not care
    /// about.
    pub fn dispatch(&mut self, event: &Event) {
        let entry = match self.active.as_mut() {
            Some(entry) => entry,
            None => {
                self.stats.events_dropped += 1;
                trace!("Dispatcher: no active task, dropping {:?}", event);
                return;
            }
        };

        self.stats.events_dispatched += 1;
        let outcome = {
            let mut ctx = TaskContext::new(self.sink.as_mut(), &mut self.tids, Instant::now());
            entry.task.handle_event(event, &mut ctx)
        };

        match outcome {
            EventOutcome::Handled => {}
            EventOutcome::Ignored => {
                self.stats.events_ignored += 1;
                trace!(
                    "Dispatcher: task '{}' ignored {:?}",
                    entry.task.name(),
                    event
                );
            }
            EventOutcome::Finished(completion) => {
                debug!(
                    "Dispatcher: task '{}' finished: {}",
                    entry.task.name(),
                    completion.status
                );
                self.stats.completed += 1;
                entry.finish(completion);
                self.active = None;
                self.activate_next();
            }
        }
    }

    /// Deadline check, driven by the surrounding loop's timer tick.
    pub fn tick(&mut self, now: Instant) {
        let expired = match &self.active {
            Some(entry) => matches!(entry.task.deadline(), Some(deadline) if deadline <= now),
            None => false,
        };
        if !expired {
            return;
        }

        if let Some(mut entry) = self.active.take() {
            let completion = entry.task.expire();
            warn!(
                "Dispatcher: task '{}' passed its deadline, finishing: {}",
                entry.task.name(),
                completion.status
            );
            self.stats.completed += 1;
            entry.finish(completion);
            self.activate_next();
        }
    }

    /// Force-finish the active task and every pending task with `status`,
    /// in queue order, activating none of them. Used on device loss and
    /// at shutdown.
    pub fn flush(&mut self, status: StatusCode) {
        let count = self.pending.len() + usize::from(self.active.is_some());
        if count > 0 {
            debug!("Dispatcher: flushing {} task(s) with {}", count, status);
        }

        if let Some(mut entry) = self.active.take() {
            self.stats.flushed += 1;
            self.stats.completed += 1;
            entry.finish(Completion::status_only(status));
        }
        while let Some(mut entry) = self.pending.pop_front() {
            self.stats.flushed += 1;
            self.stats.completed += 1;
            entry.finish(Completion::status_only(status));
        }
    }

    /// Whether no task is active or pending.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Number of tasks waiting behind the active one.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Activity counters.
    pub fn stats(&self) -> DispatcherStats {
        self.stats
    }

    /// Promote queued tasks until one stays active or the queue empties.
    ///
    /// A task whose activation finishes on the spot (argument rejection,
    /// degenerate operation) is completed here and the next one tried,
    /// so a bad submission never wedges the queue.
    fn activate_next(&mut self) {
        while self.active.is_none() {
            let mut entry = match self.pending.pop_front() {
                Some(entry) => entry,
                None => break,
            };

            entry.state = TaskState::Active;
            debug!("Dispatcher: activating task '{}'", entry.task.name());
            let outcome = {
                let mut ctx =
                    TaskContext::new(self.sink.as_mut(), &mut self.tids, Instant::now());
                entry.task.activate(&mut ctx)
            };

            match outcome {
                EventOutcome::Finished(completion) => {
                    debug!(
                        "Dispatcher: task '{}' finished during activation: {}",
                        entry.task.name(),
                        completion.status
                    );
                    self.stats.completed += 1;
                    entry.finish(completion);
                }
                _ => {
                    self.active = Some(entry);
                }
            }
        }
    }
}
