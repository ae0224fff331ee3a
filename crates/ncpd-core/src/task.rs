//! The task contract shared by every NCP operation.

use std::time::Instant;

use ncpd_protocol::{Beacon, Command, StatusCode, MAX_TID};
use tracing::trace;

use crate::error::LinkError;

/// Externally observable lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, not yet activated.
    Pending,
    /// Owns the channel; receives events.
    Active,
    /// Terminal; the completion callback has fired (or never will again).
    Finished,
}

/// Result payload reported alongside the completion status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// No payload.
    None,
    /// Networks discovered by a scan, in arrival order.
    Networks(Vec<Beacon>),
    /// Raw property value bytes.
    Bytes(Vec<u8>),
}

/// Terminal outcome of a task: status plus result payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Final status.
    pub status: StatusCode,
    /// Result payload, `TaskResult::None` unless the variant defines one.
    pub result: TaskResult,
}

impl Completion {
    /// A completion carrying only a status.
    pub fn status_only(status: StatusCode) -> Self {
        Completion {
            status,
            result: TaskResult::None,
        }
    }

    /// A successful completion with a payload.
    pub fn success(result: TaskResult) -> Self {
        Completion {
            status: StatusCode::Success,
            result,
        }
    }
}

/// What a task did with one delivered event.
#[derive(Debug)]
pub enum EventOutcome {
    /// Event consumed; the task stays active.
    Handled,
    /// Event was not relevant to this task.
    Ignored,
    /// The task completed while processing this event.
    Finished(Completion),
}

/// Single-shot completion callback, invoked with `(status, result)`.
pub type CompletionFn = Box<dyn FnOnce(StatusCode, TaskResult) + Send>;

/// Where encoded commands go. The daemon's implementation frames and
/// writes them to the transport; tests record them.
pub trait CommandSink: Send {
    /// Send one command towards the NCP.
    fn send_command(&mut self, command: Command) -> Result<(), LinkError>;
}

/// Rotating transaction id allocator. Ids cycle through 1..=15; 0 is
/// reserved for unsolicited traffic and never handed out.
#[derive(Debug)]
pub struct TidAllocator {
    next: u8,
}

impl TidAllocator {
    /// Create an allocator starting at tid 1.
    pub fn new() -> Self {
        TidAllocator { next: 1 }
    }

    /// Take the next transaction id.
    pub fn next_tid(&mut self) -> u8 {
        let tid = self.next;
        self.next = if tid >= MAX_TID { 1 } else { tid + 1 };
        tid
    }
}

impl Default for TidAllocator {
    fn default() -> Self {
        TidAllocator::new()
    }
}

/// Controlled channel access handed to the active task for the duration
/// of one activation or dispatch call. Tasks never touch the transport
/// directly.
pub struct TaskContext<'a> {
    sink: &'a mut dyn CommandSink,
    tids: &'a mut TidAllocator,
    now: Instant,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        sink: &'a mut dyn CommandSink,
        tids: &'a mut TidAllocator,
        now: Instant,
    ) -> Self {
        TaskContext { sink, tids, now }
    }

    /// Allocate a transaction id for the next command.
    pub fn next_tid(&mut self) -> u8 {
        self.tids.next_tid()
    }

    /// Send one command towards the NCP.
    pub fn send(&mut self, command: Command) -> Result<(), LinkError> {
        trace!(
            "Task link: sending command 0x{:02X} (tid {})",
            command.code(),
            command.tid()
        );
        self.sink.send_command(command)
    }

    /// The dispatch call's notion of now.
    pub fn now(&self) -> Instant {
        self.now
    }
}

/// One asynchronous NCP operation.
///
/// A task is activated at most once, receives events only while active,
/// and reports exactly one terminal outcome: by returning
/// [`EventOutcome::Finished`] from `activate`/`handle_event`, by its
/// deadline passing (`expire`), or by a dispatcher flush.
pub trait Task: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Activation hook: emit the operation's first command(s).
    ///
    /// Returning `Finished` means the task completed (or refused its
    /// arguments) without ever occupying the channel.
    fn activate(&mut self, ctx: &mut TaskContext<'_>) -> EventOutcome;

    /// Deliver one decoded event.
    fn handle_event(&mut self, event: &ncpd_protocol::Event, ctx: &mut TaskContext<'_>)
        -> EventOutcome;

    /// Absolute deadline after which the surrounding loop should expire
    /// this task, if the variant enforces one.
    fn deadline(&self) -> Option<Instant> {
        None
    }

    /// Build the completion reported when the deadline passes.
    fn expire(&mut self) -> Completion {
        Completion::status_only(StatusCode::Timeout)
    }
}
