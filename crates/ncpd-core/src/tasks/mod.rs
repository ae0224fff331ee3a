//! Built-in tasks for the operations the daemon exposes.
//!
//! Each task is a small state machine over the command/reply protocol.
//! Tasks never talk to the device directly; they emit commands through
//! the [`TaskContext`](crate::TaskContext) the dispatcher hands them and
//! react to the events routed back.

mod form;
mod leave;
mod prop;
mod scan;

pub use form::FormTask;
pub use leave::LeaveTask;
pub use prop::{PropertyGetTask, PropertyWriteTask};
pub use scan::{ScanTask, DEFAULT_SCAN_PERIOD_MS};

use std::time::Duration;

use ncpd_protocol::{Command, Reply, StatusCode};

use crate::task::{Completion, TaskContext};

/// Deadline applied by tasks that have no operation-specific budget.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Send a command, converting a dead link into a terminal completion.
///
/// Internal task steps thread this with `?` so a closed device unwinds
/// the whole step into `Finished(ProtocolError)`.
pub(crate) fn send_or_fail(ctx: &mut TaskContext<'_>, command: Command) -> Result<(), Completion> {
    ctx.send(command)
        .map_err(|_| Completion::status_only(StatusCode::ProtocolError))
}

/// Interpret a reply as an acknowledgement.
///
/// `Ok(())` for a property echo, `Err(completion)` carrying the device's
/// own status for an error reply.
pub(crate) fn ack_or_failure(reply: &Reply) -> Result<(), Completion> {
    match reply.status() {
        Some(status) if !status.is_success() => Err(Completion::status_only(status)),
        _ => Ok(()),
    }
}
