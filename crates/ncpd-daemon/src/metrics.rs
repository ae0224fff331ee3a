//! Metric names and registration.
//!
//! Counter names are declared as constants so call sites cannot drift
//! from the descriptions registered at startup. Recording goes through
//! the `metrics` facade; wiring an exporter is the embedder's business.

use metrics::describe_counter;

/// Frames received from the NCP.
pub const FRAMES_RX: &str = "ncpd.frames.rx";

/// Frames written towards the NCP.
pub const FRAMES_TX: &str = "ncpd.frames.tx";

/// Frames or events that failed to decode.
pub const DECODE_ERRORS: &str = "ncpd.decode.errors";

/// Tasks accepted by the dispatcher.
pub const TASKS_SUBMITTED: &str = "ncpd.tasks.submitted";

/// Tasks that reached a terminal outcome.
pub const TASKS_COMPLETED: &str = "ncpd.tasks.completed";

/// Tasks terminated by a flush (shutdown or device loss).
pub const TASKS_FLUSHED: &str = "ncpd.tasks.flushed";

/// Requests received on the control socket.
pub const CONTROL_REQUESTS: &str = "ncpd.control.requests";

/// Register descriptions for every metric the daemon records.
pub fn describe_metrics() {
    describe_counter!(FRAMES_RX, "Frames received from the NCP");
    describe_counter!(FRAMES_TX, "Frames written towards the NCP");
    describe_counter!(DECODE_ERRORS, "Frames or events that failed to decode");
    describe_counter!(TASKS_SUBMITTED, "Tasks accepted by the dispatcher");
    describe_counter!(TASKS_COMPLETED, "Tasks that reached a terminal outcome");
    describe_counter!(TASKS_FLUSHED, "Tasks terminated by a flush");
    describe_counter!(CONTROL_REQUESTS, "Requests received on the control socket");
}
