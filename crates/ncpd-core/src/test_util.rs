//! Shared helpers for the in-crate test suites.

use std::sync::{Arc, Mutex};

use ncpd_protocol::{Command, StatusCode};

use crate::error::LinkError;
use crate::task::{CommandSink, CompletionFn, TaskResult};

/// Sink that records every command it is handed.
pub(crate) struct RecordingSink {
    sent: Arc<Mutex<Vec<Command>>>,
}

impl RecordingSink {
    /// Returns the sink and a shared handle onto its command log.
    pub(crate) fn new() -> (Self, Arc<Mutex<Vec<Command>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            sent: Arc::clone(&sent),
        };
        (sink, sent)
    }
}

impl CommandSink for RecordingSink {
    fn send_command(&mut self, command: Command) -> Result<(), LinkError> {
        self.sent.lock().unwrap().push(command);
        Ok(())
    }
}

/// Sink that refuses everything, as a closed device would.
pub(crate) struct FailingSink;

impl CommandSink for FailingSink {
    fn send_command(&mut self, _command: Command) -> Result<(), LinkError> {
        Err(LinkError::Closed)
    }
}

/// Completion callback that appends `(status, result)` to a shared log.
pub(crate) fn completion_log() -> (CompletionFn, Arc<Mutex<Vec<(StatusCode, TaskResult)>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_ref = Arc::clone(&log);
    let on_complete: CompletionFn =
        Box::new(move |status, result| log_ref.lock().unwrap().push((status, result)));
    (on_complete, log)
}
