//! Error sinks for server-side and client-side dispatchers
//!
//! On the server a failed command is only logged. On the client the hosting
//! application is additionally told about it through an [`AppEvent`], since
//! nothing else would surface a failure that happened after `add` returned.

use seqline_core::{CommandFault, ErrorSink};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, warn};

use crate::events::{AppEvent, AppEventSender};

// ----------------------------------------------------------------------------
// Server Sink
// ----------------------------------------------------------------------------

/// Logs faults and does nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerErrorSink;

impl ErrorSink for ServerErrorSink {
    fn on_fault(&self, fault: CommandFault) {
        log_fault(&fault);
    }
}

// ----------------------------------------------------------------------------
// Client Sink
// ----------------------------------------------------------------------------

/// Publishes an async error notification to the application, then logs
#[derive(Debug, Clone)]
pub struct ClientErrorSink {
    app_events: AppEventSender,
}

impl ClientErrorSink {
    pub fn new(app_events: AppEventSender) -> Self {
        Self { app_events }
    }
}

impl ErrorSink for ClientErrorSink {
    fn on_fault(&self, fault: CommandFault) {
        let event = AppEvent::AsyncError {
            connection_id: fault.connection_id().clone(),
            fault: fault.clone(),
        };

        // Drain activations run on pool threads, so the notification must not block.
        match self.app_events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    connection_id = %fault.connection_id(),
                    "app event channel full, dropping async error notification"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    connection_id = %fault.connection_id(),
                    "app event receiver dropped, async error not delivered"
                );
            }
        }

        log_fault(&fault);
    }
}

fn log_fault(fault: &CommandFault) {
    error!(
        connection_id = %fault.connection_id(),
        panicked = fault.is_panic(),
        error = %fault.kind(),
        "command execution failed"
    );
}
