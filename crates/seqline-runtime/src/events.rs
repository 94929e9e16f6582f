//! Notifications published to the hosting application

use seqline_core::{CommandFault, ConnectionId};
use tokio::sync::mpsc;

use crate::config::ClientConfig;

/// Events delivered from a client-side dispatcher to the application
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A queued command failed after `add` had already returned
    AsyncError {
        connection_id: ConnectionId,
        fault: CommandFault,
    },
}

pub type AppEventSender = mpsc::Sender<AppEvent>;
pub type AppEventReceiver = mpsc::Receiver<AppEvent>;

/// Create the application event channel with the configured buffer size
pub fn create_app_event_channel(config: &ClientConfig) -> (AppEventSender, AppEventReceiver) {
    mpsc::channel(config.app_event_buffer_size)
}
