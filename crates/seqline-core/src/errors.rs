//! Error types for Seqline
//!
//! Two families live here: [`SeqlineError`], returned by fallible setup
//! operations (configuration, pool construction, logging), and [`CommandFault`],
//! which is never returned to a caller and only ever reaches an
//! [`ErrorSink`](crate::ErrorSink).

use std::error::Error as StdError;
use std::sync::Arc;

use crate::types::ConnectionId;

// ----------------------------------------------------------------------------
// Crate Error
// ----------------------------------------------------------------------------

/// Errors raised while setting up or configuring a dispatcher
#[derive(Debug, thiserror::Error)]
pub enum SeqlineError {
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Runtime error: {message}")]
    Runtime { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SeqlineError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

pub type SeqlineResult<T> = core::result::Result<T, SeqlineError>;

// ----------------------------------------------------------------------------
// Command Faults
// ----------------------------------------------------------------------------

/// How a command failed
#[derive(Debug, Clone, thiserror::Error)]
pub enum FaultKind {
    /// The command returned an error
    #[error("{0}")]
    Failed(Arc<dyn StdError + Send + Sync>),

    /// The command panicked; carries the panic message when one was available
    #[error("command panicked: {0}")]
    Panicked(String),
}

/// A fault raised while executing a queued command.
///
/// Produced by the drain activation of a connection queue and handed to the
/// dispatcher's error sink. Cheap to clone so a sink can both publish and log it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("command on connection {connection_id} failed: {kind}")]
pub struct CommandFault {
    connection_id: ConnectionId,
    kind: FaultKind,
}

impl CommandFault {
    pub fn new(connection_id: ConnectionId, kind: FaultKind) -> Self {
        Self {
            connection_id,
            kind,
        }
    }

    /// Connection whose command faulted
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.kind, FaultKind::Panicked(_))
    }

    /// The error returned by the command, if it returned one rather than panicking
    pub fn error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match &self.kind {
            FaultKind::Failed(error) => Some(error.as_ref()),
            FaultKind::Panicked(_) => None,
        }
    }
}
