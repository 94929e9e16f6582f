//! Error sink capability
//!
//! Faults raised while draining a connection queue never reach the code that
//! submitted the command. They are handed to the dispatcher's [`ErrorSink`],
//! which alone decides what the user sees.

use crate::errors::CommandFault;

/// Consumer of faults raised during command execution
pub trait ErrorSink: Send + Sync {
    fn on_fault(&self, fault: CommandFault);
}

impl<F> ErrorSink for F
where
    F: Fn(CommandFault) + Send + Sync,
{
    fn on_fault(&self, fault: CommandFault) {
        self(fault)
    }
}
