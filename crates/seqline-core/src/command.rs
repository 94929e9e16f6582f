//! Commands and envelopes
//!
//! A [`Command`] is the unit of work supplied by the surrounding application. An
//! [`Envelope`] binds one command to the arguments it will be invoked with, at
//! submission time, so the pair can wait in a connection queue.

use std::sync::Arc;

/// Error type returned by a failing command
pub type CommandError = Box<dyn std::error::Error + Send + Sync>;

// ----------------------------------------------------------------------------
// Command Capability
// ----------------------------------------------------------------------------

/// A unit of work invoked with arguments of type `A`
pub trait Command<A> {
    fn run(&self, args: A) -> Result<(), CommandError>;
}

impl<A, T: Command<A> + ?Sized> Command<A> for Arc<T> {
    fn run(&self, args: A) -> Result<(), CommandError> {
        (**self).run(args)
    }
}

impl<A, T: Command<A> + ?Sized> Command<A> for Box<T> {
    fn run(&self, args: A) -> Result<(), CommandError> {
        (**self).run(args)
    }
}

/// Adapter turning a closure into a [`Command`]
#[derive(Clone)]
pub struct FnCommand<F>(F);

impl<A, F> Command<A> for FnCommand<F>
where
    F: Fn(A) -> Result<(), CommandError>,
{
    fn run(&self, args: A) -> Result<(), CommandError> {
        (self.0)(args)
    }
}

/// Wrap a closure as a command
pub fn command_fn<A, F>(f: F) -> FnCommand<F>
where
    F: Fn(A) -> Result<(), CommandError>,
{
    FnCommand(f)
}

// ----------------------------------------------------------------------------
// Envelope
// ----------------------------------------------------------------------------

/// A command bound to its invocation arguments, ready for execution
pub struct Envelope<C, A> {
    command: C,
    args: A,
}

impl<C, A> Envelope<C, A>
where
    C: Command<A>,
{
    pub fn new(command: C, args: A) -> Self {
        Self { command, args }
    }

    /// Run the command with its bound arguments.
    ///
    /// Errors and panics from the command are not intercepted here.
    pub fn execute(self) -> Result<(), CommandError> {
        self.command.run(self.args)
    }
}

impl<C, A: core::fmt::Debug> core::fmt::Debug for Envelope<C, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Envelope")
            .field("command", &core::any::type_name::<C>())
            .field("args", &self.args)
            .finish()
    }
}
