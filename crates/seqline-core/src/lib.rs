//! Seqline Core
//!
//! Per-connection serialized command dispatch. Commands submitted under the same
//! connection id execute one at a time in submission order; commands for different
//! connections run concurrently on a shared worker pool.
//!
//! The crate is runtime-agnostic: it only needs something that implements
//! [`WorkerPool`] to run drain activations and something that implements
//! [`ErrorSink`] to receive command faults. `seqline-runtime` provides tokio-backed
//! implementations of both.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod command;
pub mod dispatcher;
pub mod errors;
pub mod pool;
pub mod queue;
pub mod sink;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use command::{command_fn, Command, CommandError, Envelope, FnCommand};
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use errors::{CommandFault, FaultKind, SeqlineError, SeqlineResult};
pub use pool::{Task, WorkerPool};
pub use queue::{ConnectionQueue, LaneState, QueueStats};
pub use sink::ErrorSink;
pub use types::ConnectionId;
