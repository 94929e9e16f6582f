//! Seqline Runtime
//!
//! Wires `seqline-core` dispatchers to a concrete execution environment:
//! - `TokioWorkerPool`: runs drain activations on tokio's blocking pool
//! - `ServerErrorSink` / `ClientErrorSink`: the two fault-reporting policies
//! - `DispatcherBuilder`: assembles server-side and client-side dispatchers
//! - Configuration loading and logging setup shared by binaries

pub mod builder;
pub mod config;
pub mod events;
pub mod logging;
pub mod pool;
pub mod sinks;

pub use builder::{ClientDispatcher, DispatcherBuilder, ServerDispatcher};
pub use config::{ClientConfig, LoggingConfig, PoolConfig, SeqlineConfig};
pub use events::{create_app_event_channel, AppEvent, AppEventReceiver, AppEventSender};
pub use logging::init_logging;
pub use pool::TokioWorkerPool;
pub use sinks::{ClientErrorSink, ServerErrorSink};

// Re-export core types for convenience
pub use seqline_core::{
    command_fn, Command, CommandError, CommandFault, ConnectionId, Dispatcher, DispatcherStats,
    ErrorSink, FaultKind, LaneState, SeqlineError, SeqlineResult, WorkerPool,
};
