//! Tokio-backed worker pool
//!
//! Drain activations execute commands synchronously and may block for as long
//! as a command takes, so they are handed to tokio's blocking pool rather than
//! spawned as async tasks.

use std::time::Duration;

use seqline_core::{SeqlineError, SeqlineResult, Task, WorkerPool};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use crate::config::PoolConfig;

/// [`WorkerPool`] running tasks via `spawn_blocking` on a tokio runtime
pub struct TokioWorkerPool {
    handle: Handle,
    // Present when the pool built its own runtime.
    runtime: Option<Runtime>,
}

impl TokioWorkerPool {
    /// Use the blocking pool of an existing runtime
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }

    /// Use the runtime this call is made from
    pub fn current() -> SeqlineResult<Self> {
        let handle = Handle::try_current().map_err(|e| {
            SeqlineError::runtime(format!("no tokio runtime to schedule on: {e}"))
        })?;
        Ok(Self::from_handle(handle))
    }

    /// Build and own a multi-threaded runtime sized by `config`
    pub fn from_config(config: &PoolConfig) -> SeqlineResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .thread_keep_alive(Duration::from_millis(config.keep_alive_ms))
            .enable_all()
            .build()?;

        info!(
            max_blocking_threads = config.max_blocking_threads,
            thread_name = %config.thread_name,
            "started worker pool runtime"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn owns_runtime(&self) -> bool {
        self.runtime.is_some()
    }
}

impl WorkerPool for TokioWorkerPool {
    fn schedule(&self, task: Task) {
        self.handle.spawn_blocking(task);
    }
}

impl Drop for TokioWorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            debug!("shutting down worker pool runtime");
            // Does not block, so the pool may be dropped from async code.
            runtime.shutdown_background();
        }
    }
}

impl core::fmt::Debug for TokioWorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokioWorkerPool")
            .field("owns_runtime", &self.owns_runtime())
            .finish()
    }
}
