//! Per-connection ordered command queue
//!
//! A [`ConnectionQueue`] buffers envelopes for one connection and makes sure at
//! most one drain activation is running for it at any time. The activation runs
//! on the shared [`WorkerPool`] and executes envelopes strictly in enqueue order.
//!
//! The buffer and the draining flag share one mutex. Appending and checking the
//! flag happen in the same critical section as observing an empty buffer and
//! clearing the flag, so an envelope can never be left behind in an idle queue
//! and a second activation can never start while one is running.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::command::{Command, Envelope};
use crate::errors::{CommandFault, FaultKind};
use crate::pool::WorkerPool;
use crate::sink::ErrorSink;
use crate::types::ConnectionId;

// ----------------------------------------------------------------------------
// Queue State
// ----------------------------------------------------------------------------

/// Drain state of a connection queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneState {
    /// No drain activation is scheduled or running
    Idle,
    /// A drain activation is scheduled or running
    Draining,
}

struct QueueState<C, A> {
    pending: VecDeque<Envelope<C, A>>,
    draining: bool,
}

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    executed: AtomicU64,
    faulted: AtomicU64,
    activations: AtomicU64,
}

/// Point-in-time view of a connection queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub state: LaneState,
    pub pending: usize,
    pub enqueued: u64,
    /// Envelopes that ran, whether or not they faulted
    pub executed: u64,
    pub faulted: u64,
    /// Drain activations scheduled over the queue's lifetime
    pub activations: u64,
}

// ----------------------------------------------------------------------------
// Connection Queue
// ----------------------------------------------------------------------------

/// Ordered buffer of envelopes for a single connection
pub struct ConnectionQueue<C, A> {
    connection_id: ConnectionId,
    state: Mutex<QueueState<C, A>>,
    pool: Arc<dyn WorkerPool>,
    sink: Arc<dyn ErrorSink>,
    counters: QueueCounters,
}

impl<C, A> ConnectionQueue<C, A>
where
    C: Command<A> + Send + 'static,
    A: Send + 'static,
{
    pub fn new(
        connection_id: ConnectionId,
        pool: Arc<dyn WorkerPool>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            connection_id,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                draining: false,
            }),
            pool,
            sink,
            counters: QueueCounters::default(),
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Append an envelope and make sure a drain activation will pick it up.
    ///
    /// Returns without waiting for the envelope to execute.
    pub fn enqueue(self: &Arc<Self>, envelope: Envelope<C, A>) {
        let activate = {
            let mut state = self.lock_state();
            state.pending.push_back(envelope);
            !std::mem::replace(&mut state.draining, true)
        };
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);

        // The flag is already set, so no other enqueue can schedule a second
        // activation before this one is handed to the pool.
        if activate {
            self.counters.activations.fetch_add(1, Ordering::Relaxed);
            let queue = Arc::clone(self);
            self.pool.schedule(Box::new(move || queue.drain()));
        }
    }

    /// Current drain state
    pub fn lane_state(&self) -> LaneState {
        if self.lock_state().draining {
            LaneState::Draining
        } else {
            LaneState::Idle
        }
    }

    /// Envelopes waiting to execute, excluding one currently running
    pub fn pending(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn stats(&self) -> QueueStats {
        let (state, pending) = {
            let state = self.lock_state();
            let lane = if state.draining {
                LaneState::Draining
            } else {
                LaneState::Idle
            };
            (lane, state.pending.len())
        };

        QueueStats {
            state,
            pending,
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            executed: self.counters.executed.load(Ordering::Relaxed),
            faulted: self.counters.faulted.load(Ordering::Relaxed),
            activations: self.counters.activations.load(Ordering::Relaxed),
        }
    }

    /// Drain activation: execute envelopes until the buffer is observed empty
    fn drain(&self) {
        debug!(connection_id = %self.connection_id, "drain activation started");
        let mut executed = 0u64;

        loop {
            let envelope = {
                let mut state = self.lock_state();
                match state.pending.pop_front() {
                    Some(envelope) => envelope,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };

            trace!(connection_id = %self.connection_id, "executing envelope");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| envelope.execute()));
            self.counters.executed.fetch_add(1, Ordering::Relaxed);
            executed += 1;

            let kind = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => FaultKind::Failed(Arc::from(error)),
                Err(payload) => FaultKind::Panicked(panic_message(payload.as_ref())),
            };
            self.report(CommandFault::new(self.connection_id.clone(), kind));
        }

        debug!(
            connection_id = %self.connection_id,
            executed,
            "drain activation finished"
        );
    }

    fn report(&self, fault: CommandFault) {
        self.counters.faulted.fetch_add(1, Ordering::Relaxed);

        // A panicking sink must not strand the queue in the draining state.
        if panic::catch_unwind(AssertUnwindSafe(|| self.sink.on_fault(fault))).is_err() {
            error!(
                connection_id = %self.connection_id,
                "error sink panicked while handling a fault"
            );
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState<C, A>> {
        // Commands never run under this lock, so a poisoned guard still holds
        // a consistent buffer.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
