//! Connection-keyed command dispatcher
//!
//! The [`Dispatcher`] owns the registry that maps each connection id to its
//! [`ConnectionQueue`]. Queues are created lazily on first submission and are
//! kept for the dispatcher's lifetime; the registry only ever grows, one entry
//! per connection id seen.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{Command, Envelope};
use crate::pool::WorkerPool;
use crate::queue::{ConnectionQueue, LaneState, QueueStats};
use crate::sink::ErrorSink;
use crate::types::ConnectionId;

/// Aggregate view over every connection queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub connections: usize,
    /// Queues with a drain activation scheduled or running
    pub draining: usize,
    pub pending: usize,
    pub enqueued: u64,
    pub executed: u64,
    pub faulted: u64,
}

/// Per-connection serialized dispatcher.
///
/// Commands added under the same connection id execute one at a time in the
/// order `add` was called; commands under different ids run concurrently on the
/// worker pool. Faults raised by commands go to the error sink supplied at
/// construction.
pub struct Dispatcher<C, A> {
    queues: DashMap<ConnectionId, Arc<ConnectionQueue<C, A>>>,
    pool: Arc<dyn WorkerPool>,
    sink: Arc<dyn ErrorSink>,
}

impl<C, A> Dispatcher<C, A>
where
    C: Command<A> + Send + 'static,
    A: Send + 'static,
{
    pub fn new(pool: Arc<dyn WorkerPool>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            queues: DashMap::new(),
            pool,
            sink,
        }
    }

    /// Queue `command` for execution with `args` on the connection's lane.
    ///
    /// Returns as soon as the envelope is buffered. Command faults are reported
    /// later through the error sink, never here.
    pub fn add(&self, connection_id: impl Into<ConnectionId>, command: C, args: A) {
        let queue = self.queue_for(connection_id.into());
        queue.enqueue(Envelope::new(command, args));
    }

    /// Number of connection queues created so far
    pub fn connection_count(&self) -> usize {
        self.queues.len()
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.queues.contains_key(connection_id)
    }

    /// Drain state of a connection's queue, `None` if nothing was ever added for it
    pub fn lane_state(&self, connection_id: &str) -> Option<LaneState> {
        self.queues.get(connection_id).map(|queue| queue.lane_state())
    }

    /// Envelopes still waiting on a connection's queue
    pub fn pending(&self, connection_id: &str) -> usize {
        self.queues
            .get(connection_id)
            .map_or(0, |queue| queue.pending())
    }

    pub fn queue_stats(&self, connection_id: &str) -> Option<QueueStats> {
        self.queues.get(connection_id).map(|queue| queue.stats())
    }

    pub fn stats(&self) -> DispatcherStats {
        let queues: Vec<_> = self.queues.iter().map(|entry| entry.value().clone()).collect();

        queues
            .iter()
            .map(|queue| queue.stats())
            .fold(
                DispatcherStats {
                    connections: queues.len(),
                    ..DispatcherStats::default()
                },
                |mut total, stats| {
                    if stats.state == LaneState::Draining {
                        total.draining += 1;
                    }
                    total.pending += stats.pending;
                    total.enqueued += stats.enqueued;
                    total.executed += stats.executed;
                    total.faulted += stats.faulted;
                    total
                },
            )
    }

    fn queue_for(&self, connection_id: ConnectionId) -> Arc<ConnectionQueue<C, A>> {
        if let Some(queue) = self.queues.get(&connection_id) {
            return Arc::clone(queue.value());
        }

        // The shard lock is released once the queue handle is cloned out, before
        // the caller touches the queue.
        self.queues
            .entry(connection_id.clone())
            .or_insert_with(|| {
                debug!(connection_id = %connection_id, "creating connection queue");
                Arc::new(ConnectionQueue::new(
                    connection_id.clone(),
                    Arc::clone(&self.pool),
                    Arc::clone(&self.sink),
                ))
            })
            .value()
            .clone()
    }
}

impl<C, A> core::fmt::Debug for Dispatcher<C, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("connections", &self.queues.len())
            .finish()
    }
}
