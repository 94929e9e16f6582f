//! Dispatcher Builder API
//!
//! Assembles dispatchers for the two sides of a connection: server-side
//! dispatchers report command faults to the log only, client-side dispatchers
//! also hand them to the application through an [`AppEventReceiver`].

use std::sync::Arc;

use seqline_core::{Command, Dispatcher, ErrorSink, SeqlineResult, WorkerPool};
use tokio::runtime::Handle;
use tracing::info;

use crate::config::SeqlineConfig;
use crate::events::{create_app_event_channel, AppEventReceiver};
use crate::pool::TokioWorkerPool;
use crate::sinks::{ClientErrorSink, ServerErrorSink};

/// Dispatcher whose faults are only logged
///
/// A naming alias: the side is fixed by the sink chosen in
/// [`DispatcherBuilder::build_server`], not by the type.
pub type ServerDispatcher<C, A> = Dispatcher<C, A>;

/// Dispatcher whose faults are published as [`AppEvent`](crate::AppEvent)s and logged
///
/// A naming alias like [`ServerDispatcher`]; see [`DispatcherBuilder::build_client`].
pub type ClientDispatcher<C, A> = Dispatcher<C, A>;

// ----------------------------------------------------------------------------
// Dispatcher Builder
// ----------------------------------------------------------------------------

/// Builder for server-side and client-side dispatchers
#[derive(Default)]
pub struct DispatcherBuilder {
    config: SeqlineConfig,
    pool: Option<Arc<dyn WorkerPool>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SeqlineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing pool instead of resolving one at build time
    pub fn with_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Run activations on the blocking pool of the given runtime
    ///
    /// The `pool` section of the configuration is not applied to a borrowed
    /// runtime.
    pub fn with_runtime(self, handle: Handle) -> Self {
        self.with_pool(Arc::new(TokioWorkerPool::from_handle(handle)))
    }

    pub fn build_server<C, A>(self) -> SeqlineResult<ServerDispatcher<C, A>>
    where
        C: Command<A> + Send + 'static,
        A: Send + 'static,
    {
        info!("building server dispatcher");
        self.build_with_sink(Arc::new(ServerErrorSink))
    }

    /// Build a client dispatcher and the receiver for its async error events
    pub fn build_client<C, A>(self) -> SeqlineResult<(ClientDispatcher<C, A>, AppEventReceiver)>
    where
        C: Command<A> + Send + 'static,
        A: Send + 'static,
    {
        info!("building client dispatcher");
        let (app_event_sender, app_event_receiver) =
            create_app_event_channel(&self.config.client);
        let dispatcher = self.build_with_sink(Arc::new(ClientErrorSink::new(app_event_sender)))?;
        Ok((dispatcher, app_event_receiver))
    }

    /// Build a dispatcher reporting to a custom sink
    pub fn build_with_sink<C, A>(self, sink: Arc<dyn ErrorSink>) -> SeqlineResult<Dispatcher<C, A>>
    where
        C: Command<A> + Send + 'static,
        A: Send + 'static,
    {
        self.config.validate()?;
        let pool = self.resolve_pool()?;
        Ok(Dispatcher::new(pool, sink))
    }

    /// Explicit pool, else an owned runtime sized by `config.pool`
    fn resolve_pool(&self) -> SeqlineResult<Arc<dyn WorkerPool>> {
        match &self.pool {
            Some(pool) => Ok(Arc::clone(pool)),
            None => Ok(Arc::new(TokioWorkerPool::from_config(&self.config.pool)?)),
        }
    }
}
