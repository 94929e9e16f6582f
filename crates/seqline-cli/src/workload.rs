//! Synthetic command workload

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use seqline_runtime::{
    AppEventReceiver, Command, CommandError, Dispatcher, DispatcherBuilder, SeqlineConfig,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Which error sink the dispatcher reports to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Server,
    Client,
}

#[derive(Debug, Clone)]
pub struct Workload {
    pub connections: usize,
    pub commands: u32,
    pub fail_every: u32,
    pub work: Duration,
    pub side: Side,
}

#[derive(Debug)]
pub struct Report {
    pub connections: usize,
    pub executed: u64,
    pub faulted: u64,
    pub async_errors: u64,
    pub elapsed: Duration,
    /// Connections whose journal differs from submission order
    pub out_of_order: Vec<String>,
}

type Journal = Arc<Mutex<Vec<u32>>>;

type WorkloadDispatcher = Dispatcher<WorkloadCommand, Tick>;

/// Arguments for one synthetic command
struct Tick {
    seq: u32,
    journal: Journal,
}

struct WorkloadCommand {
    fail: bool,
    work: Duration,
}

impl Command<Tick> for WorkloadCommand {
    fn run(&self, tick: Tick) -> Result<(), CommandError> {
        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
        tick.journal
            .lock()
            .map_err(|_| "journal lock poisoned")?
            .push(tick.seq);

        if self.fail {
            return Err(format!("synthetic failure at step {}", tick.seq).into());
        }
        Ok(())
    }
}

impl Workload {
    pub async fn run(&self, config: SeqlineConfig, wait: Duration) -> Result<Report> {
        let builder = DispatcherBuilder::new().with_config(config);
        let (dispatcher, app_events): (WorkloadDispatcher, Option<AppEventReceiver>) =
            match self.side {
                Side::Server => (builder.build_server()?, None),
                Side::Client => {
                    let (dispatcher, app_events) = builder.build_client()?;
                    (dispatcher, Some(app_events))
                }
            };

        let collector = app_events.map(|mut app_events| {
            tokio::spawn(async move {
                let mut received = 0u64;
                while app_events.recv().await.is_some() {
                    received += 1;
                }
                received
            })
        });

        let lanes: Vec<(String, Journal)> = (0..self.connections)
            .map(|_| (format!("conn-{}", Uuid::new_v4().simple()), Journal::default()))
            .collect();
        let total = self.connections as u64 * u64::from(self.commands);
        let started = Instant::now();

        for seq in 0..self.commands {
            for (connection, journal) in &lanes {
                let command = WorkloadCommand {
                    fail: self.fail_every > 0 && (seq + 1) % self.fail_every == 0,
                    work: self.work,
                };
                dispatcher.add(
                    connection.as_str(),
                    command,
                    Tick {
                        seq,
                        journal: journal.clone(),
                    },
                );
            }
        }
        info!(total, "workload submitted");

        let drained = tokio::time::timeout(wait, async {
            loop {
                let stats = dispatcher.stats();
                if stats.executed >= total && stats.draining == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            bail!("workload did not drain within {:?}: {:?}", wait, dispatcher.stats());
        }
        let elapsed = started.elapsed();
        let stats = dispatcher.stats();
        debug!(?stats, "workload drained");

        // Dropping the dispatcher closes the app event channel.
        drop(dispatcher);
        let async_errors = match collector {
            Some(handle) => handle.await?,
            None => 0,
        };

        let expected: Vec<u32> = (0..self.commands).collect();
        let out_of_order = lanes
            .iter()
            .filter(|(_, journal)| journal.lock().map_or(true, |seen| *seen != expected))
            .map(|(connection, _)| connection.clone())
            .collect();

        Ok(Report {
            connections: lanes.len(),
            executed: stats.executed,
            faulted: stats.faulted,
            async_errors,
            elapsed,
            out_of_order,
        })
    }
}
