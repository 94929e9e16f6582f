//! Dispatch Ordering and Isolation Tests
//!
//! Exercises server and client dispatchers on a real tokio blocking pool:
//! per-connection ordering under concurrent submitters, isolation between
//! connections, the single-drainer guarantee, fault recovery, and atomic queue
//! creation for unseen connection ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use seqline_runtime::{
    AppEvent, Command, CommandError, DispatcherBuilder, FaultKind, LaneState, SeqlineConfig,
    ServerDispatcher,
};
use tokio::time::timeout;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

/// Shared observation point for every command in a test
#[derive(Default)]
struct Probe {
    executed: Mutex<Vec<(String, u32)>>,
    active: Mutex<HashMap<String, usize>>,
    peak: AtomicUsize,
}

impl Probe {
    fn enter(&self, connection: &str) {
        let mut active = self.active.lock().unwrap();
        let count = active.entry(connection.to_string()).or_default();
        *count += 1;
        self.peak.fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, connection: &str) {
        *self.active.lock().unwrap().get_mut(connection).unwrap() -= 1;
    }

    fn order_for(&self, connection: &str) -> Vec<u32> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == connection)
            .map(|(_, seq)| *seq)
            .collect()
    }

    fn position(&self, connection: &str, seq: u32) -> Option<usize> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .position(|(id, s)| id == connection && *s == seq)
    }
}

/// Arguments bound to each command at submission time
struct Step {
    connection: String,
    seq: u32,
    probe: Arc<Probe>,
}

enum ChatCommand {
    Record,
    Slow(Duration),
    Fail,
    Panic,
}

impl Command<Step> for ChatCommand {
    fn run(&self, step: Step) -> Result<(), CommandError> {
        step.probe.enter(&step.connection);
        let result = match self {
            ChatCommand::Record => Ok(()),
            ChatCommand::Slow(delay) => {
                std::thread::sleep(*delay);
                Ok(())
            }
            ChatCommand::Fail => Err(format!("step {} rejected", step.seq).into()),
            ChatCommand::Panic => {
                step.probe.leave(&step.connection);
                panic!("step {} panicked", step.seq);
            }
        };
        step.probe.leave(&step.connection);
        if result.is_ok() {
            step.probe
                .executed
                .lock()
                .unwrap()
                .push((step.connection, step.seq));
        }
        result
    }
}

fn step(probe: &Arc<Probe>, connection: &str, seq: u32) -> Step {
    Step {
        connection: connection.to_string(),
        seq,
        probe: probe.clone(),
    }
}

fn server() -> ServerDispatcher<ChatCommand, Step> {
    DispatcherBuilder::new()
        .with_config(SeqlineConfig::testing())
        .build_server()
        .expect("server dispatcher")
}

/// Wait until `executed` envelopes have run and every lane is idle again
async fn settle(dispatcher: &ServerDispatcher<ChatCommand, Step>, executed: u64) {
    timeout(Duration::from_secs(10), async {
        loop {
            let stats = dispatcher.stats();
            if stats.executed >= executed && stats.draining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dispatcher settles in time");
}

// ----------------------------------------------------------------------------
// Ordering
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_connection_runs_in_submission_order() {
    let dispatcher = server();
    let probe = Arc::new(Probe::default());

    for seq in 0..50 {
        let command = if seq % 7 == 0 {
            ChatCommand::Slow(Duration::from_millis(2))
        } else {
            ChatCommand::Record
        };
        dispatcher.add("alice", command, step(&probe, "alice", seq));
    }
    settle(&dispatcher, 50).await;

    assert_eq!(probe.order_for("alice"), (0..50).collect::<Vec<_>>());
    assert_eq!(dispatcher.lane_state("alice"), Some(LaneState::Idle));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_keep_per_thread_order() {
    let dispatcher = Arc::new(server());
    let probe = Arc::new(Probe::default());
    let submitters = 4u32;
    let per_submitter = 100u32;

    let handles: Vec<_> = (0..submitters)
        .map(|t| {
            let dispatcher = dispatcher.clone();
            let probe = probe.clone();
            std::thread::spawn(move || {
                for i in 0..per_submitter {
                    // Sequence numbers increase per submitter, so each
                    // submitter's subsequence must come out sorted.
                    let seq = t * 1_000 + i;
                    dispatcher.add("shared", ChatCommand::Record, step(&probe, "shared", seq));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    settle(&dispatcher, u64::from(submitters * per_submitter)).await;

    let order = probe.order_for("shared");
    assert_eq!(order.len(), (submitters * per_submitter) as usize);
    for t in 0..submitters {
        let mine: Vec<u32> = order.iter().copied().filter(|s| s / 1_000 == t).collect();
        let expected: Vec<u32> = (0..per_submitter).map(|i| t * 1_000 + i).collect();
        assert_eq!(mine, expected, "submitter {t} reordered");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_lanes_scenario() {
    let dispatcher = server();
    let probe = Arc::new(Probe::default());

    dispatcher.add("A", ChatCommand::Slow(Duration::from_millis(20)), step(&probe, "A", 1));
    dispatcher.add("A", ChatCommand::Record, step(&probe, "A", 2));
    dispatcher.add("B", ChatCommand::Record, step(&probe, "B", 3));
    settle(&dispatcher, 3).await;

    assert_eq!(probe.order_for("A"), vec![1, 2]);
    assert_eq!(probe.order_for("B"), vec![3]);
    assert_eq!(dispatcher.connection_count(), 2);
}

// ----------------------------------------------------------------------------
// Isolation and Exclusivity
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_connection_does_not_delay_other_connection() {
    let dispatcher = server();
    let probe = Arc::new(Probe::default());
    let started = Instant::now();

    dispatcher.add("slow", ChatCommand::Slow(Duration::from_millis(500)), step(&probe, "slow", 1));
    dispatcher.add("fast", ChatCommand::Record, step(&probe, "fast", 1));

    timeout(Duration::from_millis(400), async {
        while probe.order_for("fast").is_empty() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("fast lane finishes while slow lane is still busy");

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(probe.position("fast", 1), Some(0));
    settle(&dispatcher, 2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_drainer_per_connection_under_load() {
    let dispatcher = Arc::new(server());
    let probe = Arc::new(Probe::default());
    let connections = ["c0", "c1", "c2"];

    let handles: Vec<_> = (0..6u32)
        .map(|t| {
            let dispatcher = dispatcher.clone();
            let probe = probe.clone();
            std::thread::spawn(move || {
                for i in 0..60u32 {
                    let connection = connections[((t + i) % 3) as usize];
                    let command = if i % 10 == 0 {
                        ChatCommand::Slow(Duration::from_millis(1))
                    } else {
                        ChatCommand::Record
                    };
                    dispatcher.add(connection, command, step(&probe, connection, t * 100 + i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    settle(&dispatcher, 360).await;

    assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    assert_eq!(probe.executed.lock().unwrap().len(), 360);
    assert_eq!(dispatcher.connection_count(), 3);
}

// ----------------------------------------------------------------------------
// Faults
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_faults_do_not_halt_lane() {
    let dispatcher = server();
    let probe = Arc::new(Probe::default());

    dispatcher.add("bob", ChatCommand::Record, step(&probe, "bob", 1));
    dispatcher.add("bob", ChatCommand::Fail, step(&probe, "bob", 2));
    dispatcher.add("bob", ChatCommand::Panic, step(&probe, "bob", 3));
    dispatcher.add("bob", ChatCommand::Record, step(&probe, "bob", 4));
    settle(&dispatcher, 4).await;

    assert_eq!(probe.order_for("bob"), vec![1, 4]);
    let stats = dispatcher.queue_stats("bob").unwrap();
    assert_eq!(stats.faulted, 2);
    assert_eq!(stats.state, LaneState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_client_receives_one_notification_per_fault() {
    let (dispatcher, mut app_events) = DispatcherBuilder::new()
        .with_config(SeqlineConfig::testing())
        .build_client::<ChatCommand, Step>()
        .unwrap();
    let probe = Arc::new(Probe::default());

    dispatcher.add("carol", ChatCommand::Fail, step(&probe, "carol", 1));
    dispatcher.add("carol", ChatCommand::Record, step(&probe, "carol", 2));
    dispatcher.add("carol", ChatCommand::Panic, step(&probe, "carol", 3));
    dispatcher.add("dave", ChatCommand::Record, step(&probe, "dave", 1));

    let mut faults = Vec::new();
    for _ in 0..2 {
        let event = timeout(Duration::from_secs(5), app_events.recv())
            .await
            .expect("notification in time")
            .expect("channel open");
        let AppEvent::AsyncError {
            connection_id,
            fault,
        } = event;
        assert_eq!(connection_id.as_str(), "carol");
        faults.push(fault);
    }

    assert!(matches!(faults[0].kind(), FaultKind::Failed(e) if e.to_string() == "step 1 rejected"));
    assert!(matches!(faults[1].kind(), FaultKind::Panicked(msg) if msg == "step 3 panicked"));
    assert_eq!(probe.order_for("carol"), vec![2]);

    // No further notifications for the successful commands.
    assert!(timeout(Duration::from_millis(100), app_events.recv()).await.is_err());
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_submissions_share_one_queue() {
    let dispatcher = Arc::new(server());
    let probe = Arc::new(Probe::default());
    let barrier = Arc::new(std::sync::Barrier::new(8));

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let dispatcher = dispatcher.clone();
            let probe = probe.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    let seq = t * 10 + i;
                    dispatcher.add("newcomer", ChatCommand::Record, step(&probe, "newcomer", seq));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    settle(&dispatcher, 80).await;

    let mut order = probe.order_for("newcomer");
    order.sort_unstable();
    assert_eq!(order, (0..80).collect::<Vec<_>>());
    assert_eq!(dispatcher.connection_count(), 1);
    assert!(dispatcher.contains("newcomer"));
}
