//! Worker pool capability
//!
//! The dispatcher does not own threads. Each connection queue asks a
//! [`WorkerPool`] to run its drain activation and returns immediately.

/// A drain activation handed to the pool
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fire-and-forget task submission.
///
/// Implementations must run every scheduled task eventually and may run tasks
/// concurrently and in any order relative to each other. A task may block its
/// worker for as long as the command it executes takes.
pub trait WorkerPool: Send + Sync {
    fn schedule(&self, task: Task);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Task, WorkerPool};
    use std::sync::Mutex;

    /// Runs every task on a fresh OS thread
    pub struct SpawnPool;

    impl WorkerPool for SpawnPool {
        fn schedule(&self, task: Task) {
            std::thread::spawn(task);
        }
    }

    /// Holds tasks until the test runs them explicitly
    #[derive(Default)]
    pub struct ManualPool {
        tasks: Mutex<Vec<Task>>,
    }

    impl ManualPool {
        pub fn scheduled(&self) -> usize {
            self.tasks.lock().unwrap().len()
        }

        pub fn run_all(&self) {
            let tasks: Vec<Task> = self.tasks.lock().unwrap().drain(..).collect();
            for task in tasks {
                task();
            }
        }
    }

    impl WorkerPool for ManualPool {
        fn schedule(&self, task: Task) {
            self.tasks.lock().unwrap().push(task);
        }
    }
}
