use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, instrument};

use super::{Job, ThreadPool};
use crate::{KvsError, Result};

/// A thread pool implemented with a shared job queue (i.e. channel).
///
/// This implementation uses the MPMC [`channel`] provided by the crossbeam crate.
/// Specifically, we are using it as a single producer, multiple consumer. The single producer
/// is this type itself, and the threads in the pool are the consumers.
///
/// The channel is unbounded, so [`ThreadPool::spawn`] never waits. Jobs are taken in FIFO
/// order by whichever worker is idle. A job that panics is caught inside the worker, so the
/// number of threads stays fixed for the life of the pool.
///
/// [`channel`]: https://docs.rs/crossbeam/0.8.1/crossbeam/channel/index.html
pub struct SharedQueueThreadPool {
    /// the sending part of the channel
    tx: Sender<Job>,
    threads: u32,
}

impl SharedQueueThreadPool {
    /// number of worker threads
    pub fn threads(&self) -> u32 {
        self.threads
    }
}

impl ThreadPool for SharedQueueThreadPool {
    /// create a new thread pool with the given number of `threads`.
    /// Every thread created will have a handle to the receiving end of the channel
    fn new(threads: u32) -> Result<Self> {
        if threads == 0 {
            return Err(KvsError::Parsing("a thread pool needs at least one thread".to_string()));
        }
        let (tx, rx) = channel::unbounded::<Job>();
        for id in 0..threads {
            let task_rx = TaskReceiver(rx.clone());
            thread::Builder::new()
                .name(format!("kvs-worker-{}", id))
                .spawn(move || run_tasks(task_rx))?;
        }
        debug!("created shared queue thread pool with {} threads", threads);
        Ok(SharedQueueThreadPool { tx, threads })
    }

    /// Queues a function on the thread pool.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            error!("job dropped: there are no threads in the pool");
        }
    }
}

/// A type that can receive tasks (i.e. closures) from a channel
#[derive(Clone, Debug)]
struct TaskReceiver(Receiver<Job>);

/// this function waits for a task to arrive on its (wrapped) receiver, and then runs the task.
/// It returns only once every sender is gone
#[instrument]
fn run_tasks(rx: TaskReceiver) {
    while let Ok(task) = rx.0.recv() {
        debug!("received a new task");
        if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!("task panicked: {}", panic_message(&*cause));
        }
    }
    debug!("Thread exited because the thread pool was destroyed.");
}

/// best-effort text of a panic payload
pub(super) fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}
