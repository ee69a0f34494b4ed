//! Fixed-size thread pools used to service client connections.
//!
//! Both pools create all of their threads up front and never grow. A job that panics is
//! caught and logged; the worker that ran it goes on to the next job.
use crate::Result;

/// a unit of work handed to a pool: one serviced connection
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A trait for pools of worker threads
pub trait ThreadPool: Send {
    /// creates a pool with `threads` worker threads
    ///
    /// # Errors
    /// returns an error if `threads` is zero or a thread could not be started
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// queues `job` to run on whichever worker becomes idle first. Never blocks
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}

mod rayon_pool;
mod shared_queue;

pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;
