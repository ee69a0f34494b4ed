use tracing::{debug, error};

use super::shared_queue::panic_message;
use crate::{KvsError, Result, ThreadPool};

/// A thread pool that uses a work stealing strategy as implemented by the [`Rayon`] library.
///
/// Rayon aborts the process when a spawned job panics unless a panic handler is installed, so
/// this pool installs one that logs the panic and keeps the worker alive.
///
/// [`Rayon`]: https://docs.rs/rayon/latest/rayon/index.html
pub struct RayonThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool for RayonThreadPool {
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized,
    {
        if threads == 0 {
            return Err(KvsError::Parsing("a thread pool needs at least one thread".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .thread_name(|id| format!("kvs-rayon-{}", id))
            .panic_handler(|cause| error!("task panicked: {}", panic_message(&*cause)))
            .build()
            .map_err(|e| KvsError::Parsing(format!("could not build thread pool: {:?}", &e)))?;
        debug!("created thread pool with {} threads", &threads);

        Ok(Self { pool })
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }
}
