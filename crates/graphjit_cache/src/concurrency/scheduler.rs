//! Fixed-size worker pool for background compilation.
//!
//! Jobs run to completion; there is no cancellation. Shutting the pool down (or
//! dropping it) waits for every queued job, so whatever the jobs borrow through their
//! captured `Arc`s outlives them.

use crossbeam_channel::{Sender, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::error::{CompileError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct AsyncCompileScheduler {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    /// Jobs queued or running
    pending: Arc<AtomicUsize>,
}

impl AsyncCompileScheduler {
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(CompileError::invalid_argument(
                "async compile pool needs at least one thread",
            ));
        }

        let (sender, receiver) = unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(num_threads);

        for idx in 0..num_threads {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("graphjit-compile-{idx}"))
                .spawn(move || {
                    for job in receiver.iter() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("background compile job panicked");
                        }
                        pending.fetch_sub(1, Ordering::AcqRel);
                    }
                    debug!(worker = idx, "compile worker exiting");
                })
                .map_err(|e| {
                    CompileError::internal(format!("failed to spawn compile worker: {e}"))
                })?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
            pending,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Jobs that have been scheduled but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn schedule<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return Err(CompileError::internal("async compile pool is shut down"));
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        sender.send(Box::new(job)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            CompileError::internal("async compile pool is shut down")
        })
    }

    /// Stop accepting work and wait for everything already queued
    pub fn shutdown(&mut self) {
        // Closing the channel lets each worker drain the queue and exit
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("compile worker terminated abnormally");
            }
        }
    }
}

impl Drop for AsyncCompileScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rejects_empty_pool() {
        assert!(AsyncCompileScheduler::new(0).is_err());
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut scheduler = AsyncCompileScheduler::new(2).unwrap();
        assert_eq!(scheduler.num_threads(), 2);

        for _ in 0..8 {
            let done = Arc::clone(&done);
            scheduler
                .schedule(move || {
                    thread::sleep(Duration::from_millis(5));
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        scheduler.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 8);
        assert_eq!(scheduler.pending(), 0);
        assert!(scheduler.schedule(|| {}).is_err());
    }

    #[test]
    fn test_worker_survives_panicking_job() {
        let done = Arc::new(AtomicUsize::new(0));
        let scheduler = AsyncCompileScheduler::new(1).unwrap();

        scheduler.schedule(|| panic!("backend crashed")).unwrap();
        let counter = Arc::clone(&done);
        scheduler
            .schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        drop(scheduler);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
