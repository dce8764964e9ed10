// rust/reader-core/src/pool.rs

//! Fixed-size worker pool hosting background producers.
//!
//! Workers pull boxed tasks from a shared unbounded channel. Each scheduled
//! task gets a [`TaskHandle`] that can wait for it to finish. A long-running
//! task (such as an on-disk producer) occupies its worker until it returns.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error};

use crate::error::{ReaderError, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed number of named worker threads.
pub struct ThreadPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns `num_threads` workers.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if `num_threads` is 0, and a pipeline
    /// error if a thread cannot be spawned.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(ReaderError::precondition(
                "thread pool needs at least one worker",
            ));
        }

        let (sender, receiver) = channel::unbounded::<Task>();
        let mut workers = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let receiver: Receiver<Task> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("reader-pool-{id}"))
                .spawn(move || {
                    // Ends when the pool drops its sender
                    for task in receiver.iter() {
                        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                            error!(worker = id, "pool task panicked");
                        }
                    }
                    debug!(worker = id, "pool worker exiting");
                })
                .map_err(|e| {
                    ReaderError::pipeline(format!("failed to spawn pool worker {id}: {e}"))
                })?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues `task` for execution on the next free worker.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error if the pool is shutting down.
    pub fn schedule<F>(&self, task: F) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = channel::bounded::<()>(1);
        let wrapped: Task = Box::new(move || {
            task();
            let _ = done_tx.send(());
        });

        self.sender
            .as_ref()
            .ok_or_else(|| ReaderError::pipeline("thread pool is shut down"))?
            .send(wrapped)
            .map_err(|_| ReaderError::pipeline("thread pool is shut down"))?;

        Ok(TaskHandle { done: done_rx })
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel lets idle workers fall out of their loop
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Completion handle for a scheduled task.
#[derive(Debug)]
pub struct TaskHandle {
    done: Receiver<()>,
}

impl TaskHandle {
    /// Blocks until the task has finished.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error if the task panicked or was dropped unrun.
    pub fn join(self) -> Result<()> {
        self.done
            .recv()
            .map_err(|_| ReaderError::pipeline("task ended without completing"))
    }
}
