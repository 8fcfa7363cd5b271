//! Fixed-size worker pool.
//!
//! Workers drain a shared FIFO queue guarded by a mutex and a condition variable.
//! `submit` hands back a [`TaskHandle`] that resolves to the task's result.
//!
//! Shutdown semantics:
//! - `shutdown` wakes every worker and discards tasks that are still queued.
//! - Tasks already dequeued by a worker run to completion.
//! - Dropping the pool shuts it down and blocks until every worker has exited.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::{Error, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

/// Pending result of a task submitted to a [`ThreadPool`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task has run and return its result.
    ///
    /// Fails with `PoolClosed` if the pool dropped the task before running it.
    pub fn join(self) -> Result<T> {
        match self.rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::TaskPanicked),
            Err(_) => Err(Error::PoolClosed),
        }
    }
}

impl ThreadPool {
    /// Spawn a pool with `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let shared = Arc::new(Shared::default());
        let workers = (0..size)
            .map(|id| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("glyph-mlp-worker-{id}"))
                    .spawn(move || worker_loop(&shared))
                    .unwrap_or_else(|e| panic!("failed to spawn pool worker {id}: {e}"))
            })
            .collect();
        debug!("thread pool started with {size} workers");
        Self { shared, workers }
    }

    /// Spawn a pool sized to the detected hardware concurrency.
    pub fn with_available_parallelism() -> Self {
        let size = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(size)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `f` for execution on a worker.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let task: Task = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            // The receiver may already be gone; nothing to report then.
            let _ = tx.send(result);
        });

        {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                return Err(Error::PoolClosed);
            }
            queue.tasks.push_back(task);
        }
        self.shared.available.notify_one();

        Ok(TaskHandle { rx })
    }

    /// Stop accepting work, drop queued tasks and wake all workers.
    ///
    /// Does not wait for the workers; dropping the pool does.
    pub fn shutdown(&self) {
        let dropped = {
            let mut queue = self.shared.queue.lock();
            queue.closed = true;
            let dropped = queue.tasks.len();
            queue.tasks.clear();
            dropped
        };
        if dropped > 0 {
            warn!("thread pool shut down with {dropped} queued tasks discarded");
        }
        self.shared.available.notify_all();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("thread pool worker exited with a panic");
            }
        }
        debug!("thread pool stopped");
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            while queue.tasks.is_empty() && !queue.closed {
                shared.available.wait(&mut queue);
            }
            if queue.closed {
                return;
            }
            match queue.tasks.pop_front() {
                Some(task) => task,
                None => continue,
            }
        };
        task();
    }
}

/// Process-wide pool used by the fast multiplication path.
pub fn shared_pool() -> &'static ThreadPool {
    static POOL: OnceLock<ThreadPool> = OnceLock::new();
    POOL.get_or_init(ThreadPool::with_available_parallelism)
}
