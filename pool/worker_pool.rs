// ========================================================================================
//
//                              THE SHARED WORKER POOL
//
// ========================================================================================
//
// A fixed set of named threads pulling boxed tasks from one unbounded
// multi-consumer queue. The pool knows nothing about batches: it accepts work
// from any number of submitters, never rejects it, and never reorders it
// deliberately. Excess work waits in the queue.

use crate::config::PoolConfig;
use crate::error::ConfigError;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, trace, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    queue: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl WorkerPool {
    /// Starts `capacity` workers named with the default prefix.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::spawn(capacity, PoolConfig::DEFAULT_THREAD_PREFIX)
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::spawn(config.capacity(), &config.thread_name_prefix)
    }

    fn spawn(capacity: usize, prefix: &str) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        let (queue, tasks) = unbounded::<Task>();
        let mut workers = Vec::with_capacity(capacity);
        for index in 0..capacity {
            let name = format!("{prefix}{index}");
            let tasks = tasks.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(tasks))
                .map_err(|source| ConfigError::Spawn { name, source })?;
            workers.push(handle);
        }
        debug!("Worker pool started with {capacity} workers ('{prefix}*').");

        Ok(Self {
            queue: Some(queue),
            workers,
            capacity,
        })
    }

    /// Enqueues `task` for any free worker and returns immediately.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(queue) = &self.queue else {
            return;
        };
        if let Err(rejected) = queue.send(Box::new(task)) {
            // Every worker is gone. Run it here rather than lose it.
            error!("Worker pool queue is disconnected; running task on the submitting thread.");
            let task = rejected.into_inner();
            task();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map_or(0, Sender::len)
    }

    /// Closes the queue, lets the workers drain what is already queued, and
    /// joins them.
    pub fn shutdown(mut self) {
        if self.queue.take().is_none() {
            return;
        }
        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            // A task that owns the last handle to the pool would otherwise join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("A pool worker exited abnormally during shutdown.");
            }
        }
        debug!("Worker pool with {} workers shut down.", self.capacity);
    }
}

/// Dropping closes the queue without waiting. Workers finish whatever is
/// already queued in the background and exit; the dropping thread is never
/// held up by work abandoned after a timeout or interrupt.
impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.queue.take().is_some() {
            debug!(
                "Worker pool with {} workers dropped; detaching its threads.",
                self.capacity
            );
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("queued", &self.queued())
            .finish()
    }
}

fn run_worker(tasks: Receiver<Task>) {
    let name = thread::current().name().unwrap_or("worker").to_owned();
    trace!("{name} waiting for tasks");
    while let Ok(task) = tasks.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            warn!(
                "{name} recovered from a panicking task: {}",
                panic_message(payload.as_ref())
            );
        }
    }
    trace!("{name} exiting, queue closed");
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
