use std::any::Any;
use std::fmt;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

/// A unit of work executed by a worker thread.
pub(super) type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads fed through a channel.
///
/// Jobs are expected to catch their own panics and register them with
/// [`WorkerPool::register_panic()`], so that a panicking job does not take
/// its worker thread down with it.
pub(super) struct WorkerPool {
    sender: Option<Sender<Job>>,
    join_handles: Vec<JoinHandle<()>>,
    worker_panic: Mutex<Option<Box<dyn Any + Send + 'static>>>,
}

impl WorkerPool {
    /// Spawns `num_threads` worker threads.
    pub(super) fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "a worker pool needs at least one thread");

        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let join_handles = (0..num_threads)
            .map(|id| {
                let receiver: Receiver<Job> = receiver.clone();

                thread::Builder::new()
                    .name(format!("Worker #{}", id))
                    .spawn(move || {
                        // The loop ends when the pool drops the sender.
                        for job in receiver.iter() {
                            job();
                        }
                    })
                    .unwrap()
            })
            .collect();

        Self {
            sender: Some(sender),
            join_handles,
            worker_panic: Mutex::new(None),
        }
    }

    /// Returns the number of worker threads.
    pub(super) fn num_threads(&self) -> usize {
        self.join_handles.len()
    }

    /// Submits a job for execution on any worker thread.
    pub(super) fn execute(&self, job: Job) {
        // The sender is only taken on drop.
        if let Some(sender) = &self.sender {
            sender
                .send(job)
                .expect("worker threads outlive the worker pool");
        }
    }

    /// Registers a panic raised by a job.
    ///
    /// Only the first registered panic is kept.
    pub(super) fn register_panic(&self, panic: Box<dyn Any + Send + 'static>) {
        let mut worker_panic = self.worker_panic.lock().unwrap();
        if worker_panic.is_none() {
            *worker_panic = Some(panic);
        }
    }

    /// Takes a job panic if any is registered.
    pub(super) fn take_panic(&self) -> Option<Box<dyn Any + Send + 'static>> {
        self.worker_panic.lock().unwrap().take()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel makes all threads return once idle.
        self.sender = None;

        // The pool may be dropped from a job, in which case the current
        // worker cannot join itself.
        let current = thread::current().id();
        for join_handle in self.join_handles.drain(..) {
            if join_handle.thread().id() != current {
                let _ = join_handle.join();
            }
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads())
            .finish_non_exhaustive()
    }
}
