mod pool;

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::sync::WaitGroup;
use tracing::{debug, error, trace};

use crate::event::BoxedEvent;
use crate::hooking::{Hook, HookCtx, HookPos, Hookable};
use crate::time::VTimeInSec;

use super::{Engine, EngineCore, EventQueue, ExecutionError, SimulationEndHandler};

use pool::WorkerPool;

/// An engine that handles all events scheduled for the same time
/// concurrently on a pool of worker threads.
///
/// Events are spread over a fixed number of sub-queues which circulate
/// through an "available queues" channel: [`Engine::schedule()`] borrows any
/// available sub-queue, pushes the event and gives the sub-queue back. At
/// each step, [`Engine::run()`] reclaims all sub-queues, determines the
/// earliest pending time (the *trigger time*), dispatches every event
/// scheduled for that time to the worker pool, makes the sub-queues
/// available again and waits until all dispatched events have been handled.
/// No event scheduled for a later time is therefore handled before all
/// events of the trigger time have completed.
///
/// Primary and secondary events scheduled for the same time are handled in
/// two consecutive rounds. An event scheduled for the current time while a
/// round is in progress is handled in a follow-up round at the same time.
///
/// Events handled in the same round run concurrently and in an unspecified
/// order. Scheduling two events for the same handler at the same time is
/// therefore a logic error of the caller.
pub struct ParallelEngine {
    core: EngineCore,
    me: Weak<Self>,
    queue_sender: Sender<EventQueue>,
    queue_receiver: Receiver<EventQueue>,
    num_queues: usize,
    pending: AtomicUsize,
    failures: Mutex<Vec<ExecutionError>>,
    pool: WorkerPool,
}

impl ParallelEngine {
    /// Creates a parallel engine with one worker thread per logical CPU and
    /// two sub-queues per logical CPU.
    pub fn new() -> Arc<Self> {
        let num_cpus = num_cpus::get();

        Self::with_config(num_cpus, 2 * num_cpus)
    }

    /// Creates a parallel engine with the specified number of worker threads
    /// and sub-queues.
    ///
    /// # Panics
    ///
    /// This will panic if either number is zero.
    pub fn with_config(num_workers: usize, num_queues: usize) -> Arc<Self> {
        assert!(num_workers > 0, "the number of worker threads cannot be zero");
        assert!(num_queues > 0, "the number of sub-queues cannot be zero");

        let (queue_sender, queue_receiver) = crossbeam_channel::bounded(num_queues);
        for _ in 0..num_queues {
            queue_sender.send(EventQueue::new()).unwrap();
        }

        Arc::new_cyclic(|me| Self {
            core: EngineCore::new(),
            me: me.clone(),
            queue_sender,
            queue_receiver,
            num_queues,
            pending: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
            pool: WorkerPool::new(num_workers),
        })
    }

    /// Returns the number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.pool.num_threads()
    }

    /// Returns the number of sub-queues.
    pub fn num_queues(&self) -> usize {
        self.num_queues
    }

    /// Takes all sub-queues out of the channel, waiting for those currently
    /// borrowed by `schedule`.
    fn reclaim_queues(&self) -> Vec<EventQueue> {
        (0..self.num_queues)
            .map(|_| self.queue_receiver.recv().unwrap())
            .collect()
    }

    fn return_queues(&self, queues: Vec<EventQueue>) {
        for queue in queues {
            self.queue_sender.send(queue).unwrap();
        }
    }

    /// Dispatches all events of the earliest round to the worker pool and
    /// returns the number of dispatched events, or `None` if no event is
    /// pending.
    fn dispatch_round(&self, queues: &mut [EventQueue], wg: &WaitGroup) -> Option<usize> {
        let (trigger_time, secondary) = queues
            .iter()
            .filter_map(EventQueue::peek_key)
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))?;

        self.core.set_now(trigger_time);
        trace!(trigger_time, secondary, "dispatching round");

        let mut count = 0;
        for queue in queues.iter_mut() {
            while let Some((time, is_secondary)) = queue.peek_key() {
                assert!(
                    time >= trigger_time,
                    "event at t={}s found while dispatching events at t={}s",
                    time,
                    trigger_time
                );
                if time > trigger_time || is_secondary != secondary {
                    break;
                }
                // Just peeked.
                let Some(event) = queue.pop() else { break };
                self.pending.fetch_sub(1, Ordering::Relaxed);
                self.dispatch(event, wg.clone());
                count += 1;
            }
        }

        Some(count)
    }

    fn dispatch(&self, event: BoxedEvent, wg: WaitGroup) {
        // `self` is necessarily owned by an `Arc` since it is borrowed.
        let Some(engine) = self.me.upgrade() else {
            return;
        };

        self.pool.execute(Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), ExecutionError> {
                engine
                    .core
                    .invoke_event_hook(&*engine, HookPos::BeforeEvent, &event);
                event.dispatch()?;
                engine
                    .core
                    .invoke_event_hook(&*engine, HookPos::AfterEvent, &event);

                Ok(())
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => engine.failures.lock().unwrap().push(err),
                Err(panic) => engine.pool.register_panic(panic),
            }

            // Nothing captured may be dropped on a worker thread once the
            // barrier is released.
            drop(event);
            drop(engine);
            drop(wg);
        }));
    }

    /// Returns the first handler error of the last round, logging all others.
    fn take_failure(&self) -> Option<ExecutionError> {
        let failures = mem::take(&mut *self.failures.lock().unwrap());
        let mut failures = failures.into_iter();
        let first = failures.next()?;
        error!(error = %first, "event handling failed");
        for other in failures {
            error!(error = %other, "event handling failed (not returned)");
        }

        Some(first)
    }
}

impl Engine for ParallelEngine {
    fn schedule(&self, event: BoxedEvent) {
        self.core.check_schedule_time(event.time());

        let mut queue = self.queue_receiver.recv().unwrap();
        queue.push(event);
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.queue_sender.send(queue).unwrap();
    }

    fn run(&self) -> Result<(), ExecutionError> {
        self.core.resume();
        debug!(
            now = self.core.now(),
            num_workers = self.num_workers(),
            num_queues = self.num_queues,
            "parallel engine started"
        );

        loop {
            if self.core.is_paused() {
                debug!(now = self.core.now(), "parallel engine paused");
                return Ok(());
            }

            let mut queues = self.reclaim_queues();
            let wg = WaitGroup::new();
            let dispatched = self.dispatch_round(&mut queues, &wg);
            self.return_queues(queues);

            // Barrier.
            wg.wait();

            if let Some(panic) = self.pool.take_panic() {
                panic::resume_unwind(panic);
            }
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            if dispatched.is_none() {
                debug!(now = self.core.now(), "parallel engine completed");
                return Ok(());
            }
        }
    }

    fn pause(&self) {
        self.core.pause();
    }

    fn now(&self) -> VTimeInSec {
        self.core.now()
    }

    fn has_more_events(&self) -> bool {
        self.pending.load(Ordering::Relaxed) != 0
    }

    fn register_end_handler(&self, handler: Arc<dyn SimulationEndHandler>) {
        self.core.register_end_handler(handler);
    }

    fn finished(&self) {
        self.core.finished();
    }
}

impl Hookable for ParallelEngine {
    fn accept_hook(&self, hook: Arc<dyn Hook>) {
        self.core.hooks().accept_hook(hook);
    }

    fn num_hooks(&self) -> usize {
        self.core.hooks().num_hooks()
    }

    fn invoke_hook(&self, ctx: &HookCtx<'_>) {
        self.core.hooks().invoke_hook(ctx);
    }
}

impl fmt::Debug for ParallelEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelEngine")
            .field("core", &self.core)
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .field("num_queues", &self.num_queues)
            .field("pool", &self.pool)
            .finish()
    }
}
