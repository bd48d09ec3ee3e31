//! Event-driven simulation engines.
//!
//! This module provides the [`Engine`] trait and its two implementations:
//!
//! * [`SerialEngine`]: handles one event at a time on the thread calling
//!   [`Engine::run()`],
//! * [`ParallelEngine`]: handles all events scheduled for the same time
//!   concurrently on a pool of worker threads, with a barrier between
//!   consecutive times.
//!
//! Both engines process events in `(time, secondary, scheduling order)`
//! order and produce the same results for workloads in which no two events
//! addressed to the same handler are scheduled for the same time.
//!
//! Engines are configured with an [`EngineBuilder`] or constructed directly.
//! They are always handed out as `Arc`s since handlers need to hold on to
//! their engine to schedule further events.
//!
//! # Errors and invariant violations
//!
//! A handler error stops [`Engine::run()`], which returns it as an
//! [`ExecutionError`]. The event is consumed and all other pending events are
//! kept, so the simulation may be resumed with another call to `run()`.
//!
//! Scheduling an event in the past of the current simulation time is a bug
//! in the calling model and causes a panic. A panic raised by a handler on a
//! worker thread of the parallel engine is re-raised on the thread calling
//! `run()` once all events of the current time have completed.

mod parallel;
mod queue;
mod serial;

pub use parallel::ParallelEngine;
pub use queue::EventQueue;
pub use serial::SerialEngine;

use std::error::Error;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_utils::atomic::AtomicCell;

use crate::event::{BoxedEvent, HandleError};
use crate::hooking::{HookCtx, HookPos, Hookable, HookableBase};
use crate::time::VTimeInSec;

/// A discrete-event simulation engine.
pub trait Engine: Hookable + Send + Sync {
    /// Schedules an event.
    ///
    /// # Panics
    ///
    /// This will panic if the event time is earlier than [`Engine::now()`] or
    /// is NaN.
    fn schedule(&self, event: BoxedEvent);

    /// Handles events in chronological order until no event remains or until
    /// the engine is paused.
    ///
    /// The first handler error stops the simulation and is returned.
    fn run(&self) -> Result<(), ExecutionError>;

    /// Requests the engine to stop before handling the next event.
    ///
    /// Pending events are kept and handled by the next call to
    /// [`Engine::run()`], which clears the request.
    fn pause(&self);

    /// Returns the current simulation time.
    fn now(&self) -> VTimeInSec;

    /// Returns `true` if some events are still pending.
    fn has_more_events(&self) -> bool;

    /// Registers a handler to be notified by [`Engine::finished()`].
    fn register_end_handler(&self, handler: Arc<dyn SimulationEndHandler>);

    /// Notifies all registered end handlers that the simulation is over.
    ///
    /// End handlers are notified in registration order and only once, even
    /// if this method is called several times.
    fn finished(&self);
}

/// An object notified when the simulation ends.
pub trait SimulationEndHandler: Send + Sync {
    /// Handles the end of the simulation at time `now`.
    fn handle_end(&self, now: VTimeInSec);
}

/// Builder for serial and parallel engines.
///
/// # Examples
///
/// ```
/// use cyclesim::engine::{Engine, EngineBuilder};
///
/// let serial = EngineBuilder::new().build();
/// let parallel = EngineBuilder::new().with_num_workers(2).build();
///
/// assert_eq!(serial.now(), 0.0);
/// assert_eq!(parallel.now(), 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EngineBuilder {
    parallel: bool,
    num_workers: Option<usize>,
    num_queues: Option<usize>,
}

impl EngineBuilder {
    /// Creates a builder for a serial engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the parallel engine with its default configuration, i.e. one
    /// worker thread per logical CPU and two sub-queues per logical CPU.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;

        self
    }

    /// Selects the parallel engine with the specified number of worker
    /// threads.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.parallel = true;
        self.num_workers = Some(num_workers);

        self
    }

    /// Selects the parallel engine with the specified number of sub-queues.
    pub fn with_num_queues(mut self, num_queues: usize) -> Self {
        self.parallel = true;
        self.num_queues = Some(num_queues);

        self
    }

    /// Builds the engine.
    ///
    /// # Panics
    ///
    /// This will panic if a number of worker threads or sub-queues of zero
    /// was requested.
    pub fn build(self) -> Arc<dyn Engine> {
        if !self.parallel {
            return SerialEngine::new();
        }
        let num_cpus = num_cpus::get();
        let num_workers = self.num_workers.unwrap_or(num_cpus);
        let num_queues = self.num_queues.unwrap_or(2 * num_cpus);

        ParallelEngine::with_config(num_workers, num_queues)
    }
}

/// Error returned when a simulation could not run to completion.
#[derive(Debug)]
pub enum ExecutionError {
    /// A handler returned an error.
    HandlerFailed {
        /// The name of the handler.
        handler: String,
        /// The time of the event being handled.
        time: VTimeInSec,
        /// The error returned by the handler.
        source: HandleError,
    },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandlerFailed {
                handler,
                time,
                source,
            } => write!(
                fmt,
                "handler '{}' failed at t={}s: {}",
                handler, time, source
            ),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HandlerFailed { source, .. } => Some(&**source),
        }
    }
}

/// State shared by all engine flavors.
pub(crate) struct EngineCore {
    now: AtomicCell<VTimeInSec>,
    paused: AtomicBool,
    hooks: HookableBase,
    end_handlers: Mutex<Vec<Arc<dyn SimulationEndHandler>>>,
}

impl EngineCore {
    pub(crate) fn new() -> Self {
        Self {
            now: AtomicCell::new(0.0),
            paused: AtomicBool::new(false),
            hooks: HookableBase::new(),
            end_handlers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn now(&self) -> VTimeInSec {
        self.now.load()
    }

    /// Advances the simulation time.
    pub(crate) fn set_now(&self, time: VTimeInSec) {
        debug_assert!(time >= self.now.load());

        self.now.store(time);
    }

    /// Panics if an event cannot be scheduled at the specified time.
    pub(crate) fn check_schedule_time(&self, time: VTimeInSec) {
        assert!(!time.is_nan(), "cannot schedule an event at a NaN time");
        let now = self.now.load();
        assert!(
            time >= now,
            "cannot schedule an event at t={}s, which is in the past of the current time t={}s",
            time,
            now
        );
    }

    pub(crate) fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub(crate) fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub(crate) fn hooks(&self) -> &HookableBase {
        &self.hooks
    }

    /// Invokes the event hooks at the specified position, if any.
    pub(crate) fn invoke_event_hook(
        &self,
        domain: &dyn std::any::Any,
        pos: HookPos,
        event: &BoxedEvent,
    ) {
        if self.hooks.num_hooks() == 0 {
            return;
        }
        self.hooks.invoke_hook(&HookCtx {
            domain,
            now: event.time(),
            pos,
            item: event,
            detail: None,
        });
    }

    pub(crate) fn register_end_handler(&self, handler: Arc<dyn SimulationEndHandler>) {
        self.end_handlers.lock().unwrap().push(handler);
    }

    pub(crate) fn finished(&self) {
        // The handlers are taken out so they can register further handlers.
        let handlers = mem::take(&mut *self.end_handlers.lock().unwrap());
        let now = self.now();
        for handler in handlers {
            handler.handle_end(now);
        }
    }
}

impl fmt::Debug for EngineCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCore")
            .field("now", &self.now())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}
