//! Cooperative ticking.
//!
//! Cycle-level components are naturally expressed as a `tick` function called
//! once per clock cycle. Calling it on every cycle would however waste most
//! of the simulation time on components that have nothing to do, e.g. a
//! memory controller without pending requests.
//!
//! A [`TickingComponent`] therefore only ticks while it makes progress. As
//! soon as [`Ticker::tick()`] reports that nothing happened, the component
//! stops scheduling ticks and goes idle. It is woken up again when a message
//! arrives at one of its ports or when a port it failed to send to becomes
//! free, both of which are reported through the [`Component`] trait, and
//! ticks again from the next clock edge.
//!
//! [`TickScheduler`] holds the scheduling logic and can also be embedded in
//! custom handlers.
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! use cyclesim::engine::{Engine, SerialEngine};
//! use cyclesim::ticking::{Ticker, TickingComponent};
//! use cyclesim::time::{Freq, VTimeInSec};
//!
//! /// Counts down to zero, one step per cycle.
//! struct Countdown(AtomicU32);
//!
//! impl Ticker for Countdown {
//!     fn tick(&self, _now: VTimeInSec) -> bool {
//!         self.0
//!             .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
//!             .is_ok()
//!     }
//! }
//!
//! let engine = SerialEngine::new();
//! let freq = Freq::new(1.0 * Freq::GHZ);
//! let countdown = TickingComponent::new("countdown", engine.clone(), freq, Countdown(AtomicU32::new(3)));
//!
//! countdown.tick_later(0.0);
//! engine.run().unwrap();
//!
//! // Three productive ticks at 1, 2 and 3 ns, then an idle tick at 4 ns.
//! assert_eq!(engine.now(), freq.n_cycles_later(4, 0.0));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::engine::Engine;
use crate::event::{Event, HandleError, Handler};
use crate::ports::{Component, PortAddr};
use crate::time::{Freq, VTimeInSec};

/// The payload of a tick event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickEvent;

/// The per-cycle behavior of a [`TickingComponent`].
pub trait Ticker: Send + Sync + 'static {
    /// Advances the component by one cycle and returns `true` if any
    /// progress was made.
    fn tick(&self, now: VTimeInSec) -> bool;
}

/// The scheduling state of a ticking handler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickState {
    /// No tick is scheduled.
    Idle,
    /// A tick is scheduled.
    ScheduledToTick,
    /// A tick is being handled.
    Ticking,
}

struct TickSchedule {
    next_tick_time: Option<VTimeInSec>,
    state: TickState,
}

/// Schedules tick events for a handler, at most one per clock edge.
pub struct TickScheduler<H: Handler<Payload = TickEvent>> {
    handler: Weak<H>,
    engine: Arc<dyn Engine>,
    freq: Freq,
    secondary: bool,
    schedule: Mutex<TickSchedule>,
}

impl<H: Handler<Payload = TickEvent>> TickScheduler<H> {
    /// Creates a scheduler of primary tick events.
    pub fn new(handler: Weak<H>, engine: Arc<dyn Engine>, freq: Freq) -> Self {
        Self {
            handler,
            engine,
            freq,
            secondary: false,
            schedule: Mutex::new(TickSchedule {
                next_tick_time: None,
                state: TickState::Idle,
            }),
        }
    }

    /// Creates a scheduler of secondary tick events, which are handled after
    /// all primary events of the same time.
    pub fn new_secondary(handler: Weak<H>, engine: Arc<dyn Engine>, freq: Freq) -> Self {
        Self {
            secondary: true,
            ..Self::new(handler, engine, freq)
        }
    }

    /// Returns the clock frequency.
    pub fn freq(&self) -> Freq {
        self.freq
    }

    /// Returns the engine ticks are scheduled on.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Returns the scheduling state.
    pub fn state(&self) -> TickState {
        self.schedule.lock().unwrap().state
    }

    /// Schedules a tick at the first clock edge strictly after `now`, unless
    /// a tick at or after that edge is already scheduled.
    pub fn tick_later(&self, now: VTimeInSec) {
        self.schedule_at(self.freq.next_tick(now));
    }

    /// Schedules a tick at the first clock edge at or after `now`, unless a
    /// tick at or after that edge is already scheduled.
    pub fn tick_now(&self, now: VTimeInSec) {
        self.schedule_at(self.freq.this_tick(now));
    }

    /// Marks the beginning of a tick.
    pub fn start_tick(&self) {
        self.schedule.lock().unwrap().state = TickState::Ticking;
    }

    /// Marks the end of a tick that did not reschedule itself.
    pub fn end_tick(&self) {
        let mut schedule = self.schedule.lock().unwrap();
        if schedule.state == TickState::Ticking {
            schedule.state = TickState::Idle;
        }
    }

    fn schedule_at(&self, time: VTimeInSec) {
        let Some(handler) = self.handler.upgrade() else {
            return;
        };

        {
            let mut schedule = self.schedule.lock().unwrap();
            if matches!(schedule.next_tick_time, Some(next) if next >= time) {
                return;
            }
            schedule.next_tick_time = Some(time);
            schedule.state = TickState::ScheduledToTick;
        }

        let event = if self.secondary {
            Event::new_secondary(time, handler, TickEvent)
        } else {
            Event::new(time, handler, TickEvent)
        };
        self.engine.schedule(event.into());
    }
}

impl<H: Handler<Payload = TickEvent>> fmt::Debug for TickScheduler<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schedule = self.schedule.lock().unwrap();

        f.debug_struct("TickScheduler")
            .field("freq", &self.freq)
            .field("secondary", &self.secondary)
            .field("next_tick_time", &schedule.next_tick_time)
            .field("state", &schedule.state)
            .finish_non_exhaustive()
    }
}

/// A component that ticks as long as it makes progress.
pub struct TickingComponent<T: Ticker> {
    name: String,
    ticker: T,
    scheduler: TickScheduler<Self>,
}

impl<T: Ticker> TickingComponent<T> {
    /// Creates an idle ticking component.
    pub fn new(
        name: impl Into<String>,
        engine: Arc<dyn Engine>,
        freq: Freq,
        ticker: T,
    ) -> Arc<Self> {
        Self::new_cyclic(name, engine, freq, |_| ticker)
    }

    /// Creates an idle ticking component whose ticker is built from a weak
    /// reference to the component, typically to create ports owned by the
    /// component.
    pub fn new_cyclic<F>(
        name: impl Into<String>,
        engine: Arc<dyn Engine>,
        freq: Freq,
        build_ticker: F,
    ) -> Arc<Self>
    where
        F: FnOnce(&Weak<Self>) -> T,
    {
        let name = name.into();

        Arc::new_cyclic(|me| Self {
            name,
            ticker: build_ticker(me),
            scheduler: TickScheduler::new(me.clone(), engine, freq),
        })
    }

    /// Returns the ticker.
    pub fn ticker(&self) -> &T {
        &self.ticker
    }

    /// Returns the tick scheduler.
    pub fn tick_scheduler(&self) -> &TickScheduler<Self> {
        &self.scheduler
    }

    /// Wakes the component up at the first clock edge strictly after `now`.
    pub fn tick_later(&self, now: VTimeInSec) {
        self.scheduler.tick_later(now);
    }

    /// Wakes the component up at the first clock edge at or after `now`.
    pub fn tick_now(&self, now: VTimeInSec) {
        self.scheduler.tick_now(now);
    }
}

impl<T: Ticker> Handler for TickingComponent<T> {
    type Payload = TickEvent;

    fn handle(&self, event: &Event<Self>) -> Result<(), HandleError> {
        let now = event.time();

        self.scheduler.start_tick();
        if self.ticker.tick(now) {
            self.scheduler.tick_later(now);
        } else {
            self.scheduler.end_tick();
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Ticker> Component for TickingComponent<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify_recv(&self, now: VTimeInSec, _port: &PortAddr) {
        self.scheduler.tick_later(now);
    }

    fn notify_port_free(&self, now: VTimeInSec, _port: &PortAddr) {
        self.scheduler.tick_later(now);
    }
}

impl<T: Ticker> fmt::Debug for TickingComponent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickingComponent")
            .field("name", &self.name)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
