//! A discrete-event simulation substrate for cycle-level simulators.
//!
//! Cyclesim advances a virtual clock, dispatches timestamped events to the
//! handlers they are addressed to, and lets simulated components exchange
//! messages through flow-controlled ports. It is the foundation on which
//! hardware models (processors, caches, interconnects...) are built, but it
//! does not provide any such model itself.
//!
//! Events are always handled in strict chronological order. The
//! [`ParallelEngine`](engine::ParallelEngine) additionally handles all events
//! scheduled for the same time concurrently, waiting for all of them to
//! complete before moving on to the next time.
//!
//! # A practical overview
//!
//! Building a simulator typically involves:
//!
//! 1. writing [handlers](event::Handler) for the events each component reacts
//!    to, or [tickers](ticking::Ticker) for components that work cycle by
//!    cycle,
//! 2. connecting the [ports](ports) of the components,
//! 3. scheduling initial events on an [engine](engine) and running it.
//!
//! ## Handling events
//!
//! An [`Event`](event::Event) carries a time, a reference to its handler and
//! a payload whose type is chosen by the handler. Handlers take `&self`,
//! since the parallel engine may call them from any worker thread, and keep
//! their mutable state behind atomics or locks:
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::{Arc, Weak};
//!
//! use cyclesim::engine::Engine;
//! use cyclesim::event::{Event, HandleError, Handler};
//!
//! /// Reschedules itself every second until it has counted to `limit`.
//! pub struct Beacon {
//!     me: Weak<Self>,
//!     engine: Arc<dyn Engine>,
//!     count: AtomicU64,
//!     limit: u64,
//! }
//!
//! impl Beacon {
//!     pub fn new(engine: Arc<dyn Engine>, limit: u64) -> Arc<Self> {
//!         Arc::new_cyclic(|me| Self {
//!             me: me.clone(),
//!             engine,
//!             count: AtomicU64::new(0),
//!             limit,
//!         })
//!     }
//! }
//!
//! impl Handler for Beacon {
//!     type Payload = ();
//!
//!     fn handle(&self, event: &Event<Self>) -> Result<(), HandleError> {
//!         let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
//!         if count < self.limit {
//!             if let Some(me) = self.me.upgrade() {
//!                 self.engine.schedule(Event::new(event.time() + 1.0, me, ()).into());
//!             }
//!         }
//!
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Handler errors stop the simulation and are returned by
//! [`Engine::run()`](engine::Engine::run). Scheduling an event in the past is
//! a bug and panics.
//!
//! ## Running a simulation
//!
//! Engines are created with an [`EngineBuilder`](engine::EngineBuilder) or
//! with the constructors of [`SerialEngine`](engine::SerialEngine) and
//! [`ParallelEngine`](engine::ParallelEngine). A simulation runs until no
//! event remains or until [`Engine::pause()`](engine::Engine::pause) is
//! called, and can be resumed by calling `run()` again:
//!
//! ```
//! # use std::sync::atomic::{AtomicU64, Ordering};
//! # use std::sync::{Arc, Weak};
//! # use cyclesim::engine::Engine;
//! # use cyclesim::event::{Event, HandleError, Handler};
//! # pub struct Beacon {
//! #     me: Weak<Self>,
//! #     engine: Arc<dyn Engine>,
//! #     count: AtomicU64,
//! #     limit: u64,
//! # }
//! # impl Beacon {
//! #     pub fn new(engine: Arc<dyn Engine>, limit: u64) -> Arc<Self> {
//! #         Arc::new_cyclic(|me| Self { me: me.clone(), engine, count: AtomicU64::new(0), limit })
//! #     }
//! # }
//! # impl Handler for Beacon {
//! #     type Payload = ();
//! #     fn handle(&self, event: &Event<Self>) -> Result<(), HandleError> {
//! #         let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
//! #         if count < self.limit {
//! #             if let Some(me) = self.me.upgrade() {
//! #                 self.engine.schedule(Event::new(event.time() + 1.0, me, ()).into());
//! #             }
//! #         }
//! #         Ok(())
//! #     }
//! # }
//! use cyclesim::engine::EngineBuilder;
//!
//! let engine = EngineBuilder::new().with_num_workers(2).build();
//! let beacon = Beacon::new(engine.clone(), 5);
//!
//! engine.schedule(Event::new(0.0, beacon.clone(), ()).into());
//! engine.run().unwrap();
//!
//! assert_eq!(engine.now(), 4.0);
//! assert_eq!(beacon.count.load(Ordering::Relaxed), 5);
//! ```
//!
//! ## Observing a simulation
//!
//! Engines, buffers, ports and connections accept [hooks](hooking) that
//! observe every event and every message transfer without being able to
//! alter them. [`EventLogger`](hooking::EventLogger) is a ready-made hook
//! that logs all handled events with the [`tracing`] crate, which is also
//! used by the engines themselves for diagnostics.
//!
//! # Ticking components
//!
//! Components that are naturally described cycle by cycle implement
//! [`Ticker`](ticking::Ticker) and are wrapped in a
//! [`TickingComponent`](ticking::TickingComponent), which only schedules
//! ticks while the component makes progress and is woken up by its ports.
//! Clock edges are computed with [`Freq`](time::Freq).
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod engine;
pub mod event;
pub mod hooking;
pub mod id;
pub mod ports;
pub mod ticking;
pub mod time;
