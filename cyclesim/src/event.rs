//! Events and event handlers.
//!
//! An [`Event`] is a timestamped record addressed to a [`Handler`]. Each
//! handler type defines the payload carried by its events with the
//! [`Handler::Payload`] associated type, which is typically an `enum` matched
//! in [`Handler::handle()`].
//!
//! Engines store events of heterogeneous handler types as [`BoxedEvent`]s.
//! Any `Event<H>` converts into a `BoxedEvent` with `From`/`Into`.
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! use cyclesim::engine::{Engine, SerialEngine};
//! use cyclesim::event::{Event, HandleError, Handler};
//!
//! enum CounterEvent {
//!     Add(u64),
//!     Reset,
//! }
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: AtomicU64,
//! }
//!
//! impl Handler for Counter {
//!     type Payload = CounterEvent;
//!
//!     fn handle(&self, event: &Event<Self>) -> Result<(), HandleError> {
//!         match event.payload() {
//!             CounterEvent::Add(n) => self.value.fetch_add(*n, Ordering::Relaxed),
//!             CounterEvent::Reset => self.value.swap(0, Ordering::Relaxed),
//!         };
//!
//!         Ok(())
//!     }
//! }
//!
//! let engine = SerialEngine::new();
//! let counter = Arc::new(Counter::default());
//!
//! engine.schedule(Event::new(1.0, counter.clone(), CounterEvent::Add(3)).into());
//! engine.schedule(Event::new(2.0, counter.clone(), CounterEvent::Add(4)).into());
//! engine.run().unwrap();
//!
//! assert_eq!(counter.value.load(Ordering::Relaxed), 7);
//! assert_eq!(engine.now(), 2.0);
//! ```

use std::any::{self, Any};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::engine::ExecutionError;
use crate::time::VTimeInSec;

/// The error type returned by event handlers.
pub type HandleError = Box<dyn Error + Send + Sync + 'static>;

/// A unit to which events are addressed.
///
/// Handlers take `&self` because an engine may dispatch events from any of
/// its worker threads; state mutated while handling events must therefore
/// use interior mutability. Engines never dispatch two events to the same
/// handler concurrently as long as no two events for the same handler are
/// scheduled for the same time, which is an obligation of the caller.
pub trait Handler: Sized + Send + Sync + 'static {
    /// The payload carried by events addressed to this handler.
    type Payload: Send + 'static;

    /// Handles an event.
    fn handle(&self, event: &Event<Self>) -> Result<(), HandleError>;

    /// Returns a name identifying the handler in logs and errors.
    fn name(&self) -> &str {
        any::type_name::<Self>()
    }
}

/// A timestamped event addressed to a handler of type `H`.
pub struct Event<H: Handler> {
    time: VTimeInSec,
    secondary: bool,
    handler: Arc<H>,
    payload: H::Payload,
}

impl<H: Handler> Event<H> {
    /// Creates a primary event.
    pub fn new(time: VTimeInSec, handler: Arc<H>, payload: H::Payload) -> Self {
        Self {
            time,
            secondary: false,
            handler,
            payload,
        }
    }

    /// Creates a secondary event, which is handled after all primary events
    /// scheduled for the same time.
    pub fn new_secondary(time: VTimeInSec, handler: Arc<H>, payload: H::Payload) -> Self {
        Self {
            time,
            secondary: true,
            handler,
            payload,
        }
    }

    /// Returns the time at which the event is to be handled.
    pub fn time(&self) -> VTimeInSec {
        self.time
    }

    /// Returns the handler the event is addressed to.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Returns `true` if this is a secondary event.
    pub fn is_secondary(&self) -> bool {
        self.secondary
    }

    /// Returns a reference to the payload.
    pub fn payload(&self) -> &H::Payload {
        &self.payload
    }

    /// Consumes the event and returns its payload.
    pub fn into_payload(self) -> H::Payload {
        self.payload
    }
}

impl<H: Handler> fmt::Debug for Event<H>
where
    H::Payload: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("time", &self.time)
            .field("secondary", &self.secondary)
            .field("handler", &self.handler.name())
            .field("payload", &self.payload)
            .finish()
    }
}

/// Type-erased interface of an `Event<H>`.
trait ScheduledEvent: Send {
    fn time(&self) -> VTimeInSec;
    fn is_secondary(&self) -> bool;
    fn handler_type(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn dispatch(&self) -> Result<(), ExecutionError>;
}

impl<H: Handler> ScheduledEvent for Event<H> {
    fn time(&self) -> VTimeInSec {
        self.time
    }

    fn is_secondary(&self) -> bool {
        self.secondary
    }

    fn handler_type(&self) -> &'static str {
        any::type_name::<H>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispatch(&self) -> Result<(), ExecutionError> {
        self.handler
            .handle(self)
            .map_err(|source| ExecutionError::HandlerFailed {
                handler: self.handler.name().to_owned(),
                time: self.time,
                source,
            })
    }
}

/// An event of any handler type, as stored by engines.
pub struct BoxedEvent(Box<dyn ScheduledEvent>);

impl BoxedEvent {
    /// Returns the time at which the event is to be handled.
    pub fn time(&self) -> VTimeInSec {
        self.0.time()
    }

    /// Returns `true` if this is a secondary event.
    pub fn is_secondary(&self) -> bool {
        self.0.is_secondary()
    }

    /// Returns the type name of the handler the event is addressed to.
    pub fn handler_type(&self) -> &'static str {
        self.0.handler_type()
    }

    /// Returns a reference to the typed event if it is addressed to a handler
    /// of type `H`.
    pub fn downcast_ref<H: Handler>(&self) -> Option<&Event<H>> {
        self.0.as_any().downcast_ref()
    }

    /// Hands the event to its handler.
    pub(crate) fn dispatch(&self) -> Result<(), ExecutionError> {
        self.0.dispatch()
    }
}

impl<H: Handler> From<Event<H>> for BoxedEvent {
    fn from(event: Event<H>) -> Self {
        Self(Box::new(event))
    }
}

impl fmt::Debug for BoxedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedEvent")
            .field("time", &self.time())
            .field("secondary", &self.is_secondary())
            .field("handler", &self.handler_type())
            .finish_non_exhaustive()
    }
}
