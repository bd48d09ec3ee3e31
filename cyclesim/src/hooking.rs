//! Observation hooks.
//!
//! Engines, buffers, ports and connections are [`Hookable`]: any number of
//! [`Hook`]s can be attached to them, and each hook is invoked with a
//! [`HookCtx`] at well-defined positions of the observed operation, e.g.
//! right before an event is handled or right after a message was pushed to a
//! buffer.
//!
//! Hooks are pure observers. They only receive shared references and cannot
//! return anything, so they can neither block nor alter the outcome of the
//! operation they observe. Hooks attached to the same object are invoked in
//! registration order.
//!
//! Call sites only build a [`HookCtx`] if [`Hookable::num_hooks()`] is
//! non-zero, so an object without hooks pays no more than an atomic load.
//!
//! # Examples
//!
//! Counting the events handled by an engine:
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use cyclesim::engine::{Engine, SerialEngine};
//! use cyclesim::hooking::{HookCtx, HookPos, Hookable};
//!
//! let engine = SerialEngine::new();
//! let count = Arc::new(AtomicUsize::new(0));
//!
//! let c = count.clone();
//! engine.accept_hook(Arc::new(move |ctx: &HookCtx<'_>| {
//!     if ctx.pos == HookPos::BeforeEvent {
//!         c.fetch_add(1, Ordering::Relaxed);
//!     }
//! }));
//!
//! engine.run().unwrap();
//! assert_eq!(count.load(Ordering::Relaxed), 0);
//! ```

mod logger;

pub use logger::EventLogger;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::time::VTimeInSec;

/// The position within an operation at which a hook is invoked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HookPos {
    /// An engine is about to handle an event; the item is a
    /// [`BoxedEvent`](crate::event::BoxedEvent).
    BeforeEvent,
    /// An engine has handled an event; the item is a
    /// [`BoxedEvent`](crate::event::BoxedEvent).
    AfterEvent,
    /// An element was pushed to a [`Buffer`](crate::ports::Buffer).
    BufPush,
    /// An element was popped from a [`Buffer`](crate::ports::Buffer).
    BufPop,
    /// A message was sent by a [`Port`](crate::ports::Port).
    PortMsgSend,
    /// A message was received by a [`Port`](crate::ports::Port).
    PortMsgRecvd,
    /// A message was retrieved from a [`Port`](crate::ports::Port).
    PortMsgRetrieve,
    /// A connection started the delivery of a message.
    ConnStartSend,
    /// A connection delivered a message to its destination.
    ConnDeliver,
    /// A user-defined position.
    Custom(&'static str),
}

impl fmt::Display for HookPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeEvent => f.write_str("before-event"),
            Self::AfterEvent => f.write_str("after-event"),
            Self::BufPush => f.write_str("buf-push"),
            Self::BufPop => f.write_str("buf-pop"),
            Self::PortMsgSend => f.write_str("port-msg-send"),
            Self::PortMsgRecvd => f.write_str("port-msg-recvd"),
            Self::PortMsgRetrieve => f.write_str("port-msg-retrieve"),
            Self::ConnStartSend => f.write_str("conn-start-send"),
            Self::ConnDeliver => f.write_str("conn-deliver"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// The information passed to a hook.
pub struct HookCtx<'a> {
    /// The hookable object invoking the hook.
    pub domain: &'a dyn Any,
    /// The current virtual time.
    pub now: VTimeInSec,
    /// Where in the operation the hook is invoked.
    pub pos: HookPos,
    /// The object the operation is applied to, e.g. an event or a message.
    pub item: &'a dyn Any,
    /// Optional position-specific information.
    pub detail: Option<&'a dyn Any>,
}

impl fmt::Debug for HookCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookCtx")
            .field("now", &self.now)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

/// An observer that can be attached to a [`Hookable`] object.
///
/// The trait is implemented for all `Fn(&HookCtx)` closures.
pub trait Hook: Send + Sync {
    /// Observes the operation described by the context.
    fn func(&self, ctx: &HookCtx<'_>);
}

impl<F> Hook for F
where
    F: Fn(&HookCtx<'_>) + Send + Sync,
{
    fn func(&self, ctx: &HookCtx<'_>) {
        self(ctx)
    }
}

/// An object that accepts hooks.
pub trait Hookable {
    /// Registers a hook.
    fn accept_hook(&self, hook: Arc<dyn Hook>);

    /// Returns the number of registered hooks.
    fn num_hooks(&self) -> usize;

    /// Invokes all registered hooks in registration order.
    fn invoke_hook(&self, ctx: &HookCtx<'_>);
}

/// A reusable [`Hookable`] implementation.
///
/// Hooks must not register other hooks on the object they are invoked from.
#[derive(Default)]
pub struct HookableBase {
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
    count: AtomicUsize,
}

impl HookableBase {
    /// Creates an object without hooks.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Hookable for HookableBase {
    fn accept_hook(&self, hook: Arc<dyn Hook>) {
        let mut hooks = self.hooks.write().unwrap();
        hooks.push(hook);
        self.count.store(hooks.len(), Ordering::Release);
    }

    #[inline]
    fn num_hooks(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn invoke_hook(&self, ctx: &HookCtx<'_>) {
        for hook in self.hooks.read().unwrap().iter() {
            hook.func(ctx);
        }
    }
}

impl fmt::Debug for HookableBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookableBase")
            .field("num_hooks", &self.num_hooks())
            .finish()
    }
}
