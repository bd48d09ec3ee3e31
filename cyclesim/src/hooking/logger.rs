use tracing::Level;

use crate::event::BoxedEvent;

use super::{Hook, HookCtx, HookPos};

/// A hook that logs every event an engine is about to handle.
///
/// Records are emitted with the `tracing` crate under the `cyclesim::event`
/// target, with the virtual time, the handler type and the secondary flag as
/// fields. Attach it to an engine with
/// [`Hookable::accept_hook()`](super::Hookable::accept_hook).
///
/// ```
/// use std::sync::Arc;
///
/// use cyclesim::engine::SerialEngine;
/// use cyclesim::hooking::{EventLogger, Hookable};
///
/// let engine = SerialEngine::new();
/// engine.accept_hook(Arc::new(EventLogger::new()));
/// ```
#[derive(Copy, Clone, Debug)]
pub struct EventLogger {
    level: Level,
}

impl EventLogger {
    /// Creates a logger emitting `TRACE` records.
    pub fn new() -> Self {
        Self::with_level(Level::TRACE)
    }

    /// Creates a logger emitting records at the specified level.
    pub fn with_level(level: Level) -> Self {
        Self { level }
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Hook for EventLogger {
    fn func(&self, ctx: &HookCtx<'_>) {
        if ctx.pos != HookPos::BeforeEvent {
            return;
        }
        let Some(event) = ctx.item.downcast_ref::<BoxedEvent>() else {
            return;
        };

        // `tracing` macros need the level to be known at compile time.
        macro_rules! log_event {
            ($level:expr) => {
                tracing::event!(
                    target: "cyclesim::event",
                    $level,
                    time = event.time(),
                    handler = event.handler_type(),
                    secondary = event.is_secondary(),
                    "handling event"
                )
            };
        }
        if self.level == Level::ERROR {
            log_event!(Level::ERROR);
        } else if self.level == Level::WARN {
            log_event!(Level::WARN);
        } else if self.level == Level::INFO {
            log_event!(Level::INFO);
        } else if self.level == Level::DEBUG {
            log_event!(Level::DEBUG);
        } else {
            log_event!(Level::TRACE);
        }
    }
}
