use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::event::BoxedEvent;
use crate::hooking::{Hook, HookCtx, HookPos, Hookable};
use crate::time::VTimeInSec;

use super::{Engine, EngineCore, EventQueue, ExecutionError, SimulationEndHandler};

/// An engine that handles events one at a time, on the thread calling
/// [`Engine::run()`].
///
/// Handlers may schedule events, including at the current time, from within
/// [`Handler::handle()`](crate::event::Handler::handle): the queue lock is
/// never held while a handler runs.
pub struct SerialEngine {
    core: EngineCore,
    queue: Mutex<EventQueue>,
}

impl SerialEngine {
    /// Creates a serial engine at time zero.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: EngineCore::new(),
            queue: Mutex::new(EventQueue::new()),
        })
    }

    fn pop_next(&self) -> Option<BoxedEvent> {
        self.queue.lock().unwrap().pop()
    }
}

impl Engine for SerialEngine {
    fn schedule(&self, event: BoxedEvent) {
        self.core.check_schedule_time(event.time());

        self.queue.lock().unwrap().push(event);
    }

    fn run(&self) -> Result<(), ExecutionError> {
        self.core.resume();
        debug!(now = self.core.now(), "serial engine started");

        while !self.core.is_paused() {
            let Some(event) = self.pop_next() else {
                debug!(now = self.core.now(), "serial engine completed");
                return Ok(());
            };

            self.core.set_now(event.time());
            self.core
                .invoke_event_hook(self, HookPos::BeforeEvent, &event);

            if let Err(err) = event.dispatch() {
                error!(error = %err, "event handling failed");
                return Err(err);
            }

            self.core.invoke_event_hook(self, HookPos::AfterEvent, &event);
        }
        debug!(now = self.core.now(), "serial engine paused");

        Ok(())
    }

    fn pause(&self) {
        self.core.pause();
    }

    fn now(&self) -> VTimeInSec {
        self.core.now()
    }

    fn has_more_events(&self) -> bool {
        !self.queue.lock().unwrap().is_empty()
    }

    fn register_end_handler(&self, handler: Arc<dyn SimulationEndHandler>) {
        self.core.register_end_handler(handler);
    }

    fn finished(&self) {
        self.core.finished();
    }
}

impl Hookable for SerialEngine {
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

impl fmt::Debug for SerialEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialEngine")
            .field("core", &self.core)
            .field("queue", &*self.queue.lock().unwrap())
            .finish()
    }
}
