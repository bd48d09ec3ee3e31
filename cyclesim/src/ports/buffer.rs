use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::hooking::{Hook, HookCtx, HookPos, Hookable, HookableBase};
use crate::time::VTimeInSec;

/// A bounded FIFO queue.
///
/// Push and pop operations invoke the [`HookPos::BufPush`] and
/// [`HookPos::BufPop`] hooks with the element as item. Since a buffer has no
/// clock of its own, hooks are given the time last set with
/// [`Buffer::set_time()`]; ports set it before each operation.
pub struct Buffer<T> {
    name: String,
    capacity: usize,
    elements: VecDeque<T>,
    time: VTimeInSec,
    hooks: HookableBase,
}

impl<T: Send + 'static> Buffer<T> {
    /// Creates an empty buffer.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            elements: VecDeque::with_capacity(capacity),
            time: 0.0,
            hooks: HookableBase::new(),
        }
    }

    /// Returns the name of the buffer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of elements.
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if an element can be pushed.
    pub fn can_push(&self) -> bool {
        self.elements.len() < self.capacity
    }

    /// Appends an element.
    ///
    /// # Panics
    ///
    /// This will panic if the buffer is full.
    pub fn push(&mut self, element: T) {
        assert!(
            self.can_push(),
            "buffer '{}' overflow (capacity {})",
            self.name,
            self.capacity
        );

        self.elements.push_back(element);

        if self.hooks.num_hooks() != 0 {
            if let Some(element) = self.elements.back() {
                self.invoke(HookPos::BufPush, element);
            }
        }
    }

    /// Removes and returns the oldest element, if any.
    pub fn pop(&mut self) -> Option<T> {
        let element = self.elements.pop_front()?;

        if self.hooks.num_hooks() != 0 {
            self.invoke(HookPos::BufPop, &element);
        }

        Some(element)
    }

    /// Returns a reference to the oldest element, if any.
    pub fn peek(&self) -> Option<&T> {
        self.elements.front()
    }

    pub(crate) fn peek_back(&self) -> Option<&T> {
        self.elements.back()
    }

    /// Removes all elements without invoking hooks.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Sets the time reported to hooks.
    pub fn set_time(&mut self, now: VTimeInSec) {
        self.time = now;
    }

    fn invoke(&self, pos: HookPos, element: &T) {
        self.hooks.invoke_hook(&HookCtx {
            domain: self,
            now: self.time,
            pos,
            item: element,
            detail: None,
        });
    }
}

impl<T> Hookable for Buffer<T> {
    fn accept_hook(&self, hook: Arc<dyn Hook>) {
        self.hooks.accept_hook(hook);
    }

    fn num_hooks(&self) -> usize {
        self.hooks.num_hooks()
    }

    fn invoke_hook(&self, ctx: &HookCtx<'_>) {
        self.hooks.invoke_hook(ctx);
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.name)
            .field("size", &self.elements.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
