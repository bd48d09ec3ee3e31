//! Event queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use crate::event::BoxedEvent;
use crate::time::VTimeInSec;

/// A priority queue of events.
///
/// Events are popped in ascending `(time, secondary, sequence)` order, where
/// `sequence` is the insertion order: at equal times, primary events come
/// before secondary events, and events of the same kind are popped in FIFO
/// order.
///
/// `push` and `pop` have *O*(log(*N*)) complexity; `peek` is *O*(1).
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event.
    pub fn push(&mut self, event: BoxedEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.heap.push(Entry {
            key: QueueKey {
                time: event.time(),
                secondary: event.is_secondary(),
                seq,
            },
            event,
        });
    }

    /// Removes and returns the earliest event, if any.
    pub fn pop(&mut self) -> Option<BoxedEvent> {
        self.heap.pop().map(|entry| entry.event)
    }

    /// Returns a reference to the earliest event, if any.
    pub fn peek(&self) -> Option<&BoxedEvent> {
        self.heap.peek().map(|entry| &entry.event)
    }

    /// Returns the time of the earliest event, if any.
    pub fn peek_time(&self) -> Option<VTimeInSec> {
        self.heap.peek().map(|entry| entry.key.time)
    }

    /// Returns the time and secondary flag of the earliest event, if any.
    pub(crate) fn peek_key(&self) -> Option<(VTimeInSec, bool)> {
        self.heap
            .peek()
            .map(|entry| (entry.key.time, entry.key.secondary))
    }

    /// Returns the number of events in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if the queue contains no event.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("next_time", &self.peek_time())
            .finish()
    }
}

#[derive(Copy, Clone, Debug)]
struct QueueKey {
    time: VTimeInSec,
    secondary: bool,
    seq: u64,
}

impl QueueKey {
    fn cmp_ascending(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.secondary.cmp(&other.secondary))
            .then(self.seq.cmp(&other.seq))
    }
}

struct Entry {
    key: QueueKey,
    event: BoxedEvent,
}

// `BinaryHeap` is a max-heap, hence the reversed order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp_ascending(&self.key)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}
