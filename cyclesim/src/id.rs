//! Unique identifier generation.
//!
//! Identifier generation is a capability rather than a process-wide default:
//! an [`IdGenerator`] instance is created once when the simulation is set up
//! and handed to every component that needs to stamp unique identifiers, for
//! instance on outgoing messages.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A source of identifiers that are unique within a simulation.
pub trait IdGenerator: Send + Sync {
    /// Returns a new identifier.
    fn generate(&self) -> u64;
}

/// An [`IdGenerator`] that hands out consecutive integers.
///
/// Identifiers only depend on the number of previous calls, so they are
/// reproducible as long as calls happen in a deterministic order (which is
/// the case with the serial engine).
#[derive(Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator whose first identifier is 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a generator whose first identifier is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for SequentialIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialIdGenerator")
            .field("next", &self.next.load(Ordering::Relaxed))
            .finish()
    }
}
