//! Virtual time and clock frequencies.
//!
//! This module provides:
//!
//! * [`VTimeInSec`]: the virtual simulation time, a real number of abstract
//!   seconds unrelated to the wall clock,
//! * [`Freq`]: a clock frequency that maps virtual time to clock cycles and
//!   tick boundaries.
//!
//! # Tick convention
//!
//! Tick `n` of a clock of frequency `f` happens at exactly `n as f64 / f`.
//! A time `t` belongs to the cycle `[tₙ, tₙ₊₁)`, so that:
//!
//! * [`Freq::this_tick()`] returns the smallest tick that is `>= t`,
//! * [`Freq::next_tick()`] returns the smallest tick that is `> t`.
//!
//! Cycle indices are first estimated with floating-point arithmetic and then
//! corrected by comparing against the recomputed tick times, so a time that
//! was itself produced as a tick of the same clock always maps back to that
//! exact tick.
//!
//! # Examples
//!
//! ```
//! use cyclesim::time::Freq;
//!
//! let freq = Freq::new(1.0 * Freq::GHZ);
//!
//! let t = freq.n_cycles_later(3, 0.0);
//! assert_eq!(freq.this_tick(t), t);
//! assert!(freq.next_tick(t) > t);
//! assert_eq!(freq.cycle(t), 3);
//! ```

mod freq;

pub use freq::Freq;

/// Virtual time in seconds.
pub type VTimeInSec = f64;
