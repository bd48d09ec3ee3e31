use std::fmt;

use super::VTimeInSec;

/// A clock frequency in Hz.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Freq(f64);

impl Freq {
    /// 1 Hz.
    pub const HZ: f64 = 1.0;
    /// 1 kHz.
    pub const KHZ: f64 = 1e3;
    /// 1 MHz.
    pub const MHZ: f64 = 1e6;
    /// 1 GHz.
    pub const GHZ: f64 = 1e9;

    /// The largest supported cycle index.
    ///
    /// Cycle indices up to 2^53 are exactly representable as `f64`. This is
    /// about 104 days of virtual time at 1 GHz.
    pub const MAX_CYCLE: u64 = 1 << 53;

    /// Creates a frequency from a value in Hz.
    ///
    /// # Panics
    ///
    /// This will panic if the frequency is not a finite, strictly positive
    /// number.
    pub fn new(hz: f64) -> Self {
        assert!(
            hz.is_finite() && hz > 0.0,
            "a frequency must be finite and strictly positive (got {hz} Hz)"
        );

        Self(hz)
    }

    /// Returns the frequency in Hz.
    pub fn hz(&self) -> f64 {
        self.0
    }

    /// Returns the duration of a cycle.
    pub fn period(&self) -> VTimeInSec {
        1.0 / self.0
    }

    /// Returns the time of tick `n`.
    fn tick(&self, n: u64) -> VTimeInSec {
        n as f64 / self.0
    }

    /// Returns the index of the cycle that contains `time`, i.e. the largest
    /// `n` such that tick `n` is not later than `time`.
    ///
    /// # Panics
    ///
    /// This will panic if the cycle index exceeds [`Freq::MAX_CYCLE`] or if
    /// `time` is NaN.
    pub fn cycle(&self, time: VTimeInSec) -> u64 {
        assert!(!time.is_nan(), "cannot compute the cycle of a NaN time");
        if time <= 0.0 {
            return 0;
        }
        let estimate = (time * self.0).floor();
        assert!(
            estimate <= Self::MAX_CYCLE as f64,
            "t={}s is beyond the last representable cycle of a {} clock",
            time,
            self
        );
        let mut n = estimate as u64;
        // Correct a floating-point estimate that is off by one ulp either way.
        if self.tick(n) > time {
            n -= 1;
        } else if self.tick(n + 1) <= time {
            n += 1;
        }

        n
    }

    /// Returns the earliest tick that is not earlier than `time`.
    pub fn this_tick(&self, time: VTimeInSec) -> VTimeInSec {
        if time <= 0.0 {
            return 0.0;
        }
        let n = self.cycle(time);
        let tick = self.tick(n);
        if tick == time {
            return tick;
        }

        self.tick(n + 1)
    }

    /// Returns the earliest tick that is strictly later than `time`.
    pub fn next_tick(&self, time: VTimeInSec) -> VTimeInSec {
        if time < 0.0 {
            return 0.0;
        }

        self.tick(self.cycle(time) + 1)
    }

    /// Returns the tick `n` cycles after the tick that `time` aligns to with
    /// [`Freq::this_tick()`].
    pub fn n_cycles_later(&self, n: u64, time: VTimeInSec) -> VTimeInSec {
        let first = self.cycle(self.this_tick(time));

        self.tick(first + n)
    }

    /// Returns the earliest tick that is not earlier than `time`.
    ///
    /// This is an alias of [`Freq::this_tick()`] that reads better at call
    /// sites computing a deadline.
    pub fn no_earlier_than(&self, time: VTimeInSec) -> VTimeInSec {
        self.this_tick(time)
    }
}

impl fmt::Display for Freq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}
