// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Simulation time.
//!
//! Time is held as an integer number of picoseconds so that events at the
//! same instant compare equal and ties can be broken by priority.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

const PS_PER_NS: f64 = 1000.0;
const PS_PER_S: f64 = 1.0e12;

/// A point in (or a duration of) simulated time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime(0);

    #[must_use]
    pub const fn from_ps(ps: u64) -> Self {
        Self(ps)
    }

    /// Convert from nanoseconds, rounding to the nearest picosecond.
    /// Negative values clamp to zero.
    #[must_use]
    pub fn from_ns(ns: f64) -> Self {
        Self((ns * PS_PER_NS).round().max(0.0) as u64)
    }

    /// Convert from seconds, rounding to the nearest picosecond.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * PS_PER_S).round().max(0.0) as u64)
    }

    #[must_use]
    pub const fn as_ps(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn as_ns(self) -> f64 {
        self.0 as f64 / PS_PER_NS
    }

    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / PS_PER_S
    }

    #[must_use]
    pub const fn saturating_sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}ns", self.as_ns())
    }
}
