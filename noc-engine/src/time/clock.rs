// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A clock defined by its period.
//!
//! Clocked components arm a self-scheduled tick on each edge. When a clock is
//! gated and later restarted it must stay aligned to the same grid of edges,
//! which [`Clock::next_edge_after`] provides.

use crate::sim_error;
use crate::time::simtime::SimTime;
use crate::types::SimError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    period: SimTime,
}

impl Clock {
    /// Create a clock with the given period. The period must not be zero.
    pub fn new(period: SimTime) -> Result<Self, SimError> {
        if period.is_zero() {
            return sim_error!("clock period must be greater than zero");
        }
        Ok(Self { period })
    }

    /// Create the clock of a link which sends one `bits`-sized unit per
    /// cycle at `datarate_bps`.
    pub fn for_link(bits: usize, datarate_bps: f64) -> Result<Self, SimError> {
        if datarate_bps <= 0.0 {
            return sim_error!(format!("invalid link data rate {datarate_bps}"));
        }
        Self::new(SimTime::from_secs_f64(bits as f64 / datarate_bps))
    }

    /// Create the clock of a link when the user imposes a base clock period.
    ///
    /// The link period is the imposed period divided by the whole number of
    /// units that fit into it.
    pub fn for_link_with_base(
        bits: usize,
        datarate_bps: f64,
        base_period: SimTime,
    ) -> Result<Self, SimError> {
        let units_per_base = (datarate_bps * base_period.as_secs_f64() / bits as f64).floor();
        if units_per_base < 1.0 {
            return sim_error!(format!(
                "clock of {base_period} is too short to send {bits} bits at {datarate_bps} bps"
            ));
        }
        Self::new(SimTime::from_ps(
            (base_period.as_ps() as f64 / units_per_base).round() as u64,
        ))
    }

    #[must_use]
    pub fn period(&self) -> SimTime {
        self.period
    }

    #[must_use]
    pub fn freq_mhz(&self) -> f64 {
        1.0e6 / self.period.as_ps() as f64
    }

    /// The first clock edge strictly after `now`.
    #[must_use]
    pub fn next_edge_after(&self, now: SimTime) -> SimTime {
        let period = self.period.as_ps();
        SimTime::from_ps((now.as_ps() / period + 1) * period)
    }

    /// Number of whole clock periods in `duration`, rounded to nearest.
    #[must_use]
    pub fn ticks_in(&self, duration: SimTime) -> u64 {
        (duration.as_ps() as f64 / self.period.as_ps() as f64).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_clock() {
        // 4 bytes at 32 Gbps
        let clock = Clock::for_link(32, 32.0e9).unwrap();
        assert_eq!(clock.period(), SimTime::from_ns(1.0));
        assert_eq!(clock.freq_mhz(), 1000.0);
    }

    #[test]
    fn base_clock_divides_evenly() {
        // 1ns per flit, imposed 2.5ns clock fits 2 flits
        let clock = Clock::for_link_with_base(32, 32.0e9, SimTime::from_ns(2.5)).unwrap();
        assert_eq!(clock.period(), SimTime::from_ns(1.25));
        assert!(Clock::for_link_with_base(32, 32.0e9, SimTime::from_ns(0.5)).is_err());
    }

    #[test]
    fn edges_are_aligned() {
        let clock = Clock::new(SimTime::from_ns(2.0)).unwrap();
        assert_eq!(clock.next_edge_after(SimTime::ZERO), SimTime::from_ns(2.0));
        assert_eq!(clock.next_edge_after(SimTime::from_ns(3.0)), SimTime::from_ns(4.0));
        assert_eq!(clock.next_edge_after(SimTime::from_ns(4.0)), SimTime::from_ns(6.0));
        assert_eq!(clock.ticks_in(SimTime::from_ns(9.0)), 5);
    }

    #[test]
    fn zero_period_rejected() {
        assert!(Clock::new(SimTime::ZERO).is_err());
        assert!(Clock::for_link(32, 0.0).is_err());
    }
}
