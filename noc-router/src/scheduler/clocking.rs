// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! When a scheduler arbitrates.
//!
//! A [`Clocking`] strategy does not touch the arbitration state. It is told
//! what happened and answers whether to arbitrate now and when its next
//! timer should fire.

use noc_config::{Clocking as ClockingMode, RouterConfig};
use noc_engine::sim_error;
use noc_engine::time::clock::Clock;
use noc_engine::time::simtime::SimTime;
use noc_engine::types::SimError;

/// Outcome of a timer firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// When to fire the timer again.
    pub next: Option<SimTime>,

    /// Whether to arbitrate now.
    pub arbitrate: bool,
}

pub trait Clocking {
    fn name(&self) -> &'static str;

    /// Time of the first timer, if any, when the simulation starts.
    fn start(&mut self, now: SimTime) -> Option<SimTime>;

    /// A request, acknowledgement or credit has been handled. Returns
    /// whether to arbitrate now.
    fn on_event(&mut self, link_busy: bool) -> bool;

    /// The timer has fired.
    fn on_tick(&mut self, now: SimTime, has_work: bool, link_busy: bool) -> Tick;

    /// Called after every handled message. Returns when to restart a
    /// stopped timer.
    fn reschedule(&mut self, now: SimTime, has_work: bool) -> Option<SimTime>;

    fn on_grant(&mut self) {}

    fn on_nack(&mut self) {}

    /// A flit has been put on the output link and the link is busy until
    /// `finish`. Returns when to fire the timer.
    fn on_send(&mut self, _finish: SimTime) -> Option<SimTime> {
        None
    }

    /// The clock period, if the strategy is clocked.
    fn period(&self) -> Option<SimTime> {
        None
    }
}

/// Arbitrate once per clock edge.
///
/// Unless it is free running, the clock stops when there is nothing left
/// to arbitrate and restarts on the next edge once there is.
pub struct Synchronous {
    clock: Clock,
    free_running: bool,
    armed: bool,
    num_ticks: u64,
}

impl Synchronous {
    #[must_use]
    pub fn new(clock: Clock, free_running: bool) -> Self {
        Self {
            clock,
            free_running,
            armed: false,
            num_ticks: 0,
        }
    }

    #[must_use]
    pub fn num_ticks(&self) -> u64 {
        self.num_ticks
    }
}

impl Clocking for Synchronous {
    fn name(&self) -> &'static str {
        "synchronous"
    }

    fn start(&mut self, now: SimTime) -> Option<SimTime> {
        self.armed = true;
        Some(now + self.clock.period())
    }

    fn on_event(&mut self, _link_busy: bool) -> bool {
        false
    }

    fn on_tick(&mut self, now: SimTime, has_work: bool, link_busy: bool) -> Tick {
        self.num_ticks += 1;
        if self.free_running || has_work {
            Tick {
                next: Some(now + self.clock.period()),
                arbitrate: !link_busy,
            }
        } else {
            self.armed = false;
            Tick {
                next: None,
                arbitrate: false,
            }
        }
    }

    fn reschedule(&mut self, now: SimTime, has_work: bool) -> Option<SimTime> {
        if self.armed || !has_work {
            return None;
        }
        self.armed = true;
        Some(self.clock.next_edge_after(now))
    }

    fn period(&self) -> Option<SimTime> {
        Some(self.clock.period())
    }
}

/// Arbitrate as soon as something changes and the link is free.
#[derive(Default)]
pub struct Asynchronous {
    busy: bool,
}

impl Asynchronous {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

impl Clocking for Asynchronous {
    fn name(&self) -> &'static str {
        "asynchronous"
    }

    fn start(&mut self, _now: SimTime) -> Option<SimTime> {
        None
    }

    fn on_event(&mut self, link_busy: bool) -> bool {
        !self.busy && !link_busy
    }

    fn on_tick(&mut self, _now: SimTime, _has_work: bool, _link_busy: bool) -> Tick {
        self.busy = false;
        Tick {
            next: None,
            arbitrate: true,
        }
    }

    fn reschedule(&mut self, _now: SimTime, _has_work: bool) -> Option<SimTime> {
        None
    }

    fn on_grant(&mut self) {
        self.busy = true;
    }

    fn on_nack(&mut self) {
        self.busy = false;
    }

    fn on_send(&mut self, finish: SimTime) -> Option<SimTime> {
        Some(finish)
    }
}

/// Create the clocking strategy of a scheduler whose output link runs at
/// `datarate_bps`.
///
/// A synchronous scheduler ticks once per flit time, or at the largest
/// whole fraction of `given_clock_ns` that fits a flit.
pub fn create_clocking(
    config: &RouterConfig,
    datarate_bps: Option<f64>,
) -> Result<Box<dyn Clocking>, SimError> {
    match config.clocking {
        ClockingMode::Asynchronous => Ok(Box::new(Asynchronous::new())),
        ClockingMode::Synchronous => {
            let Some(datarate_bps) = datarate_bps else {
                return sim_error!("a synchronous scheduler needs a link with a data rate");
            };
            let bits = 8 * config.flit_size_bytes;
            let clock = match config.given_clock_ns {
                Some(given) => Clock::for_link_with_base(bits, datarate_bps, SimTime::from_ns(given))?,
                None => Clock::for_link(bits, datarate_bps)?,
            };
            Ok(Box::new(Synchronous::new(clock, config.free_running_clock)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(t: f64) -> SimTime {
        SimTime::from_ns(t)
    }

    #[test]
    fn synchronous_gates_and_restarts() {
        let clock = Clock::new(ns(2.0)).unwrap();
        let mut sync = Synchronous::new(clock, false);
        assert_eq!(sync.start(SimTime::ZERO), Some(ns(2.0)));
        assert!(!sync.on_event(false));
        assert_eq!(sync.reschedule(ns(1.0), true), None);

        let tick = sync.on_tick(ns(2.0), true, false);
        assert_eq!(tick, Tick { next: Some(ns(4.0)), arbitrate: true });

        // Busy link: keep ticking without arbitrating
        let tick = sync.on_tick(ns(4.0), true, true);
        assert_eq!(tick, Tick { next: Some(ns(6.0)), arbitrate: false });

        // No work: the clock is gated
        let tick = sync.on_tick(ns(6.0), false, false);
        assert_eq!(tick.next, None);
        assert_eq!(sync.reschedule(ns(6.0), false), None);

        // Work arrives off-edge: restart on the next edge
        assert_eq!(sync.reschedule(ns(7.5), true), Some(ns(8.0)));
        assert_eq!(sync.reschedule(ns(7.5), true), None);
        assert_eq!(sync.num_ticks(), 3);
    }

    #[test]
    fn free_running_never_gates() {
        let mut sync = Synchronous::new(Clock::new(ns(1.0)).unwrap(), true);
        sync.start(SimTime::ZERO);
        let tick = sync.on_tick(ns(1.0), false, false);
        assert_eq!(tick.next, Some(ns(2.0)));
        assert_eq!(sync.period(), Some(ns(1.0)));
    }

    #[test]
    fn clock_from_link_rate() {
        let mut config = RouterConfig::default();
        // 4-byte flits at 32Gbps
        let clocking = create_clocking(&config, Some(32.0e9)).unwrap();
        assert_eq!(clocking.name(), "synchronous");
        assert_eq!(clocking.period(), Some(ns(1.0)));

        // Two flits fit in a 2.5ns base clock
        config.given_clock_ns = Some(2.5);
        let clocking = create_clocking(&config, Some(32.0e9)).unwrap();
        assert_eq!(clocking.period(), Some(ns(1.25)));

        config.given_clock_ns = Some(0.5);
        assert!(create_clocking(&config, Some(32.0e9)).is_err());
        assert!(create_clocking(&RouterConfig::default(), None).is_err());

        config.clocking = ClockingMode::Asynchronous;
        assert_eq!(create_clocking(&config, None).unwrap().period(), None);
    }

    #[test]
    fn asynchronous_busy_cycle() {
        let mut clocking = Asynchronous::new();
        assert_eq!(clocking.start(SimTime::ZERO), None);
        assert!(clocking.on_event(false));
        assert!(!clocking.on_event(true));

        clocking.on_grant();
        assert!(clocking.is_busy());
        assert!(!clocking.on_event(false));

        clocking.on_nack();
        assert!(clocking.on_event(false));

        clocking.on_grant();
        assert_eq!(clocking.on_send(ns(3.0)), Some(ns(3.0)));
        let tick = clocking.on_tick(ns(3.0), true, false);
        assert!(tick.arbitrate);
        assert!(!clocking.is_busy());
    }
}
