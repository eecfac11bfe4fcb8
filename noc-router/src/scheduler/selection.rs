// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Output VC selection policies.
//!
//! The arbiter scans the output VCs starting from `last + start_offset()`
//! and, after granting on a VC, moves `last` to `next_last(..)`.

use noc_config::Arbitration;

pub trait Select {
    fn name(&self) -> &'static str;

    /// Offset from the last serviced VC at which a scan starts.
    fn start_offset(&self) -> usize;

    /// The last serviced VC after a grant on `vc`.
    fn next_last(&self, vc: usize, fully_granted: bool, num_vcs: usize) -> usize;
}

/// Keep granting the same VC until its packet is fully granted.
pub struct WinnerTakeAll;

impl Select for WinnerTakeAll {
    fn name(&self) -> &'static str {
        "winner-take-all"
    }

    fn start_offset(&self) -> usize {
        0
    }

    fn next_last(&self, vc: usize, fully_granted: bool, num_vcs: usize) -> usize {
        if fully_granted { (vc + 1) % num_vcs } else { vc }
    }
}

/// Move to the next VC after every grant.
pub struct RoundRobin;

impl Select for RoundRobin {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn start_offset(&self) -> usize {
        1
    }

    fn next_last(&self, vc: usize, _fully_granted: bool, _num_vcs: usize) -> usize {
        vc
    }
}

#[must_use]
pub fn create_select(arbitration: Arbitration) -> Box<dyn Select> {
    match arbitration {
        Arbitration::WinnerTakeAll => Box::new(WinnerTakeAll),
        Arbitration::RoundRobin => Box::new(RoundRobin),
    }
}
