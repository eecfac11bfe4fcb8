// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The arbitration state of one output port.
//!
//! Each output VC has a credit counter, at most one owning request and a
//! Nack flag. A request owns its VC from the moment it is first granted
//! until its tail flit has passed. Errors returned here describe the
//! violated condition; the [`Scheduler`](super::Scheduler) adds its name.

use noc_config::RequestQueue;
use noc_engine::sim_error;
use noc_engine::types::{SimError, SimResult};

use crate::scheduler::requests::RequestPool;
use crate::scheduler::selection::Select;
use crate::types::{Ack, Flit, Grant, Request};
use crate::vc_alloc::VcSnapshot;

/// The request currently holding an output VC.
#[derive(Debug)]
pub struct Owner {
    pub in_port: usize,
    pub request: Request,
}

pub struct VcArbiter {
    credits: Vec<i64>,
    usage: Vec<u32>,
    owners: Vec<Option<Owner>>,
    nacked: Vec<bool>,
    pending: RequestPool,
    last_vc: usize,
    select: Box<dyn Select>,
}

impl VcArbiter {
    #[must_use]
    pub fn new(
        num_vcs: usize,
        num_in_ports: usize,
        discipline: RequestQueue,
        select: Box<dyn Select>,
    ) -> Self {
        Self {
            credits: vec![0; num_vcs],
            usage: vec![0; num_vcs],
            owners: (0..num_vcs).map(|_| None).collect(),
            nacked: vec![false; num_vcs],
            pending: RequestPool::new(discipline, num_vcs, num_in_ports),
            last_vc: num_vcs.saturating_sub(1),
            select,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &'static str {
        self.select.name()
    }

    fn check_vc(&self, vc: usize) -> SimResult {
        if vc >= self.credits.len() {
            return sim_error!(format!(
                "vc {vc} out of range ({} VCs)",
                self.credits.len()
            ));
        }
        Ok(())
    }

    pub fn add_request(&mut self, in_port: usize, request: Request) -> SimResult {
        self.check_vc(request.output_vc)?;
        let vc = request.output_vc;
        let already_owned = self.owners[vc]
            .as_ref()
            .is_some_and(|owner| owner.request.packet_id == request.packet_id);
        if already_owned || self.pending.contains(request.packet_id) {
            return sim_error!(format!(
                "request for packet {:#x} on vc {vc} is already known",
                request.packet_id
            ));
        }
        if let Err(request) = self.pending.push(in_port, request) {
            return sim_error!(format!("cannot queue {request} from input port {in_port}"));
        }
        Ok(())
    }

    /// Grant one flit on the first serviceable output VC, if any.
    ///
    /// The first usable VC whose owner is fully granted ends the scan: its
    /// packet is waiting for its last flits and nothing is granted this
    /// cycle. Returns the input port to send the grant to.
    pub fn arbitrate(&mut self) -> Option<(usize, Grant)> {
        let num_vcs = self.credits.len();
        if num_vcs == 0 {
            return None;
        }
        for i in self.select.start_offset()..=num_vcs {
            let vc = (self.last_vc + i) % num_vcs;
            if self.credits[vc] <= 0 || self.nacked[vc] {
                continue;
            }

            match &self.owners[vc] {
                Some(owner) if owner.request.is_fully_granted() => return None,
                Some(_) => {}
                None => match self.pending.take(vc) {
                    Some((in_port, request)) => {
                        self.owners[vc] = Some(Owner { in_port, request });
                    }
                    None => continue,
                },
            }

            let owner = self.owners[vc].as_mut()?;
            owner.request.granted += 1;
            self.credits[vc] -= 1;
            let fully_granted = owner.request.is_fully_granted();
            let grant = Grant {
                input_vc: owner.request.input_vc,
                output_vc: vc,
            };
            let in_port = owner.in_port;
            self.last_vc = self.select.next_last(vc, fully_granted, num_vcs);
            return Some((in_port, grant));
        }
        None
    }

    /// Undo the last grant on a VC whose input had no flit to send.
    pub fn nack(&mut self, in_port: usize, ack: &Ack) -> SimResult {
        self.check_vc(ack.output_vc)?;
        let vc = ack.output_vc;
        let Some(owner) = self.owners[vc]
            .as_mut()
            .filter(|o| o.in_port == in_port && o.request.input_vc == ack.input_vc)
        else {
            return sim_error!(format!(
                "nack on vc {vc} from input port {in_port} vc {} which does not own it",
                ack.input_vc
            ));
        };
        if owner.request.granted == 0 {
            return sim_error!(format!("nack on vc {vc} without a grant"));
        }
        owner.request.granted -= 1;
        self.credits[vc] += 1;
        self.nacked[vc] = true;
        Ok(())
    }

    pub fn ack_ok(&mut self, ack: &Ack) -> SimResult {
        self.check_vc(ack.output_vc)?;
        self.nacked[ack.output_vc] = false;
        Ok(())
    }

    pub fn add_credits(&mut self, vc: usize, count: usize) -> SimResult {
        self.check_vc(vc)?;
        self.credits[vc] += count as i64;
        self.nacked[vc] = false;
        Ok(())
    }

    /// Account for a granted flit crossing to the output link.
    pub fn flit_passed(&mut self, flit: &Flit) -> SimResult {
        self.check_vc(flit.vc)?;
        let vc = flit.vc;
        if self.credits[vc] < 0 {
            return sim_error!(format!(
                "negative credits ({}) on vc {vc} sending packet {:#x}",
                self.credits[vc], flit.packet_id
            ));
        }

        let Some(owner) = self.owners[vc].as_mut() else {
            return sim_error!(format!(
                "{flit} crossed to vc {vc} which has no owner"
            ));
        };
        let request = &mut owner.request;
        if request.packet_id != flit.packet_id {
            return sim_error!(format!(
                "{flit} crossed to vc {vc} owned by packet {:#x}",
                request.packet_id
            ));
        }

        if flit.is_tail() {
            if request.granted != request.total_flits || request.acked + 1 != request.total_flits {
                return sim_error!(format!("tail {flit} passed with inconsistent {request}"));
            }
            self.owners[vc] = None;
            self.usage[vc] = self.usage[vc].saturating_sub(1);
        } else {
            request.acked += 1;
        }
        Ok(())
    }

    pub fn reserve_vc(&mut self, vc: usize) -> SimResult {
        self.check_vc(vc)?;
        self.usage[vc] += 1;
        Ok(())
    }

    /// Whether arbitration may have something to grant.
    #[must_use]
    pub fn has_work(&self) -> bool {
        !self.pending.is_empty()
            || self
                .owners
                .iter()
                .flatten()
                .any(|owner| !owner.request.is_fully_granted())
    }

    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of VCs reserved by at least one packet.
    #[must_use]
    pub fn num_used_vcs(&self) -> usize {
        self.usage.iter().filter(|u| **u > 0).count()
    }

    #[must_use]
    pub fn owner(&self, vc: usize) -> Option<&Owner> {
        self.owners.get(vc).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn credits(&self, vc: usize) -> i64 {
        self.credits.get(vc).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_nacked(&self, vc: usize) -> bool {
        self.nacked.get(vc).copied().unwrap_or(false)
    }
}

impl VcSnapshot for VcArbiter {
    fn num_vcs(&self) -> usize {
        self.credits.len()
    }

    fn credits_for(&self, vc: usize) -> u32 {
        self.credits(vc).clamp(0, i64::from(u32::MAX)) as u32
    }

    fn usage_for(&self, vc: usize) -> u32 {
        self.usage.get(vc).copied().unwrap_or(0)
    }
}
