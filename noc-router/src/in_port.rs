// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A router input port.
//!
//! Each input VC buffers up to `flits_per_vc` flits and carries one packet
//! at a time through the router. The head flit at the front of a VC is
//! routed and allocated an output VC, after which a request is sent to the
//! scheduler of its output port. Each grant then moves one flit across the
//! router and returns one credit upstream.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use noc_config::RouterConfig;
use noc_engine::engine::Context;
use noc_engine::sim_error;
use noc_engine::time::simtime::SimTime;
use noc_engine::types::{SimError, SimResult};
use noc_track::entity::Entity;
use noc_track::trace;

use crate::routing::XyRouting;
use crate::scheduler::Scheduler;
use crate::stats::Accumulator;
use crate::types::{Ack, Credit, Flit, Grant, Internal, NocMsg, PacketId, Request};
use crate::vc_alloc::VcAllocator;

/// Kept with each buffered flit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlitInfo {
    pub out_port: usize,
    pub in_vc: usize,
    pub arrived_at: SimTime,
}

#[derive(Clone, Copy, Debug)]
struct Receiving {
    packet_id: PacketId,
    next_index: usize,
    out_port: usize,
}

#[derive(Clone, Copy, Debug)]
struct Route {
    out_port: usize,
    out_vc: usize,
}

#[derive(Debug, Default)]
struct InVc {
    queue: VecDeque<(Flit, FlitInfo)>,

    /// The packet whose flits are arriving, until its tail arrives.
    receiving: Option<Receiving>,

    /// The route of the packet at the front, until its tail leaves.
    route: Option<Route>,

    /// A grant was refused because no flit was buffered.
    rejected: bool,
}

/// Time flits spent waiting in the input buffers.
#[derive(Clone, Debug, Default)]
pub struct HopWaits {
    /// Head flits, waiting for an output VC.
    pub head: Accumulator,

    /// Body and tail flits, waiting for their turn on the link.
    pub body: Accumulator,

    /// Per (source, destination), when enabled.
    pub per_flow: HashMap<(usize, usize), Accumulator>,
}

pub struct InPort {
    pub entity: Rc<Entity>,
    port: usize,
    credit_gate: usize,
    flits_per_vc: usize,
    vcs: Vec<InVc>,
    allocator: VcAllocator,
    collect_per_flow: bool,
    stat_start: SimTime,
    waits: HopWaits,
}

impl InPort {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, port: usize, credit_gate: usize, config: &RouterConfig) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, &format!("in{port}"))),
            port,
            credit_gate,
            flits_per_vc: config.flits_per_vc,
            vcs: (0..config.num_vcs).map(|_| InVc::default()).collect(),
            allocator: VcAllocator::new(),
            collect_per_flow: config.collect_per_hop_wait,
            stat_start: SimTime::from_ns(config.stat_start_ns),
            waits: HopWaits::default(),
        }
    }

    /// Give the upstream partner the credits of all the input buffers.
    pub fn initialize(&mut self, ctx: &mut Context<NocMsg>) -> SimResult {
        if !ctx.is_connected(self.credit_gate) {
            return Ok(());
        }
        for vc in 0..self.vcs.len() {
            ctx.send(
                self.credit_gate,
                NocMsg::Credit(Credit {
                    vc,
                    count: self.flits_per_vc,
                }),
            )?;
        }
        Ok(())
    }

    pub fn receive(
        &mut self,
        ctx: &mut Context<NocMsg>,
        mut flit: Flit,
        routing: &XyRouting,
        schedulers: &mut [Scheduler],
    ) -> SimResult {
        let vc = flit.vc;
        let now = ctx.now();
        let Some(in_vc) = self.vcs.get_mut(vc) else {
            return sim_error!(format!(
                "{}: {flit} on vc {vc} but only {} VCs",
                self.entity,
                self.vcs.len()
            ));
        };
        if flit.first_network_at.is_none() {
            flit.first_network_at = Some(now);
        }

        let out_port = if flit.is_head() {
            if let Some(receiving) = in_vc.receiving {
                return sim_error!(format!(
                    "{}: head {flit} on vc {vc} while packet {:#x} is still arriving",
                    self.entity, receiving.packet_id
                ));
            }
            let out_port = routing
                .route(flit.dst_id)
                .map_err(|e| SimError(format!("{}: {}", self.entity, e.0)))?;
            in_vc.receiving = Some(Receiving {
                packet_id: flit.packet_id,
                next_index: 1,
                out_port,
            });
            out_port
        } else {
            match in_vc.receiving.as_mut() {
                Some(receiving)
                    if receiving.packet_id == flit.packet_id
                        && receiving.next_index == flit.flit_index =>
                {
                    receiving.next_index += 1;
                    receiving.out_port
                }
                Some(receiving) => {
                    return sim_error!(format!(
                        "{}: {flit} on vc {vc} but expected flit {} of packet {:#x}",
                        self.entity, receiving.next_index, receiving.packet_id
                    ));
                }
                None => {
                    return sim_error!(format!(
                        "{}: {flit} on vc {vc} without a head",
                        self.entity
                    ));
                }
            }
        };

        if in_vc.queue.len() >= self.flits_per_vc {
            return sim_error!(format!(
                "{}: {flit} overflows vc {vc} ({} flits)",
                self.entity, self.flits_per_vc
            ));
        }
        if flit.is_tail() {
            in_vc.receiving = None;
        }

        trace!(self.entity ; "receive {flit}");
        let is_head = flit.is_head();
        in_vc.queue.push_back((
            flit,
            FlitInfo {
                out_port,
                in_vc: vc,
                arrived_at: now,
            },
        ));

        if in_vc.rejected {
            in_vc.rejected = false;
            if let Some(route) = in_vc.route {
                ctx.send_self(NocMsg::Internal(Internal::Ack {
                    in_port: self.port,
                    out_port: route.out_port,
                    ack: Ack {
                        ok: true,
                        input_vc: vc,
                        output_vc: route.out_vc,
                    },
                }));
            }
        }

        if is_head && in_vc.route.is_none() && in_vc.queue.len() == 1 {
            self.request_front(ctx, vc, schedulers)?;
        }
        Ok(())
    }

    /// Allocate an output VC to the head flit at the front of `vc` and
    /// request its output port.
    fn request_front(
        &mut self,
        ctx: &mut Context<NocMsg>,
        vc: usize,
        schedulers: &mut [Scheduler],
    ) -> SimResult {
        let Some((flit, info)) = self.vcs[vc].queue.front() else {
            return Ok(());
        };
        if !flit.is_head() {
            return Ok(());
        }
        let (src_id, dst_id, packet_id, total_flits) =
            (flit.src_id, flit.dst_id, flit.packet_id, flit.total_flits);
        let out_port = info.out_port;

        let Some(scheduler) = schedulers.get_mut(out_port) else {
            return sim_error!(format!(
                "{}: no output port {out_port} for packet {packet_id:#x}",
                self.entity
            ));
        };
        let out_vc = self.allocator.allocate(out_port, src_id, dst_id, &*scheduler);
        scheduler.reserve_vc(out_vc)?;
        self.vcs[vc].route = Some(Route { out_port, out_vc });

        let request = Request::new(out_port, out_vc, vc, packet_id, total_flits);
        trace!(self.entity ; "{request}");
        ctx.send_self(NocMsg::Internal(Internal::Request {
            in_port: self.port,
            request,
        }));
        Ok(())
    }

    pub fn grant(
        &mut self,
        ctx: &mut Context<NocMsg>,
        grant: Grant,
        schedulers: &mut [Scheduler],
    ) -> SimResult {
        let vc = grant.input_vc;
        let now = ctx.now();
        let Some(in_vc) = self.vcs.get_mut(vc) else {
            return sim_error!(format!("{}: grant for unknown vc {vc}", self.entity));
        };
        let Some(route) = in_vc.route.filter(|r| r.out_vc == grant.output_vc) else {
            return sim_error!(format!(
                "{}: grant of output vc {} to vc {vc} which did not request it",
                self.entity, grant.output_vc
            ));
        };

        let Some((mut flit, info)) = in_vc.queue.pop_front() else {
            trace!(self.entity ; "nack: vc {vc} is empty");
            in_vc.rejected = true;
            ctx.send_self(NocMsg::Internal(Internal::Ack {
                in_port: self.port,
                out_port: route.out_port,
                ack: Ack {
                    ok: false,
                    input_vc: vc,
                    output_vc: route.out_vc,
                },
            }));
            return Ok(());
        };

        if now >= self.stat_start {
            let wait = now.saturating_sub(info.arrived_at).as_ns();
            if flit.is_head() {
                self.waits.head.add(wait);
            } else {
                self.waits.body.add(wait);
            }
            if self.collect_per_flow {
                self.waits
                    .per_flow
                    .entry((flit.src_id, flit.dst_id))
                    .or_default()
                    .add(wait);
            }
        }

        let is_tail = flit.is_tail();
        flit.vc = route.out_vc;
        ctx.send_self(NocMsg::Internal(Internal::Traverse {
            in_port: self.port,
            out_port: route.out_port,
            flit,
        }));
        if ctx.is_connected(self.credit_gate) {
            ctx.send(self.credit_gate, NocMsg::Credit(Credit { vc, count: 1 }))?;
        }

        if is_tail {
            in_vc.route = None;
            self.request_front(ctx, vc, schedulers)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn occupancy(&self, vc: usize) -> usize {
        self.vcs.get(vc).map_or(0, |in_vc| in_vc.queue.len())
    }

    #[must_use]
    pub fn waits(&self) -> &HopWaits {
        &self.waits
    }
}
