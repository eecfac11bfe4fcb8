// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A sink attached to the core port of a router.
//!
//! The sink has effectively unlimited bandwidth: it advertises
//! `initial_credits` per VC at start-up and returns each credit as soon as a
//! flit arrives. It checks that packets arrive whole and in order on each VC
//! and records latency statistics once `stat_start` has passed.
//!
//! # Ports
//!
//!  - input gate `0` (`rx`): flits from the router,
//!  - output gate `0` (`credit_tx`): credits to the router.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use noc_engine::engine::{Context, Engine};
use noc_engine::sim_error;
use noc_engine::time::simtime::SimTime;
use noc_engine::traits::Component;
use noc_engine::types::{Arrival, ComponentId, GateRef, SimResult};
use noc_router::stats::Accumulator;
use noc_router::types::{Credit, Flit, NocMsg, PacketId};
use noc_track::entity::Entity;
use noc_track::{info, trace};

const CREDIT_TX: usize = 0;

/// Latencies of the traffic from one source.
#[derive(Clone, Debug, Default)]
pub struct FlowLatency {
    pub end_to_end: Accumulator,
    pub packet: Accumulator,
}

#[derive(Clone, Debug, Default)]
pub struct SinkStats {
    /// Creation to arrival, per flit.
    pub end_to_end: Accumulator,

    /// Entry into the first router to arrival, per flit.
    pub network: Accumulator,

    /// Creation to injection, per flit.
    pub queueing: Accumulator,

    /// Entry of the head into the first router to arrival of the tail.
    pub packet: Accumulator,

    pub per_source: BTreeMap<usize, FlowLatency>,
    pub flits_per_vc: Vec<u64>,
    pub received_flits: u64,
    pub received_packets: u64,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    packet_id: PacketId,
    next_index: usize,
    head_entered_at: SimTime,
}

struct SinkState {
    in_flight: Vec<Option<InFlight>>,
    stats: SinkStats,
}

pub struct LatencySink {
    pub entity: Rc<Entity>,
    id: ComponentId,
    core_id: usize,
    num_vcs: usize,
    initial_credits: usize,
    stat_start: SimTime,
    state: RefCell<SinkState>,
}

impl LatencySink {
    #[must_use]
    pub fn new_and_register(
        engine: &mut Engine<NocMsg>,
        parent: &Rc<Entity>,
        name: &str,
        core_id: usize,
        num_vcs: usize,
        initial_credits: usize,
        stat_start: SimTime,
    ) -> Rc<Self> {
        let rc_self = Rc::new(Self {
            entity: Rc::new(Entity::new(parent, name)),
            id: engine.next_id(),
            core_id,
            num_vcs,
            initial_credits,
            stat_start,
            state: RefCell::new(SinkState {
                in_flight: vec![None; num_vcs],
                stats: SinkStats {
                    flits_per_vc: vec![0; num_vcs],
                    ..SinkStats::default()
                },
            }),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    #[must_use]
    pub fn port_rx(&self) -> GateRef {
        GateRef::new(self.id, 0)
    }

    #[must_use]
    pub fn port_credit_tx(&self) -> GateRef {
        GateRef::new(self.id, CREDIT_TX)
    }

    #[must_use]
    pub fn stats(&self) -> SinkStats {
        self.state.borrow().stats.clone()
    }

    #[must_use]
    pub fn received_packets(&self) -> u64 {
        self.state.borrow().stats.received_packets
    }

    fn check_order(&self, state: &mut SinkState, flit: &Flit, entered_at: SimTime) -> SimResult {
        let vc = flit.vc;
        let Some(slot) = state.in_flight.get_mut(vc) else {
            return sim_error!(format!(
                "{}: {flit} on vc {vc} but only {} VCs",
                self.entity, self.num_vcs
            ));
        };
        if flit.is_head() {
            if let Some(current) = slot {
                return sim_error!(format!(
                    "{}: head {flit} while packet {:#x} is incomplete on vc {vc}",
                    self.entity, current.packet_id
                ));
            }
            *slot = Some(InFlight {
                packet_id: flit.packet_id,
                next_index: 1,
                head_entered_at: entered_at,
            });
        } else {
            match slot {
                Some(current)
                    if current.packet_id == flit.packet_id
                        && current.next_index == flit.flit_index =>
                {
                    current.next_index += 1;
                }
                Some(current) => {
                    return sim_error!(format!(
                        "{}: {flit} but expected flit {} of packet {:#x} on vc {vc}",
                        self.entity, current.next_index, current.packet_id
                    ));
                }
                None => {
                    return sim_error!(format!("{}: {flit} without a head", self.entity));
                }
            }
        }
        Ok(())
    }

    fn receive(&self, ctx: &mut Context<NocMsg>, flit: Flit) -> SimResult {
        let now = ctx.now();
        if flit.dst_id != self.core_id {
            return sim_error!(format!(
                "{}: {flit} delivered to core {}",
                self.entity, self.core_id
            ));
        }
        let Some(entered_at) = flit.first_network_at else {
            return sim_error!(format!(
                "{}: {flit} never entered the network",
                self.entity
            ));
        };

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        self.check_order(state, &flit, entered_at)?;
        ctx.send(
            CREDIT_TX,
            NocMsg::Credit(Credit {
                vc: flit.vc,
                count: 1,
            }),
        )?;
        trace!(self.entity ; "received {flit}");

        let packet_done = flit.is_tail();
        let head_entered_at = if packet_done {
            state.in_flight[flit.vc]
                .take()
                .map_or(entered_at, |p| p.head_entered_at)
        } else {
            entered_at
        };

        let stats = &mut state.stats;
        stats.received_flits += 1;
        stats.flits_per_vc[flit.vc] += 1;
        if packet_done {
            stats.received_packets += 1;
        }
        if now < self.stat_start {
            return Ok(());
        }

        let end_to_end = now.saturating_sub(flit.created_at).as_ns();
        stats.end_to_end.add(end_to_end);
        stats.network.add(now.saturating_sub(entered_at).as_ns());
        if let Some(injected_at) = flit.injected_at {
            stats
                .queueing
                .add(injected_at.saturating_sub(flit.created_at).as_ns());
        }
        let flow = stats.per_source.entry(flit.src_id).or_default();
        flow.end_to_end.add(end_to_end);
        if packet_done {
            let packet = now.saturating_sub(head_entered_at).as_ns();
            stats.packet.add(packet);
            flow.packet.add(packet);
        }
        Ok(())
    }
}

impl Component<NocMsg> for LatencySink {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn initialize(&self, ctx: &mut Context<NocMsg>) -> SimResult {
        if !ctx.is_connected(CREDIT_TX) {
            return Ok(());
        }
        for vc in 0..self.num_vcs {
            ctx.send(
                CREDIT_TX,
                NocMsg::Credit(Credit {
                    vc,
                    count: self.initial_credits,
                }),
            )?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut Context<NocMsg>, arrival: Arrival, msg: NocMsg) -> SimResult {
        match (arrival, msg) {
            (Arrival::Gate(0), NocMsg::Flit(flit)) => self.receive(ctx, flit),
            (arrival, msg) => sim_error!(format!(
                "{}: unexpected {msg} ({arrival:?})",
                self.entity
            )),
        }
    }

    fn finish(&self, _ctx: &Context<NocMsg>) {
        let state = self.state.borrow();
        let stats = &state.stats;
        info!(self.entity ; "sink {}: {} packets, {} flits", self.core_id, stats.received_packets, stats.received_flits);
        info!(self.entity ; "end-to-end latency (ns): {}", stats.end_to_end);
        info!(self.entity ; "network latency (ns): {}", stats.network);
        info!(self.entity ; "packet latency (ns): {}", stats.packet);
        for (src_id, flow) in &stats.per_source {
            info!(self.entity ; "from {src_id}: end-to-end {} packet {}", flow.end_to_end, flow.packet);
        }
    }
}
