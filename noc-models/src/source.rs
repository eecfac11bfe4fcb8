// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A traffic source attached to the core port of a router.
//!
//! Packets are generated at a fixed interval (or at the intervals read from
//! a trace file) and queued until they can be injected. A packet generated
//! while `max_queued_packets` packets are already waiting is dropped.
//!
//! The source only uses the injection VC and holds the credits of that VC
//! in the router's input buffer. It injects at most one flit per credit,
//! either:
//!  - synchronously, on a clock whose period is the time taken to send one
//!    flit on the link, starting half a period in,
//!  - or asynchronously, as soon as a credit is available and the link is
//!    free.
//!
//! # Ports
//!
//!  - output gate `0` (`tx`): flits to the router,
//!  - input gate `0` (`credit_rx`): credits from the router.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::rc::Rc;

use noc_config::{Destination, TrafficConfig};
use noc_engine::engine::{Context, Engine};
use noc_engine::sim_error;
use noc_engine::time::clock::Clock;
use noc_engine::time::simtime::SimTime;
use noc_engine::traits::Component;
use noc_engine::types::{Arrival, ComponentId, GateRef, SimError, SimResult};
use noc_router::types::{Flit, NocMsg, packet_id};
use noc_track::entity::Entity;
use noc_track::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TX: usize = 0;

const GENERATE: usize = 0;
const INJECT: usize = 1;
const LINK_FREE: usize = 2;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub generated: u64,
    pub queued: u64,
    pub dropped: u64,
    pub sent_packets: u64,
    pub sent_flits: u64,
}

impl SourceStats {
    /// Fraction of generated packets that were dropped, `-1` if none were
    /// generated.
    #[must_use]
    pub fn loss_probability(&self) -> f64 {
        if self.generated == 0 {
            -1.0
        } else {
            1.0 - self.queued as f64 / self.generated as f64
        }
    }
}

impl fmt::Display for SourceStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "generated={} queued={} dropped={} sent={} ({} flits) loss={:.4}",
            self.generated,
            self.queued,
            self.dropped,
            self.sent_packets,
            self.sent_flits,
            self.loss_probability()
        )
    }
}

struct SourceState {
    rng: StdRng,
    queue: VecDeque<Flit>,
    queued_packets: usize,
    credits: usize,
    next_index: u64,
    message_remaining: usize,
    dst_id: usize,
    trace_pos: usize,
    generation_done: bool,
    clock: Option<Clock>,
    link_busy: bool,
    stats: SourceStats,
}

pub struct TrafficSource {
    pub entity: Rc<Entity>,
    id: ComponentId,
    src_id: usize,
    num_cores: usize,
    flit_size_bytes: usize,
    config: TrafficConfig,
    trace: Vec<SimTime>,
    state: RefCell<SourceState>,
}

/// Read packet inter-arrival times, in ns, one per line.
pub fn read_trace(path: &str) -> Result<Vec<SimTime>, SimError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| SimError(format!("failed to read trace file {path}: {e}")))?;
    let mut delays = Vec::new();
    for (line_number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<f64>() {
            Ok(ns) if ns >= 0.0 => delays.push(SimTime::from_ns(ns)),
            _ => {
                return sim_error!(format!(
                    "{path}:{}: invalid delay '{line}'",
                    line_number + 1
                ));
            }
        }
    }
    if delays.is_empty() {
        return sim_error!(format!("trace file {path} contains no delays"));
    }
    Ok(delays)
}

impl TrafficSource {
    pub fn new_and_register(
        engine: &mut Engine<NocMsg>,
        parent: &Rc<Entity>,
        name: &str,
        src_id: usize,
        num_cores: usize,
        flit_size_bytes: usize,
        config: &TrafficConfig,
    ) -> Result<Rc<Self>, SimError> {
        if config.destination == Destination::UniformRandom && num_cores < 2 {
            return sim_error!(format!(
                "source {name}: random destinations need at least 2 cores"
            ));
        }
        let trace = match &config.trace_file {
            Some(path) => read_trace(path)?,
            None => Vec::new(),
        };
        let rc_self = Rc::new(Self {
            entity: Rc::new(Entity::new(parent, name)),
            id: engine.next_id(),
            src_id,
            num_cores,
            flit_size_bytes,
            config: config.clone(),
            trace,
            state: RefCell::new(SourceState {
                rng: StdRng::seed_from_u64(config.seed ^ src_id as u64),
                queue: VecDeque::new(),
                queued_packets: 0,
                credits: 0,
                next_index: 0,
                message_remaining: 0,
                dst_id: src_id,
                trace_pos: 0,
                generation_done: false,
                clock: None,
                link_busy: false,
                stats: SourceStats::default(),
            }),
        });
        engine.register(rc_self.clone());
        Ok(rc_self)
    }

    #[must_use]
    pub fn port_tx(&self) -> GateRef {
        GateRef::new(self.id, TX)
    }

    #[must_use]
    pub fn port_credit_rx(&self) -> GateRef {
        GateRef::new(self.id, 0)
    }

    #[must_use]
    pub fn src_id(&self) -> usize {
        self.src_id
    }

    #[must_use]
    pub fn stats(&self) -> SourceStats {
        self.state.borrow().stats.clone()
    }

    /// Credits currently held for the injection VC.
    #[must_use]
    pub fn credits(&self) -> usize {
        self.state.borrow().credits
    }

    #[must_use]
    pub fn num_queued_flits(&self) -> usize {
        self.state.borrow().queue.len()
    }

    fn is_off(&self) -> bool {
        self.config.destination == Destination::Off
    }

    fn pick_destination(&self, state: &mut SourceState) -> usize {
        match self.config.destination {
            Destination::Fixed(dst_id) => dst_id,
            Destination::UniformRandom => {
                // Any core but this one
                let pick = state.rng.gen_range(0..self.num_cores - 1);
                if pick >= self.src_id { pick + 1 } else { pick }
            }
            Destination::Off => self.src_id,
        }
    }

    fn next_delay(&self, state: &mut SourceState) -> SimTime {
        if self.trace.is_empty() {
            SimTime::from_ns(
                self.config.packet_length_flits as f64 * self.config.flit_arrival_delay_ns,
            )
        } else {
            let delay = self.trace[state.trace_pos % self.trace.len()];
            state.trace_pos += 1;
            delay
        }
    }

    fn generate(&self, ctx: &mut Context<NocMsg>, state: &mut SourceState) -> SimResult {
        let now = ctx.now();
        if state.message_remaining == 0 {
            state.dst_id = self.pick_destination(state);
            state.message_remaining = self.config.message_length_packets;
        }
        state.message_remaining -= 1;
        state.stats.generated += 1;

        if state.queued_packets < self.config.max_queued_packets {
            state.next_index += 1;
            let id = packet_id(self.src_id, state.next_index);
            state.queue.extend(Flit::packet(
                id,
                self.config.packet_length_flits,
                self.config.injection_vc,
                self.src_id,
                state.dst_id,
                self.flit_size_bytes,
                now,
            ));
            state.queued_packets += 1;
            state.stats.queued += 1;
            trace!(self.entity ; "queued packet {id:#x} for {}", state.dst_id);
        } else {
            state.stats.dropped += 1;
            debug!(self.entity ; "queue full, dropped packet for {}", state.dst_id);
        }

        let limit_reached = self
            .config
            .packets_per_source
            .is_some_and(|n| state.stats.generated >= n as u64);
        if limit_reached {
            state.generation_done = true;
        } else {
            let delay = self.next_delay(state);
            ctx.schedule_self(now + delay, NocMsg::Timer(GENERATE))?;
        }

        if state.clock.is_none() {
            self.try_send(ctx, state)?;
        }
        Ok(())
    }

    fn can_send(&self, state: &SourceState) -> bool {
        state.credits > 0 && !state.queue.is_empty()
    }

    fn send_front(&self, ctx: &mut Context<NocMsg>, state: &mut SourceState) -> SimResult {
        let Some(mut flit) = state.queue.pop_front() else {
            return Ok(());
        };
        flit.injected_at = Some(ctx.now());
        state.credits -= 1;
        state.stats.sent_flits += 1;
        if flit.is_tail() {
            state.queued_packets -= 1;
            state.stats.sent_packets += 1;
        }
        trace!(self.entity ; "inject {flit}");
        ctx.send(TX, NocMsg::Flit(flit))
    }

    /// Inject the next flit if a credit is available and the link is idle.
    fn try_send(&self, ctx: &mut Context<NocMsg>, state: &mut SourceState) -> SimResult {
        if state.link_busy || !self.can_send(state) {
            return Ok(());
        }
        self.send_front(ctx, state)?;
        state.link_busy = true;
        let now = ctx.now();
        let free_at = ctx.transmission_finish_time(TX).map_or(now, |t| t.max(now));
        ctx.schedule_self(free_at, NocMsg::Timer(LINK_FREE))
    }

    fn inject_tick(&self, ctx: &mut Context<NocMsg>, state: &mut SourceState) -> SimResult {
        let Some(clock) = state.clock else {
            return sim_error!(format!("{}: clock tick without a clock", self.entity));
        };
        if self.can_send(state) && !ctx.is_busy(TX) {
            self.send_front(ctx, state)?;
        }
        if !state.generation_done || !state.queue.is_empty() {
            ctx.schedule_self(ctx.now() + clock.period(), NocMsg::Timer(INJECT))?;
        }
        Ok(())
    }
}

impl Component<NocMsg> for TrafficSource {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn initialize(&self, ctx: &mut Context<NocMsg>) -> SimResult {
        if self.is_off() {
            info!(self.entity ; "source {} is off", self.src_id);
            return Ok(());
        }
        let mut state = self.state.borrow_mut();
        if self.config.synchronous {
            let Some(datarate_bps) = ctx.datarate_bps(TX) else {
                return sim_error!(format!(
                    "{}: synchronous injection needs a link with a data rate",
                    self.entity
                ));
            };
            let clock = Clock::for_link(8 * self.flit_size_bytes, datarate_bps)?;
            let phase = SimTime::from_ps(clock.period().as_ps() / 2);
            ctx.schedule_self(ctx.now() + phase, NocMsg::Timer(INJECT))?;
            state.clock = Some(clock);
        }
        ctx.schedule_self(ctx.now(), NocMsg::Timer(GENERATE))
    }

    fn handle(&self, ctx: &mut Context<NocMsg>, arrival: Arrival, msg: NocMsg) -> SimResult {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        match (arrival, msg) {
            (Arrival::Gate(0), NocMsg::Credit(credit)) => {
                if credit.vc != self.config.injection_vc {
                    trace!(self.entity ; "ignore {} credits for vc {}", credit.count, credit.vc);
                    return Ok(());
                }
                state.credits += credit.count;
                if state.clock.is_none() {
                    self.try_send(ctx, state)?;
                }
                Ok(())
            }
            (Arrival::SelfMessage, NocMsg::Timer(GENERATE)) => self.generate(ctx, state),
            (Arrival::SelfMessage, NocMsg::Timer(INJECT)) => self.inject_tick(ctx, state),
            (Arrival::SelfMessage, NocMsg::Timer(LINK_FREE)) => {
                state.link_busy = false;
                self.try_send(ctx, state)
            }
            (arrival, msg) => sim_error!(format!(
                "{}: unexpected {msg} ({arrival:?})",
                self.entity
            )),
        }
    }

    fn finish(&self, _ctx: &Context<NocMsg>) {
        let state = self.state.borrow();
        info!(self.entity ; "source {}: {}", self.src_id, state.stats);
    }
}
