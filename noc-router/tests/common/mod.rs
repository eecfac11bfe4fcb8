// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Link partners used to drive a single router.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use noc_engine::channel::Channel;
use noc_engine::connect_port;
use noc_engine::engine::{Context, Engine};
use noc_engine::time::simtime::SimTime;
use noc_engine::traits::Component;
use noc_engine::types::{Arrival, ComponentId, GateRef, SimResult};
use noc_router::router::Router;
use noc_router::types::{Credit, Flit, NocMsg, packet_id};
use noc_track::entity::Entity;

/// Sends flits into a router port at fixed times and records the credits it
/// gets back.
pub struct Feeder {
    entity: Rc<Entity>,
    id: ComponentId,
    to_send: RefCell<Vec<(SimTime, Flit)>>,
    pub credits: RefCell<Vec<(SimTime, Credit)>>,
}

impl Feeder {
    pub fn new_and_register(
        engine: &mut Engine<NocMsg>,
        name: &str,
        to_send: Vec<(SimTime, Flit)>,
    ) -> Rc<Self> {
        let rc_self = Rc::new(Self {
            entity: Rc::new(Entity::new(engine.top(), name)),
            id: engine.next_id(),
            to_send: RefCell::new(to_send),
            credits: RefCell::new(Vec::new()),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    pub fn port_tx(&self) -> GateRef {
        GateRef::new(self.id, 0)
    }

    pub fn port_credit_rx(&self) -> GateRef {
        GateRef::new(self.id, 0)
    }

    pub fn total_credits(&self, vc: usize) -> usize {
        self.credits
            .borrow()
            .iter()
            .filter(|(_, c)| c.vc == vc)
            .map(|(_, c)| c.count)
            .sum()
    }
}

impl Component<NocMsg> for Feeder {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn initialize(&self, ctx: &mut Context<NocMsg>) -> SimResult {
        for (at, flit) in self.to_send.borrow_mut().drain(..) {
            ctx.schedule_self(at, NocMsg::Flit(flit))?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut Context<NocMsg>, arrival: Arrival, msg: NocMsg) -> SimResult {
        match (arrival, msg) {
            (Arrival::SelfMessage, msg @ NocMsg::Flit(_)) => ctx.send(0, msg),
            (Arrival::Gate(0), NocMsg::Credit(credit)) => {
                self.credits.borrow_mut().push((ctx.now(), credit));
                Ok(())
            }
            (_, msg) => noc_engine::sim_error!(format!("{}: unexpected {msg}", self.entity)),
        }
    }
}

/// Receives the flits of a router output and hands out credits.
pub struct Collector {
    entity: Rc<Entity>,
    id: ComponentId,
    num_vcs: usize,
    initial_credits: usize,
    return_credits: bool,
    extra_credits: RefCell<Vec<(SimTime, Credit)>>,
    pub received: RefCell<Vec<(SimTime, Flit)>>,
}

impl Collector {
    pub fn new_and_register(
        engine: &mut Engine<NocMsg>,
        name: &str,
        num_vcs: usize,
        initial_credits: usize,
        return_credits: bool,
    ) -> Rc<Self> {
        let rc_self = Rc::new(Self {
            entity: Rc::new(Entity::new(engine.top(), name)),
            id: engine.next_id(),
            num_vcs,
            initial_credits,
            return_credits,
            extra_credits: RefCell::new(Vec::new()),
            received: RefCell::new(Vec::new()),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    /// Send `credit` at time `at`, on top of the initial credits.
    pub fn credit_at(&self, at: SimTime, credit: Credit) {
        self.extra_credits.borrow_mut().push((at, credit));
    }

    pub fn port_rx(&self) -> GateRef {
        GateRef::new(self.id, 0)
    }

    pub fn port_credit_tx(&self) -> GateRef {
        GateRef::new(self.id, 0)
    }

    /// `(arrival time in ns, packet id, flit index, vc)` of each flit.
    pub fn summary(&self) -> Vec<(f64, u64, usize, usize)> {
        self.received
            .borrow()
            .iter()
            .map(|(t, f)| (t.as_ns(), f.packet_id, f.flit_index, f.vc))
            .collect()
    }
}

impl Component<NocMsg> for Collector {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn initialize(&self, ctx: &mut Context<NocMsg>) -> SimResult {
        if self.initial_credits > 0 {
            for vc in 0..self.num_vcs {
                ctx.send(
                    0,
                    NocMsg::Credit(Credit {
                        vc,
                        count: self.initial_credits,
                    }),
                )?;
            }
        }
        for (at, credit) in self.extra_credits.borrow_mut().drain(..) {
            ctx.schedule_self(at, NocMsg::Credit(credit))?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut Context<NocMsg>, arrival: Arrival, msg: NocMsg) -> SimResult {
        match (arrival, msg) {
            (Arrival::Gate(0), NocMsg::Flit(flit)) => {
                if self.return_credits {
                    ctx.send(0, NocMsg::Credit(Credit { vc: flit.vc, count: 1 }))?;
                }
                self.received.borrow_mut().push((ctx.now(), flit));
                Ok(())
            }
            (Arrival::SelfMessage, msg @ NocMsg::Credit(_)) => ctx.send(0, msg),
            (_, msg) => noc_engine::sim_error!(format!("{}: unexpected {msg}", self.entity)),
        }
    }
}

/// Connect a feeder to input `port` of a router.
pub fn attach_feeder(
    engine: &mut Engine<NocMsg>,
    router: &Rc<Router>,
    port: usize,
    to_send: Vec<(SimTime, Flit)>,
) -> Rc<Feeder> {
    let feeder = Feeder::new_and_register(engine, &format!("feeder{port}"), to_send);
    connect_port!(engine, Channel::ideal() ; feeder, tx => router, rx, port).unwrap();
    connect_port!(engine, Channel::ideal() ; router, credit_tx, port => feeder, credit_rx).unwrap();
    feeder
}

/// Connect a collector to output `port` of a router through a 32Gbps link.
pub fn attach_collector(
    engine: &mut Engine<NocMsg>,
    router: &Rc<Router>,
    port: usize,
    num_vcs: usize,
    initial_credits: usize,
    return_credits: bool,
) -> Rc<Collector> {
    let collector = Collector::new_and_register(
        engine,
        &format!("collector{port}"),
        num_vcs,
        initial_credits,
        return_credits,
    );
    let link = Channel::with_datarate(32.0, SimTime::ZERO);
    connect_port!(engine, link ; router, tx, port => collector, rx).unwrap();
    connect_port!(engine, Channel::ideal() ; collector, credit_tx => router, credit_rx, port).unwrap();
    collector
}

/// The flits of packet `index` from `src` to `dst` on input VC `vc`, all
/// arriving at `at`.
pub fn packet_at(at: SimTime, src: usize, index: u64, dst: usize, vc: usize, len: usize) -> Vec<(SimTime, Flit)> {
    Flit::packet(packet_id(src, index), len, vc, src, dst, 4, SimTime::ZERO)
        .into_iter()
        .map(|flit| (at, flit))
        .collect()
}

pub fn ns(t: f64) -> SimTime {
    SimTime::from_ns(t)
}
