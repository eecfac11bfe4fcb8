// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The router component.
//!
//! A router with `P` ports has, for each port `p`:
//!  - an output gate `p` for flits and an output gate `P + p` for the
//!    credits of its input buffers,
//!  - an input gate `p` for flits and an input gate `P + p` for the credits
//!    of the downstream buffers.
//!
//! Requests, grants, acknowledgements and flits crossing the router are
//! sent by the router to itself so that they are ordered with all other
//! events by time and priority.

use std::cell::RefCell;
use std::rc::Rc;

use noc_config::RouterConfig;
use noc_engine::engine::{Context, Engine};
use noc_engine::sim_error;
use noc_engine::traits::Component;
use noc_engine::types::{Arrival, ComponentId, GateRef, SimError, SimResult};
use noc_track::entity::Entity;
use noc_track::info;

use crate::in_port::{HopWaits, InPort};
use crate::routing::{Direction, XyRouting};
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::types::{Internal, NocMsg};

struct RouterState {
    in_ports: Vec<InPort>,
    schedulers: Vec<Scheduler>,
    routing: XyRouting,
}

pub struct Router {
    pub entity: Rc<Entity>,
    id: ComponentId,
    router_id: usize,
    directions: Vec<Direction>,
    state: RefCell<RouterState>,
}

impl Router {
    /// Create a router and register it with the engine.
    ///
    /// `ports[i]` is the direction faced by port `i`.
    pub fn new_and_register(
        engine: &mut Engine<NocMsg>,
        parent: &Rc<Entity>,
        name: &str,
        router_id: usize,
        columns: usize,
        ports: &[Direction],
        config: &RouterConfig,
    ) -> Result<Rc<Self>, SimError> {
        if ports.is_empty() {
            return sim_error!(format!("router {name} has no ports"));
        }
        if let Err(e) = config.validate() {
            return sim_error!(format!("router {name}: {e}"));
        }
        let entity = Rc::new(Entity::new(parent, name));
        let routing = XyRouting::new(router_id, columns, ports)?;
        let num_ports = ports.len();
        let in_ports = (0..num_ports)
            .map(|p| InPort::new(&entity, p, num_ports + p, config))
            .collect();
        let schedulers = (0..num_ports)
            .map(|p| Scheduler::new(&entity, p, num_ports, config))
            .collect();

        let rc_self = Rc::new(Self {
            entity,
            id: engine.next_id(),
            router_id,
            directions: ports.to_vec(),
            state: RefCell::new(RouterState {
                in_ports,
                schedulers,
                routing,
            }),
        });
        engine.register(rc_self.clone());
        Ok(rc_self)
    }

    #[must_use]
    pub fn router_id(&self) -> usize {
        self.router_id
    }

    #[must_use]
    pub fn num_ports(&self) -> usize {
        self.directions.len()
    }

    #[must_use]
    pub fn port_for(&self, direction: Direction) -> Option<usize> {
        self.directions.iter().position(|d| *d == direction)
    }

    #[must_use]
    pub fn port_tx_i(&self, i: usize) -> GateRef {
        GateRef::new(self.id, i)
    }

    #[must_use]
    pub fn port_credit_tx_i(&self, i: usize) -> GateRef {
        GateRef::new(self.id, self.num_ports() + i)
    }

    #[must_use]
    pub fn port_rx_i(&self, i: usize) -> GateRef {
        GateRef::new(self.id, i)
    }

    #[must_use]
    pub fn port_credit_rx_i(&self, i: usize) -> GateRef {
        GateRef::new(self.id, self.num_ports() + i)
    }

    /// Utilisation of an output link in percent, `-1` when not measured.
    #[must_use]
    pub fn utilization(&self, port: usize) -> f64 {
        self.state
            .borrow()
            .schedulers
            .get(port)
            .map_or(-1.0, Scheduler::utilization)
    }

    #[must_use]
    pub fn scheduler_stats(&self, port: usize) -> Option<SchedulerStats> {
        self.state
            .borrow()
            .schedulers
            .get(port)
            .map(|s| s.stats().clone())
    }

    #[must_use]
    pub fn hop_waits(&self, port: usize) -> Option<HopWaits> {
        self.state
            .borrow()
            .in_ports
            .get(port)
            .map(|p| p.waits().clone())
    }

    /// Credits currently held by an output VC.
    #[must_use]
    pub fn credits(&self, port: usize, vc: usize) -> i64 {
        self.state
            .borrow()
            .schedulers
            .get(port)
            .map_or(0, |s| s.arbiter().credits(vc))
    }

    /// Flits buffered in an input VC.
    #[must_use]
    pub fn occupancy(&self, port: usize, vc: usize) -> usize {
        self.state
            .borrow()
            .in_ports
            .get(port)
            .map_or(0, |p| p.occupancy(vc))
    }

    fn handle_internal(
        &self,
        ctx: &mut Context<NocMsg>,
        state: &mut RouterState,
        internal: Internal,
    ) -> SimResult {
        let RouterState {
            in_ports,
            schedulers,
            ..
        } = state;
        match internal {
            Internal::Request { in_port, request } => {
                let out_port = request.output_port;
                match schedulers.get_mut(out_port) {
                    Some(scheduler) => scheduler.handle_request(ctx, in_port, request),
                    None => sim_error!(format!("{}: request for port {out_port}", self.entity)),
                }
            }
            Internal::Grant {
                in_port, grant, ..
            } => match in_ports.get_mut(in_port) {
                Some(port) => port.grant(ctx, grant, schedulers),
                None => sim_error!(format!("{}: grant for port {in_port}", self.entity)),
            },
            Internal::Ack {
                in_port,
                out_port,
                ack,
            } => match schedulers.get_mut(out_port) {
                Some(scheduler) => scheduler.handle_ack(ctx, in_port, ack),
                None => sim_error!(format!("{}: ack for port {out_port}", self.entity)),
            },
            Internal::Traverse { out_port, flit, .. } => match schedulers.get_mut(out_port) {
                Some(scheduler) => scheduler.handle_traverse(ctx, flit),
                None => sim_error!(format!("{}: {flit} to port {out_port}", self.entity)),
            },
        }
    }
}

impl Component<NocMsg> for Router {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn initialize(&self, ctx: &mut Context<NocMsg>) -> SimResult {
        let mut state = self.state.borrow_mut();
        for in_port in state.in_ports.iter_mut() {
            in_port.initialize(ctx)?;
        }
        for scheduler in state.schedulers.iter_mut() {
            scheduler.initialize(ctx)?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut Context<NocMsg>, arrival: Arrival, msg: NocMsg) -> SimResult {
        let num_ports = self.num_ports();
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        match (arrival, msg) {
            (Arrival::Gate(gate), NocMsg::Flit(flit)) if gate < num_ports => {
                state.in_ports[gate].receive(ctx, flit, &state.routing, &mut state.schedulers)
            }
            (Arrival::Gate(gate), NocMsg::Credit(credit))
                if (num_ports..2 * num_ports).contains(&gate) =>
            {
                state.schedulers[gate - num_ports].handle_credit(ctx, credit)
            }
            (Arrival::SelfMessage, NocMsg::Internal(internal)) => {
                self.handle_internal(ctx, state, internal)
            }
            (Arrival::SelfMessage, NocMsg::Timer(port)) => match state.schedulers.get_mut(port) {
                Some(scheduler) => scheduler.handle_tick(ctx),
                None => sim_error!(format!("{}: timer for port {port}", self.entity)),
            },
            (arrival, msg) => sim_error!(format!(
                "{}: unexpected {msg} ({arrival:?})",
                self.entity
            )),
        }
    }

    fn finish(&self, ctx: &Context<NocMsg>) {
        let mut state = self.state.borrow_mut();
        for scheduler in state.schedulers.iter_mut() {
            scheduler.finish(ctx.now());
        }
        info!(self.entity ; "router {} finished at {}", self.router_id, ctx.now());
    }
}
