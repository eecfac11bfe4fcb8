// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use noc_engine::channel::Channel;
use noc_engine::engine::{Context, Engine};
use noc_engine::test_helpers::start_test;
use noc_engine::time::simtime::SimTime;
use noc_engine::traits::{Component, Prioritised, TotalBytes};
use noc_engine::types::{Arrival, ComponentId, GateRef, Priority, SimResult};
use noc_engine::{connect_port, run_simulation, sim_error};
use noc_track::entity::Entity;

#[derive(Debug)]
enum Msg {
    Data(usize),
    Token,
    Tick,
}

impl fmt::Display for Msg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl TotalBytes for Msg {
    fn total_bytes(&self) -> usize {
        match self {
            Msg::Data(bytes) => *bytes,
            _ => 0,
        }
    }
}

impl Prioritised for Msg {
    fn priority(&self) -> Priority {
        match self {
            Msg::Data(_) => Priority::Data,
            Msg::Token => Priority::Control,
            Msg::Tick => Priority::Clock,
        }
    }
}

/// Sends the messages it is given at initialisation, or when it is ticked.
struct Sender {
    entity: Rc<Entity>,
    id: ComponentId,
    to_send: RefCell<Vec<(SimTime, Msg)>>,
}

impl Sender {
    fn new_and_register(engine: &mut Engine<Msg>, name: &str, to_send: Vec<(SimTime, Msg)>) -> Rc<Self> {
        let rc_self = Rc::new(Self {
            entity: Rc::new(Entity::new(engine.top(), name)),
            id: engine.next_id(),
            to_send: RefCell::new(to_send),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    fn port_tx(&self) -> GateRef {
        GateRef::new(self.id, 0)
    }
}

impl Component<Msg> for Sender {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn initialize(&self, ctx: &mut Context<Msg>) -> SimResult {
        let mut to_send = self.to_send.borrow_mut();
        for (at, msg) in to_send.drain(..) {
            if at == SimTime::ZERO {
                ctx.send(0, msg)?;
            } else {
                ctx.schedule_self(at, msg)?;
            }
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut Context<Msg>, _arrival: Arrival, msg: Msg) -> SimResult {
        ctx.send(0, msg)
    }
}

/// Records what arrives and when.
struct Recorder {
    entity: Rc<Entity>,
    id: ComponentId,
    seen: RefCell<Vec<(SimTime, String)>>,
    fail_on_token: bool,
    finishes: Cell<usize>,
}

impl Recorder {
    fn new_and_register(engine: &mut Engine<Msg>, name: &str, fail_on_token: bool) -> Rc<Self> {
        let rc_self = Rc::new(Self {
            entity: Rc::new(Entity::new(engine.top(), name)),
            id: engine.next_id(),
            seen: RefCell::new(Vec::new()),
            fail_on_token,
            finishes: Cell::new(0),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    fn port_rx_i(&self, i: usize) -> GateRef {
        GateRef::new(self.id, i)
    }
}

impl Component<Msg> for Recorder {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn handle(&self, ctx: &mut Context<Msg>, arrival: Arrival, msg: Msg) -> SimResult {
        if self.fail_on_token && matches!(msg, Msg::Token) {
            return sim_error!(format!("{}: unexpected token", self.entity));
        }
        let gate = match arrival {
            Arrival::Gate(gate) => gate,
            Arrival::SelfMessage => usize::MAX,
        };
        self.seen
            .borrow_mut()
            .push((ctx.now(), format!("{gate}:{msg}")));
        Ok(())
    }

    fn finish(&self, _ctx: &Context<Msg>) {
        self.finishes.set(self.finishes.get() + 1);
    }
}

#[test]
fn data_rate_and_delay() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(&mut engine, "sender", vec![(SimTime::ZERO, Msg::Data(4))]);
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);

    let channel = Channel::with_datarate(32.0, SimTime::from_ns(2.0));
    connect_port!(engine, channel ; sender, tx => recorder, rx, 0).unwrap();
    run_simulation!(engine);

    // 1ns to transmit 4 bytes at 32Gbps and 2ns delay
    assert_eq!(
        *recorder.seen.borrow(),
        vec![(SimTime::from_ns(3.0), "0:Data(4)".to_string())]
    );
}

#[test]
fn send_while_busy_is_an_error() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(
        &mut engine,
        "sender",
        vec![(SimTime::ZERO, Msg::Data(4)), (SimTime::ZERO, Msg::Data(4))],
    );
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);
    connect_port!(engine, Channel::with_datarate(32.0, SimTime::ZERO) ; sender, tx => recorder, rx, 0)
        .unwrap();
    let result = engine.run();
    assert!(result.unwrap_err().0.contains("while busy until 1.000ns"));
}

#[test]
fn zero_size_messages_pass_a_busy_channel() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(
        &mut engine,
        "sender",
        vec![(SimTime::ZERO, Msg::Data(8)), (SimTime::ZERO, Msg::Token)],
    );
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);
    connect_port!(engine, Channel::with_datarate(32.0, SimTime::ZERO) ; sender, tx => recorder, rx, 1)
        .unwrap();
    run_simulation!(engine);

    let seen = recorder.seen.borrow();
    assert_eq!(seen[0], (SimTime::ZERO, "1:Token".to_string()));
    assert_eq!(seen[1], (SimTime::from_ns(2.0), "1:Data(8)".to_string()));
}

#[test]
fn same_time_events_follow_priority() {
    let mut engine = start_test(file!());
    let at = SimTime::from_ns(5.0);
    let sender = Sender::new_and_register(
        &mut engine,
        "sender",
        vec![(at, Msg::Tick), (at, Msg::Data(0)), (at, Msg::Token)],
    );
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);
    connect_port!(engine, Channel::ideal() ; sender, tx => recorder, rx, 0).unwrap();
    run_simulation!(engine);

    let order: Vec<String> = recorder.seen.borrow().iter().map(|(_, m)| m.clone()).collect();
    assert_eq!(order, vec!["0:Token", "0:Data(0)", "0:Tick"]);
}

#[test]
fn handler_error_aborts() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(
        &mut engine,
        "sender",
        vec![(SimTime::from_ns(1.0), Msg::Token), (SimTime::from_ns(2.0), Msg::Data(0))],
    );
    let recorder = Recorder::new_and_register(&mut engine, "recorder", true);
    connect_port!(engine, Channel::ideal() ; sender, tx => recorder, rx, 0).unwrap();
    run_simulation!(engine, "Error: top::recorder: unexpected token");
    assert!(recorder.seen.borrow().is_empty());
    assert_eq!(engine.time_now(), SimTime::from_ns(1.0));
}

#[test]
fn run_until_stops_at_limit() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(
        &mut engine,
        "sender",
        vec![(SimTime::from_ns(1.0), Msg::Token), (SimTime::from_ns(10.0), Msg::Token)],
    );
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);
    connect_port!(engine, Channel::ideal() ; sender, tx => recorder, rx, 0).unwrap();

    engine.run_until(Some(SimTime::from_ns(5.0))).unwrap();
    assert_eq!(recorder.seen.borrow().len(), 1);
    assert_eq!(engine.time_now(), SimTime::from_ns(5.0));
    assert_eq!(engine.num_pending_events(), 1);
    assert_eq!(recorder.finishes.get(), 0);
}

#[test]
fn components_finish_once() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(
        &mut engine,
        "sender",
        vec![(SimTime::from_ns(1.0), Msg::Token), (SimTime::from_ns(10.0), Msg::Token)],
    );
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);
    connect_port!(engine, Channel::ideal() ; sender, tx => recorder, rx, 0).unwrap();

    // Pausing at a limit does not finish
    engine.run_until(Some(SimTime::from_ns(5.0))).unwrap();
    assert_eq!(recorder.finishes.get(), 0);

    engine.run().unwrap();
    assert_eq!(recorder.seen.borrow().len(), 2);
    assert_eq!(recorder.finishes.get(), 1);

    engine.finish();
    engine.run().unwrap();
    assert_eq!(recorder.finishes.get(), 1);
}

#[test]
fn finish_ends_a_paused_run() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(
        &mut engine,
        "sender",
        vec![(SimTime::from_ns(1.0), Msg::Token), (SimTime::from_ns(10.0), Msg::Token)],
    );
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);
    connect_port!(engine, Channel::ideal() ; sender, tx => recorder, rx, 0).unwrap();

    engine.run_until(Some(SimTime::from_ns(5.0))).unwrap();
    engine.finish();
    engine.finish();
    assert_eq!(recorder.finishes.get(), 1);
    assert_eq!(recorder.seen.borrow().len(), 1);
}

#[test]
fn unconnected_and_double_connections() {
    let mut engine = start_test(file!());
    let sender = Sender::new_and_register(&mut engine, "sender", vec![(SimTime::ZERO, Msg::Token)]);
    let recorder = Recorder::new_and_register(&mut engine, "recorder", false);

    assert!(engine
        .connect(sender.port_tx(), GateRef::new(7, 0), Channel::ideal())
        .is_err());

    let result = engine.run();
    assert!(result.unwrap_err().0.contains("unconnected gate 0"));

    connect_port!(engine, Channel::ideal() ; sender, tx => recorder, rx, 0).unwrap();
    assert!(connect_port!(engine, Channel::ideal() ; sender, tx => recorder, rx, 1).is_err());
}
