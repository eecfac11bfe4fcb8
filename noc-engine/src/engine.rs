// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The simulation engine.
//!
//! The [`Engine`] owns every registered component, the connections between
//! their gates and the queue of pending events. Events are handled one at a
//! time; a handler can only affect other components by sending messages,
//! which are queued and delivered later (possibly at the same time but never
//! re-entrantly).

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::rc::Rc;

use noc_track::entity::{Entity, toplevel};
use noc_track::{Tracker, connect, set_time, trace};

use crate::channel::{Channel, Link};
use crate::queue::EventQueue;
use crate::sim_error;
use crate::time::simtime::SimTime;
use crate::traits::{Component, SimObject};
use crate::types::{Arrival, ComponentId, GateRef, SimError, SimResult};

pub struct Engine<M>
where
    M: SimObject,
{
    toplevel: Rc<Entity>,
    tracker: Tracker,
    components: Vec<Rc<dyn Component<M>>>,
    links: HashMap<GateRef, Link>,
    queue: EventQueue<M>,
    now: SimTime,
    initialized: bool,
    finished: bool,
}

impl<M> Engine<M>
where
    M: SimObject,
{
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        Self {
            toplevel: toplevel(tracker, "top"),
            tracker: tracker.clone(),
            components: Vec::new(),
            links: HashMap::new(),
            queue: EventQueue::default(),
            now: SimTime::ZERO,
            initialized: false,
            finished: false,
        }
    }

    #[must_use]
    pub fn top(&self) -> &Rc<Entity> {
        &self.toplevel
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }

    /// The id the next registered component will be given.
    ///
    /// Components use this to know their own id before they are registered.
    #[must_use]
    pub fn next_id(&self) -> ComponentId {
        self.components.len()
    }

    pub fn register(&mut self, component: Rc<dyn Component<M>>) -> ComponentId {
        let id = self.components.len();
        trace!(self.toplevel ; "register {} as {}", component.entity(), id);
        self.components.push(component);
        id
    }

    /// Connect an output gate to an input gate through a channel.
    pub fn connect(&mut self, from: GateRef, to: GateRef, channel: Channel) -> SimResult {
        let (Some(from_component), Some(to_component)) = (
            self.components.get(from.component),
            self.components.get(to.component),
        ) else {
            return sim_error!(format!("connect {from} => {to}: unknown component"));
        };
        connect!(from_component.entity() ; to_component.entity());

        match self.links.entry(from) {
            Entry::Occupied(_) => sim_error!(format!(
                "{} output gate {} is already connected",
                from_component.entity(),
                from.gate
            )),
            Entry::Vacant(entry) => {
                entry.insert(Link::new(to, channel));
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn time_now(&self) -> SimTime {
        self.now
    }

    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.now.as_ns()
    }

    #[must_use]
    pub fn num_pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Run until there are no more events.
    pub fn run(&mut self) -> SimResult {
        self.run_until(None)
    }

    /// Run until there are no more events or the next event would occur
    /// after `limit`.
    ///
    /// Components are finished once the queue is empty. Stopping at `limit`
    /// only pauses the run: call `run_until` again to continue or
    /// [`finish`](Self::finish) to end it there. An error from a handler
    /// aborts the run and is returned as is.
    pub fn run_until(&mut self, limit: Option<SimTime>) -> SimResult {
        if !self.initialized {
            self.initialized = true;
            self.initialize()?;
        }

        while let Some(time) = self.queue.peek_time() {
            if let Some(limit) = limit.filter(|limit| time > *limit) {
                self.now = limit;
                return Ok(());
            }

            let Some(event) = self.queue.pop() else {
                break;
            };
            if event.key.time > self.now {
                self.now = event.key.time;
                set_time!(self.toplevel ; self.now.as_ns());
            }

            let component = self.components[event.target].clone();
            let mut ctx = Context {
                now: self.now,
                current: event.target,
                components: &self.components,
                queue: &mut self.queue,
                links: &mut self.links,
            };
            component.handle(&mut ctx, event.arrival, event.msg)?;
        }

        self.finish();
        Ok(())
    }

    fn initialize(&mut self) -> SimResult {
        for id in 0..self.components.len() {
            let component = self.components[id].clone();
            let mut ctx = Context {
                now: self.now,
                current: id,
                components: &self.components,
                queue: &mut self.queue,
                links: &mut self.links,
            };
            component.initialize(&mut ctx)?;
        }
        Ok(())
    }

    /// End the run at the current time. Each component is finished at most
    /// once however many times this is called.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        for id in 0..self.components.len() {
            let component = self.components[id].clone();
            let ctx = Context {
                now: self.now,
                current: id,
                components: &self.components,
                queue: &mut self.queue,
                links: &mut self.links,
            };
            component.finish(&ctx);
        }
    }
}

/// The view of the engine given to a component while it handles an event.
pub struct Context<'a, M>
where
    M: SimObject,
{
    now: SimTime,
    current: ComponentId,
    components: &'a [Rc<dyn Component<M>>],
    queue: &'a mut EventQueue<M>,
    links: &'a mut HashMap<GateRef, Link>,
}

impl<M> Context<'_, M>
where
    M: SimObject,
{
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Id of the component handling the event.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.current
    }

    fn link(&self, gate: usize) -> Option<&Link> {
        self.links.get(&GateRef::new(self.current, gate))
    }

    #[must_use]
    pub fn is_connected(&self, gate: usize) -> bool {
        self.link(gate).is_some()
    }

    /// Whether the channel on `gate` is still transmitting.
    #[must_use]
    pub fn is_busy(&self, gate: usize) -> bool {
        self.link(gate).is_some_and(|link| link.busy_until > self.now)
    }

    /// The time at which the channel on `gate` finishes its current (or
    /// last) transmission.
    #[must_use]
    pub fn transmission_finish_time(&self, gate: usize) -> Option<SimTime> {
        self.link(gate).map(|link| link.busy_until)
    }

    /// The data rate of the channel on `gate`, if it models one.
    #[must_use]
    pub fn datarate_bps(&self, gate: usize) -> Option<f64> {
        self.link(gate).and_then(|link| link.channel.datarate_bps)
    }

    /// Send a message out of one of this component's output gates.
    pub fn send(&mut self, gate: usize, msg: M) -> SimResult {
        let now = self.now;
        let name = &self.components[self.current];
        let Some(link) = self.links.get_mut(&GateRef::new(self.current, gate)) else {
            return sim_error!(format!(
                "{}: send of {msg} on unconnected gate {gate}",
                name.entity()
            ));
        };

        let duration = link.channel.transmission_time(msg.total_bytes());
        let mut arrival_time = now;
        if !duration.is_zero() {
            if link.busy_until > now {
                return Err(SimError(format!(
                    "{}: send of {msg} on gate {gate} while busy until {}",
                    name.entity(),
                    link.busy_until
                )));
            }
            link.busy_until = now + duration;
            arrival_time = link.busy_until;
        }
        arrival_time += link.channel.delay;

        let to = link.to;
        self.queue.push(
            arrival_time,
            msg.priority(),
            to.component,
            Arrival::Gate(to.gate),
            msg,
        );
        Ok(())
    }

    /// Deliver a message back to this component at the current time.
    pub fn send_self(&mut self, msg: M) {
        self.queue.push(
            self.now,
            msg.priority(),
            self.current,
            Arrival::SelfMessage,
            msg,
        );
    }

    /// Deliver a message back to this component at time `at`.
    pub fn schedule_self(&mut self, at: SimTime, msg: M) -> SimResult {
        if at < self.now {
            return sim_error!(format!(
                "{}: cannot schedule {msg} in the past ({at} < {})",
                self.components[self.current].entity(),
                self.now
            ));
        }
        self.queue
            .push(at, msg.priority(), self.current, Arrival::SelfMessage, msg);
        Ok(())
    }
}
