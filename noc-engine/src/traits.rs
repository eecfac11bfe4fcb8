// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A set of common traits used across the simulation engine.

use std::fmt::{Debug, Display};
use std::rc::Rc;

use noc_track::entity::Entity;

use crate::engine::Context;
use crate::types::{Arrival, Priority, SimResult};

/// The `TotalBytes` trait is used to determine how many bytes an object
/// represents. A message of zero bytes takes no time on a channel.
pub trait TotalBytes {
    fn total_bytes(&self) -> usize;
}

/// The priority at which a message is delivered relative to other messages
/// arriving at the same time.
pub trait Prioritised {
    fn priority(&self) -> Priority;
}

/// Super-trait that objects passed between components must implement.
pub trait SimObject: TotalBytes + Prioritised + Debug + Display + 'static {}

impl<T> SimObject for T where T: TotalBytes + Prioritised + Debug + Display + 'static {}

/// A component registered with the [`Engine`](crate::engine::Engine).
///
/// Components are shared as `Rc<Self>` so that models and tests can keep a
/// handle to them; any state they mutate lives behind a `RefCell`.
pub trait Component<M>
where
    M: SimObject,
{
    fn entity(&self) -> &Rc<Entity>;

    /// Called once before the first event is handled.
    fn initialize(&self, _ctx: &mut Context<M>) -> SimResult {
        Ok(())
    }

    /// Handle a single event. An error aborts the simulation.
    fn handle(&self, ctx: &mut Context<M>, arrival: Arrival, msg: M) -> SimResult;

    /// Called when the simulation ends so that statistics can be finalised.
    fn finish(&self, _ctx: &Context<M>) {}
}
