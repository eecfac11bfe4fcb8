// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;

// Simulation errors

#[macro_export]
/// Build a [SimError] from a message that supports `to_string`
macro_rules! sim_error {
    ($msg:expr) => {
        Err($crate::types::SimError($msg.to_string()))
    };
}

/// The `SimError` is what should be returned in the case of an error
#[derive(Debug, Clone, PartialEq)]
pub struct SimError(pub String);

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl Error for SimError {}

/// The SimResult is the return type for most simulation functions
pub type SimResult = Result<(), SimError>;

/// Index of a component registered with the [`Engine`](crate::engine::Engine).
pub type ComponentId = usize;

/// One end of a connection: a numbered gate of a registered component.
///
/// Output gates and input gates are numbered independently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GateRef {
    pub component: ComponentId,
    pub gate: usize,
}

impl GateRef {
    #[must_use]
    pub const fn new(component: ComponentId, gate: usize) -> Self {
        Self { component, gate }
    }
}

impl fmt::Display for GateRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.gate)
    }
}

/// How a message reached the component handling it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arrival {
    /// Delivered through a connection to the given input gate.
    Gate(usize),

    /// Scheduled by the component for itself.
    SelfMessage,
}

/// Scheduling priority used to order events that occur at the same time.
///
/// Lower values are handled first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Credits, requests, grants and acknowledgements.
    Control = 0,

    /// Data flits.
    Data = 1,

    /// Clock ticks and other timers.
    Clock = 2,
}
