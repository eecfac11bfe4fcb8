// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A single-threaded discrete-event simulation engine.
//!
//! Components implement [`Component`](traits::Component) and are registered
//! with the [`Engine`](engine::Engine). Their gates are connected through
//! [`Channel`](channel::Channel)s which can model a propagation delay and a
//! data rate. Components never block: anything that has to wait schedules a
//! message to itself.

pub mod channel;
pub mod engine;
pub mod queue;
pub mod test_helpers;
pub mod time;
pub mod traits;
pub mod types;

pub use paste::paste;

/// Run the simulation and panic if it fails.
///
/// With a second argument, run the simulation and check that it fails with
/// the given error message.
#[macro_export]
macro_rules! run_simulation {
    ($engine:expr) => {
        $engine.run().unwrap();
    };
    ($engine:expr, $expected:expr) => {
        match $engine.run() {
            Ok(()) => panic!("Expected an error"),
            Err(e) => assert_eq!(e.to_string(), $expected),
        }
    };
}

/// Connect an output gate of one component to an input gate of another.
///
/// The components provide `port_<name>()` (or `port_<name>_i(index)` for
/// arrays of gates) returning a [`GateRef`](types::GateRef).
///
/// ```rust,ignore
/// connect_port!(engine, channel ; source, tx => router, rx, core_port)?;
/// ```
#[macro_export]
macro_rules! connect_port {
    ($engine:expr, $channel:expr ; $from:expr, $from_port:ident => $to:expr, $to_port:ident) => {
        $crate::paste! {
            $engine.connect($from.[< port_ $from_port >](), $to.[< port_ $to_port >](), $channel)
        }
    };
    ($engine:expr, $channel:expr ; $from:expr, $from_port:ident, $from_index:expr => $to:expr, $to_port:ident) => {
        $crate::paste! {
            $engine.connect($from.[< port_ $from_port _i >]($from_index), $to.[< port_ $to_port >](), $channel)
        }
    };
    ($engine:expr, $channel:expr ; $from:expr, $from_port:ident => $to:expr, $to_port:ident, $to_index:expr) => {
        $crate::paste! {
            $engine.connect($from.[< port_ $from_port >](), $to.[< port_ $to_port _i >]($to_index), $channel)
        }
    };
    ($engine:expr, $channel:expr ; $from:expr, $from_port:ident, $from_index:expr => $to:expr, $to_port:ident, $to_index:expr) => {
        $crate::paste! {
            $engine.connect($from.[< port_ $from_port _i >]($from_index), $to.[< port_ $to_port _i >]($to_index), $channel)
        }
    };
}
