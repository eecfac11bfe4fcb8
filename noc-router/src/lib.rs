// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The datapath of a wormhole-switched NoC router.
//!
//! A [`Router`](router::Router) has one [`InPort`](in_port::InPort) and one
//! [`Scheduler`](scheduler::Scheduler) per port. Packets are routed with
//! dimension-order [routing], given an output VC by a
//! [`VcAllocator`](vc_alloc::VcAllocator) and cross the router one flit per
//! grant. Buffer space is accounted for with credits: a scheduler only
//! grants a flit on a VC with at least one credit, and each flit leaving
//! an input buffer returns one credit to the upstream partner.
//!
//! Any violation of the flit protocol (interleaved packets, out of order
//! flits, buffer overflow, inconsistent handshake) is reported as a
//! [`SimError`](noc_engine::types::SimError) which ends the simulation.

pub mod in_port;
pub mod router;
pub mod routing;
pub mod scheduler;
pub mod stats;
pub mod types;
pub mod vc_alloc;
