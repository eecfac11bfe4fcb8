// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Models built around the NoC router.
//!
//! A [`TrafficSource`](source::TrafficSource) and a
//! [`LatencySink`](sink::LatencySink) sit on the core port of each router,
//! and [`build_mesh`](mesh::build_mesh) connects a complete 2D mesh from a
//! [`MeshConfig`](noc_config::MeshConfig).

pub mod mesh;
pub mod sink;
pub mod source;
