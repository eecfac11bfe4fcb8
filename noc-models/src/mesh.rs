// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Build a 2D mesh of routers, each with a traffic source and a sink on its
//! core port.
//!
//! Routers are numbered row by row. Port 0 of every router faces its core;
//! the other ports face the neighbours that exist, in the order north,
//! east, south, west. Flits travel over links with the configured data rate
//! and delay. Credits travel over links with the same delay and no rate.

use std::fmt;
use std::rc::Rc;

use noc_config::MeshConfig;
use noc_engine::channel::Channel;
use noc_engine::connect_port;
use noc_engine::engine::Engine;
use noc_engine::sim_error;
use noc_engine::time::simtime::SimTime;
use noc_engine::types::SimError;
use noc_router::router::Router;
use noc_router::routing::{Coord, Direction};
use noc_router::stats::Accumulator;
use noc_router::types::NocMsg;
use noc_track::entity::Entity;

use crate::sink::LatencySink;
use crate::source::TrafficSource;

const LINK_DIRECTIONS: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

/// The neighbour of `id` in `direction`, if it is inside the mesh.
#[must_use]
pub fn neighbour(id: usize, direction: Direction, rows: usize, columns: usize) -> Option<usize> {
    let Coord { row, col } = Coord::of(id, columns);
    match direction {
        Direction::Core => Some(id),
        Direction::North if row + 1 < rows => Some(id + columns),
        Direction::East if col + 1 < columns => Some(id + 1),
        Direction::South if row > 0 => Some(id - columns),
        Direction::West if col > 0 => Some(id - 1),
        _ => None,
    }
}

/// The direction faced by each port of router `id`.
#[must_use]
pub fn port_directions(id: usize, rows: usize, columns: usize) -> Vec<Direction> {
    let mut ports = vec![Direction::Core];
    ports.extend(
        LINK_DIRECTIONS
            .into_iter()
            .filter(|d| neighbour(id, *d, rows, columns).is_some()),
    );
    ports
}

pub struct Mesh {
    pub entity: Rc<Entity>,
    pub routers: Vec<Rc<Router>>,
    pub sources: Vec<Rc<TrafficSource>>,
    pub sinks: Vec<Rc<LatencySink>>,
}

/// Totals over all the sources and sinks of a mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshSummary {
    pub generated: u64,
    pub dropped: u64,
    pub sent_packets: u64,
    pub received_packets: u64,
    pub received_flits: u64,
    pub end_to_end: Accumulator,
    pub network: Accumulator,
    pub packet: Accumulator,
}

impl fmt::Display for MeshSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "packets: generated={} dropped={} sent={} received={} ({} flits)",
            self.generated,
            self.dropped,
            self.sent_packets,
            self.received_packets,
            self.received_flits
        )?;
        writeln!(f, "end-to-end latency (ns): {}", self.end_to_end)?;
        writeln!(f, "network latency (ns): {}", self.network)?;
        write!(f, "packet latency (ns): {}", self.packet)
    }
}

impl Mesh {
    #[must_use]
    pub fn summary(&self) -> MeshSummary {
        let mut summary = MeshSummary::default();
        for source in &self.sources {
            let stats = source.stats();
            summary.generated += stats.generated;
            summary.dropped += stats.dropped;
            summary.sent_packets += stats.sent_packets;
        }
        for sink in &self.sinks {
            let stats = sink.stats();
            summary.received_packets += stats.received_packets;
            summary.received_flits += stats.received_flits;
            summary.end_to_end.merge(&stats.end_to_end);
            summary.network.merge(&stats.network);
            summary.packet.merge(&stats.packet);
        }
        summary
    }
}

/// Create and connect all the routers, sources and sinks of a mesh.
pub fn build_mesh(engine: &mut Engine<NocMsg>, config: &MeshConfig) -> Result<Mesh, SimError> {
    if let Err(e) = config.validate() {
        return sim_error!(e.to_string());
    }
    let (rows, columns) = (config.rows, config.columns);
    let num_cores = config.num_cores();
    let entity = Rc::new(Entity::new(engine.top(), "mesh"));

    let delay = SimTime::from_ns(config.link.delay_ns);
    let flit_link = Channel::with_datarate(config.link.datarate_gbps, delay);
    let credit_link = Channel::with_delay(delay);

    let mut routers = Vec::with_capacity(num_cores);
    let mut sources = Vec::with_capacity(num_cores);
    let mut sinks = Vec::with_capacity(num_cores);
    for id in 0..num_cores {
        let ports = port_directions(id, rows, columns);
        routers.push(Router::new_and_register(
            engine,
            &entity,
            &format!("router{id}"),
            id,
            columns,
            &ports,
            &config.router,
        )?);
        sources.push(TrafficSource::new_and_register(
            engine,
            &entity,
            &format!("source{id}"),
            id,
            num_cores,
            config.router.flit_size_bytes,
            &config.traffic,
        )?);
        sinks.push(LatencySink::new_and_register(
            engine,
            &entity,
            &format!("sink{id}"),
            id,
            config.router.num_vcs,
            config.sink.initial_credits,
            SimTime::from_ns(config.router.stat_start_ns),
        ));
    }

    for id in 0..num_cores {
        let router = &routers[id];
        let Some(core) = router.port_for(Direction::Core) else {
            return sim_error!(format!("router {id} has no core port"));
        };
        connect_port!(engine, flit_link ; sources[id], tx => router, rx, core)?;
        connect_port!(engine, credit_link ; router, credit_tx, core => sources[id], credit_rx)?;
        connect_port!(engine, flit_link ; router, tx, core => sinks[id], rx)?;
        connect_port!(engine, credit_link ; sinks[id], credit_tx => router, credit_rx, core)?;

        // Each router drives its own outgoing links; the neighbour returns
        // the credits of its input buffer.
        for direction in LINK_DIRECTIONS {
            let Some(other_id) = neighbour(id, direction, rows, columns) else {
                continue;
            };
            let other = &routers[other_id];
            let (Some(out_port), Some(in_port)) =
                (router.port_for(direction), other.port_for(direction.opposite()))
            else {
                return sim_error!(format!(
                    "routers {id} and {other_id} are not connected {direction}"
                ));
            };
            connect_port!(engine, flit_link ; router, tx, out_port => other, rx, in_port)?;
            connect_port!(engine, credit_link ; other, credit_tx, in_port => router, credit_rx, out_port)?;
        }
    }

    Ok(Mesh {
        entity,
        routers,
        sources,
        sinks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_and_centre_ports() {
        assert_eq!(
            port_directions(0, 3, 3),
            vec![Direction::Core, Direction::North, Direction::East]
        );
        assert_eq!(port_directions(4, 3, 3).len(), 5);
        assert_eq!(
            port_directions(8, 3, 3),
            vec![Direction::Core, Direction::South, Direction::West]
        );
        assert_eq!(port_directions(0, 1, 1), vec![Direction::Core]);
    }

    #[test]
    fn neighbours_are_symmetric() {
        let (rows, columns) = (3, 4);
        for id in 0..rows * columns {
            for direction in LINK_DIRECTIONS {
                if let Some(other) = neighbour(id, direction, rows, columns) {
                    assert_eq!(
                        neighbour(other, direction.opposite(), rows, columns),
                        Some(id)
                    );
                }
            }
        }
        assert_eq!(neighbour(3, Direction::East, rows, columns), None);
        assert_eq!(neighbour(4, Direction::East, rows, columns), Some(5));
    }
}
