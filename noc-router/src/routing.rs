// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Dimension-order (XY) routing on a 2D mesh.
//!
//! Core ids are laid out row by row: `row = id / columns`,
//! `col = id % columns`. Packets first travel along the row (east/west)
//! until they reach the destination column, then along the column
//! (north/south). North is the direction of increasing row.

use std::fmt;

use noc_engine::sim_error;
use noc_engine::types::SimError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Core,
    North,
    East,
    South,
    West,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Direction::Core => "core",
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        write!(f, "{name}")
    }
}

impl Direction {
    /// The direction a neighbour sees this router in.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Core => Direction::Core,
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    #[must_use]
    pub fn of(id: usize, columns: usize) -> Self {
        Self {
            row: id / columns,
            col: id % columns,
        }
    }
}

/// XY routing for one router.
///
/// The router's ports are described by the direction each one faces; a
/// direction without a port is a mesh edge.
#[derive(Clone, Debug)]
pub struct XyRouting {
    local: Coord,
    columns: usize,
    port_of: [Option<usize>; 5],
}

fn slot(direction: Direction) -> usize {
    match direction {
        Direction::Core => 0,
        Direction::North => 1,
        Direction::East => 2,
        Direction::South => 3,
        Direction::West => 4,
    }
}

impl XyRouting {
    /// `ports[i]` is the direction faced by router port `i`.
    pub fn new(router_id: usize, columns: usize, ports: &[Direction]) -> Result<Self, SimError> {
        if columns == 0 {
            return sim_error!("XY routing needs at least one column");
        }
        let mut port_of = [None; 5];
        for (port, direction) in ports.iter().enumerate() {
            if port_of[slot(*direction)].replace(port).is_some() {
                return sim_error!(format!(
                    "router {router_id} has more than one {direction} port"
                ));
            }
        }
        Ok(Self {
            local: Coord::of(router_id, columns),
            columns,
            port_of,
        })
    }

    #[must_use]
    pub fn port_for(&self, direction: Direction) -> Option<usize> {
        self.port_of[slot(direction)]
    }

    /// The direction a packet for `dst_id` leaves in.
    #[must_use]
    pub fn direction(&self, dst_id: usize) -> Direction {
        let dst = Coord::of(dst_id, self.columns);
        if dst.col > self.local.col {
            Direction::East
        } else if dst.col < self.local.col {
            Direction::West
        } else if dst.row > self.local.row {
            Direction::North
        } else if dst.row < self.local.row {
            Direction::South
        } else {
            Direction::Core
        }
    }

    /// The output port for a packet addressed to `dst_id`.
    pub fn route(&self, dst_id: usize) -> Result<usize, SimError> {
        let direction = self.direction(dst_id);
        match self.port_for(direction) {
            Some(port) => Ok(port),
            None => sim_error!(format!(
                "routing dead end: no {direction} port at ({}, {}) towards {dst_id}",
                self.local.row, self.local.col
            )),
        }
    }
}
