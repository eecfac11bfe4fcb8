// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Event queue with deterministic ordering.
//!
//! Events are ordered by:
//! 1. Time (earlier first)
//! 2. [`Priority`] (control before data before clock ticks)
//! 3. Sequence number (FIFO for the same time and priority)

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::time::simtime::SimTime;
use crate::types::{Arrival, ComponentId, Priority};

/// Key for ordering events in the queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    pub time: SimTime,
    pub priority: Priority,
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.priority.cmp(&other.priority))
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A message waiting to be delivered to a component.
#[derive(Debug)]
pub struct Event<M> {
    pub key: EventKey,
    pub target: ComponentId,
    pub arrival: Arrival,
    pub msg: M,
}

impl<M> PartialEq for Event<M> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<M> Eq for Event<M> {}

impl<M> Ord for Event<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, the earliest key must compare greatest
        other.key.cmp(&self.key)
    }
}

impl<M> PartialOrd for Event<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending events. Each event owns its message until it is delivered, so
/// dropping the queue releases every undelivered message exactly once.
pub struct EventQueue<M> {
    heap: BinaryHeap<Event<M>>,
    next_sequence: u64,
}

impl<M> Default for EventQueue<M> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }
}

impl<M> EventQueue<M> {
    pub fn push(
        &mut self,
        time: SimTime,
        priority: Priority,
        target: ComponentId,
        arrival: Arrival,
        msg: M,
    ) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Event {
            key: EventKey {
                time,
                priority,
                sequence,
            },
            target,
            arrival,
            msg,
        });
    }

    pub fn pop(&mut self) -> Option<Event<M>> {
        self.heap.pop()
    }

    #[must_use]
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.key.time)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
