// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Requests waiting for an output VC to become free.

use std::collections::VecDeque;

use noc_config::RequestQueue;

use crate::types::{PacketId, Request};

/// Pending requests of one output port, with the selected queueing
/// discipline.
#[derive(Debug)]
pub enum RequestPool {
    /// One FIFO for all output VCs. The oldest request for a VC wins.
    Shared(VecDeque<(usize, Request)>),

    /// One FIFO per (output VC, input port). Input ports are served in
    /// round-robin order starting after the last port served on that VC.
    PerInput {
        queues: Vec<Vec<VecDeque<Request>>>,
        last_port: Vec<usize>,
    },
}

impl RequestPool {
    #[must_use]
    pub fn new(discipline: RequestQueue, num_vcs: usize, num_in_ports: usize) -> Self {
        match discipline {
            RequestQueue::Shared => RequestPool::Shared(VecDeque::new()),
            RequestQueue::PerInput => RequestPool::PerInput {
                queues: (0..num_vcs)
                    .map(|_| (0..num_in_ports).map(|_| VecDeque::new()).collect())
                    .collect(),
                last_port: vec![num_in_ports.saturating_sub(1); num_vcs],
            },
        }
    }

    /// Queue a request. Returns it back if it cannot be queued.
    pub fn push(&mut self, in_port: usize, request: Request) -> Result<(), Request> {
        match self {
            RequestPool::Shared(queue) => {
                queue.push_back((in_port, request));
                Ok(())
            }
            RequestPool::PerInput { queues, .. } => {
                match queues
                    .get_mut(request.output_vc)
                    .and_then(|per_vc| per_vc.get_mut(in_port))
                {
                    Some(queue) => {
                        queue.push_back(request);
                        Ok(())
                    }
                    None => Err(request),
                }
            }
        }
    }

    /// Remove the next request for `vc` together with its input port.
    pub fn take(&mut self, vc: usize) -> Option<(usize, Request)> {
        match self {
            RequestPool::Shared(queue) => {
                let index = queue.iter().position(|(_, r)| r.output_vc == vc)?;
                queue.remove(index)
            }
            RequestPool::PerInput { queues, last_port } => {
                let per_vc = queues.get_mut(vc)?;
                let num_ports = per_vc.len();
                for i in 1..=num_ports {
                    let port = (last_port[vc] + i) % num_ports;
                    if let Some(request) = per_vc[port].pop_front() {
                        last_port[vc] = port;
                        return Some((port, request));
                    }
                }
                None
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RequestPool::Shared(queue) => queue.len(),
            RequestPool::PerInput { queues, .. } => queues
                .iter()
                .flat_map(|per_vc| per_vc.iter())
                .map(VecDeque::len)
                .sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a request with this packet id is waiting.
    #[must_use]
    pub fn contains(&self, packet_id: PacketId) -> bool {
        match self {
            RequestPool::Shared(queue) => queue.iter().any(|(_, r)| r.packet_id == packet_id),
            RequestPool::PerInput { queues, .. } => queues
                .iter()
                .flat_map(|per_vc| per_vc.iter())
                .any(|queue| queue.iter().any(|r| r.packet_id == packet_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(out_vc: usize, in_vc: usize, id: u64) -> Request {
        Request::new(0, out_vc, in_vc, id, 1)
    }

    #[test]
    fn shared_takes_oldest_for_vc() {
        let mut pool = RequestPool::new(RequestQueue::Shared, 2, 3);
        pool.push(2, req(1, 0, 10)).unwrap();
        pool.push(0, req(0, 0, 11)).unwrap();
        pool.push(1, req(1, 1, 12)).unwrap();
        assert_eq!(pool.len(), 3);
        assert!(pool.contains(12));

        let (port, r) = pool.take(1).unwrap();
        assert_eq!((port, r.packet_id), (2, 10));
        let (port, r) = pool.take(1).unwrap();
        assert_eq!((port, r.packet_id), (1, 12));
        assert!(pool.take(1).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn per_input_round_robin() {
        let mut pool = RequestPool::new(RequestQueue::PerInput, 1, 3);
        pool.push(2, req(0, 0, 20)).unwrap();
        pool.push(0, req(0, 0, 21)).unwrap();
        pool.push(0, req(0, 1, 22)).unwrap();
        pool.push(1, req(0, 0, 23)).unwrap();

        let order: Vec<(usize, u64)> = std::iter::from_fn(|| pool.take(0))
            .map(|(port, r)| (port, r.packet_id))
            .collect();
        assert_eq!(order, vec![(0, 21), (1, 23), (2, 20), (0, 22)]);
        assert!(pool.is_empty());
    }

    #[test]
    fn per_input_rejects_bad_vc() {
        let mut pool = RequestPool::new(RequestQueue::PerInput, 2, 1);
        assert!(pool.push(0, req(2, 0, 1)).is_err());
        assert!(pool.push(1, req(0, 0, 1)).is_err());
    }
}
