// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Messages exchanged by routers and their link partners.
//!
//! Flits and requests are moved between queues by value and are never
//! cloned, so each one has exactly one owner at any time.

use std::fmt;

use noc_engine::time::simtime::SimTime;
use noc_engine::traits::{Prioritised, TotalBytes};
use noc_engine::types::Priority;

/// Packet identifier, `(source << 16) + packet index`.
pub type PacketId = u64;

/// Build the identifier of the `index`th packet of a source. Indices start
/// at 1 so that no packet has id 0.
#[must_use]
pub fn packet_id(src_id: usize, index: u64) -> PacketId {
    ((src_id as u64) << 16) + index
}

/// Position of a flit within its packet.
///
/// A single-flit packet is made of one `Head` flit which is also its tail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlitRole {
    Head,
    Body,
    Tail,
}

impl FlitRole {
    #[must_use]
    pub fn for_index(flit_index: usize, total_flits: usize) -> Self {
        if flit_index == 0 {
            FlitRole::Head
        } else if flit_index + 1 == total_flits {
            FlitRole::Tail
        } else {
            FlitRole::Body
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Flit {
    pub packet_id: PacketId,
    pub flit_index: usize,
    pub total_flits: usize,
    pub role: FlitRole,

    /// VC on the link the flit is travelling on.
    pub vc: usize,

    pub src_id: usize,
    pub dst_id: usize,
    pub size_bytes: usize,

    pub created_at: SimTime,
    pub injected_at: Option<SimTime>,

    /// Set by the first router input port the flit reaches.
    pub first_network_at: Option<SimTime>,
}

impl Flit {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        packet_id: PacketId,
        flit_index: usize,
        total_flits: usize,
        vc: usize,
        src_id: usize,
        dst_id: usize,
        size_bytes: usize,
        created_at: SimTime,
    ) -> Self {
        Self {
            packet_id,
            flit_index,
            total_flits,
            role: FlitRole::for_index(flit_index, total_flits),
            vc,
            src_id,
            dst_id,
            size_bytes,
            created_at,
            injected_at: None,
            first_network_at: None,
        }
    }

    /// Create all the flits of a packet.
    #[must_use]
    pub fn packet(
        packet_id: PacketId,
        total_flits: usize,
        vc: usize,
        src_id: usize,
        dst_id: usize,
        size_bytes: usize,
        created_at: SimTime,
    ) -> Vec<Flit> {
        (0..total_flits)
            .map(|i| {
                Flit::new(
                    packet_id,
                    i,
                    total_flits,
                    vc,
                    src_id,
                    dst_id,
                    size_bytes,
                    created_at,
                )
            })
            .collect()
    }

    #[must_use]
    pub fn is_head(&self) -> bool {
        self.flit_index == 0
    }

    #[must_use]
    pub fn is_tail(&self) -> bool {
        self.flit_index + 1 == self.total_flits
    }
}

impl fmt::Display for Flit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "flit {}.{}:{}/{} vc:{} {}->{}",
            self.packet_id >> 16,
            self.packet_id & 0xffff,
            self.flit_index,
            self.total_flits,
            self.vc,
            self.src_id,
            self.dst_id
        )
    }
}

/// Free buffer slots on one VC returned to the upstream link partner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Credit {
    pub vc: usize,
    pub count: usize,
}

/// A packet waiting for, or holding, an output VC.
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    pub output_port: usize,
    pub output_vc: usize,
    pub input_vc: usize,
    pub packet_id: PacketId,
    pub total_flits: usize,
    pub granted: usize,
    pub acked: usize,
}

impl Request {
    #[must_use]
    pub fn new(
        output_port: usize,
        output_vc: usize,
        input_vc: usize,
        packet_id: PacketId,
        total_flits: usize,
    ) -> Self {
        Self {
            output_port,
            output_vc,
            input_vc,
            packet_id,
            total_flits,
            granted: 0,
            acked: 0,
        }
    }

    #[must_use]
    pub fn is_fully_granted(&self) -> bool {
        self.granted == self.total_flits
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "req {}.{} ivc:{} op:{} ovc:{} granted:{}/{} acked:{}",
            self.packet_id >> 16,
            self.packet_id & 0xffff,
            self.input_vc,
            self.output_port,
            self.output_vc,
            self.granted,
            self.total_flits,
            self.acked
        )
    }
}

/// Permission for an input VC to send one flit on an output VC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grant {
    pub input_vc: usize,
    pub output_vc: usize,
}

/// Answer to a [`Grant`]. `ok == false` is a Nack: no flit was available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ack {
    pub ok: bool,
    pub input_vc: usize,
    pub output_vc: usize,
}

/// Messages that stay within a router.
#[derive(Debug)]
pub enum Internal {
    Request { in_port: usize, request: Request },
    Grant { out_port: usize, in_port: usize, grant: Grant },
    Ack { in_port: usize, out_port: usize, ack: Ack },

    /// A granted flit crossing from an input port to an output scheduler.
    Traverse { in_port: usize, out_port: usize, flit: Flit },
}

/// All messages handled by the NoC components.
#[derive(Debug)]
pub enum NocMsg {
    Flit(Flit),
    Credit(Credit),
    Internal(Internal),

    /// A component timer; the tag is interpreted by its owner.
    Timer(usize),
}

impl TotalBytes for NocMsg {
    fn total_bytes(&self) -> usize {
        match self {
            NocMsg::Flit(flit) => flit.size_bytes,
            _ => 0,
        }
    }
}

impl Prioritised for NocMsg {
    fn priority(&self) -> Priority {
        match self {
            NocMsg::Flit(_) | NocMsg::Internal(Internal::Traverse { .. }) => Priority::Data,
            NocMsg::Credit(_) | NocMsg::Internal(_) => Priority::Control,
            NocMsg::Timer(_) => Priority::Clock,
        }
    }
}

impl fmt::Display for NocMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NocMsg::Flit(flit) => write!(f, "{flit}"),
            NocMsg::Credit(credit) => write!(f, "credit vc:{} x{}", credit.vc, credit.count),
            NocMsg::Internal(Internal::Request { in_port, request }) => {
                write!(f, "{request} from ip:{in_port}")
            }
            NocMsg::Internal(Internal::Grant {
                out_port,
                in_port,
                grant,
            }) => write!(
                f,
                "grant op:{out_port} -> ip:{in_port} ivc:{} ovc:{}",
                grant.input_vc, grant.output_vc
            ),
            NocMsg::Internal(Internal::Ack {
                in_port,
                out_port,
                ack,
            }) => write!(
                f,
                "{} ip:{in_port} -> op:{out_port} ivc:{} ovc:{}",
                if ack.ok { "ack" } else { "nack" },
                ack.input_vc,
                ack.output_vc
            ),
            NocMsg::Internal(Internal::Traverse {
                in_port,
                out_port,
                flit,
            }) => write!(f, "{flit} ip:{in_port} -> op:{out_port}"),
            NocMsg::Timer(tag) => write!(f, "timer {tag}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles() {
        let flits = Flit::packet(packet_id(3, 1), 3, 0, 3, 5, 4, SimTime::ZERO);
        let roles: Vec<FlitRole> = flits.iter().map(|f| f.role).collect();
        assert_eq!(roles, vec![FlitRole::Head, FlitRole::Body, FlitRole::Tail]);
        assert!(flits[0].is_head() && !flits[0].is_tail());
        assert!(flits[2].is_tail());

        let single = Flit::new(packet_id(0, 1), 0, 1, 0, 0, 1, 4, SimTime::ZERO);
        assert_eq!(single.role, FlitRole::Head);
        assert!(single.is_head() && single.is_tail());
    }

    #[test]
    fn ids_and_display() {
        let id = packet_id(2, 7);
        assert_eq!(id, 0x2_0007);
        let flit = Flit::new(id, 1, 4, 1, 2, 8, 4, SimTime::ZERO);
        assert_eq!(format!("{flit}"), "flit 2.7:1/4 vc:1 2->8");
    }

    #[test]
    fn control_is_prioritised() {
        let credit = NocMsg::Credit(Credit { vc: 0, count: 1 });
        let flit = NocMsg::Flit(Flit::new(1, 0, 1, 0, 0, 1, 4, SimTime::ZERO));
        assert!(credit.priority() < flit.priority());
        assert!(flit.priority() < NocMsg::Timer(0).priority());
        assert_eq!(flit.total_bytes(), 4);
        assert_eq!(credit.total_bytes(), 0);
    }
}
