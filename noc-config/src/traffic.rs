// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Traffic generation configuration.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, config_error};

/// Destination of the messages generated by a source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Always send to the given core.
    Fixed(usize),

    /// Pick a core other than the source uniformly at random per message.
    #[default]
    UniformRandom,

    /// The source does not generate any traffic.
    Off,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrafficConfig {
    /// Generation interval per flit; a packet is generated every
    /// `packet_length_flits * flit_arrival_delay_ns`.
    pub flit_arrival_delay_ns: f64,

    pub packet_length_flits: usize,

    /// Consecutive packets sent to the same destination.
    pub message_length_packets: usize,

    /// Packets generated while the source queue is full are dropped.
    pub max_queued_packets: usize,

    pub destination: Destination,

    /// VC on which packets are injected into the router.
    pub injection_vc: usize,

    /// Inject on a clock derived from the link rate rather than as soon as
    /// a credit and the link are available.
    pub synchronous: bool,

    /// Stop generating after this many packets.
    pub packets_per_source: Option<usize>,

    /// Seed of the random destination generator.
    pub seed: u64,

    /// File of packet inter-arrival times in ns, one per line, used instead
    /// of `flit_arrival_delay_ns`.
    pub trace_file: Option<String>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            flit_arrival_delay_ns: 4.0,
            packet_length_flits: 4,
            message_length_packets: 1,
            max_queued_packets: 8,
            destination: Destination::default(),
            injection_vc: 0,
            synchronous: true,
            packets_per_source: Some(50),
            seed: 1,
            trace_file: None,
        }
    }
}

impl TrafficConfig {
    pub fn validate(&self, num_cores: usize, num_vcs: usize) -> Result<(), ConfigError> {
        if self.packet_length_flits == 0 {
            return config_error!("traffic.packet_length_flits must be at least 1");
        }
        if self.message_length_packets == 0 {
            return config_error!("traffic.message_length_packets must be at least 1");
        }
        if self.max_queued_packets == 0 {
            return config_error!("traffic.max_queued_packets must be at least 1");
        }
        if self.trace_file.is_none() && self.flit_arrival_delay_ns <= 0.0 {
            return config_error!("traffic.flit_arrival_delay_ns must be positive");
        }
        if self.injection_vc >= num_vcs {
            return config_error!(
                "traffic.injection_vc {} out of range for {num_vcs} VCs",
                self.injection_vc
            );
        }
        match self.destination {
            Destination::Fixed(dst) if dst >= num_cores => {
                config_error!("traffic.destination {dst} out of range for {num_cores} cores")
            }
            Destination::UniformRandom if num_cores < 2 => {
                config_error!("traffic.destination uniform_random needs at least 2 cores")
            }
            _ => Ok(()),
        }
    }
}
