// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Channels between an output gate and an input gate.
//!
//! A channel adds a propagation delay and, optionally, models a data rate.
//! With a data rate, a message occupies the channel for `8 * bytes / rate`
//! and is delivered at the end of its transmission plus the delay. Sending
//! a non-empty message while the channel is still transmitting is an error.

use crate::time::simtime::SimTime;
use crate::types::GateRef;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Channel {
    pub delay: SimTime,
    pub datarate_bps: Option<f64>,
}

impl Channel {
    /// A channel that delivers immediately and never becomes busy.
    #[must_use]
    pub fn ideal() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delay(delay: SimTime) -> Self {
        Self {
            delay,
            datarate_bps: None,
        }
    }

    #[must_use]
    pub fn with_datarate(datarate_gbps: f64, delay: SimTime) -> Self {
        Self {
            delay,
            datarate_bps: Some(datarate_gbps * 1.0e9),
        }
    }

    /// Time taken to transmit `bytes`. Zero when the channel has no rate.
    #[must_use]
    pub fn transmission_time(&self, bytes: usize) -> SimTime {
        match self.datarate_bps {
            Some(rate) if bytes > 0 => SimTime::from_secs_f64(8.0 * bytes as f64 / rate),
            _ => SimTime::ZERO,
        }
    }
}

/// A connection from an output gate.
#[derive(Debug)]
pub(crate) struct Link {
    pub to: GateRef,
    pub channel: Channel,
    pub busy_until: SimTime,
}

impl Link {
    pub(crate) fn new(to: GateRef, channel: Channel) -> Self {
        Self {
            to,
            channel,
            busy_until: SimTime::ZERO,
        }
    }
}
