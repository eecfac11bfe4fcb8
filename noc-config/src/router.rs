// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Router configuration.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, config_error};

/// How the scheduler of an output port picks the next VC to serve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Arbitration {
    /// Keep granting the same VC until its packet has been fully granted.
    #[default]
    WinnerTakeAll,

    /// Move on to the next VC after every grant.
    RoundRobin,
}

/// Timing discipline of the output port schedulers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Clocking {
    /// Arbitrate on a periodic clock derived from the link rate.
    #[default]
    Synchronous,

    /// Arbitrate whenever something changes and the link is idle.
    Asynchronous,
}

/// Organisation of the requests waiting for an output VC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RequestQueue {
    /// One FIFO shared by all output VCs and input ports.
    Shared,

    /// One FIFO per (input port, output VC), input ports served in turn.
    PerInput,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Number of virtual channels per port.
    pub num_vcs: usize,

    /// Buffer depth of each input VC, in flits.
    pub flits_per_vc: usize,

    pub flit_size_bytes: usize,

    pub arbitration: Arbitration,

    pub clocking: Clocking,

    /// Keep the synchronous clock ticking even without pending requests.
    pub free_running_clock: bool,

    /// Impose a base clock period on synchronous schedulers.
    pub given_clock_ns: Option<f64>,

    /// Defaults to `per_input` for synchronous and `shared` for asynchronous
    /// schedulers.
    pub request_queue: Option<RequestQueue>,

    /// Statistics are only gathered after this time.
    pub stat_start_ns: f64,

    /// Record per (source, destination) waiting times in the input ports.
    pub collect_per_hop_wait: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            num_vcs: 2,
            flits_per_vc: 4,
            flit_size_bytes: 4,
            arbitration: Arbitration::default(),
            clocking: Clocking::default(),
            free_running_clock: false,
            given_clock_ns: None,
            request_queue: None,
            stat_start_ns: 0.0,
            collect_per_hop_wait: false,
        }
    }
}

impl RouterConfig {
    /// The request queue discipline in effect.
    #[must_use]
    pub fn request_queue(&self) -> RequestQueue {
        self.request_queue.unwrap_or(match self.clocking {
            Clocking::Synchronous => RequestQueue::PerInput,
            Clocking::Asynchronous => RequestQueue::Shared,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_vcs == 0 {
            return config_error!("router.num_vcs must be at least 1");
        }
        if self.flits_per_vc == 0 {
            return config_error!("router.flits_per_vc must be at least 1");
        }
        if self.flit_size_bytes == 0 {
            return config_error!("router.flit_size_bytes must be at least 1");
        }
        if let Some(given) = self.given_clock_ns.filter(|given| *given <= 0.0) {
            return config_error!("router.given_clock_ns must be positive, got {given}");
        }
        if self.stat_start_ns < 0.0 {
            return config_error!("router.stat_start_ns must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_queue_follows_clocking() {
        let mut config = RouterConfig::default();
        assert_eq!(config.request_queue(), RequestQueue::PerInput);
        config.clocking = Clocking::Asynchronous;
        assert_eq!(config.request_queue(), RequestQueue::Shared);
        config.request_queue = Some(RequestQueue::PerInput);
        assert_eq!(config.request_queue(), RequestQueue::PerInput);
    }

    #[test]
    fn invalid_values() {
        let config = RouterConfig {
            num_vcs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RouterConfig {
            given_clock_ns: Some(-1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(RouterConfig::default().validate().is_ok());
    }
}
