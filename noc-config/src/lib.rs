// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Configuration of a NoC simulation.
//!
//! Values are read once at start-up and fixed for the whole run. They are
//! layered in the following order, later sources overriding earlier ones:
//!
//!  1. the `Default` implementations in this crate,
//!  2. an optional TOML file,
//!  3. environment variables prefixed with `NOC_`, using `__` to separate
//!     nested keys (e.g. `NOC_ROUTER__NUM_VCS=4`),
//!
//! and finally the command-line options of the binary in use.

use std::fmt;

pub mod mesh;
pub mod router;
pub mod traffic;

pub use mesh::{LinkConfig, MeshConfig, SinkConfig};
pub use router::{Arbitration, Clocking, RequestQueue, RouterConfig};
pub use traffic::{Destination, TrafficConfig};

/// Prefix of the environment variables read by [`MeshConfig::load`].
pub const ENV_PREFIX: &str = "NOC_";

/// Error returned when configuration cannot be read or is invalid.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError(e.to_string())
    }
}

/// Build a [`ConfigError`] result from a message.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        Err($crate::ConfigError(format!($($arg)+)))
    };
}
