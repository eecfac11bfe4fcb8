// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Configuration of a complete mesh and how it is loaded.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::router::RouterConfig;
use crate::traffic::TrafficConfig;
use crate::{ConfigError, ENV_PREFIX, config_error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub datarate_gbps: f64,
    pub delay_ns: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            datarate_gbps: 32.0,
            delay_ns: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    /// Credits per VC advertised by each sink at start-up.
    pub initial_credits: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            initial_credits: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshConfig {
    pub rows: usize,
    pub columns: usize,
    pub router: RouterConfig,
    pub link: LinkConfig,
    pub traffic: TrafficConfig,
    pub sink: SinkConfig,

    /// Stop the simulation at this time even if events remain.
    pub finish_ns: Option<f64>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            columns: 3,
            router: RouterConfig::default(),
            link: LinkConfig::default(),
            traffic: TrafficConfig::default(),
            sink: SinkConfig::default(),
            finish_ns: None,
        }
    }
}

impl MeshConfig {
    #[must_use]
    pub fn num_cores(&self) -> usize {
        self.rows * self.columns
    }

    fn figment_with_defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(MeshConfig::default()))
    }

    fn figment_conf_file_merge(config: Figment, conf_file: &Path) -> Figment {
        config.merge(Toml::file(conf_file))
    }

    fn figment_env_var_merge(config: Figment) -> Figment {
        config.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// The layered configuration sources, before extraction.
    pub fn figment(conf_file: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut config = Self::figment_with_defaults();
        if let Some(conf_file) = conf_file {
            if !conf_file.is_file() {
                return config_error!("configuration file {} not found", conf_file.display());
            }
            config = Self::figment_conf_file_merge(config, conf_file);
        }
        Ok(Self::figment_env_var_merge(config))
    }

    /// Load from the defaults, the optional file and the environment, then
    /// validate.
    pub fn load(conf_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: MeshConfig = Self::figment(conf_file)?.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.columns == 0 {
            return config_error!(
                "mesh must have at least one row and column, got {}x{}",
                self.rows,
                self.columns
            );
        }
        if self.num_cores() > 1 << 16 {
            return config_error!("mesh of {} cores is too large", self.num_cores());
        }
        if self.link.datarate_gbps <= 0.0 {
            return config_error!("link.datarate_gbps must be positive");
        }
        if self.link.delay_ns < 0.0 {
            return config_error!("link.delay_ns must not be negative");
        }
        if self.sink.initial_credits == 0 {
            return config_error!("sink.initial_credits must be at least 1");
        }
        self.router.validate()?;
        self.traffic
            .validate(self.num_cores(), self.router.num_vcs)
    }
}
