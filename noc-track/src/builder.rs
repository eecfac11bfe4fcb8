// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Library functions to build trackers as defined by the user.

use std::fs;
use std::io::{self, BufWriter};
use std::rc::Rc;

use simplelog::{ConfigBuilder, LevelFilter, SimpleLogger};

use crate::tracker::{
    EntityManager, LogTracker, TextTracker, TrackConfigError, dev_null_tracker,
};
use crate::{Tracker, Writer};

/// Configuration options for a tracker.
pub struct TrackerConfig<'a> {
    /// Enable this tracker.
    pub enable: bool,

    /// Set the level at which this tracker should be enabled.
    pub level: log::Level,

    /// A regular expression to match which entities should have this level
    /// applied. All other entities only emit errors.
    pub filter_regex: &'a str,

    /// If required, the name of the file to which the tracker will write.
    pub file: Option<&'a str>,
}

impl Default for TrackerConfig<'_> {
    fn default() -> Self {
        Self {
            enable: true,
            level: log::Level::Warn,
            filter_regex: "",
            file: None,
        }
    }
}

fn build_entity_manager(config: &TrackerConfig) -> Result<EntityManager, TrackConfigError> {
    let default_level = if config.filter_regex.is_empty() {
        config.level
    } else {
        log::Level::Error
    };

    let mut entity_manager = EntityManager::new(default_level);
    if !config.filter_regex.is_empty() {
        entity_manager.add_entity_level_filter(config.filter_regex, config.level)?;
    }
    Ok(entity_manager)
}

/// Create a text tracker that writes to the configured file, or to stdout if
/// no file is given. A disabled configuration gives a tracker that drops
/// everything.
pub fn setup_tracker(config: &TrackerConfig) -> Result<Tracker, TrackConfigError> {
    if !config.enable {
        return Ok(dev_null_tracker());
    }

    let entity_manager = build_entity_manager(config)?;
    let writer: Writer = match config.file {
        Some(file) => {
            let file = fs::File::create(file).map_err(|e| {
                TrackConfigError(format!("Unable to create log file '{file}': {e}"))
            })?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(Rc::new(TextTracker::new(entity_manager, writer)))
}

/// Create a tracker that forwards to the `log` facade and install a
/// `simplelog` logger at the configured level to print the messages.
///
/// Can only be called once per process as the logger is global.
pub fn setup_log_tracker(config: &TrackerConfig) -> Result<Tracker, TrackConfigError> {
    if !config.enable {
        return Ok(dev_null_tracker());
    }

    let entity_manager = build_entity_manager(config)?;
    let logger_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    SimpleLogger::init(config.level.to_level_filter(), logger_config)
        .map_err(|e| TrackConfigError(format!("Unable to install logger: {e}")))?;

    Ok(Rc::new(LogTracker::new(entity_manager)))
}
