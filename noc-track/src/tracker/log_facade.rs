// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::Id;
use crate::tracker::{EntityManager, Track};

/// A tracker that forwards log messages to the [`log`] facade.
///
/// Entity filtering is still performed by the [`EntityManager`]; whatever
/// logger has been installed (see
/// [`setup_log_tracker`](crate::builder::setup_log_tracker)) decides where
/// the text ends up.
pub struct LogTracker {
    entity_manager: EntityManager,
    names: RefCell<HashMap<Id, String>>,
}

impl LogTracker {
    /// Create a new [`LogTracker`] with an [`EntityManager`].
    #[must_use]
    pub fn new(entity_manager: EntityManager) -> Self {
        Self {
            entity_manager,
            names: RefCell::new(HashMap::new()),
        }
    }
}

impl Track for LogTracker {
    fn unique_id(&self) -> Id {
        self.entity_manager.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.entity_manager.is_log_enabled_at_level(id, level)
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        self.entity_manager.add_entity(id, entity_name);
        self.names.borrow_mut().insert(id, entity_name.to_owned());
    }

    fn create(&self, created_by: Id, id: Id, name: &str) {
        log::trace!("{created_by}: created {id}, {name}");
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        log::trace!("{destroyed_by}: destroyed {id}");
    }

    fn connect(&self, connect_from: Id, connect_to: Id) {
        log::trace!("{connect_from}: connect to {connect_to}");
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        match self.names.borrow().get(&id) {
            Some(name) => log::log!(level, "{name}: {msg}"),
            None => log::log!(level, "{id}: {msg}"),
        }
    }

    fn time(&self, set_by: Id, time_ns: f64) {
        log::trace!("{set_by}: set time to {time_ns:.3}ns");
    }

    fn shutdown(&self) {
        log::logger().flush();
    }
}
