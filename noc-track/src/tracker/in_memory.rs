// Copyright (c) 2020 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::Id;
use crate::tracker::{EntityManager, Track};

/// A log message kept by the [`InMemoryTracker`].
#[derive(Debug, Clone)]
pub struct LoggedMessage {
    /// Full name of the entity that emitted the message.
    pub entity: String,

    /// Level the message was emitted at.
    pub level: log::Level,

    /// Formatted message text.
    pub text: String,

    /// Most recent time reported through [`Track::time`].
    pub time_ns: f64,
}

/// A tracker that keeps log messages in memory so that tests can check
/// what a model reported.
pub struct InMemoryTracker {
    entity_manager: EntityManager,
    names: RefCell<HashMap<Id, String>>,
    messages: RefCell<Vec<LoggedMessage>>,
    time_ns: RefCell<f64>,
}

impl InMemoryTracker {
    /// Create a new [`InMemoryTracker`] with an [`EntityManager`].
    #[must_use]
    pub fn new(entity_manager: EntityManager) -> Self {
        Self {
            entity_manager,
            names: RefCell::new(HashMap::new()),
            messages: RefCell::new(Vec::new()),
            time_ns: RefCell::new(0.0),
        }
    }

    /// Return a copy of all the messages logged so far.
    #[must_use]
    pub fn messages(&self) -> Vec<LoggedMessage> {
        self.messages.borrow().clone()
    }

    /// Return the text of messages whose entity name contains `entity` and
    /// whose text contains `needle`.
    #[must_use]
    pub fn matching(&self, entity: &str, needle: &str) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.entity.contains(entity) && m.text.contains(needle))
            .map(|m| m.text.clone())
            .collect()
    }
}

impl Track for InMemoryTracker {
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

    fn create(&self, _created_by: Id, _id: Id, _name: &str) {}

    fn destroy(&self, _destroyed_by: Id, _id: Id) {}

    fn connect(&self, _connect_from: Id, _connect_to: Id) {}

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        let entity = self
            .names
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string());
        self.messages.borrow_mut().push(LoggedMessage {
            entity,
            level,
            text: msg.to_string(),
            time_ns: *self.time_ns.borrow(),
        });
    }

    fn time(&self, _set_by: Id, time_ns: f64) {
        *self.time_ns.borrow_mut() = time_ns;
    }

    fn shutdown(&self) {}
}
