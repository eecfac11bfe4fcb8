// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Named nodes of the model hierarchy.
//!
//! Routers, their ports and schedulers, sources and sinks each own an
//! [`Entity`]. Its `::`-separated path (`top::mesh::router3::out1`) is what
//! log messages print and what level filters match against.

use std::fmt;
use std::rc::Rc;

use crate::{Id, NO_ID, Tracker, create, destroy};

const SEPARATOR: &str = "::";

pub struct Entity {
    pub name: String,
    pub parent: Option<Rc<Entity>>,
    pub id: Id,
    pub tracker: Tracker,

    /// Full path from the top-level, built once when the entity is created.
    path: String,
}

impl Entity {
    /// Create an entity below `parent`, sharing its tracker.
    #[must_use]
    pub fn new(parent: &Rc<Entity>, name: &str) -> Self {
        let path = [parent.path(), name].join(SEPARATOR);
        Self::registered(Some(parent.clone()), &parent.tracker, name, path)
    }

    fn registered(parent: Option<Rc<Entity>>, tracker: &Tracker, name: &str, path: String) -> Self {
        let id = tracker.unique_id();
        tracker.add_entity(id, &path);
        let entity = Self {
            name: name.to_string(),
            parent,
            id,
            tracker: tracker.clone(),
            path,
        };
        create!(entity);
        entity
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Id of the parent, or [`NO_ID`] for the top-level.
    #[must_use]
    pub fn parent_id(&self) -> Id {
        self.parent.as_ref().map_or(NO_ID, |parent| parent.id)
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        destroy!(self);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({} #{})", self.path, self.id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Create the root of a hierarchy; every other entity descends from it.
pub fn toplevel(tracker: &Tracker, name: &str) -> Rc<Entity> {
    Rc::new(Entity::registered(None, tracker, name, name.to_string()))
}
