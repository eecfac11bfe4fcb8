// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::fs;
use std::rc::Rc;

use noc_track::builder::{TrackerConfig, setup_log_tracker, setup_tracker};
use noc_track::entity::{Entity, toplevel};
use noc_track::tracker::{EntityManager, InMemoryTracker};
use noc_track::{Tracker, debug, error, info};
use serial_test::serial;

#[test]
fn in_memory_tracker_keeps_enabled_messages() {
    let mut manager = EntityManager::new(log::Level::Warn);
    manager
        .add_entity_level_filter("sched", log::Level::Debug)
        .unwrap();
    let memory = Rc::new(InMemoryTracker::new(manager));
    let tracker: Tracker = memory.clone();

    let top = toplevel(&tracker, "top");
    let sched = Entity::new(&top, "sched_0");
    let port = Entity::new(&top, "in_port_0");

    debug!(sched ; "grant vc {}", 2);
    debug!(port ; "dropped");
    error!(port ; "overflow");

    assert_eq!(memory.matching("sched_0", "grant"), vec!["grant vc 2"]);
    assert!(memory.matching("in_port_0", "dropped").is_empty());
    assert_eq!(memory.matching("in_port_0", "overflow").len(), 1);
    assert_eq!(memory.messages()[0].entity, "top::sched_0");
}

#[test]
fn file_tracker_writes_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.log");
    let path_str = path.to_str().unwrap();
    {
        let tracker = setup_tracker(&TrackerConfig {
            enable: true,
            level: log::Level::Info,
            filter_regex: "",
            file: Some(path_str),
        })
        .unwrap();
        let top = toplevel(&tracker, "top");
        info!(top ; "hello {}", "mesh");
        tracker.shutdown();
    }
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains(":INFO: hello mesh"));
}

#[test]
fn disabled_tracker_is_silent() {
    let tracker = setup_tracker(&TrackerConfig {
        enable: false,
        ..Default::default()
    })
    .unwrap();
    let top = toplevel(&tracker, "top");
    assert!(!top.tracker.is_entity_enabled(top.id, log::Level::Error));
}

#[test]
fn bad_filter_is_rejected() {
    let result = setup_tracker(&TrackerConfig {
        filter_regex: "[",
        ..Default::default()
    });
    assert!(result.is_err());
}

#[test]
#[serial]
fn log_tracker_installs_logger_once() {
    let config = TrackerConfig {
        level: log::Level::Info,
        ..Default::default()
    };
    let tracker = setup_log_tracker(&config).unwrap();
    let top = toplevel(&tracker, "top");
    info!(top ; "through the log facade");

    assert!(setup_log_tracker(&config).is_err());
}
