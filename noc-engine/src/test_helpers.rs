// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::rc::Rc;

use noc_track::tracker::{EntityManager, TextTracker, dev_null_tracker};
use noc_track::{Tracker, Writer};

use crate::engine::Engine;
use crate::traits::SimObject;

/// Create a tracker which writes everything to `traces/<test file>.log`.
///
/// Falls back to a tracker which drops everything if the file cannot be
/// created.
#[must_use]
pub fn create_tracker(full_filepath: &str) -> Tracker {
    // Place all trace files in one folder
    const FOLDER: &str = "traces";

    let filename_only = Path::new(full_filepath)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("test");

    if fs::create_dir_all(FOLDER).is_err() {
        return dev_null_tracker();
    }
    let Ok(file) = fs::File::create(format!("{FOLDER}/{filename_only}.log")) else {
        return dev_null_tracker();
    };
    let writer: Writer = Box::new(BufWriter::new(file));

    let entity_manager = EntityManager::new(log::Level::Debug);
    let tracker: Tracker = Rc::new(TextTracker::new(entity_manager, writer));
    tracker
}

#[must_use]
pub fn start_test<M>(full_filepath: &str) -> Engine<M>
where
    M: SimObject,
{
    Engine::new(&create_tracker(full_filepath))
}
