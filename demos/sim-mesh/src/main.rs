// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Simulate a 2D mesh of wormhole routers.
//!
//! Every router has a traffic source and a latency sink on its core port.
//! The configuration is read from the defaults, an optional TOML file and
//! `NOC_` environment variables; the command-line options below override
//! the most common settings.
//!
//! ```text
//! sim-mesh --rows 4 --columns 4 --clocking asynchronous --stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use noc_config::{Arbitration, Clocking, MeshConfig};
use noc_engine::engine::Engine;
use noc_engine::sim_error;
use noc_engine::time::simtime::SimTime;
use noc_engine::types::SimError;
use noc_models::mesh::build_mesh;
use noc_router::types::NocMsg;
use noc_track::builder::{TrackerConfig, setup_log_tracker, setup_tracker};
use noc_track::{Tracker, error, info};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(about = "NoC mesh simulation")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable logging to the console.
    #[arg(long, default_value = "false")]
    stdout: bool,

    /// Print log messages through the `log` crate rather than the text
    /// tracker.
    #[arg(long, default_value = "false")]
    log_facade: bool,

    /// Level of log message to display.
    #[arg(long, default_value = "Info")]
    stdout_level: log::Level,

    /// Set a regular expression for which entites should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Write the log to this file instead of the console.
    #[arg(long)]
    log_file: Option<String>,

    /// Number of rows of routers.
    #[arg(long)]
    rows: Option<usize>,

    /// Number of columns of routers.
    #[arg(long)]
    columns: Option<usize>,

    /// Number of virtual channels per port.
    #[arg(long)]
    num_vcs: Option<usize>,

    /// Timing discipline of the router schedulers.
    #[arg(long, value_enum)]
    clocking: Option<Clocking>,

    /// How each scheduler picks the next VC to serve.
    #[arg(long, value_enum)]
    arbitration: Option<Arbitration>,

    /// Number of packets each source generates.
    #[arg(long)]
    packets_per_source: Option<usize>,

    /// Seed for the random destinations.
    #[arg(long)]
    seed: Option<u64>,

    /// Stop the simulation at this time (ns) even if traffic remains.
    #[arg(long)]
    finish_ns: Option<f64>,
}

/// Apply the command-line overrides on top of the loaded configuration.
fn apply_overrides(args: &Cli, config: &mut MeshConfig) {
    if let Some(rows) = args.rows {
        config.rows = rows;
    }
    if let Some(columns) = args.columns {
        config.columns = columns;
    }
    if let Some(num_vcs) = args.num_vcs {
        config.router.num_vcs = num_vcs;
    }
    if let Some(clocking) = args.clocking {
        config.router.clocking = clocking;
    }
    if let Some(arbitration) = args.arbitration {
        config.router.arbitration = arbitration;
    }
    if let Some(packets) = args.packets_per_source {
        config.traffic.packets_per_source = Some(packets);
    }
    if let Some(seed) = args.seed {
        config.traffic.seed = seed;
    }
    if args.finish_ns.is_some() {
        config.finish_ns = args.finish_ns;
    }
}

fn load_config(args: &Cli) -> Result<MeshConfig, SimError> {
    let mut config =
        MeshConfig::load(args.config.as_deref()).map_err(|e| SimError(e.to_string()))?;
    apply_overrides(args, &mut config);
    config.validate().map_err(|e| SimError(e.to_string()))?;
    if config.traffic.packets_per_source.is_none() && config.finish_ns.is_none() {
        return sim_error!("endless traffic needs a finish time (--finish-ns)");
    }
    Ok(config)
}

fn setup_all_trackers(args: &Cli) -> Result<Tracker, SimError> {
    let config = TrackerConfig {
        enable: args.stdout || args.log_file.is_some(),
        level: args.stdout_level,
        filter_regex: &args.stdout_filter_regex,
        file: args.log_file.as_deref(),
    };
    let tracker = if args.log_facade {
        setup_log_tracker(&config)
    } else {
        setup_tracker(&config)
    };
    tracker.map_err(|e| SimError(e.to_string()))
}

fn main() -> Result<(), SimError> {
    let args = Cli::parse();

    let tracker = setup_all_trackers(&args)?;
    let config = load_config(&args)?;

    let mut engine: Engine<NocMsg> = Engine::new(&tracker);
    let top = engine.top().clone();
    info!(top ;
        "{}x{} mesh, {} VCs of {} flits, {:?} {:?} schedulers",
        config.rows,
        config.columns,
        config.router.num_vcs,
        config.router.flits_per_vc,
        config.router.clocking,
        config.router.arbitration
    );

    let mesh = build_mesh(&mut engine, &config)?;
    info!(top ; "Mesh built and connected");

    engine.run_until(config.finish_ns.map(SimTime::from_ns))?;
    engine.finish();

    let summary = mesh.summary();
    for line in summary.to_string().lines() {
        info!(top ; "{line}");
    }
    for router in &mesh.routers {
        let utilization: Vec<String> = (0..router.num_ports())
            .map(|port| format!("{:.1}", router.utilization(port)))
            .collect();
        info!(router.entity ; "link utilization (%): {}", utilization.join(" "));
    }

    if config.finish_ns.is_none() && summary.received_packets != summary.sent_packets {
        error!(top ;
            "{}/{} packets received",
            summary.received_packets,
            summary.sent_packets
        );
        error!(top ; "Deadlock detected at {:.2}ns", engine.time_now_ns());
        tracker.shutdown();
        return sim_error!("Deadlock");
    }
    info!(top ; "Pass ({:.2}ns)", engine.time_now_ns());
    tracker.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_loaded_values() {
        let args = Cli::parse_from([
            "sim-mesh",
            "--rows",
            "2",
            "--clocking",
            "asynchronous",
            "--arbitration",
            "round-robin",
            "--finish-ns",
            "100",
        ]);
        let mut config = MeshConfig::default();
        apply_overrides(&args, &mut config);
        assert_eq!(config.rows, 2);
        assert_eq!(config.columns, MeshConfig::default().columns);
        assert_eq!(config.router.clocking, Clocking::Asynchronous);
        assert_eq!(config.router.arbitration, Arbitration::RoundRobin);
        assert_eq!(config.finish_ns, Some(100.0));
    }
}
