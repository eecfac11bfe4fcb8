// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::fs;

use approx::assert_relative_eq;
use noc_config::{Arbitration, Clocking, Destination, MeshConfig};
use noc_engine::channel::Channel;
use noc_engine::engine::Engine;
use noc_engine::test_helpers::start_test;
use noc_engine::time::simtime::SimTime;
use noc_engine::{connect_port, run_simulation};
use noc_models::mesh::{Mesh, build_mesh};
use noc_models::sink::LatencySink;
use noc_models::source::TrafficSource;
use noc_router::types::NocMsg;

fn mesh_config(rows: usize, columns: usize) -> MeshConfig {
    let mut config = MeshConfig {
        rows,
        columns,
        ..MeshConfig::default()
    };
    config.traffic.max_queued_packets = 100;
    config
}

fn build(engine: &mut Engine<NocMsg>, config: &MeshConfig) -> Mesh {
    build_mesh(engine, config).unwrap()
}

/// All buffers are empty again: every credit is back with its owner.
fn assert_drained(mesh: &Mesh, config: &MeshConfig) {
    for router in &mesh.routers {
        for port in 0..router.num_ports() {
            let expected = if port == 0 {
                config.sink.initial_credits
            } else {
                config.router.flits_per_vc
            };
            for vc in 0..config.router.num_vcs {
                assert_eq!(router.credits(port, vc), expected as i64);
                assert_eq!(router.occupancy(port, vc), 0);
            }
        }
    }
    for source in &mesh.sources {
        assert_eq!(source.credits(), config.router.flits_per_vc);
        assert_eq!(source.num_queued_flits(), 0);
    }
}

#[test]
fn uniform_traffic_is_delivered() {
    for arbitration in [Arbitration::WinnerTakeAll, Arbitration::RoundRobin] {
        for clocking in [Clocking::Synchronous, Clocking::Asynchronous] {
            for synchronous_sources in [true, false] {
                let mut engine = start_test(file!());
                let mut config = mesh_config(3, 3);
                config.router.arbitration = arbitration;
                config.router.clocking = clocking;
                config.traffic.synchronous = synchronous_sources;
                config.traffic.packets_per_source = Some(20);
                let mesh = build(&mut engine, &config);
                run_simulation!(engine);

                let summary = mesh.summary();
                let label = format!("{arbitration:?} {clocking:?} sync sources {synchronous_sources}");
                assert_eq!(summary.generated, 9 * 20, "{label}");
                assert_eq!(summary.dropped, 0, "{label}");
                assert_eq!(summary.sent_packets, 9 * 20, "{label}");
                assert_eq!(summary.received_packets, 9 * 20, "{label}");
                assert_eq!(summary.received_flits, 9 * 20 * 4, "{label}");
                assert_eq!(summary.end_to_end.count(), 9 * 20 * 4, "{label}");
                assert_eq!(summary.packet.count(), 9 * 20, "{label}");

                // A flit spends at least one link transmission in the network
                assert!(summary.network.min().unwrap() >= 1.0, "{label}");
                assert!(summary.end_to_end.mean() >= summary.network.mean(), "{label}");
                assert_drained(&mesh, &config);
            }
        }
    }
}

#[test]
fn fixed_destination_uses_one_sink() {
    let mut engine = start_test(file!());
    let mut config = mesh_config(2, 3);
    config.traffic.destination = Destination::Fixed(5);
    config.traffic.packets_per_source = Some(4);
    let mesh = build(&mut engine, &config);
    run_simulation!(engine);

    for (id, sink) in mesh.sinks.iter().enumerate() {
        let stats = sink.stats();
        if id == 5 {
            assert_eq!(stats.received_packets, 6 * 4);
            assert_eq!(stats.per_source.len(), 6);
            assert_eq!(stats.per_source[&0].packet.count(), 4);
        } else {
            assert_eq!(stats.received_packets, 0);
        }
    }
    assert_drained(&mesh, &config);
}

#[test]
fn messages_share_a_destination() {
    let mut engine = start_test(file!());
    let mut config = mesh_config(3, 3);
    config.traffic.message_length_packets = 5;
    config.traffic.packets_per_source = Some(5);
    let mesh = build(&mut engine, &config);
    run_simulation!(engine);

    // Each source sent a single message, so it appears in exactly one sink
    for src_id in 0..9 {
        let sinks_reached = mesh
            .sinks
            .iter()
            .filter(|sink| sink.stats().per_source.contains_key(&src_id))
            .count();
        assert_eq!(sinks_reached, 1);
    }
    // And never to itself
    for (id, sink) in mesh.sinks.iter().enumerate() {
        assert!(!sink.stats().per_source.contains_key(&id));
    }
    assert_eq!(mesh.summary().received_packets, 9 * 5);
}

#[test]
fn full_queue_drops_packets() {
    let mut engine = start_test(file!());
    let mut config = mesh_config(1, 2);
    config.traffic.max_queued_packets = 1;
    config.traffic.flit_arrival_delay_ns = 0.25;
    config.traffic.packets_per_source = Some(10);
    let mesh = build(&mut engine, &config);
    run_simulation!(engine);

    for source in &mesh.sources {
        let stats = source.stats();
        assert_eq!(stats.generated, 10);
        assert!(stats.dropped > 0);
        assert_eq!(stats.queued + stats.dropped, 10);
        assert_eq!(stats.sent_packets, stats.queued);
        assert_relative_eq!(
            stats.loss_probability(),
            stats.dropped as f64 / stats.generated as f64
        );
    }
    let summary = mesh.summary();
    assert_eq!(summary.received_packets, summary.sent_packets);
    assert_drained(&mesh, &config);
}

#[test]
fn trace_driven_generation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delays.txt");
    fs::write(&path, "1\n30\n").unwrap();

    let mut engine = start_test(file!());
    let mut config = mesh_config(1, 2);
    config.traffic.trace_file = Some(path.to_str().unwrap().to_string());
    config.traffic.packets_per_source = Some(3);
    let mesh = build(&mut engine, &config);
    run_simulation!(engine);

    // Packets are created at 0, 1 and 31ns
    assert_eq!(mesh.summary().received_packets, 6);
    assert!(engine.time_now_ns() > 31.0);
}

#[test]
fn sources_off() {
    let mut engine = start_test(file!());
    let mut config = mesh_config(2, 2);
    config.traffic.destination = Destination::Off;
    let mesh = build(&mut engine, &config);
    run_simulation!(engine);

    let summary = mesh.summary();
    assert_eq!(summary.generated, 0);
    assert_eq!(summary.received_packets, 0);
    assert_eq!(mesh.sources[0].stats().loss_probability(), -1.0);
    assert_drained(&mesh, &config);
}

#[test]
fn statistics_start_late() {
    let mut engine = start_test(file!());
    let mut config = mesh_config(2, 2);
    config.router.stat_start_ns = 1.0e6;
    config.traffic.packets_per_source = Some(3);
    let mesh = build(&mut engine, &config);
    run_simulation!(engine);

    let summary = mesh.summary();
    assert_eq!(summary.received_packets, 4 * 3);
    assert_eq!(summary.end_to_end.count(), 0);
    assert_eq!(summary.packet.count(), 0);
}

#[test]
fn finish_time_stops_endless_traffic() {
    let mut engine = start_test(file!());
    let mut config = mesh_config(2, 2);
    config.traffic.packets_per_source = None;
    let mesh = build(&mut engine, &config);
    engine.run_until(Some(SimTime::from_ns(200.0))).unwrap();

    let summary = mesh.summary();
    assert!(summary.generated > 4 * 10);
    assert!(summary.received_packets > 0);
    assert!(summary.received_packets <= summary.sent_packets);
}

#[test]
fn flits_must_cross_a_router() {
    let mut engine = start_test(file!());
    let config = mesh_config(1, 1);
    let top = engine.top().clone();
    let mut traffic = config.traffic.clone();
    traffic.destination = Destination::Fixed(0);
    traffic.packets_per_source = Some(1);
    let source =
        TrafficSource::new_and_register(&mut engine, &top, "source", 0, 1, 4, &traffic).unwrap();
    let sink = LatencySink::new_and_register(
        &mut engine,
        &top,
        "sink",
        0,
        2,
        10,
        SimTime::ZERO,
    );
    let link = Channel::with_datarate(32.0, SimTime::ZERO);
    connect_port!(engine, link ; source, tx => sink, rx).unwrap();
    connect_port!(engine, Channel::ideal() ; sink, credit_tx => source, credit_rx).unwrap();

    let err = engine.run().unwrap_err();
    assert!(err.0.contains("never entered the network"), "{err}");
    assert!(err.0.contains("top::sink"), "{err}");
}

#[test]
fn random_destinations_need_two_cores() {
    let mut engine = start_test(file!());
    let mut config = mesh_config(1, 1);
    config.traffic.destination = Destination::UniformRandom;
    assert!(build_mesh(&mut engine, &config).is_err());
}
