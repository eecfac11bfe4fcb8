// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use noc_config::{Clocking, MeshConfig};
use noc_engine::engine::Engine;
use noc_models::mesh::{Mesh, build_mesh};
use noc_router::types::NocMsg;
use noc_track::tracker::dev_null_tracker;

const PACKETS_PER_SOURCE: usize = 100;

fn setup_mesh(clocking: Clocking) -> (Engine<NocMsg>, Mesh) {
    // Create an engine without the tracker system opening files for logging
    let tracker = dev_null_tracker();
    let mut engine = Engine::new(&tracker);

    let mut config = MeshConfig {
        rows: 4,
        columns: 4,
        ..MeshConfig::default()
    };
    config.router.clocking = clocking;
    config.traffic.packets_per_source = Some(PACKETS_PER_SOURCE);
    config.traffic.max_queued_packets = PACKETS_PER_SOURCE;
    let mesh = build_mesh(&mut engine, &config).unwrap();
    (engine, mesh)
}

fn run_mesh(args: (Engine<NocMsg>, Mesh)) {
    let (mut engine, mesh) = args;
    engine.run().unwrap();
    assert_eq!(
        mesh.summary().received_packets,
        (16 * PACKETS_PER_SOURCE) as u64
    );
}

fn bench_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_4x4");

    group.bench_function("synchronous", |b| {
        b.iter_batched(
            || setup_mesh(Clocking::Synchronous),
            run_mesh,
            BatchSize::SmallInput,
        );
    });

    group.bench_function("asynchronous", |b| {
        b.iter_batched(
            || setup_mesh(Clocking::Asynchronous),
            run_mesh,
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_mesh
}
criterion_main!(benches);
