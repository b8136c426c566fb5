use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use airlink::protocol::{Outbound, physics};
use airlink::transport::FrameAssembler;
use airlink::{Frame, GridDims, MessageType};

fn physics_frame(cells: usize) -> Frame {
    let directions: Vec<f32> = (0..cells * 3)
        .map(|i| ((i % 31) as f32 / 15.0) - 1.0)
        .collect();
    let magnitudes: Vec<f32> = (0..cells).map(|i| (i % 100) as f32 / 100.0).collect();
    let temperatures: Vec<f32> = (0..cells).map(|i| (i % 256) as f32 / 256.0).collect();

    let mut frame = Frame::tagged(MessageType::RequestPhysicalValue, physics::payload_len(cells));
    physics::encode_into(&mut frame, &directions, &magnitudes, &temperatures).unwrap();
    frame
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for size in [16usize, 64] {
        let dims = GridDims::cube(size);
        let occupancy = vec![true; dims.size3()];
        group.throughput(Throughput::Bytes(dims.size3() as u64));
        group.bench_function(format!("encode_occupancy_{size}^3"), |b| {
            b.iter(|| black_box(Outbound::OccupancyFull(&occupancy).encode().unwrap()));
        });
    }

    let changed: Vec<u32> = (0..4096).collect();
    group.throughput(Throughput::Bytes(4096 * 4));
    group.bench_function("encode_occupancy_diff_4k", |b| {
        b.iter(|| black_box(Outbound::OccupancyDiff(&changed).encode().unwrap()));
    });

    group.finish();
}

fn bench_physics_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("physics");

    for size in [16usize, 64] {
        let cells = GridDims::cube(size).size3();
        let wire = physics_frame(cells).as_bytes().to_vec();
        let mut fields = physics::PhysicsFields::zeroed(cells);

        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_function(format!("decode_{size}^3"), |b| {
            b.iter(|| {
                let mut frame = Frame::from_bytes(&wire).unwrap();
                frame.pop_tag().unwrap();
                physics::decode_into(&mut frame, cells, &mut fields).unwrap();
                black_box(&fields);
            });
        });
    }

    group.finish();
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembly");

    let cells = GridDims::cube(32).size3();
    let wire = physics_frame(cells).as_bytes().to_vec();
    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("assemble_64k_chunks", |b| {
        b.iter(|| {
            let mut assembler = FrameAssembler::new();
            for chunk in wire.chunks(64 * 1024) {
                assembler.extend(chunk);
            }
            black_box(assembler.next_frame().unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_physics_decode, bench_assembly);
criterion_main!(benches);
