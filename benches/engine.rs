// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Engine hot-path benchmarks.
//
// Run with:
//   cargo bench --bench engine
//
// Groups:
//   index_stack_contention — IndexStack::pop/push under private vs shared
//                            lock mode, the allocator beneath every chunk
//                            and fid allocation
//   engine_write           — Engine::write throughput at three payload
//                            sizes (sub-chunk, exactly one chunk, spanning
//                            a chunk boundary)
//   engine_read            — Engine::pread throughput at the same sizes,
//                            against data written once up front
//   engine_open_close      — open/write/close/unlink cycle cost, the unit
//                            of work repeated by any workload that creates
//                            many small scratch files

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use libramfs::index_stack::IndexStack;
use libramfs::{Engine, LockMode, OpenFlags};

const SUB_CHUNK: usize = 4096;
const ONE_CHUNK: usize = 1 << 20;
const CROSS_CHUNK: usize = (1 << 20) + 4096;

const SIZES: &[(&str, usize)] = &[
    ("sub_chunk_4k", SUB_CHUNK),
    ("one_chunk_1m", ONE_CHUNK),
    ("cross_chunk_1m4k", CROSS_CHUNK),
];

fn mount_scratch_engine(label: &str) -> Engine {
    let dir = tempfile::tempdir().unwrap();
    let prefix = format!("/tmp/libramfs-bench-{label}-{}", std::process::id());
    let engine = Engine::mount(&prefix, 0, dir.path().join("spill")).unwrap();
    // leak: the engine borrows nothing from `dir` directly (spillover is
    // only touched once the memory pool is exhausted, which these
    // benchmarks never reach), but keep the path valid for the engine's
    // lifetime regardless.
    std::mem::forget(dir);
    engine
}

// ---------------------------------------------------------------------------
// IndexStack: the free-fid / free-chunk allocator underneath every
// Engine::open / Engine::write call.
// ---------------------------------------------------------------------------

fn bench_index_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_stack_contention");

    for &(label, lock_mode) in &[("private", LockMode::Private), ("shared", LockMode::Shared)] {
        group.bench_function(BenchmarkId::new("pop_push_roundtrip", label), |b| {
            let capacity = 1024u32;
            let mut buf = vec![0u8; IndexStack::byte_len(capacity)];
            // `init_at` already leaves every id 0..capacity free.
            let stack = unsafe { IndexStack::init_at(buf.as_mut_ptr(), capacity) };
            b.iter(|| {
                let id = stack.pop(lock_mode).expect("stack never drained by this benchmark");
                black_box(id);
                stack.push(id, lock_mode);
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Engine::write: allocates chunks on first touch, then copies into the
// chunk pool.
// ---------------------------------------------------------------------------

fn bench_engine_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_write");

    for &(label, size) in SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, &sz| {
            let engine = mount_scratch_engine(&format!("write-{label}"));
            let path = format!("/tmp/libramfs-bench-write-{label}-{}/f", std::process::id());
            let h = engine
                .open(
                    &path,
                    OpenFlags {
                        create: true,
                        writable: true,
                        ..Default::default()
                    },
                )
                .unwrap();
            let payload = vec![0xABu8; sz];
            // Repeated `pwrite` at a fixed offset reuses the chunks the
            // first call allocated rather than growing the file or
            // exhausting the fid table over thousands of iterations.
            b.iter(|| {
                engine.pwrite(h, black_box(&payload), 0).unwrap();
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Engine::pread: pure read-side cost once the chunks already exist.
// ---------------------------------------------------------------------------

fn bench_engine_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_read");

    for &(label, size) in SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, &sz| {
            let engine = mount_scratch_engine(&format!("read-{label}"));
            let path = format!("/tmp/libramfs-bench-read-{label}-{}/f", std::process::id());
            let h = engine
                .open(
                    &path,
                    OpenFlags {
                        create: true,
                        readable: true,
                        writable: true,
                        ..Default::default()
                    },
                )
                .unwrap();
            engine.write(h, &vec![0xCDu8; sz]).unwrap();

            let mut out = vec![0u8; sz];
            b.iter(|| {
                engine.pread(h, black_box(&mut out), 0).unwrap();
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// open/write/close/unlink: the unit of work for a workload that creates
// many short-lived scratch files rather than one long-lived one.
// ---------------------------------------------------------------------------

fn bench_open_close_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_open_close");
    group.throughput(Throughput::Bytes(SUB_CHUNK as u64));

    group.bench_function("create_write_close_unlink", |b| {
        let engine = mount_scratch_engine("cycle");
        let payload = vec![0xEFu8; SUB_CHUNK];
        let mut counter = 0u64;
        b.iter(|| {
            let path = format!("/tmp/libramfs-bench-cycle-{}/f{counter}", std::process::id());
            counter += 1;
            let h = engine
                .open(
                    &path,
                    OpenFlags {
                        create: true,
                        writable: true,
                        ..Default::default()
                    },
                )
                .unwrap();
            engine.write(h, black_box(&payload)).unwrap();
            engine.close(h).unwrap();
            engine.unlink(&path).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_index_stack,
    bench_engine_write,
    bench_engine_read,
    bench_open_close_cycle,
);
criterion_main!(benches);
