//! Mutex hot-path microbenchmarks.
//!
//! Uncontended lock/unlock and trylock per mutex kind, through the safe
//! runtime API and through the C ABI, plus a contended increment.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pthread_rs_abi::PrsMutex;
use pthread_rs_abi::mutex_abi::{
    prs_pthread_mutex_destroy, prs_pthread_mutex_init, prs_pthread_mutex_lock,
    prs_pthread_mutex_unlock,
};
use pthread_rs_bench::{BenchStats, print_env_metadata_once};
use pthread_rs_core::{MutexKind, Runtime};

const TAG: &str = "MUTEX_BENCH";
const KINDS: [(MutexKind, &str); 3] = [
    (MutexKind::Normal, "normal"),
    (MutexKind::Recursive, "recursive"),
    (MutexKind::ErrorCheck, "errorcheck"),
];

fn bench_mutex_lock_unlock(c: &mut Criterion) {
    print_env_metadata_once(TAG);
    let rt = Runtime::new();
    let mut group = c.benchmark_group("mutex_hotpath");
    group.throughput(Throughput::Elements(1));

    for (kind, label) in KINDS {
        let m = rt.mutex_init(kind);
        // Adopt the bench thread before measuring.
        for _ in 0..10_000 {
            let _ = rt.mutex_lock(m);
            let _ = rt.mutex_unlock(m);
        }

        let stats = RefCell::new(BenchStats::default());
        group.bench_function(BenchmarkId::new("lock_unlock", label), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    let _ = black_box(rt.mutex_lock(m));
                    let _ = black_box(rt.mutex_unlock(m));
                }
                let dur = start.elapsed().max(Duration::from_nanos(1));
                stats.borrow_mut().record(iters, dur);
                dur
            });
        });
        stats.borrow().report(TAG, &format!("lock_unlock_{label}"));
    }
    group.finish();
}

fn bench_mutex_trylock(c: &mut Criterion) {
    print_env_metadata_once(TAG);
    let rt = Runtime::new();
    let m = rt.mutex_init(MutexKind::Normal);

    let stats = RefCell::new(BenchStats::default());
    let mut group = c.benchmark_group("mutex_hotpath");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("trylock_unlock", "normal"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let _ = black_box(rt.mutex_trylock(m));
                let _ = black_box(rt.mutex_unlock(m));
            }
            let dur = start.elapsed().max(Duration::from_nanos(1));
            stats.borrow_mut().record(iters, dur);
            dur
        });
    });
    group.finish();
    stats.borrow().report(TAG, "trylock_unlock");
}

fn bench_mutex_abi(c: &mut Criterion) {
    print_env_metadata_once(TAG);
    let mut m: PrsMutex = 0;
    // SAFETY: `m` is live, writable storage for the whole bench.
    unsafe {
        prs_pthread_mutex_init(&mut m, std::ptr::null());
    }

    let stats = RefCell::new(BenchStats::default());
    let mut group = c.benchmark_group("mutex_hotpath");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("abi_lock_unlock", "normal"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                // SAFETY: `m` was initialized above.
                unsafe {
                    black_box(prs_pthread_mutex_lock(&mut m));
                    black_box(prs_pthread_mutex_unlock(&mut m));
                }
            }
            let dur = start.elapsed().max(Duration::from_nanos(1));
            stats.borrow_mut().record(iters, dur);
            dur
        });
    });
    group.finish();
    stats.borrow().report(TAG, "abi_lock_unlock");

    // SAFETY: unlocked and no longer used.
    unsafe {
        prs_pthread_mutex_destroy(&mut m);
    }
}

/// Manual threaded benchmark: 4 threads each take the lock 2000 times.
fn bench_mutex_contended_4_threads(_c: &mut Criterion) {
    print_env_metadata_once(TAG);
    let rounds = 20;
    let per_thread: u64 = 2_000;
    let mut stats = BenchStats::default();

    for _ in 0..rounds {
        let rt = Runtime::new();
        let m = rt.mutex_init(MutexKind::Normal);

        let start = Instant::now();
        let threads: Vec<_> = (0..4)
            .filter_map(|_| {
                let worker = rt.clone();
                rt.create(
                    move |_| {
                        for _ in 0..per_thread {
                            let _ = worker.mutex_lock(m);
                            let _ = worker.mutex_unlock(m);
                        }
                        0
                    },
                    0,
                )
                .ok()
            })
            .collect();
        for t in threads {
            let _ = rt.join(t);
        }
        let dur = start.elapsed().max(Duration::from_nanos(1));
        stats.record(per_thread * 4, dur);

        let contended = rt.metrics().mutex_contended;
        black_box(contended);
    }
    stats.report(TAG, "contended_4_threads");
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(1))
        .measurement_time(Duration::from_secs(2))
        .sample_size(80);
    targets =
        bench_mutex_lock_unlock,
        bench_mutex_trylock,
        bench_mutex_abi,
        bench_mutex_contended_4_threads
);
criterion_main!(benches);
