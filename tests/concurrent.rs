use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Once};
use std::thread;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use tierthrottle::clock::ManualTicks;
use tierthrottle::{OwnerId, Pfn, ThrottleEngine};

const NUM_THREADS: usize = 8;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tierthrottle=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

#[test]
fn lookups_racing_store_destruction_complete_cleanly() {
    init_tracing();
    let clock = Arc::new(ManualTicks::new(0));
    let engine = Arc::new(ThrottleEngine::with_tick_source(clock.clone()));
    engine.config().set_enabled(true);
    let owner = OwnerId(1);

    let stop = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(NUM_THREADS + 1));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS {
        let engine = Arc::clone(&engine);
        let stop = Arc::clone(&stop);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut decisions = 0u64;
            while !stop.load(Ordering::Relaxed) {
                // Any answer is acceptable; the property under test is that
                // no lookup ever touches a freed store.
                engine.should_throttle_promotion(owner, Pfn(thread_id as u64));
                engine.record_promotion(owner, Pfn(thread_id as u64), Pfn(100 + thread_id as u64));
                decisions += 1;
            }
            decisions
        }));
    }

    barrier.wait();
    for round in 0..200 {
        engine.create_store(owner);
        engine.record_promotion(owner, Pfn(500), Pfn(600));
        clock.advance(1);
        engine.destroy_store(owner);
        if round % 50 == 0 {
            thread::yield_now();
        }
    }
    stop.store(true, Ordering::Relaxed);

    for handle in handles {
        let decisions = handle.join().unwrap();
        assert!(decisions > 0);
    }
    // Destroyed: every remaining lookup sees "no store".
    assert_eq!(engine.entry_count(owner), 0);
}

#[test]
fn mixed_operations_from_many_threads_keep_counts_consistent() {
    init_tracing();
    let clock = Arc::new(ManualTicks::new(0));
    let engine = Arc::new(ThrottleEngine::with_tick_source(clock.clone()));
    engine.config().set_enabled(true);
    engine.config().set_max_entries_per_owner(1000).unwrap();
    let owner = OwnerId(1);
    engine.create_store(owner);

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS {
        let engine = Arc::clone(&engine);
        let clock = Arc::clone(&clock);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(thread_id as u64);
            barrier.wait();
            for _ in 0..2000 {
                let pfn = rng.gen_range(0..4096u64);
                match rng.gen_range(0..4u32) {
                    0 => {
                        engine.should_throttle_promotion(owner, Pfn(pfn));
                    }
                    1 => engine.record_promotion(owner, Pfn(pfn), Pfn(pfn + 10_000)),
                    2 => engine.record_demotion(owner, Pfn(pfn + 10_000), Pfn(pfn)),
                    _ => {
                        engine.reclaim(4);
                    }
                }
                clock.advance(1);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // The atomic counter and the map agree once everything has settled:
    // draining the store through reclaim leaves both at zero.
    engine.config().set_throttle_duration_ms(1).unwrap();
    engine.config().set_lifetime_expiration_ms(1).unwrap();
    clock.advance(10_000);
    while engine.reclaim(1024) > 0 {}
    assert_eq!(engine.entry_count(owner), 0);
    assert_eq!(engine.reclaimable_count(), 0);
}

#[test]
fn derived_stores_are_isolated_under_concurrency() {
    init_tracing();
    let engine = Arc::new(ThrottleEngine::new());
    engine.config().set_enabled(true);
    let parent = OwnerId(0);
    engine.create_store(parent);
    for i in 0..500u64 {
        engine.record_promotion(parent, Pfn(i), Pfn(10_000 + i));
    }

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];
    for thread_id in 0..NUM_THREADS {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let child = OwnerId(1 + thread_id as u64);
            engine.create_store_for_derived(parent, child);
            assert_eq!(engine.entry_count(child), 0);
            engine.destroy_store(child);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(engine.entry_count(parent), 500);
}
