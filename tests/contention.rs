//! Pool invariants under sustained contention

use esox_resourcepool::{PoolConfiguration, ResourcePool};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const MAX: usize = 4;
const THREADS: usize = 8;
const ROUNDS: usize = 40;

#[test]
fn no_slot_is_ever_shared_and_size_stays_bounded() {
    let pool = ResourcePool::new(
        || Ok::<_, io::Error>(()),
        PoolConfiguration::new()
            .with_sizes(2, MAX)
            .with_poll_interval(Duration::from_millis(1)),
    )
    .unwrap();

    // Caller currently holding each slot, 0 when free.
    let occupants: Vec<AtomicU64> = (0..MAX).map(|_| AtomicU64::new(0)).collect();
    let done = AtomicBool::new(false);
    let acquired = AtomicUsize::new(0);

    let (pool, occupants, done, acquired) = (&pool, &occupants, &done, &acquired);
    thread::scope(|scope| {
        let sampler = scope.spawn(move || {
            let mut last = pool.size();
            while !done.load(Ordering::SeqCst) {
                let size = pool.size();
                assert!(size >= last, "pool shrank from {last} to {size}");
                assert!(size <= MAX);
                last = size;
                thread::sleep(Duration::from_micros(200));
            }
        });

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(move || {
                    let caller = pool.caller();
                    for round in 0..ROUNDS {
                        let mut conn = pool
                            .acquire_with_retry(caller, Duration::from_secs(10))
                            .unwrap()
                            .into_option()
                            .expect("acquired within deadline");

                        let previous = occupants[conn.slot()].swap(caller.as_u64(), Ordering::SeqCst);
                        assert_eq!(previous, 0, "slot {} already held", conn.slot());
                        thread::sleep(Duration::from_micros(100));
                        occupants[conn.slot()].store(0, Ordering::SeqCst);
                        acquired.fetch_add(1, Ordering::SeqCst);

                        if round % 7 == 0 {
                            conn.mark_faulty();
                        }
                        drop(conn);
                    }
                    pool.release_all_for_caller(caller);
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        sampler.join().unwrap();
    });

    let metrics = pool.get_metrics();
    assert_eq!(acquired.load(Ordering::SeqCst), THREADS * ROUNDS);
    assert_eq!(metrics.total_acquired, THREADS * ROUNDS);
    assert_eq!(metrics.total_released, THREADS * ROUNDS);
    assert_eq!(metrics.invalid_releases, 0);
    assert_eq!(metrics.active_resources, 0);
    assert!(metrics.pool_size <= MAX);
    assert!(metrics.heals > 0);
}

#[test]
fn abandoned_waiters_expire_and_stop_blocking() {
    let pool = ResourcePool::new(
        || Ok::<_, io::Error>(()),
        PoolConfiguration::new()
            .with_sizes(1, 1)
            .with_poll_interval(Duration::from_millis(5)),
    )
    .unwrap();

    let held = pool.try_acquire(pool.caller()).unwrap().unwrap();
    for _ in 0..5 {
        assert!(pool.try_acquire(pool.caller()).unwrap().is_none());
    }
    pool.release(held).unwrap();

    // None of the abandoned callers come back; once their tokens are
    // older than the expiry window a fresh caller is served.
    thread::sleep(pool.config().token_expiry_window() * 4);
    assert!(pool.try_acquire(pool.caller()).unwrap().is_some());
    assert_eq!(pool.waiting_count(), 0);
}
