//! Basic usage examples for ResourcePool

use esox_resourcepool::{AcquireOutcome, PoolConfiguration, ResourcePool};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
}

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Acquire and release
    acquire_and_release();

    // Example 2: Growth and timeouts
    growth_and_timeout();

    // Example 3: Healing a faulty resource
    healing();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn connection_factory() -> impl Fn() -> io::Result<Connection> + Send + Sync + 'static {
    let next = Arc::new(AtomicUsize::new(1));
    move || {
        Ok(Connection {
            id: next.fetch_add(1, Ordering::Relaxed),
        })
    }
}

fn acquire_and_release() {
    println!("1. Acquire and Release:");
    let pool = ResourcePool::new(connection_factory(), PoolConfiguration::new().with_sizes(2, 2))
        .unwrap();
    let caller = pool.caller();

    {
        let conn = pool.try_acquire(caller).unwrap().unwrap();
        println!("   Got connection: {}", conn.id);
        // Connection automatically returned when dropped
    }

    let conn = pool.try_acquire(caller).unwrap().unwrap();
    pool.release(conn).unwrap();
    println!("   Available after return: {}\n", pool.available_count());
}

fn growth_and_timeout() {
    println!("2. Growth and Timeout:");
    let pool = ResourcePool::new(connection_factory(), PoolConfiguration::new().with_sizes(1, 3))
        .unwrap();

    let held: Vec<_> = (0..3)
        .map(|_| pool.try_acquire(pool.caller()).unwrap().unwrap())
        .collect();
    println!("   Pool grew to {} slots", pool.size());

    match pool
        .acquire_with_retry(pool.caller(), Duration::from_millis(50))
        .unwrap()
    {
        AcquireOutcome::Acquired(_) => println!("   Unexpectedly got a connection"),
        AcquireOutcome::TimedOut { waited } => println!("   Timed out after {:?}", waited),
    }

    drop(held);
    println!("   Available after return: {}\n", pool.available_count());
}

fn healing() {
    println!("3. Healing:");
    let pool = ResourcePool::new(connection_factory(), PoolConfiguration::new().with_sizes(1, 1))
        .unwrap();

    let conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
    println!("   Connection {} hit a protocol error", conn.id);
    pool.release_faulty(conn).unwrap();

    let conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
    println!("   Slot now holds connection {}\n", conn.id);
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let pool = ResourcePool::new(connection_factory(), PoolConfiguration::new().with_sizes(2, 5))
        .unwrap();

    {
        let _conn1 = pool.try_acquire(pool.caller()).unwrap().unwrap();
        let _conn2 = pool.try_acquire(pool.caller()).unwrap().unwrap();

        let health = pool.get_health_status();
        println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
        println!("   Utilization: {:.1}%", health.utilization * 100.0);
        println!("   Active: {}, Available: {}", health.active_resources, health.available_resources);
    }

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
