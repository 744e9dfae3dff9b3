//! Async usage examples

use esox_resourcepool::{PoolConfiguration, ResourcePool};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    esox_resourcepool::telemetry::init_tracing();
    println!("=== EsoxSolutions.ResourcePool - Async Examples ===\n");

    // Example 1: Async acquire
    async_acquire().await;

    // Example 2: Concurrent access with fairness
    concurrent_access().await;
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = ResourcePool::new(
        || Ok::<_, std::io::Error>(42u32),
        PoolConfiguration::new().with_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let caller = pool.caller();
    if let Some(value) = pool.acquire_async(caller).await.unwrap().into_option() {
        println!("   Got resource asynchronously: {}", *value);
    }

    println!();
}

async fn concurrent_access() {
    println!("2. Concurrent Access:");
    let pool = ResourcePool::new(
        || Ok::<_, std::io::Error>(String::from("session")),
        PoolConfiguration::new().with_sizes(1, 2),
    )
    .unwrap();

    let mut handles = vec![];
    for i in 0..6 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let caller = pool.caller();
            let outcome = pool
                .acquire_with_retry_async(caller, Duration::from_secs(1))
                .await;
            if let Ok(Some(_session)) = outcome.map(|o| o.into_option()) {
                println!("   Task {} got a session", i);
                sleep(Duration::from_millis(20)).await;
            }
            pool.release_all_for_caller(caller);
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    println!("   Pool size: {}, acquired: {}", pool.size(), pool.get_metrics().total_acquired);
}
