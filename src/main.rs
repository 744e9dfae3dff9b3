// EsoxSolutions.ResourcePool
// Bounded, fairness-aware resource pool

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic

use esox_resourcepool::{telemetry, AcquireOutcome, PoolConfiguration, ResourcePool};
use std::time::Duration;

fn main() {
    telemetry::init_tracing();

    println!("=== EsoxSolutions.ResourcePool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    let pool = match ResourcePool::new(
        || Ok::<_, std::io::Error>(String::from("connection")),
        PoolConfiguration::new().with_sizes(1, 2),
    ) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Could not create pool: {}", e);
            return;
        }
    };

    println!("Quick Demo:");
    let caller = pool.caller();
    match pool.acquire_with_retry(caller, Duration::from_millis(100)) {
        Ok(AcquireOutcome::Acquired(conn)) => println!("  Got resource: {}", *conn),
        Ok(AcquireOutcome::TimedOut { waited }) => println!("  Timed out after {:?}", waited),
        Err(e) => println!("  Error: {}", e),
    }

    println!("  Available after return: {}", pool.available_count());
}
