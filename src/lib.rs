//! # EsoxSolutions.ResourcePool
//!
//! Bounded, fairness-aware pool of expensive resources (database
//! connections, sessions, sockets) shared by competing callers.
//!
//! ## Features
//!
//! - Hard upper bound on live resources, `min_size` of them built eagerly
//! - On-demand growth up to `max_size`; slots are never removed
//! - Retrying acquisition with a deadline, sync and async
//! - Timeouts reported as an outcome, not an error
//! - Reservation tokens that hold free slots for older waiters
//! - In-place healing of resources returned as faulty
//! - Bulk release of everything a caller owns
//! - Automatic return of resources via RAII (Drop trait)
//! - Metrics, health status and Prometheus export
//! - Structured logging through `tracing`
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{PoolConfiguration, ResourcePool};
//! use std::time::Duration;
//!
//! let pool = ResourcePool::new(
//!     || Ok::<_, std::io::Error>(String::from("connection")),
//!     PoolConfiguration::new().with_sizes(1, 4),
//! )
//! .unwrap();
//!
//! let caller = pool.caller();
//! match pool.acquire_with_retry(caller, Duration::from_millis(100)).unwrap() {
//!     esox_resourcepool::AcquireOutcome::Acquired(conn) => {
//!         println!("Got: {}", *conn);
//!         // Resource automatically returned when `conn` goes out of scope
//!     }
//!     esox_resourcepool::AcquireOutcome::TimedOut { .. } => println!("busy"),
//! }
//! pool.release_all_for_caller(caller);
//! ```

mod config;
mod errors;
mod factory;
mod fairness;
mod health;
mod metrics;
mod pool;
mod slots;
pub mod telemetry;

pub use config::PoolConfiguration;
pub use errors::{PoolError, PoolResult};
pub use factory::ResourceFactory;
pub use fairness::CallerId;
pub use health::HealthStatus;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{AcquireOutcome, PooledResource, ResourcePool};
