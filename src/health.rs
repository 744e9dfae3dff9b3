//! Health monitoring for resource pools

use crate::metrics::PoolMetrics;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(
///     || Ok::<_, std::io::Error>(1u8),
///     PoolConfiguration::new().with_sizes(3, 3),
/// )
/// .unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.available_resources, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Free slots
    pub available_resources: usize,

    /// Owned slots
    pub active_resources: usize,

    /// Slots marked faulty and not yet healed
    pub sick_resources: usize,

    /// Distinct callers holding an unexpired reservation token
    pub waiting_callers: usize,

    /// Maximum number of slots
    pub total_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Derive a health status from a metrics snapshot
    pub fn from_metrics(metrics: &PoolMetrics) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if metrics.utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", metrics.utilization * 100.0));
            is_healthy = false;
        }

        if metrics.sick_resources > 0 {
            warnings.push(format!("{} resource(s) awaiting healing", metrics.sick_resources));
        }

        if metrics.waiting_callers > 0 {
            warnings.push(format!("{} caller(s) waiting for a resource", metrics.waiting_callers));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization: metrics.utilization,
            available_resources: metrics.available_resources,
            active_resources: metrics.active_resources,
            sick_resources: metrics.sick_resources,
            waiting_callers: metrics.waiting_callers,
            total_capacity: metrics.max_size,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
