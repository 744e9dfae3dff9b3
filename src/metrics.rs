//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(
///     || Ok::<_, std::io::Error>(0u32),
///     PoolConfiguration::new().with_sizes(2, 4),
/// )
/// .unwrap();
/// let caller = pool.caller();
///
/// {
///     let _conn = pool.try_acquire(caller).unwrap().unwrap();
///     let metrics = pool.get_metrics();
///     assert_eq!(metrics.total_acquired, 1);
///     assert_eq!(metrics.active_resources, 1);
///     assert_eq!(metrics.available_resources, 1);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Total resources granted to callers
    pub total_acquired: usize,

    /// Total resources returned to the pool (including faulty returns)
    pub total_released: usize,

    /// Returns flagged as faulty
    pub faulty_releases: usize,

    /// Releases refused because the caller did not own the slot
    pub invalid_releases: usize,

    /// Acquisitions that ran out of time
    pub acquire_timeouts: usize,

    /// Slots added beyond the eager minimum
    pub slots_grown: usize,

    /// Sick resources replaced in place
    pub heals: usize,

    /// Factory failures during construction, growth or healing
    pub construction_failures: usize,

    /// Reservation tokens recorded by failed attempts
    pub tokens_enqueued: usize,

    /// Times the reservation queue had to be deduplicated
    pub queue_deduplications: usize,

    /// Current number of slots
    pub pool_size: usize,

    /// Maximum number of slots
    pub max_size: usize,

    /// Slots currently owned by a caller
    pub active_resources: usize,

    /// Slots currently free
    pub available_resources: usize,

    /// Slots waiting to be healed
    pub sick_resources: usize,

    /// Distinct callers holding at least one unexpired reservation token
    pub waiting_callers: usize,

    /// Active resources relative to `max_size` (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("faulty_releases".to_string(), self.faulty_releases.to_string());
        metrics.insert("invalid_releases".to_string(), self.invalid_releases.to_string());
        metrics.insert("acquire_timeouts".to_string(), self.acquire_timeouts.to_string());
        metrics.insert("slots_grown".to_string(), self.slots_grown.to_string());
        metrics.insert("heals".to_string(), self.heals.to_string());
        metrics.insert("construction_failures".to_string(), self.construction_failures.to_string());
        metrics.insert("tokens_enqueued".to_string(), self.tokens_enqueued.to_string());
        metrics.insert("queue_deduplications".to_string(), self.queue_deduplications.to_string());
        metrics.insert("pool_size".to_string(), self.pool_size.to_string());
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("active_resources".to_string(), self.active_resources.to_string());
        metrics.insert("available_resources".to_string(), self.available_resources.to_string());
        metrics.insert("sick_resources".to_string(), self.sick_resources.to_string());
        metrics.insert("waiting_callers".to_string(), self.waiting_callers.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{MetricsExporter, PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// let pool = ResourcePool::new(
    ///     || Ok::<_, std::io::Error>(()),
    ///     PoolConfiguration::default(),
    /// )
    /// .unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&pool.get_metrics(), "db", Some(&tags)).unwrap();
    /// assert!(output.contains("resourcepool_resources_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }
        let registry = Registry::new_custom(Some("resourcepool".to_string()), Some(labels))?;

        let gauges = [
            ("resources_active", "Slots currently owned by a caller", metrics.active_resources),
            ("resources_available", "Slots currently free", metrics.available_resources),
            ("resources_sick", "Slots waiting to be healed", metrics.sick_resources),
            ("slots", "Current number of slots", metrics.pool_size),
            ("slots_max", "Maximum number of slots", metrics.max_size),
            ("callers_waiting", "Distinct callers with a live reservation", metrics.waiting_callers),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(Opts::new(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let utilization = Gauge::with_opts(Opts::new("utilization", "Pool utilization ratio"))?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        let counters = [
            ("acquired_total", "Total resources acquired", metrics.total_acquired),
            ("released_total", "Total resources released", metrics.total_released),
            ("faulty_releases_total", "Releases flagged as faulty", metrics.faulty_releases),
            ("invalid_releases_total", "Releases by a non-owner", metrics.invalid_releases),
            ("acquire_timeouts_total", "Acquisitions that timed out", metrics.acquire_timeouts),
            ("slots_grown_total", "Slots added on demand", metrics.slots_grown),
            ("heals_total", "Sick resources replaced", metrics.heals),
            ("construction_failures_total", "Factory failures", metrics.construction_failures),
            ("tokens_enqueued_total", "Reservation tokens recorded", metrics.tokens_enqueued),
            (
                "queue_deduplications_total",
                "Reservation queue overflows resolved by deduplication",
                metrics.queue_deduplications,
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(Opts::new(name, help))?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub faulty_releases: AtomicUsize,
    pub invalid_releases: AtomicUsize,
    pub acquire_timeouts: AtomicUsize,
    pub slots_grown: AtomicUsize,
    pub heals: AtomicUsize,
    pub construction_failures: AtomicUsize,
    pub tokens_enqueued: AtomicUsize,
    pub queue_deduplications: AtomicUsize,
}

/// Live state sampled under the pool lock
pub(crate) struct PoolGauges {
    pub pool_size: usize,
    pub max_size: usize,
    pub active: usize,
    pub sick: usize,
    pub waiting: usize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, gauges: PoolGauges) -> PoolMetrics {
        let utilization = if gauges.max_size > 0 {
            gauges.active as f64 / gauges.max_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            faulty_releases: self.faulty_releases.load(Ordering::Relaxed),
            invalid_releases: self.invalid_releases.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            slots_grown: self.slots_grown.load(Ordering::Relaxed),
            heals: self.heals.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            tokens_enqueued: self.tokens_enqueued.load(Ordering::Relaxed),
            queue_deduplications: self.queue_deduplications.load(Ordering::Relaxed),
            pool_size: gauges.pool_size,
            max_size: gauges.max_size,
            active_resources: gauges.active,
            available_resources: gauges.pool_size - gauges.active,
            sick_resources: gauges.sick,
            waiting_callers: gauges.waiting,
            utilization,
        }
    }
}
