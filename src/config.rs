//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_min_size(2)
///     .with_max_size(8)
///     .with_poll_interval(Duration::from_millis(5))
///     .with_timeout(Duration::from_secs(1));
///
/// assert_eq!(config.max_size, 8);
/// assert_eq!(config.token_expiry_window(), Duration::from_millis(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfiguration {
    /// Number of resources constructed eagerly when the pool is created
    pub min_size: usize,

    /// Hard upper bound on the number of slots
    pub max_size: usize,

    /// Sleep between acquisition attempts
    pub poll_interval: Duration,

    /// Default timeout for `acquire` and `acquire_async`
    pub operation_timeout: Duration,

    /// Reservation tokens expire after this many poll intervals
    pub token_expiry_factor: u32,

    /// The reservation queue is deduplicated once it holds more than
    /// `queue_overflow_factor * max_size` tokens
    pub queue_overflow_factor: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            poll_interval: Duration::from_millis(5),
            operation_timeout: Duration::from_secs(30),
            token_expiry_factor: 2,
            queue_overflow_factor: 30,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of eagerly constructed resources
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_max_size(50);
    ///
    /// assert_eq!(config.max_size, 50);
    /// ```
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set both bounds at once
    pub fn with_sizes(self, min: usize, max: usize) -> Self {
        self.with_min_size(min).with_max_size(max)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the default acquire timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_token_expiry_factor(mut self, factor: u32) -> Self {
        self.token_expiry_factor = factor;
        self
    }

    pub fn with_queue_overflow_factor(mut self, factor: usize) -> Self {
        self.queue_overflow_factor = factor;
        self
    }

    /// How long a reservation token keeps its place in the queue
    pub fn token_expiry_window(&self) -> Duration {
        self.poll_interval * self.token_expiry_factor
    }

    /// Queue length above which duplicate tokens are dropped
    pub fn queue_overflow_bound(&self) -> usize {
        self.queue_overflow_factor.saturating_mul(self.max_size)
    }

    /// Check the bounds `0 < min_size <= max_size` and non-zero timings
    pub fn validate(&self) -> PoolResult<()> {
        if self.min_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "min_size must be greater than zero".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(PoolError::InvalidConfiguration(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if self.token_expiry_factor == 0 || self.queue_overflow_factor == 0 {
            return Err(PoolError::InvalidConfiguration(
                "token_expiry_factor and queue_overflow_factor must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
