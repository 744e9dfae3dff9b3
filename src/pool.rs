//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::factory::ResourceFactory;
use crate::fairness::{CallerId, FairnessQueue};
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolGauges, PoolMetrics};
use crate::slots::SlotRegistry;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a retrying acquisition
///
/// Running out of time is an expected outcome, not an error; callers pick
/// their own policy (reject, back off, escalate).
#[derive(Debug)]
pub enum AcquireOutcome<T> {
    /// A slot was granted
    Acquired(T),

    /// The deadline passed without a free slot
    TimedOut { waited: Duration },
}

impl<T> AcquireOutcome<T> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, AcquireOutcome::TimedOut { .. })
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            AcquireOutcome::Acquired(value) => Some(value),
            AcquireOutcome::TimedOut { .. } => None,
        }
    }

    /// Treat a timeout as [`PoolError::Timeout`]
    pub fn into_result(self) -> PoolResult<T> {
        match self {
            AcquireOutcome::Acquired(value) => Ok(value),
            AcquireOutcome::TimedOut { waited } => Err(PoolError::Timeout(waited)),
        }
    }
}

/// A resource checked out of the pool
///
/// Returned to its slot when dropped, or explicitly through
/// [`ResourcePool::release`] / [`ResourcePool::release_faulty`].
pub struct PooledResource<F: ResourceFactory> {
    resource: Option<F::Resource>,
    slot: usize,
    caller: CallerId,
    epoch: u64,
    resource_id: u64,
    faulty: bool,
    shared: Arc<Shared<F>>,
}

impl<F: ResourceFactory> PooledResource<F> {
    /// Construction id of the resource; changes whenever the slot is healed
    pub fn resource_id(&self) -> u64 {
        self.resource_id
    }

    /// Registry position this resource belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn caller(&self) -> CallerId {
        self.caller
    }

    /// Flag the resource as broken so it is replaced before its next use.
    /// Takes effect when the lease is dropped.
    pub fn mark_faulty(&mut self) {
        self.faulty = true;
    }

    fn return_to_pool(&mut self, faulty: bool) -> PoolResult<()> {
        match self.resource.take() {
            Some(resource) => {
                self.shared
                    .check_in(self.slot, self.caller, self.epoch, resource, faulty)
            }
            None => Ok(()),
        }
    }
}

impl<F: ResourceFactory> Deref for PooledResource<F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("resource already returned")
    }
}

impl<F: ResourceFactory> DerefMut for PooledResource<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("resource already returned")
    }
}

impl<F: ResourceFactory> Drop for PooledResource<F> {
    fn drop(&mut self) {
        // Refusals are logged in check_in.
        let faulty = self.faulty;
        let _ = self.return_to_pool(faulty);
    }
}

impl<F: ResourceFactory> fmt::Debug for PooledResource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledResource")
            .field("slot", &self.slot)
            .field("caller", &self.caller)
            .field("resource_id", &self.resource_id)
            .field("faulty", &self.faulty)
            .finish()
    }
}

struct PoolState<R> {
    slots: SlotRegistry<R>,
    queue: FairnessQueue,
}

struct Shared<F: ResourceFactory> {
    factory: F,
    config: PoolConfiguration,
    state: Mutex<PoolState<F::Resource>>,
    metrics: MetricsTracker,
    next_caller: AtomicU64,
    next_resource_id: AtomicU64,
}

impl<F: ResourceFactory> Shared<F> {
    /// Build one resource and give it a fresh construction id
    fn build(&self) -> PoolResult<(F::Resource, u64)> {
        match self.factory.create() {
            Ok(resource) => {
                let id = self.next_resource_id.fetch_add(1, Ordering::Relaxed);
                Ok((resource, id))
            }
            Err(e) => {
                MetricsTracker::incr(&self.metrics.construction_failures);
                tracing::warn!(error = %e, "resource construction failed");
                Err(PoolError::construction(e))
            }
        }
    }

    /// Best-effort close
    fn discard(&self, resource: F::Resource) {
        if let Err(e) = self.factory.destroy(resource) {
            tracing::warn!(error = %e, "failed to close discarded resource");
        }
    }

    fn check_in(
        &self,
        slot: usize,
        caller: CallerId,
        epoch: u64,
        resource: F::Resource,
        faulty: bool,
    ) -> PoolResult<()> {
        let refused = self
            .state
            .lock()
            .slots
            .check_in(slot, caller, epoch, resource, faulty)
            .err();

        match refused {
            None => {
                MetricsTracker::incr(&self.metrics.total_released);
                if faulty {
                    MetricsTracker::incr(&self.metrics.faulty_releases);
                    tracing::debug!(slot, %caller, "resource released as faulty");
                }
                Ok(())
            }
            Some((reason, resource)) => {
                MetricsTracker::incr(&self.metrics.invalid_releases);
                tracing::warn!(slot, %caller, ?reason, "release refused, caller does not own the slot");
                self.discard(resource);
                Err(PoolError::InvalidRelease { slot, caller })
            }
        }
    }
}

/// Bounded, fairness-aware pool of reusable resources
///
/// Resources are built by a [`ResourceFactory`]. `min_size` of them are
/// created up front; further slots are added on demand up to `max_size`
/// and are never removed. Callers that cannot be served leave a
/// reservation behind, and free slots are held back for older
/// reservations before newer callers may take them.
///
/// Cloning the pool yields another handle to the same slots.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
/// use std::time::Duration;
///
/// let pool = ResourcePool::new(
///     || Ok::<_, std::io::Error>(Vec::<u8>::new()),
///     PoolConfiguration::new().with_sizes(1, 2),
/// )
/// .unwrap();
///
/// let caller = pool.caller();
/// let mut buffer = pool
///     .acquire_with_retry(caller, Duration::from_millis(50))
///     .unwrap()
///     .into_option()
///     .unwrap();
/// buffer.push(1);
/// pool.release(buffer).unwrap();
/// ```
pub struct ResourcePool<F: ResourceFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ResourceFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Create a pool and eagerly build `min_size` resources.
    ///
    /// Fails without a partial pool if the configuration is invalid or any
    /// initial resource cannot be built.
    pub fn new(factory: F, config: PoolConfiguration) -> PoolResult<Self> {
        config.validate()?;

        let shared = Shared {
            state: Mutex::new(PoolState {
                slots: SlotRegistry::with_capacity(config.max_size),
                queue: FairnessQueue::new(
                    config.token_expiry_window(),
                    config.queue_overflow_bound(),
                ),
            }),
            factory,
            metrics: MetricsTracker::new(),
            next_caller: AtomicU64::new(1),
            next_resource_id: AtomicU64::new(1),
            config,
        };

        let mut initial = Vec::with_capacity(shared.config.min_size);
        for _ in 0..shared.config.min_size {
            match shared.build() {
                Ok(built) => initial.push(built),
                Err(e) => {
                    for (resource, _) in initial {
                        shared.discard(resource);
                    }
                    return Err(e);
                }
            }
        }

        {
            let mut state = shared.state.lock();
            for (resource, id) in initial {
                state.slots.push(resource, id);
            }
        }

        tracing::info!(
            min_size = shared.config.min_size,
            max_size = shared.config.max_size,
            "resource pool created"
        );

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Allocate a caller identity unique within this pool
    pub fn caller(&self) -> CallerId {
        CallerId::from(self.shared.next_caller.fetch_add(1, Ordering::Relaxed))
    }

    /// Make a single acquisition attempt.
    ///
    /// Returns `Ok(None)` when no slot is available for `caller` yet; a
    /// reservation is then recorded so that the caller keeps its place
    /// on the next attempt. Errors only when a resource had to be built
    /// (growth or healing) and the factory failed.
    pub fn try_acquire(&self, caller: CallerId) -> PoolResult<Option<PooledResource<F>>> {
        let shared = &*self.shared;
        let now = Instant::now();
        let mut guard = shared.state.lock();
        let state = &mut *guard;

        let reserved = state.queue.priority_count(caller, now);

        if let Some(index) = state.slots.grant_candidate(reserved) {
            state.queue.consume(caller);
            return self.grant(&mut state.slots, index, caller).map(Some);
        }

        if state.slots.len() < shared.config.max_size {
            let (resource, id) = shared.build()?;
            let index = state.slots.push(resource, id);
            MetricsTracker::incr(&shared.metrics.slots_grown);
            tracing::debug!(slot = index, size = state.slots.len(), "pool grown");

            state.queue.consume(caller);
            return self.grant(&mut state.slots, index, caller).map(Some);
        }

        MetricsTracker::incr(&shared.metrics.tokens_enqueued);
        if state.queue.enqueue(caller, now) {
            MetricsTracker::incr(&shared.metrics.queue_deduplications);
        }
        tracing::trace!(%caller, reserved, waiting = state.queue.len(), "no slot available");
        Ok(None)
    }

    /// Assign a free slot to `caller`, healing it first if needed
    fn grant(
        &self,
        slots: &mut SlotRegistry<F::Resource>,
        index: usize,
        caller: CallerId,
    ) -> PoolResult<PooledResource<F>> {
        let shared = &*self.shared;

        let (resource, epoch, resource_id) = slots.assign_with(index, caller, |stale| {
            if let Some(stale) = stale {
                shared.discard(stale);
            }
            let rebuilt = shared.build()?;
            MetricsTracker::incr(&shared.metrics.heals);
            tracing::debug!(slot = index, resource_id = rebuilt.1, "slot healed");
            Ok::<_, PoolError>(rebuilt)
        })?;

        MetricsTracker::incr(&shared.metrics.total_acquired);

        Ok(PooledResource {
            resource: Some(resource),
            slot: index,
            caller,
            epoch,
            resource_id,
            faulty: false,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Retry acquisition until a slot is granted or `timeout` elapses.
    ///
    /// A timeout too large to be represented as an [`Instant`] (such as
    /// `Duration::MAX`) means the caller waits until a slot is granted.
    pub fn acquire_with_retry(
        &self,
        caller: CallerId,
        timeout: Duration,
    ) -> PoolResult<AcquireOutcome<PooledResource<F>>> {
        let started = Instant::now();
        self.retry_blocking(caller, started, started.checked_add(timeout))
    }

    /// Retry acquisition until a slot is granted or `deadline` passes.
    ///
    /// At least one attempt is made. The pool lock is never held while
    /// sleeping between attempts.
    pub fn acquire_until(
        &self,
        caller: CallerId,
        deadline: Instant,
    ) -> PoolResult<AcquireOutcome<PooledResource<F>>> {
        self.retry_blocking(caller, Instant::now(), Some(deadline))
    }

    fn retry_blocking(
        &self,
        caller: CallerId,
        started: Instant,
        deadline: Option<Instant>,
    ) -> PoolResult<AcquireOutcome<PooledResource<F>>> {
        loop {
            if let Some(lease) = self.try_acquire(caller)? {
                return Ok(AcquireOutcome::Acquired(lease));
            }
            match self.next_pause(deadline) {
                Some(pause) => std::thread::sleep(pause),
                None => return Ok(self.timed_out(caller, started)),
            }
        }
    }

    /// Time to sleep before the next attempt, `None` once the deadline has
    /// passed. No deadline means poll forever.
    fn next_pause(&self, deadline: Option<Instant>) -> Option<Duration> {
        let poll = self.shared.config.poll_interval;
        let Some(deadline) = deadline else {
            return Some(poll);
        };
        let now = Instant::now();
        if now >= deadline {
            None
        } else {
            Some(poll.min(deadline - now))
        }
    }

    /// Acquire with the configured `operation_timeout`
    pub fn acquire(&self, caller: CallerId) -> PoolResult<AcquireOutcome<PooledResource<F>>> {
        self.acquire_with_retry(caller, self.shared.config.operation_timeout)
    }

    /// Async variant of [`acquire_with_retry`](Self::acquire_with_retry).
    ///
    /// Sleeps on the tokio timer between attempts. Resource construction
    /// still runs synchronously on the calling task.
    pub async fn acquire_with_retry_async(
        &self,
        caller: CallerId,
        timeout: Duration,
    ) -> PoolResult<AcquireOutcome<PooledResource<F>>> {
        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        loop {
            if let Some(lease) = self.try_acquire(caller)? {
                return Ok(AcquireOutcome::Acquired(lease));
            }
            match self.next_pause(deadline) {
                Some(pause) => tokio::time::sleep(pause).await,
                None => return Ok(self.timed_out(caller, started)),
            }
        }
    }

    pub async fn acquire_async(
        &self,
        caller: CallerId,
    ) -> PoolResult<AcquireOutcome<PooledResource<F>>> {
        self.acquire_with_retry_async(caller, self.shared.config.operation_timeout)
            .await
    }

    fn timed_out(&self, caller: CallerId, started: Instant) -> AcquireOutcome<PooledResource<F>> {
        let waited = started.elapsed();
        MetricsTracker::incr(&self.shared.metrics.acquire_timeouts);
        tracing::debug!(%caller, ?waited, "acquire timed out");
        AcquireOutcome::TimedOut { waited }
    }

    /// Return a resource to its slot.
    ///
    /// Fails with [`PoolError::InvalidRelease`] if the caller no longer
    /// owns the slot; the pool is left untouched and the resource is closed.
    pub fn release(&self, mut lease: PooledResource<F>) -> PoolResult<()> {
        lease.return_to_pool(false)
    }

    /// Return a resource that is suspected broken. It is closed and
    /// rebuilt the next time its slot is granted.
    pub fn release_faulty(&self, mut lease: PooledResource<F>) -> PoolResult<()> {
        lease.return_to_pool(true)
    }

    /// Clear ownership of every slot held by `caller` and return how many
    /// were released. Any lease the caller still holds becomes stale.
    pub fn release_all_for_caller(&self, caller: CallerId) -> usize {
        let released = self.shared.state.lock().slots.release_all(caller);
        if released > 0 {
            tracing::debug!(%caller, released, "released all slots for caller");
        }
        released
    }

    /// Current number of slots
    pub fn size(&self) -> usize {
        self.shared.state.lock().slots.len()
    }

    pub fn max_size(&self) -> usize {
        self.shared.config.max_size
    }

    /// Free slots
    pub fn available_count(&self) -> usize {
        let state = self.shared.state.lock();
        state.slots.len() - state.slots.owned_count()
    }

    /// Owned slots
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().slots.owned_count()
    }

    /// Reservation tokens currently queued, expired and duplicate ones
    /// included. See [`PoolMetrics::waiting_callers`] for the number of
    /// distinct callers still waiting.
    pub fn waiting_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let gauges = {
            let state = self.shared.state.lock();
            PoolGauges {
                pool_size: state.slots.len(),
                max_size: self.shared.config.max_size,
                active: state.slots.owned_count(),
                sick: state.slots.sick_count(),
                waiting: state.queue.waiting_callers(Instant::now()),
            }
        };
        self.shared.metrics.get_metrics(gauges)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.get_metrics())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        crate::metrics::MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<F: ResourceFactory> fmt::Debug for ResourcePool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ResourcePool")
            .field("size", &state.slots.len())
            .field("max_size", &self.shared.config.max_size)
            .field("active", &state.slots.owned_count())
            .field("queued_tokens", &state.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Debug)]
    struct Conn {
        serial: usize,
    }

    struct TestFactory {
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
        close_failing: Arc<AtomicBool>,
    }

    impl ResourceFactory for TestFactory {
        type Resource = Conn;
        type Error = io::Error;

        fn create(&self) -> Result<Conn, io::Error> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "database down"));
            }
            let serial = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Conn { serial })
        }

        fn destroy(&self, _conn: Conn) -> Result<(), io::Error> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            if self.close_failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "close failed"));
            }
            Ok(())
        }
    }

    struct Harness {
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
        close_failing: Arc<AtomicBool>,
    }

    fn pool(min: usize, max: usize) -> (ResourcePool<TestFactory>, Harness) {
        let harness = Harness {
            created: Arc::new(AtomicUsize::new(0)),
            destroyed: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
            close_failing: Arc::new(AtomicBool::new(false)),
        };
        let factory = TestFactory {
            created: Arc::clone(&harness.created),
            destroyed: Arc::clone(&harness.destroyed),
            failing: Arc::clone(&harness.failing),
            close_failing: Arc::clone(&harness.close_failing),
        };
        let config = PoolConfiguration::new()
            .with_sizes(min, max)
            .with_poll_interval(Duration::from_millis(25));
        (ResourcePool::new(factory, config).unwrap(), harness)
    }

    #[test]
    fn test_new_builds_min_size_eagerly() {
        let (pool, harness) = pool(3, 5);
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.available_count(), 3);
        assert_eq!(harness.created.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_new_fails_when_factory_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory = move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                Err(io::Error::other("handshake failed"))
            } else {
                Ok(())
            }
        };

        let result = ResourcePool::new(factory, PoolConfiguration::new().with_sizes(3, 3));
        assert!(matches!(result, Err(PoolError::Construction { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_new_rejects_invalid_configuration() {
        let result = ResourcePool::new(
            || Ok::<_, io::Error>(()),
            PoolConfiguration::new().with_sizes(4, 2),
        );
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_acquire_and_release_reuses_slot() {
        let (pool, harness) = pool(1, 1);
        let caller = pool.caller();

        let conn = pool.try_acquire(caller).unwrap().unwrap();
        let first_id = conn.resource_id();
        assert_eq!(pool.active_count(), 1);
        pool.release(conn).unwrap();

        let conn = pool.try_acquire(caller).unwrap().unwrap();
        assert_eq!(conn.resource_id(), first_id);
        assert_eq!(harness.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_returns_resource() {
        let (pool, _) = pool(1, 1);
        {
            let _conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
            assert_eq!(pool.available_count(), 0);
        }
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.get_metrics().total_released, 1);
    }

    #[test]
    fn test_grows_up_to_max_size() {
        let (pool, _) = pool(1, 3);
        let leases: Vec<_> = (0..3)
            .map(|_| pool.try_acquire(pool.caller()).unwrap().unwrap())
            .collect();

        assert_eq!(pool.size(), 3);
        assert!(pool.try_acquire(pool.caller()).unwrap().is_none());
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.get_metrics().slots_grown, 2);

        let slots: Vec<usize> = leases.iter().map(|l| l.slot()).collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn test_failed_attempt_records_reservation() {
        let (pool, _) = pool(1, 1);
        let _held = pool.try_acquire(pool.caller()).unwrap().unwrap();

        let waiter = pool.caller();
        assert!(pool.try_acquire(waiter).unwrap().is_none());
        assert_eq!(pool.waiting_count(), 1);
        assert_eq!(pool.get_metrics().tokens_enqueued, 1);
    }

    #[test]
    fn test_free_slot_is_held_for_older_waiter() {
        let (pool, _) = pool(1, 1);
        let holder = pool.caller();
        let waiter = pool.caller();
        let newcomer = pool.caller();

        let held = pool.try_acquire(holder).unwrap().unwrap();
        assert!(pool.try_acquire(waiter).unwrap().is_none());
        pool.release(held).unwrap();

        // The free slot belongs to the waiter while its token is live.
        assert!(pool.try_acquire(newcomer).unwrap().is_none());
        let granted = pool.try_acquire(waiter).unwrap().unwrap();
        assert_eq!(granted.caller(), waiter);
        assert_eq!(pool.waiting_count(), 1);
    }

    #[test]
    fn test_expired_reservation_stops_blocking() {
        let (pool, _) = pool(1, 1);
        let waiter = pool.caller();
        let newcomer = pool.caller();

        let held = pool.try_acquire(pool.caller()).unwrap().unwrap();
        assert!(pool.try_acquire(waiter).unwrap().is_none());
        pool.release(held).unwrap();

        std::thread::sleep(pool.config().token_expiry_window() * 3);
        assert!(pool.try_acquire(newcomer).unwrap().is_some());
    }

    #[test]
    fn test_release_faulty_heals_on_next_grant() {
        let (pool, harness) = pool(1, 1);
        let caller = pool.caller();

        let conn = pool.try_acquire(caller).unwrap().unwrap();
        let (slot, old_id, old_serial) = (conn.slot(), conn.resource_id(), conn.serial);
        pool.release_faulty(conn).unwrap();
        assert_eq!(pool.get_metrics().sick_resources, 1);

        let conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
        assert_eq!(conn.slot(), slot);
        assert_ne!(conn.resource_id(), old_id);
        assert_ne!(conn.serial, old_serial);
        assert_eq!(harness.destroyed.load(Ordering::SeqCst), 1);

        let metrics = pool.get_metrics();
        assert_eq!(metrics.heals, 1);
        assert_eq!(metrics.sick_resources, 0);
    }

    #[test]
    fn test_mark_faulty_on_drop() {
        let (pool, _) = pool(1, 1);
        let old_id = {
            let mut conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
            conn.mark_faulty();
            conn.resource_id()
        };

        let conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
        assert_ne!(conn.resource_id(), old_id);
    }

    #[test]
    fn test_heal_failure_keeps_slot_sick() {
        let (pool, harness) = pool(1, 1);
        let conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
        pool.release_faulty(conn).unwrap();

        harness.failing.store(true, Ordering::SeqCst);
        let err = pool.try_acquire(pool.caller()).unwrap_err();
        assert!(err.is_construction());
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.get_metrics().sick_resources, 1);

        harness.failing.store(false, Ordering::SeqCst);
        assert!(pool.try_acquire(pool.caller()).unwrap().is_some());
        assert_eq!(pool.get_metrics().sick_resources, 0);
    }

    #[test]
    fn test_heal_succeeds_when_closing_old_resource_fails() {
        let (pool, harness) = pool(1, 1);
        harness.close_failing.store(true, Ordering::SeqCst);

        let conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
        let old_id = conn.resource_id();
        pool.release_faulty(conn).unwrap();

        let conn = pool.try_acquire(pool.caller()).unwrap().unwrap();
        assert_ne!(conn.resource_id(), old_id);
        assert_eq!(harness.destroyed.load(Ordering::SeqCst), 1);

        let metrics = pool.get_metrics();
        assert_eq!(metrics.heals, 1);
        assert_eq!(metrics.sick_resources, 0);
        assert_eq!(metrics.construction_failures, 0);
    }

    #[test]
    fn test_invalid_release_ignores_close_failure() {
        let (pool, harness) = pool(1, 1);
        harness.close_failing.store(true, Ordering::SeqCst);
        let caller = pool.caller();
        let stale = pool.try_acquire(caller).unwrap().unwrap();

        assert_eq!(pool.release_all_for_caller(caller), 1);
        let other = pool.try_acquire(pool.caller()).unwrap().unwrap();

        match pool.release(stale) {
            Err(PoolError::InvalidRelease { slot, caller: refused }) => {
                assert_eq!(slot, 0);
                assert_eq!(refused, caller);
            }
            unexpected => panic!("expected InvalidRelease, got {unexpected:?}"),
        }
        assert_eq!(harness.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.active_count(), 1);

        harness.close_failing.store(false, Ordering::SeqCst);
        pool.release(other).unwrap();
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_growth_failure_is_immediate_error() {
        let (pool, harness) = pool(1, 2);
        let _held = pool.try_acquire(pool.caller()).unwrap().unwrap();

        harness.failing.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let result = pool.acquire_with_retry(pool.caller(), Duration::from_secs(5));

        assert!(matches!(result, Err(PoolError::Construction { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.get_metrics().construction_failures, 1);
    }

    #[test]
    fn test_acquire_with_retry_times_out() {
        let (pool, _) = pool(1, 1);
        let _held = pool.try_acquire(pool.caller()).unwrap().unwrap();

        let timeout = Duration::from_millis(30);
        let outcome = pool.acquire_with_retry(pool.caller(), timeout).unwrap();
        match outcome {
            AcquireOutcome::TimedOut { waited } => assert!(waited >= timeout),
            AcquireOutcome::Acquired(_) => panic!("pool should be exhausted"),
        }
        assert_eq!(pool.get_metrics().acquire_timeouts, 1);
    }

    #[test]
    fn test_unbounded_timeout_acquires_free_slot() {
        let (pool, _) = pool(1, 1);
        let conn = pool
            .acquire_with_retry(pool.caller(), Duration::MAX)
            .unwrap()
            .into_option()
            .expect("free slot");
        assert_eq!(conn.slot(), 0);
    }

    #[test]
    fn test_unbounded_configured_timeout() {
        let pool = ResourcePool::new(
            || Ok::<_, io::Error>(()),
            PoolConfiguration::new()
                .with_sizes(1, 1)
                .with_timeout(Duration::MAX),
        )
        .unwrap();
        assert!(pool.acquire(pool.caller()).unwrap().into_option().is_some());
    }

    #[test]
    fn test_unbounded_timeout_waits_for_release() {
        let (pool, _) = pool(1, 1);
        let holder = pool.caller();
        let held = pool.try_acquire(holder).unwrap().unwrap();

        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || {
                let caller = pool.caller();
                let outcome = pool.acquire_with_retry(caller, Duration::MAX).unwrap();
                outcome.into_option().map(|conn| conn.caller() == caller)
            })
        };

        std::thread::sleep(Duration::from_millis(60));
        pool.release(held).unwrap();
        assert_eq!(waiter.join().unwrap(), Some(true));
        assert_eq!(pool.get_metrics().acquire_timeouts, 0);
    }

    #[test]
    fn test_timeout_into_result() {
        let (pool, _) = pool(1, 1);
        let _held = pool.try_acquire(pool.caller()).unwrap().unwrap();

        let outcome = pool
            .acquire_with_retry(pool.caller(), Duration::from_millis(5))
            .unwrap();
        assert!(outcome.is_timed_out());
        assert!(matches!(outcome.into_result(), Err(PoolError::Timeout(_))));
    }

    #[test]
    fn test_release_after_release_all_is_invalid() {
        let (pool, harness) = pool(1, 1);
        let caller = pool.caller();
        let conn = pool.try_acquire(caller).unwrap().unwrap();

        assert_eq!(pool.release_all_for_caller(caller), 1);
        let other = pool.try_acquire(pool.caller()).unwrap().unwrap();

        let err = pool.release(conn).unwrap_err();
        assert!(matches!(err, PoolError::InvalidRelease { slot: 0, .. }));
        assert_eq!(pool.active_count(), 1);
        assert_eq!(harness.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.get_metrics().invalid_releases, 1);

        pool.release(other).unwrap();
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_release_all_for_caller_without_slots_is_noop() {
        let (pool, _) = pool(2, 2);
        let held = pool.try_acquire(pool.caller()).unwrap().unwrap();
        let before = pool.get_metrics();

        assert_eq!(pool.release_all_for_caller(pool.caller()), 0);

        let after = pool.get_metrics();
        assert_eq!(before.active_resources, after.active_resources);
        assert_eq!(before.waiting_callers, after.waiting_callers);
        drop(held);
    }

    #[test]
    fn test_clone_shares_slots() {
        let (pool, _) = pool(1, 1);
        let handle = pool.clone();
        let _held = pool.try_acquire(pool.caller()).unwrap().unwrap();
        assert_eq!(handle.available_count(), 0);
    }

    #[tokio::test]
    async fn test_async_acquire() {
        let (pool, _) = pool(1, 1);
        let caller = pool.caller();

        let conn = pool
            .acquire_with_retry_async(caller, Duration::from_millis(50))
            .await
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(conn.caller(), caller);

        let outcome = pool
            .acquire_with_retry_async(pool.caller(), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(outcome.is_timed_out());
    }

    #[tokio::test]
    async fn test_async_unbounded_timeout() {
        let (pool, _) = pool(1, 1);
        let conn = pool
            .acquire_with_retry_async(pool.caller(), Duration::MAX)
            .await
            .unwrap()
            .into_option();
        assert!(conn.is_some());
    }

    #[test]
    fn test_waiting_callers_counts_distinct_live_callers() {
        let (pool, _) = pool(1, 1);
        let _held = pool.try_acquire(pool.caller()).unwrap().unwrap();

        let waiter = pool.caller();
        for _ in 0..3 {
            assert!(pool.try_acquire(waiter).unwrap().is_none());
        }
        assert_eq!(pool.waiting_count(), 3);
        assert_eq!(pool.get_metrics().waiting_callers, 1);

        std::thread::sleep(pool.config().token_expiry_window() * 3);
        assert_eq!(pool.waiting_count(), 3);
        assert_eq!(pool.get_metrics().waiting_callers, 0);
        let health = pool.get_health_status();
        assert!(!health.warnings.iter().any(|w| w.contains("waiting")));
    }
}
