//! Construction and disposal of pooled resources

use std::error::Error as StdError;

/// Builds the resources held by a [`ResourcePool`](crate::ResourcePool).
///
/// The pool calls [`create`](ResourceFactory::create) while holding its
/// lock, so construction is serialized across all acquirers. Any
/// `Fn() -> Result<R, E>` closure is a factory.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(
///     || Ok::<_, std::io::Error>(String::from("connection")),
///     PoolConfiguration::new().with_min_size(1).with_max_size(2),
/// )
/// .unwrap();
///
/// assert_eq!(pool.size(), 1);
/// ```
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled resource
    type Resource: Send + 'static;

    /// Error reported by construction or disposal
    type Error: StdError + Send + Sync + 'static;

    /// Construct one live resource
    fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Close a resource that is leaving the pool.
    ///
    /// Errors are logged by the pool and never propagated to callers.
    fn destroy(&self, resource: Self::Resource) -> Result<(), Self::Error> {
        drop(resource);
        Ok(())
    }
}

impl<F, R, E> ResourceFactory for F
where
    F: Fn() -> Result<R, E> + Send + Sync + 'static,
    R: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    type Resource = R;
    type Error = E;

    fn create(&self) -> Result<R, E> {
        self()
    }
}
