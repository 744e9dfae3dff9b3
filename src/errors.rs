//! Error types for the resource pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::fairness::CallerId;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Failed to construct resource: {source}")]
    Construction {
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },

    #[error("Slot {slot} is not owned by caller {caller}")]
    InvalidRelease { slot: usize, caller: CallerId },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl PoolError {
    pub(crate) fn construction<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        PoolError::Construction {
            source: Arc::new(err),
        }
    }

    /// Whether this error came from the resource factory
    pub fn is_construction(&self) -> bool {
        matches!(self, PoolError::Construction { .. })
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
