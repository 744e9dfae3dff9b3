//! Log output for the demo binary and examples
//!
//! The pool itself only emits `tracing` events. Applications that already
//! install a subscriber never need this module.

use tracing_subscriber::EnvFilter;

/// Pool events shown when `RUST_LOG` is unset: growth, healing, refused
/// releases and failed closes.
pub const DEFAULT_DIRECTIVE: &str = "esox_resourcepool=debug";

/// Print pool events to stdout.
///
/// `RUST_LOG` wins over [`DEFAULT_DIRECTIVE`] when set. Calling this after
/// another subscriber has been installed does nothing.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
