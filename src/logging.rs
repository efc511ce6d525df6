//! Tracing setup for embedders of the store.
//!
//! The library itself only emits `tracing` events (transaction lifecycle at
//! debug, timestamp allocation and element writes at trace); installing a
//! subscriber is the embedder's call. [`init_logging`] wires up a
//! reasonable one: `RUST_LOG` when set, the given directive otherwise.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{GraphError, Result};

/// Installs the global tracing subscriber.
///
/// `default_directive` applies when `RUST_LOG` is unset, e.g. `"info"` or
/// `"tenebra=debug"`. Fails if the directive does not parse or a global
/// subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| GraphError::InvalidArgument(format!("invalid log filter: {e}")))?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| GraphError::InvalidArgument(format!("subscriber already installed: {e}")))
}
