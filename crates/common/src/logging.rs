//! Tracing subscriber initialisation.
//!
//! The engine logs through `tracing` with structured fields under the
//! targets `queries`, `cache`, and `registry`. Verbosity is controlled by
//! the `SCOUT_LOG` environment variable (standard `EnvFilter` syntax).

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("SCOUT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
