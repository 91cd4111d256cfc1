//! Process-wide logging setup, grounded on `at-telemetry`'s
//! `init_logging`/`init_logging_json`: an `EnvFilter` seeded from
//! `RUST_LOG` falling back to a caller-supplied default, safe to call more
//! than once (tests may initialize it repeatedly).

use tracing_subscriber::{fmt, EnvFilter};

/// Human-readable output, suitable for a terminal.
pub fn init(service_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised");
}

/// JSON output, suitable for shipping to a log aggregator.
pub fn init_json(service_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (json)");
}
