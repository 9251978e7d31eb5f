//! Development-time tracing for the engine.
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the embedding application. This module provides the default setup used by
//! the benches and integration tests.
//!
//! # Targets
//!
//! - `horn::vm::step`: one event per executed instruction (requires
//!   `EngineConfig::trace`)
//! - `horn::vm::call`: predicate calls
//! - `horn::vm::nondet`: choice point pushes, pops and cuts
//! - `horn::vm::exception`: throws, handler dispatch and unwinding
//! - `horn::compiler`: predicate compilation
//! - `horn::database`: clause database mutations and cache invalidation
//! - `horn::engine`: goal preparation, nesting and stopping

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize a tracing subscriber writing compact events to stderr.
///
/// Reads the `HORN_LOG` env var, then `RUST_LOG`. Defaults to `warn` if
/// neither is set. Safe to call more than once; only the first call installs
/// the subscriber.
///
/// # Example
/// ```bash
/// HORN_LOG=horn::vm::nondet=trace cargo test
/// ```
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("HORN_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        // A subscriber may already be installed by the host application.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init();
    });
}
