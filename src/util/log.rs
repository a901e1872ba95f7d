use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for the orchestrator.
///
/// `RUST_LOG` overrides the filter when set; the default enables info-level
/// events everywhere plus debug-level events from this crate, so lifecycle
/// transactions are visible without drowning in dependency noise.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,grove_core=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}
