//! Logging setup for host applications embedding Minne.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize a `tracing` subscriber for the crate.
///
/// `RUST_LOG` takes precedence over `level` when set. Safe to call more than
/// once; later calls are no-ops if a global subscriber is already installed.
pub fn init(level: &str) {
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("minne={}", level)),
    );

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
