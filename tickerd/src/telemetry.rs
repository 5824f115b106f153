//! `tracing` subscriber initialisation for the binary entry point. Library code never
//! installs a subscriber itself — only `bin/tickerd.rs` calls [`init`].

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// One JSON object per line, for shipping to a log aggregator.
    Json,
}

/// Install a global `tracing` subscriber honouring `RUST_LOG` (default `info`) and the
/// requested format. Panics if a subscriber is already installed, since that is a
/// programmer error in the binary, not a runtime condition.
pub fn init(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
            Registry::default()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .expect("tracing subscriber already installed");
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);
            Registry::default()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .expect("tracing subscriber already installed");
        }
    }
}
