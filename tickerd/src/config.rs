//! Process-environment configuration surface. Every field has a documented default so
//! the daemon starts sensibly with no environment at all.

use std::time::Duration;

const DEFAULT_RATE_GATE_WINDOW_SECS: u64 = 30;
const DEFAULT_LOG_PREFIX: &str = "tickerd";

#[derive(Debug, Clone)]
pub struct TickerdConfig {
    /// Minimum spacing enforced between registry updates for the same
    /// exchange/symbol pair. `TICKERD_RATE_GATE_WINDOW_SECS`, default 30.
    pub rate_gate_window: Duration,
    /// Upper bound on how long graceful shutdown waits for in-flight work before
    /// returning anyway. `TICKERD_SHUTDOWN_TIMEOUT_SECS`, unset means unbounded.
    pub shutdown_timeout: Option<Duration>,
    /// Identity recorded against admin-triggered registry entries.
    /// `TICKERD_ADMIN_IDENTITY`, default unset.
    pub admin_identity: Option<String>,
    /// Prefix attached to structured log records and the process registry's
    /// component names. `TICKERD_LOG_PREFIX`, default `"tickerd"`.
    pub log_prefix: String,
}

impl Default for TickerdConfig {
    fn default() -> Self {
        Self {
            rate_gate_window: Duration::from_secs(DEFAULT_RATE_GATE_WINDOW_SECS),
            shutdown_timeout: None,
            admin_identity: None,
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
        }
    }
}

impl TickerdConfig {
    /// Load configuration from the process environment, falling back to defaults for
    /// anything unset or unparsable. Malformed numeric values fall back rather than
    /// failing startup — a bad env var should never stop the daemon from running
    /// with sane defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rate_gate_window = std::env::var("TICKERD_RATE_GATE_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_gate_window);

        let shutdown_timeout = std::env::var("TICKERD_SHUTDOWN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let admin_identity = std::env::var("TICKERD_ADMIN_IDENTITY").ok();

        let log_prefix = std::env::var("TICKERD_LOG_PREFIX").unwrap_or(defaults.log_prefix);

        Self {
            rate_gate_window,
            shutdown_timeout,
            admin_identity,
            log_prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = TickerdConfig::default();
        assert_eq!(config.rate_gate_window, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, None);
        assert_eq!(config.admin_identity, None);
        assert_eq!(config.log_prefix, "tickerd");
    }
}
