//! Tracing subscriber setup
//!
//! Libraries in this workspace only emit events; binaries and tests call
//! [`init_tracing`] once to install a subscriber.

use ragline_config::ObservabilityConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::EngineError;

const CRATES: [&str; 4] = ["ragline_core", "ragline_config", "ragline_rag", "ragline_engine"];

/// Default filter directives for a log level
pub fn default_directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install a global fmt subscriber
///
/// `RUST_LOG` overrides the configured level. JSON output when
/// `log_json` is set. Fails if a global subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), EngineError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(&config.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    subscriber
        .with(fmt_layer)
        .try_init()
        .map_err(|e| EngineError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("ragline_core=debug,"));
        assert!(directives.ends_with("ragline_engine=debug"));
        assert!(directives.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let config = ObservabilityConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(EngineError::Telemetry(_))));
    }
}
