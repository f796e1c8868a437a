//! Logging setup for hosts of the runtime

use std::fmt;
use std::str::FromStr;

use kinda_core::KindaError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

/// Environment variable holding the filter directives
pub const LOG_ENV: &str = "KINDA_LOG";

/// Directives used when `KINDA_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "info";

/// Line format of emitted events
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = KindaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(KindaError::InvalidConfig(format!("unknown log format {other:?}"))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => f.write_str("compact"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber
///
/// Returns false when a subscriber was already installed, in which case
/// the existing one is left alone.
pub fn init_logging(format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter());
    let installed = match format {
        LogFormat::Compact => registry
            .with(tracing_fmt::layer().compact().with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_fmt::layer().json().with_current_span(false))
            .try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Compact ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        std::env::set_var(LOG_ENV, "kinda_runtime=debug");
        let _first = init_logging(LogFormat::Compact);
        assert!(!init_logging(LogFormat::Json));
        std::env::remove_var(LOG_ENV);
    }
}
