//! Tracing subscriber initialization.

use jobboard_core::ConfigError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directives used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,jobboard_cache=info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// # Environment Variables
    /// - `JOBBOARD_LOG`: filter directives (default: `info,jobboard_cache=info`)
    /// - `JOBBOARD_LOG_FORMAT`: `json` or `pretty` (default: `json`)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let format = match lookup("JOBBOARD_LOG_FORMAT").as_deref().map(str::trim) {
            None => defaults.format,
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(raw) if raw.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(raw) => {
                tracing::warn!(value = raw, "Unknown JOBBOARD_LOG_FORMAT, using json");
                defaults.format
            }
        };
        Self {
            log_filter: lookup("JOBBOARD_LOG")
                .filter(|f| !f.trim().is_empty())
                .unwrap_or(defaults.log_filter),
            format,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Fails if a
/// subscriber is already installed or the filter does not parse.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter).map_err(|e| ConfigError::InvalidValue {
            field: "JOBBOARD_LOG".to_string(),
            value: config.log_filter.clone(),
            reason: e.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| ConfigError::InvalidValue {
        field: "tracing subscriber".to_string(),
        value: format!("{:?}", config.format),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_defaults() {
        assert_eq!(TelemetryConfig::from_lookup(|_| None), TelemetryConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_format_and_filter() {
        let config = TelemetryConfig::from_lookup(|name| match name {
            "JOBBOARD_LOG" => Some("debug".to_string()),
            "JOBBOARD_LOG_FORMAT" => Some("Pretty".to_string()),
            _ => None,
        });
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_format_falls_back_to_json() {
        let config = TelemetryConfig::from_lookup(|name| {
            (name == "JOBBOARD_LOG_FORMAT").then(|| "xml".to_string())
        });
        assert_eq!(config.format, LogFormat::Json);
    }
}
