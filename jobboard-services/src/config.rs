//! Service configuration.

use jobboard_cache::CacheConfig;
use jobboard_core::ConfigError;

use crate::recommender::DEFAULT_RECOMMENDATION_LIMIT;
use crate::telemetry::TelemetryConfig;

/// Everything a service process needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
    /// Maximum vacancies per recommendation.
    pub recommendation_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            telemetry: TelemetryConfig::default(),
            recommendation_limit: DEFAULT_RECOMMENDATION_LIMIT,
        }
    }
}

impl ServiceConfig {
    /// Load from the environment. See [`CacheConfig::from_env`] and
    /// [`TelemetryConfig::from_env`]; `JOBBOARD_RECOMMENDATION_LIMIT` sets
    /// the recommendation size (default: 10).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let recommendation_limit = match lookup("JOBBOARD_RECOMMENDATION_LIMIT") {
            None => DEFAULT_RECOMMENDATION_LIMIT,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        default = DEFAULT_RECOMMENDATION_LIMIT,
                        "Invalid JOBBOARD_RECOMMENDATION_LIMIT, using default"
                    );
                    DEFAULT_RECOMMENDATION_LIMIT
                }
            },
        };

        Self {
            cache: CacheConfig::from_lookup(&lookup),
            telemetry: TelemetryConfig::from_lookup(&lookup),
            recommendation_limit,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recommendation_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "recommendation_limit".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        self.cache.validate()
    }
}
