//! Cache configuration.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use jobboard_core::ConfigError;

/// Default TTL for single-entity lookups.
pub const DEFAULT_ENTITY_TTL_SECS: u64 = 300;
/// Default TTL for collections and filtered lists.
pub const DEFAULT_LIST_TTL_SECS: u64 = 60;
/// Default TTL for recommendation views.
pub const DEFAULT_RECOMMENDATION_TTL_SECS: u64 = 600;
/// Default bound on resident entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
/// Default interval between expired-entry sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Family of cached values that share a TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlClass {
    /// One entity by primary key.
    Entity,
    /// Collections and filtered or paginated lists.
    List,
    /// Derived views such as recommendations.
    View,
}

/// Configuration for the read-through cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub entity_ttl: Duration,
    pub list_ttl: Duration,
    pub recommendation_ttl: Duration,
    /// `None` leaves the in-memory store unbounded.
    pub max_entries: Option<usize>,
    /// How often the background sweeper purges expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl: Duration::from_secs(DEFAULT_ENTITY_TTL_SECS),
            list_ttl: Duration::from_secs(DEFAULT_LIST_TTL_SECS),
            recommendation_ttl: Duration::from_secs(DEFAULT_RECOMMENDATION_TTL_SECS),
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_ttl(mut self, ttl: Duration) -> Self {
        self.entity_ttl = ttl;
        self
    }

    pub fn with_list_ttl(mut self, ttl: Duration) -> Self {
        self.list_ttl = ttl;
        self
    }

    pub fn with_recommendation_ttl(mut self, ttl: Duration) -> Self {
        self.recommendation_ttl = ttl;
        self
    }

    /// Bound the in-memory store. `None` means unbounded.
    pub fn with_max_entries(mut self, max: Option<usize>) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// TTL applied to values of the given class.
    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Entity => self.entity_ttl,
            TtlClass::List => self.list_ttl,
            TtlClass::View => self.recommendation_ttl,
        }
    }

    /// Reject settings the cache cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ttls = [
            ("entity_ttl", self.entity_ttl),
            ("list_ttl", self.list_ttl),
            ("recommendation_ttl", self.recommendation_ttl),
            ("sweep_interval", self.sweep_interval),
        ];
        for (field, value) in ttls {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0s".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_entries == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_entries".to_string(),
                value: "0".to_string(),
                reason: "use no limit instead of a zero limit".to_string(),
            });
        }
        Ok(())
    }

    /// Create CacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `JOBBOARD_CACHE_ENTITY_TTL_SECS`: TTL for single entities (default: 300)
    /// - `JOBBOARD_CACHE_LIST_TTL_SECS`: TTL for lists (default: 60)
    /// - `JOBBOARD_CACHE_RECOMMENDATION_TTL_SECS`: TTL for recommendations (default: 600)
    /// - `JOBBOARD_CACHE_MAX_ENTRIES`: Store bound, `0` for unbounded (default: 10000)
    /// - `JOBBOARD_CACHE_SWEEP_INTERVAL_SECS`: Sweeper interval (default: 30)
    ///
    /// Unparseable or zero values are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`] with a custom variable source.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let secs = |name: &str, default: u64| {
            let value = parse_or_default(&lookup, name, default);
            if value == 0 {
                tracing::warn!(variable = name, default, "Zero duration ignored");
                Duration::from_secs(default)
            } else {
                Duration::from_secs(value)
            }
        };

        let max_entries = match parse_or_default(&lookup, "JOBBOARD_CACHE_MAX_ENTRIES", DEFAULT_MAX_ENTRIES) {
            0 => None,
            n => Some(n),
        };

        Self {
            entity_ttl: secs("JOBBOARD_CACHE_ENTITY_TTL_SECS", DEFAULT_ENTITY_TTL_SECS),
            list_ttl: secs("JOBBOARD_CACHE_LIST_TTL_SECS", DEFAULT_LIST_TTL_SECS),
            recommendation_ttl: secs(
                "JOBBOARD_CACHE_RECOMMENDATION_TTL_SECS",
                DEFAULT_RECOMMENDATION_TTL_SECS,
            ),
            max_entries,
            sweep_interval: secs("JOBBOARD_CACHE_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

fn parse_or_default<L, T>(lookup: &L, name: &str, default: T) -> T
where
    L: Fn(&str) -> Option<String>,
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                variable = name,
                value = %raw,
                default = %default,
                error = %e,
                "Invalid cache setting, using default"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_entity_ttl(Duration::from_secs(10))
            .with_list_ttl(Duration::from_secs(5))
            .with_recommendation_ttl(Duration::from_secs(20))
            .with_max_entries(None)
            .with_sweep_interval(Duration::from_secs(1));

        assert_eq!(config.ttl_for(TtlClass::Entity), Duration::from_secs(10));
        assert_eq!(config.ttl_for(TtlClass::List), Duration::from_secs(5));
        assert_eq!(config.ttl_for(TtlClass::View), Duration::from_secs(20));
        assert_eq!(config.max_entries, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_without_variables() {
        assert_eq!(CacheConfig::from_lookup(lookup(&[])), CacheConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = CacheConfig::from_lookup(lookup(&[
            ("JOBBOARD_CACHE_LIST_TTL_SECS", "15"),
            ("JOBBOARD_CACHE_MAX_ENTRIES", "0"),
            ("JOBBOARD_CACHE_SWEEP_INTERVAL_SECS", " 2 "),
        ]));
        assert_eq!(config.list_ttl, Duration::from_secs(15));
        assert_eq!(config.max_entries, None);
        assert_eq!(config.sweep_interval, Duration::from_secs(2));
        assert_eq!(config.entity_ttl, Duration::from_secs(DEFAULT_ENTITY_TTL_SECS));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = CacheConfig::from_lookup(lookup(&[
            ("JOBBOARD_CACHE_ENTITY_TTL_SECS", "soon"),
            ("JOBBOARD_CACHE_LIST_TTL_SECS", "0"),
            ("JOBBOARD_CACHE_MAX_ENTRIES", "-5"),
        ]));
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let err = CacheConfig::new()
            .with_list_ttl(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("list_ttl"));

        assert!(CacheConfig::new().with_max_entries(Some(0)).validate().is_err());
    }
}
