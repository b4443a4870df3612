//! Runtime configuration sourced from the environment.

use std::env;

use crate::error::ConfigError;
use crate::snapshot::CountSnapshotStrategy;

/// Environment variable overriding the non-consecutive append retry ceiling.
pub const MAX_APPEND_RETRIES_VAR: &str = "SEQUENT_MAX_APPEND_RETRIES";

/// Environment variable overriding the default snapshot threshold.
pub const SNAPSHOT_THRESHOLD_VAR: &str = "SEQUENT_SNAPSHOT_THRESHOLD";

/// Tunables for an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSourceConfig {
    /// Retry ceiling for non-consecutive appends under contention.
    pub max_append_retries: u32,
    /// Event count between snapshots for the default strategy.
    pub snapshot_threshold: i64,
}

impl Default for EventSourceConfig {
    fn default() -> Self {
        Self {
            max_append_retries: 20,
            snapshot_threshold: CountSnapshotStrategy::DEFAULT_THRESHOLD,
        }
    }
}

impl EventSourceConfig {
    /// Reads overrides from the environment, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is set but does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_APPEND_RETRIES_VAR) {
            config.max_append_retries = parse(MAX_APPEND_RETRIES_VAR, &raw)?;
        }
        if let Some(raw) = lookup(SNAPSHOT_THRESHOLD_VAR) {
            config.snapshot_threshold = parse(SNAPSHOT_THRESHOLD_VAR, &raw)?;
        }
        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|error: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_owned(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use crate::config::{EventSourceConfig, MAX_APPEND_RETRIES_VAR, SNAPSHOT_THRESHOLD_VAR};
    use crate::error::ConfigError;

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = EventSourceConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config, EventSourceConfig::default());
        assert_eq!(config.max_append_retries, 20);
        assert_eq!(config.snapshot_threshold, 25);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = EventSourceConfig::from_lookup(|key| match key {
            MAX_APPEND_RETRIES_VAR => Some("5".to_owned()),
            SNAPSHOT_THRESHOLD_VAR => Some("100".to_owned()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.max_append_retries, 5);
        assert_eq!(config.snapshot_threshold, 100);
    }

    #[test]
    fn test_malformed_value_is_rejected_with_its_key() {
        let result = EventSourceConfig::from_lookup(|key| {
            (key == MAX_APPEND_RETRIES_VAR).then(|| "twenty".to_owned())
        });

        match result.unwrap_err() {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, MAX_APPEND_RETRIES_VAR);
                assert_eq!(value, "twenty");
            }
        }
    }
}
