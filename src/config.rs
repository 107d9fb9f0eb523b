//! Configuration types, built from environment variables.

use std::time::Duration;

use chrono::TimeDelta;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::limiter::{GracePolicy, RateLimitConfig};
use crate::router::OperatorAvailability;

/// Default responder model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Correspondent key allowed to issue `/approve` commands.
    pub operator: Option<String>,
    pub rate_limit: RateLimitConfig,
    /// How often idle records and lapsed grants are reclaimed.
    pub sweep_interval: Duration,
    pub availability: OperatorAvailability,
    pub openai_api_key: Option<SecretString>,
    pub model: String,
    /// Directory for the rolling log file, if any.
    pub log_dir: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            operator: None,
            rate_limit: RateLimitConfig::default(),
            sweep_interval: Duration::from_secs(300), // 5 minutes
            availability: OperatorAvailability::default(),
            openai_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            log_dir: None,
        }
    }
}

impl GateConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let limits = defaults.rate_limit.clone();

        let rate_limit = RateLimitConfig {
            max_per_minute: parse_or(&lookup, "CHAT_GATE_MAX_PER_MINUTE", limits.max_per_minute)?,
            max_per_hour: parse_or(&lookup, "CHAT_GATE_MAX_PER_HOUR", limits.max_per_hour)?,
            max_per_day: parse_or(&lookup, "CHAT_GATE_MAX_PER_DAY", limits.max_per_day)?,
            cooldown: delta_or(&lookup, "CHAT_GATE_COOLDOWN_SECS", SECOND, limits.cooldown)?,
            grace: GracePolicy {
                min_elapsed: delta_or(
                    &lookup,
                    "CHAT_GATE_GRACE_SECS",
                    SECOND,
                    limits.grace.min_elapsed,
                )?,
                max_events: parse_or(
                    &lookup,
                    "CHAT_GATE_GRACE_MAX_EVENTS",
                    limits.grace.max_events,
                )?,
            },
            warning_threshold: parse_or(
                &lookup,
                "CHAT_GATE_WARNING_THRESHOLD",
                limits.warning_threshold,
            )?,
            idle_eviction: delta_or(
                &lookup,
                "CHAT_GATE_IDLE_EVICT_DAYS",
                DAY,
                limits.idle_eviction,
            )?,
        };

        if !(0.0..=1.0).contains(&rate_limit.warning_threshold) {
            return Err(invalid("CHAT_GATE_WARNING_THRESHOLD", "must be between 0 and 1"));
        }

        let sweep_interval = Duration::from_secs(parse_or(
            &lookup,
            "CHAT_GATE_SWEEP_INTERVAL_SECS",
            defaults.sweep_interval.as_secs(),
        )?);
        if sweep_interval.is_zero() {
            return Err(invalid("CHAT_GATE_SWEEP_INTERVAL_SECS", "must be greater than zero"));
        }

        let availability = match non_empty(&lookup, "CHAT_GATE_AVAILABILITY") {
            Some(raw) => raw.parse()?,
            None => defaults.availability,
        };

        Ok(Self {
            operator: non_empty(&lookup, "CHAT_GATE_OPERATOR"),
            rate_limit,
            sweep_interval,
            availability,
            openai_api_key: non_empty(&lookup, "OPENAI_API_KEY").map(SecretString::from),
            model: non_empty(&lookup, "CHAT_GATE_MODEL").unwrap_or(defaults.model),
            log_dir: non_empty(&lookup, "CHAT_GATE_LOG_DIR"),
        })
    }
}

const SECOND: i64 = 1;
const DAY: i64 = 86_400;

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

/// A non-negative count of `unit_secs`-second units.
fn delta_or<F>(
    lookup: &F,
    key: &str,
    unit_secs: i64,
    default: TimeDelta,
) -> Result<TimeDelta, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(lookup, key) else {
        return Ok(default);
    };
    let amount: i64 = raw
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(key, format!("'{raw}': {e}")))?;
    if amount < 0 {
        return Err(invalid(key, format!("'{raw}' must not be negative")));
    }
    amount
        .checked_mul(unit_secs)
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| invalid(key, format!("'{raw}' is out of range")))
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<GateConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GateConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.availability, OperatorAvailability::Offline);
        assert!(config.operator.is_none());
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("CHAT_GATE_OPERATOR", "10000000000@c.us"),
            ("CHAT_GATE_MAX_PER_MINUTE", "10"),
            ("CHAT_GATE_COOLDOWN_SECS", "2"),
            ("CHAT_GATE_GRACE_MAX_EVENTS", "3"),
            ("CHAT_GATE_AVAILABILITY", "online"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(config.operator.as_deref(), Some("10000000000@c.us"));
        assert_eq!(config.rate_limit.max_per_minute, 10);
        assert_eq!(config.rate_limit.cooldown, TimeDelta::seconds(2));
        assert_eq!(config.rate_limit.grace.max_events, 3);
        assert_eq!(config.availability, OperatorAvailability::Online);
        assert!(config.openai_api_key.is_some());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config_from(&[("CHAT_GATE_MAX_PER_HOUR", "lots")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "CHAT_GATE_MAX_PER_HOUR"
        ));
        assert!(config_from(&[("CHAT_GATE_WARNING_THRESHOLD", "1.5")]).is_err());
        assert!(config_from(&[("CHAT_GATE_SWEEP_INTERVAL_SECS", "0")]).is_err());
        assert!(config_from(&[("CHAT_GATE_AVAILABILITY", "away")]).is_err());
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        for (key, value) in [
            ("CHAT_GATE_IDLE_EVICT_DAYS", "99999999999999"),
            ("CHAT_GATE_COOLDOWN_SECS", "9223372036854775807"),
            ("CHAT_GATE_GRACE_SECS", "99999999999999999"),
            ("CHAT_GATE_COOLDOWN_SECS", "-5"),
            ("CHAT_GATE_GRACE_SECS", "-1"),
            ("CHAT_GATE_IDLE_EVICT_DAYS", "-7"),
        ] {
            let err = config_from(&[(key, value)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { key: ref k, .. } if k == key),
                "{key}={value}"
            );
        }

        let config = config_from(&[
            ("CHAT_GATE_COOLDOWN_SECS", "0"),
            ("CHAT_GATE_IDLE_EVICT_DAYS", "30"),
        ])
        .unwrap();
        assert_eq!(config.rate_limit.cooldown, TimeDelta::zero());
        assert_eq!(config.rate_limit.idle_eviction, TimeDelta::days(30));
    }
}
