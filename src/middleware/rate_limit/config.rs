//! Rate limit configuration.
//!
//! Read once, at startup, and never mutated afterwards.
//!
//! | Variable | Default |
//! |---|---|
//! | `RATE_LIMIT_ENABLED` | `true` |
//! | `RATE_LIMIT_RATE` | `10` requests per second |
//! | `RATE_LIMIT_BURST` | `20` |
//! | `RATE_LIMIT_SWEEP_INTERVAL_SECS` | `60`, at most one year |
//! | `RATE_LIMIT_STALE_AFTER_SECS` | three sweep intervals |
//!
//! When rate limiting is disabled the numeric variables are not read at all.
//! Any value that fails to parse or validate is a [`ConfigError`]; the
//! process must not start with it.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_ENABLED: &str = "RATE_LIMIT_ENABLED";
pub const ENV_RATE: &str = "RATE_LIMIT_RATE";
pub const ENV_BURST: &str = "RATE_LIMIT_BURST";
pub const ENV_SWEEP_INTERVAL: &str = "RATE_LIMIT_SWEEP_INTERVAL_SECS";
pub const ENV_STALE_AFTER: &str = "RATE_LIMIT_STALE_AFTER_SECS";

const DEFAULT_RATE: f64 = 10.0;
const DEFAULT_BURST: u32 = 20;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Staleness window, in sweep intervals, when not configured explicitly.
const DEFAULT_STALE_INTERVALS: u32 = 3;

/// Longest accepted sweep interval. Keeps deadline arithmetic on the
/// runtime clock in range.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Validated rate limit settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    enabled: bool,
    rate: f64,
    burst: u32,
    sweep_interval: Duration,
    stale_after: Duration,
}

impl RateLimitConfig {
    /// Enabled, `rate` tokens per second, `burst` capacity, default sweep
    /// schedule.
    pub fn new(rate: f64, burst: u32) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::NonPositiveRate(rate));
        }
        if burst == 0 {
            return Err(ConfigError::ZeroBurst);
        }
        Ok(Self {
            enabled: true,
            rate,
            burst,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_after: DEFAULT_SWEEP_INTERVAL * DEFAULT_STALE_INTERVALS,
        })
    }

    /// Rate limiting switched off: the middleware is a pass-through.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            rate: DEFAULT_RATE,
            burst: DEFAULT_BURST,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_after: DEFAULT_SWEEP_INTERVAL * DEFAULT_STALE_INTERVALS,
        }
    }

    /// Sets how often idle clients are swept. Also resets the staleness
    /// window to three intervals; call [`with_stale_after`](Self::with_stale_after)
    /// afterwards to decouple them.
    ///
    /// Intervals longer than [`MAX_SWEEP_INTERVAL`] are rejected.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroDuration { key: ENV_SWEEP_INTERVAL });
        }
        let too_long = ConfigError::DurationTooLong {
            key: ENV_SWEEP_INTERVAL,
            max_secs: MAX_SWEEP_INTERVAL.as_secs(),
        };
        if interval > MAX_SWEEP_INTERVAL {
            return Err(too_long);
        }
        self.stale_after = interval.checked_mul(DEFAULT_STALE_INTERVALS).ok_or(too_long)?;
        self.sweep_interval = interval;
        Ok(self)
    }

    /// Sets how long a client may stay idle before it is evicted.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Result<Self, ConfigError> {
        if stale_after.is_zero() {
            return Err(ConfigError::ZeroDuration { key: ENV_STALE_AFTER });
        }
        self.stale_after = stale_after;
        Ok(self)
    }

    /// Loads from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads from an arbitrary variable source. Unset and set-but-empty
    /// variables both fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let enabled = match get(ENV_ENABLED) {
            Some(v) => parse_bool(ENV_ENABLED, &v)?,
            None => true,
        };
        if !enabled {
            return Ok(Self::disabled());
        }

        let rate = parse_or(ENV_RATE, get(ENV_RATE), DEFAULT_RATE)?;
        let burst = parse_or(ENV_BURST, get(ENV_BURST), DEFAULT_BURST)?;
        let mut config = Self::new(rate, burst)?;

        if let Some(v) = get(ENV_SWEEP_INTERVAL) {
            let secs: u64 = parse(ENV_SWEEP_INTERVAL, &v)?;
            config = config.with_sweep_interval(Duration::from_secs(secs))?;
        }
        if let Some(v) = get(ENV_STALE_AFTER) {
            let secs: u64 = parse(ENV_STALE_AFTER, &v)?;
            config = config.with_stale_after(Duration::from_secs(secs))?;
        }

        Ok(config)
    }

    pub fn enabled(&self) -> bool { self.enabled }
    pub fn rate(&self) -> f64 { self.rate }
    pub fn burst(&self) -> u32 { self.burst }
    pub fn sweep_interval(&self) -> Duration { self.sweep_interval }
    pub fn stale_after(&self) -> Duration { self.stale_after }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ..Self::disabled()
        }
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |v| parse(key, &v))
}

/// Accepts the usual spellings: `1 t T true TRUE True` and their negatives.
fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key,
            value: other.to_owned(),
            reason: "expected a boolean".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<RateLimitConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        RateLimitConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert!(config.enabled());
        assert_eq!(config.rate(), 10.0);
        assert_eq!(config.burst(), 20);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.stale_after(), Duration::from_secs(180));
        assert_eq!(config, RateLimitConfig::default());
    }

    #[test]
    fn overrides_from_environment() {
        let config =
            load(&[(ENV_RATE, "2.5"), (ENV_BURST, "5"), (ENV_SWEEP_INTERVAL, "10")]).unwrap();
        assert_eq!(config.rate(), 2.5);
        assert_eq!(config.burst(), 5);
        assert_eq!(config.sweep_interval(), Duration::from_secs(10));
        assert_eq!(config.stale_after(), Duration::from_secs(30));

        let config = load(&[(ENV_SWEEP_INTERVAL, "10"), (ENV_STALE_AFTER, "600")]).unwrap();
        assert_eq!(config.stale_after(), Duration::from_secs(600));
    }

    #[test]
    fn disabled_skips_numeric_parsing() {
        let config = load(&[(ENV_ENABLED, "false"), (ENV_RATE, "not-a-number")]).unwrap();
        assert!(!config.enabled());
    }

    #[test]
    fn invalid_numbers_are_fatal() {
        let err = load(&[(ENV_RATE, "fast")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_RATE, .. }));

        let err = load(&[(ENV_BURST, "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_BURST, .. }));

        assert_eq!(load(&[(ENV_RATE, "0")]).unwrap_err(), ConfigError::NonPositiveRate(0.0));
        assert_eq!(load(&[(ENV_BURST, "0")]).unwrap_err(), ConfigError::ZeroBurst);
        assert_eq!(
            load(&[(ENV_STALE_AFTER, "0")]).unwrap_err(),
            ConfigError::ZeroDuration { key: ENV_STALE_AFTER }
        );
    }

    #[test]
    fn non_finite_rate_is_rejected() {
        for rate in [f64::NAN, f64::INFINITY] {
            assert!(matches!(RateLimitConfig::new(rate, 1), Err(ConfigError::NonPositiveRate(_))));
        }
    }

    #[test]
    fn huge_sweep_interval_is_an_error() {
        let err = load(&[(ENV_SWEEP_INTERVAL, "18446744073709551615")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DurationTooLong {
                key: ENV_SWEEP_INTERVAL,
                max_secs: MAX_SWEEP_INTERVAL.as_secs(),
            }
        );

        let err = RateLimitConfig::default().with_sweep_interval(Duration::MAX).unwrap_err();
        assert!(matches!(err, ConfigError::DurationTooLong { key: ENV_SWEEP_INTERVAL, .. }));
    }

    #[test]
    fn longest_sweep_interval_is_accepted() {
        let secs = MAX_SWEEP_INTERVAL.as_secs().to_string();
        let config = load(&[(ENV_SWEEP_INTERVAL, &secs)]).unwrap();
        assert_eq!(config.sweep_interval(), MAX_SWEEP_INTERVAL);
        assert_eq!(config.stale_after(), 3 * MAX_SWEEP_INTERVAL);
    }

    #[test]
    fn huge_stale_window_is_accepted() {
        let config = load(&[(ENV_STALE_AFTER, "18446744073709551615")]).unwrap();
        assert_eq!(config.stale_after(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn invalid_boolean_is_fatal() {
        let err = load(&[(ENV_ENABLED, "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_ENABLED, .. }));
    }

    #[test]
    fn boolean_spellings() {
        for v in ["1", "t", "T", "true", "TRUE", "True"] {
            assert!(parse_bool(ENV_ENABLED, v).unwrap());
        }
        for v in ["0", "f", "F", "false", "FALSE", "False"] {
            assert!(!parse_bool(ENV_ENABLED, v).unwrap());
        }
    }
}
