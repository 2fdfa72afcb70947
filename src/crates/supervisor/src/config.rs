//! Runtime configuration loaded from the environment.
//!
//! Every knob has a sane default; out-of-range or unparsable values fall
//! back to the default silently (a debug log only), so a broken deployment
//! environment degrades instead of failing startup.

use std::time::Duration;

use crate::state::{MAX_ITERATIONS, MAX_TASK_STEPS};

/// Behavior of the supervisor node.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Sampling temperature for planning/routing calls. Low by default so
    /// decisions stay stable.
    pub temperature: f32,

    /// Iteration cap; reaching it forces FINISH.
    pub max_iterations: usize,

    /// Plan length cap; longer plans are truncated.
    pub max_task_steps: usize,

    /// Whether the plan phase runs at all.
    pub enable_planning: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_iterations: MAX_ITERATIONS,
            max_task_steps: MAX_TASK_STEPS,
            enable_planning: true,
        }
    }
}

impl SupervisorConfig {
    /// Load from `SUPERVISOR_MAX_ITERATIONS`, `SUPERVISOR_MAX_TASK_STEPS`
    /// and `SUPERVISOR_ENABLE_PLANNING`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            temperature: defaults.temperature,
            max_iterations: env::parse_in_range(
                "SUPERVISOR_MAX_ITERATIONS",
                defaults.max_iterations,
                1..=100,
            ),
            max_task_steps: env::parse_in_range(
                "SUPERVISOR_MAX_TASK_STEPS",
                defaults.max_task_steps,
                1..=64,
            ),
            enable_planning: env::bool_or("SUPERVISOR_ENABLE_PLANNING", defaults.enable_planning),
        }
    }
}

/// Behavior of the performance layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfConfig {
    /// Whether the rule engine gate runs.
    pub enable_rule_engine: bool,

    /// Whether the semantic cache gate runs.
    pub enable_semantic_cache: bool,

    /// Cosine-similarity threshold for a cache hit.
    pub similarity_threshold: f64,

    /// Time-to-live for cache entries.
    pub cache_ttl: Duration,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            enable_rule_engine: true,
            enable_semantic_cache: true,
            similarity_threshold: 0.95,
            cache_ttl: Duration::from_secs(86_400 * 7),
        }
    }
}

impl PerfConfig {
    /// Load from `ENABLE_RULE_ENGINE`, `ENABLE_SEMANTIC_CACHE`,
    /// `SEMANTIC_CACHE_THRESHOLD` and `CACHE_TTL_DAYS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let threshold = env::parse_or("SEMANTIC_CACHE_THRESHOLD", defaults.similarity_threshold);
        let threshold = if (0.0..=1.0).contains(&threshold) {
            threshold
        } else {
            tracing::debug!(threshold, "SEMANTIC_CACHE_THRESHOLD out of range, using default");
            defaults.similarity_threshold
        };

        let ttl_days = env::parse_in_range("CACHE_TTL_DAYS", 7u64, 1..=365);

        Self {
            enable_rule_engine: env::bool_or("ENABLE_RULE_ENGINE", defaults.enable_rule_engine),
            enable_semantic_cache: env::bool_or(
                "ENABLE_SEMANTIC_CACHE",
                defaults.enable_semantic_cache,
            ),
            similarity_threshold: threshold,
            cache_ttl: Duration::from_secs(86_400 * ttl_days),
        }
    }
}

/// Environment parsing helpers with silent-fallback semantics.
pub mod env {
    use std::ops::RangeInclusive;
    use std::str::FromStr;

    /// The variable's value, if present and valid UTF-8.
    pub fn get(key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    /// Parse the variable, falling back to `default` when it is missing or
    /// unparsable.
    pub fn parse_or<T>(key: &str, default: T) -> T
    where
        T: FromStr + Copy,
    {
        match get(key) {
            Some(raw) => match raw.parse() {
                Ok(value) => value,
                Err(_) => {
                    tracing::debug!(key, raw, "unparsable environment value, using default");
                    default
                }
            },
            None => default,
        }
    }

    /// Parse the variable and additionally clamp to a validity range; values
    /// outside the range fall back to `default`.
    pub fn parse_in_range<T>(key: &str, default: T, range: RangeInclusive<T>) -> T
    where
        T: FromStr + Copy + PartialOrd,
    {
        let value = parse_or(key, default);
        if range.contains(&value) {
            value
        } else {
            tracing::debug!(key, "environment value out of range, using default");
            default
        }
    }

    /// Parse a boolean. Recognizes true/1/yes/on and false/0/no/off,
    /// case-insensitive; anything else falls back to `default`.
    pub fn bool_or(key: &str, default: bool) -> bool {
        match get(key).map(|v| v.to_lowercase()) {
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    tracing::debug!(key, raw = %v, "invalid boolean environment value, using default");
                    default
                }
            },
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.max_task_steps, 8);
        assert!(config.enable_planning);

        let perf = PerfConfig::default();
        assert_eq!(perf.similarity_threshold, 0.95);
        assert_eq!(perf.cache_ttl, Duration::from_secs(86_400 * 7));
    }

    #[test]
    fn test_env_parse_or_falls_back_on_garbage() {
        std::env::set_var("SUPERVISOR_TEST_GARBAGE", "not_a_number");
        let value: usize = env::parse_or("SUPERVISOR_TEST_GARBAGE", 42);
        assert_eq!(value, 42);
        std::env::remove_var("SUPERVISOR_TEST_GARBAGE");
    }

    #[test]
    fn test_env_parse_in_range_rejects_outliers() {
        std::env::set_var("SUPERVISOR_TEST_RANGE", "0");
        let value = env::parse_in_range("SUPERVISOR_TEST_RANGE", 10usize, 1..=100);
        assert_eq!(value, 10);

        std::env::set_var("SUPERVISOR_TEST_RANGE", "25");
        let value = env::parse_in_range("SUPERVISOR_TEST_RANGE", 10usize, 1..=100);
        assert_eq!(value, 25);
        std::env::remove_var("SUPERVISOR_TEST_RANGE");
    }

    #[test]
    fn test_env_bool_variants() {
        for (raw, expected) in [
            ("true", true),
            ("TRUE", true),
            ("1", true),
            ("yes", true),
            ("on", true),
            ("false", false),
            ("0", false),
            ("no", false),
            ("off", false),
        ] {
            std::env::set_var("SUPERVISOR_TEST_BOOL", raw);
            assert_eq!(
                env::bool_or("SUPERVISOR_TEST_BOOL", !expected),
                expected,
                "raw: {}",
                raw
            );
        }

        std::env::set_var("SUPERVISOR_TEST_BOOL", "maybe");
        assert!(env::bool_or("SUPERVISOR_TEST_BOOL", true));
        std::env::remove_var("SUPERVISOR_TEST_BOOL");
    }

    #[test]
    fn test_threshold_out_of_range_uses_default() {
        std::env::set_var("SEMANTIC_CACHE_THRESHOLD", "1.5");
        let perf = PerfConfig::from_env();
        assert_eq!(perf.similarity_threshold, 0.95);
        std::env::remove_var("SEMANTIC_CACHE_THRESHOLD");
    }
}
