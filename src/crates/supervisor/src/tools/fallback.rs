//! Fallback content for models without tool support.
//!
//! When a model rejects tool binding, workers cannot rely on function calls
//! for live information. The [`FallbackManager`] collects replacement
//! content for named fallback domains (initially `datetime`) so the worker
//! can render a prompt variant that embeds the literal result instead.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::tools::DatetimeTool;

/// Produces replacement content for one fallback domain.
pub type FallbackFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

struct FallbackInfo {
    description: String,
    get_info: FallbackFn,
}

/// Registry of fallback domains.
#[derive(Default)]
pub struct FallbackManager {
    fallbacks: RwLock<HashMap<String, FallbackInfo>>,
}

impl FallbackManager {
    /// A manager with the default `datetime` fallback registered.
    pub fn with_defaults() -> Self {
        let manager = Self::default();
        manager.register(
            "datetime",
            "current date and time for the user's timezone",
            Arc::new(|timezone: &str| DatetimeTool::now_in(timezone).ok()),
        );
        manager
    }

    /// Register a fallback domain. Re-registering a name replaces it.
    pub fn register(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        get_info: FallbackFn,
    ) {
        let name = name.into();
        tracing::debug!(fallback = %name, "registered fallback domain");
        self.fallbacks.write().insert(
            name,
            FallbackInfo {
                description: description.into(),
                get_info,
            },
        );
    }

    /// Replacement content for one domain, using the user's timezone.
    pub fn get(&self, name: &str, timezone: &str) -> Option<String> {
        let fallbacks = self.fallbacks.read();
        let info = fallbacks.get(name)?;
        (info.get_info)(timezone)
    }

    /// Collect replacement content for several domains. Domains that fail
    /// or are unknown are skipped.
    pub fn collect(&self, names: &[&str], timezone: &str) -> HashMap<String, String> {
        let mut results = HashMap::new();
        for name in names {
            match self.get(name, timezone) {
                Some(info) => {
                    results.insert((*name).to_string(), info);
                }
                None => {
                    tracing::warn!(fallback = %name, "fallback domain unavailable");
                }
            }
        }
        results
    }

    /// Descriptions of every registered domain.
    pub fn descriptions(&self) -> HashMap<String, String> {
        self.fallbacks
            .read()
            .iter()
            .map(|(name, info)| (name.clone(), info.description.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_datetime_fallback() {
        let manager = FallbackManager::with_defaults();
        let info = manager.get("datetime", "Asia/Tokyo").unwrap();
        assert!(info.contains("Asia/Tokyo"));
    }

    #[test]
    fn test_unknown_domain_is_none() {
        let manager = FallbackManager::with_defaults();
        assert!(manager.get("weather", "UTC").is_none());
    }

    #[test]
    fn test_collect_skips_failures() {
        let manager = FallbackManager::with_defaults();
        manager.register("broken", "always fails", Arc::new(|_tz| None));

        let collected = manager.collect(&["datetime", "broken", "unknown"], "UTC");
        assert_eq!(collected.len(), 1);
        assert!(collected.contains_key("datetime"));
    }

    #[test]
    fn test_register_replaces() {
        let manager = FallbackManager::with_defaults();
        manager.register("datetime", "fixed", Arc::new(|_tz| Some("noon".into())));
        assert_eq!(manager.get("datetime", "UTC").unwrap(), "noon");
    }
}
