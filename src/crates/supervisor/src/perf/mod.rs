//! Performance layer: two pre-compute gates ahead of the graph.
//!
//! Before any model runs, a query passes through (in order):
//! 1. the [`rules::RuleEngine`] - canned answers for non-reasoning queries,
//! 2. the [`cache::SemanticCache`] - answers reused by embedding similarity.
//!
//! A hit short-circuits the whole graph. Both gates degrade silently when
//! their backends are missing or failing; they never block a request.

pub mod cache;
pub mod rules;

use serde_json::Value as JsonValue;

pub use cache::{CacheHit, Embedder, HashingEmbedder, InMemoryKvStore, KvStore, SemanticCache};
pub use rules::{RuleEngine, RuleMatch};

/// Where a pre-compute hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    /// The rule engine.
    RuleEngine,
    /// The semantic cache.
    SemanticCache,
}

impl HitSource {
    /// Wire-stable source tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleEngine => "rule_engine",
            Self::SemanticCache => "semantic_cache",
        }
    }
}

/// A pre-compute hit: the answer plus where it came from.
#[derive(Debug, Clone)]
pub struct PrecomputeHit {
    /// The answer to return.
    pub answer: String,
    /// Which gate produced it.
    pub source: HitSource,
    /// Rule tag (rule-engine hits only).
    pub rule_type: Option<String>,
    /// Match similarity (cache hits only).
    pub similarity: Option<f64>,
    /// The originally cached query (cache hits only).
    pub cached_query: Option<String>,
}

/// The combined pre-compute gate.
#[derive(Default)]
pub struct PerformanceLayer {
    rule_engine: Option<RuleEngine>,
    semantic_cache: Option<SemanticCache>,
}

impl PerformanceLayer {
    /// A layer with both gates disabled.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Attach a rule engine.
    pub fn with_rule_engine(mut self, engine: RuleEngine) -> Self {
        self.rule_engine = Some(engine);
        self
    }

    /// Attach a semantic cache.
    pub fn with_semantic_cache(mut self, cache: SemanticCache) -> Self {
        self.semantic_cache = Some(cache);
        self
    }

    /// Whether any gate is configured.
    pub fn is_enabled(&self) -> bool {
        self.rule_engine.is_some() || self.semantic_cache.is_some()
    }

    /// Run the gates in order. `None` means the caller continues to the
    /// LLM path.
    pub async fn process_query(&self, query: &str) -> Option<PrecomputeHit> {
        if let Some(engine) = &self.rule_engine {
            if let Some(hit) = engine.match_query(query) {
                return Some(PrecomputeHit {
                    answer: hit.answer,
                    source: HitSource::RuleEngine,
                    rule_type: Some(hit.rule_type),
                    similarity: None,
                    cached_query: None,
                });
            }
        }

        if let Some(cache) = &self.semantic_cache {
            if let Some(hit) = cache.get(query).await {
                return Some(PrecomputeHit {
                    answer: hit.answer,
                    source: HitSource::SemanticCache,
                    rule_type: None,
                    similarity: Some(hit.similarity),
                    cached_query: Some(hit.cached_query),
                });
            }
        }

        None
    }

    /// Store a finished answer in the semantic cache. Best-effort: failures
    /// are logged by the cache and never affect the response.
    pub async fn cache_answer(&self, query: &str, answer: &str, metadata: Option<JsonValue>) {
        if let Some(cache) = &self.semantic_cache {
            cache.set(query, answer, metadata).await;
        }
    }
}
