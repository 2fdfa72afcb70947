//! Semantic cache: answer reuse by embedding similarity.
//!
//! Backed by two capabilities: a [`KvStore`] with per-key TTL and an
//! [`Embedder`] producing L2-normalized vectors. A finished answer is stored
//! under two keys derived from the md5 of the query:
//!
//! - `vector:<md5>` - the query embedding as a JSON float array,
//! - `query:<md5>` - JSON `{query, answer, metadata}`.
//!
//! A lookup embeds the incoming query, scans `vector:*`, picks the highest
//! cosine similarity and returns the paired answer when it clears the
//! threshold (default 0.95). Any backend failure degrades the cache to
//! "disabled" for that call - it never blocks the request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::error::{Result, SupervisorError};

/// Key prefix for stored embeddings.
const VECTOR_PREFIX: &str = "vector:";

/// Key prefix for stored answers.
const QUERY_PREFIX: &str = "query:";

/// Key-value store with per-key TTL.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Fetch the live value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// All live keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys(prefix).await
    }
}

/// Text embedding capability. Vectors must be L2-normalized so cosine
/// similarity reduces to a dot product.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// In-memory [`KvStore`] with lazy expiry. The reference backend for tests
/// and single-process deployments.
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryKvStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let deadline = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, deadline)| *deadline > now)
            .map(|(value, _)| value.clone()))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, (_, deadline))| key.starts_with(prefix) && *deadline > now)
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// A cache hit: the stored answer plus match diagnostics.
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The cached answer.
    pub answer: String,
    /// The query that produced the cached answer.
    pub cached_query: String,
    /// Cosine similarity of the match.
    pub similarity: f64,
    /// Metadata stored alongside the answer.
    pub metadata: JsonValue,
}

/// Stored answer payload (`query:<md5>`).
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    query: String,
    answer: String,
    #[serde(default)]
    metadata: JsonValue,
}

/// The semantic cache over pluggable KV and embedding backends.
pub struct SemanticCache {
    kv: Box<dyn KvStore>,
    embedder: Box<dyn Embedder>,
    similarity_threshold: f64,
    ttl: Duration,
}

impl SemanticCache {
    /// Create a cache with the given backends and defaults (threshold 0.95,
    /// TTL 7 days).
    pub fn new(kv: Box<dyn KvStore>, embedder: Box<dyn Embedder>) -> Self {
        Self {
            kv,
            embedder,
            similarity_threshold: 0.95,
            ttl: Duration::from_secs(86_400 * 7),
        }
    }

    /// Override the similarity threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Override the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn query_hash(query: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(query.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn cosine(a: &[f32], b: &[f32]) -> f64 {
        // Both sides are L2-normalized; the dot product is the cosine.
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (*x as f64) * (*y as f64))
            .sum()
    }

    /// Look up the closest cached query. `None` on miss or backend failure.
    pub async fn get(&self, query: &str) -> Option<CacheHit> {
        match self.try_get(query).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "semantic cache lookup degraded to miss");
                None
            }
        }
    }

    async fn try_get(&self, query: &str) -> Result<Option<CacheHit>> {
        let query_vector = self.embedder.embed(query).await?;

        let vector_keys = self.kv.keys(VECTOR_PREFIX).await?;
        let mut best: Option<(String, f64)> = None;

        for vector_key in vector_keys {
            let Some(stored) = self.kv.get(&vector_key).await? else {
                continue;
            };
            let cached_vector: Vec<f32> = match serde_json::from_str(&stored) {
                Ok(vector) => vector,
                Err(e) => {
                    tracing::debug!(key = %vector_key, error = %e, "skipping malformed cached vector");
                    continue;
                }
            };

            let similarity = Self::cosine(&query_vector, &cached_vector);
            if best.as_ref().map(|(_, s)| similarity > *s).unwrap_or(true) {
                let hash = vector_key.trim_start_matches(VECTOR_PREFIX).to_string();
                best = Some((hash, similarity));
            }
        }

        let Some((hash, similarity)) = best else {
            return Ok(None);
        };
        if similarity < self.similarity_threshold {
            return Ok(None);
        }

        let Some(stored) = self.kv.get(&format!("{}{}", QUERY_PREFIX, hash)).await? else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_str(&stored)?;

        tracing::info!(similarity, "semantic cache hit");
        Ok(Some(CacheHit {
            answer: entry.answer,
            cached_query: entry.query,
            similarity,
            metadata: entry.metadata,
        }))
    }

    /// Store an answer for a query. Returns whether the write succeeded;
    /// failures are logged and swallowed.
    pub async fn set(&self, query: &str, answer: &str, metadata: Option<JsonValue>) -> bool {
        match self.try_set(query, answer, metadata).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "semantic cache write failed");
                false
            }
        }
    }

    async fn try_set(&self, query: &str, answer: &str, metadata: Option<JsonValue>) -> Result<()> {
        let hash = Self::query_hash(query);
        let vector = self.embedder.embed(query).await?;

        let vector_json = serde_json::to_string(&vector)?;
        self.kv
            .set(&format!("{}{}", VECTOR_PREFIX, hash), vector_json, self.ttl)
            .await?;

        let entry = CacheEntry {
            query: query.to_string(),
            answer: answer.to_string(),
            metadata: metadata.unwrap_or(JsonValue::Null),
        };
        self.kv
            .set(
                &format!("{}{}", QUERY_PREFIX, hash),
                serde_json::to_string(&entry)?,
                self.ttl,
            )
            .await?;

        tracing::debug!(hash = %hash, "semantic cache stored");
        Ok(())
    }
}

/// Deterministic toy embedder for tests and offline runs: hashes character
/// trigrams into a small normalized vector. Identical strings always map to
/// identical vectors.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: 64 }
    }
}

impl HashingEmbedder {
    /// An embedder with a custom dimension count.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(SupervisorError::CapabilityUnavailable(
                "embedder has zero dimensions".into(),
            ));
        }

        let mut vector = vec![0f32; self.dimensions];
        let chars: Vec<char> = text.chars().collect();
        for window in chars.windows(3.min(chars.len().max(1))) {
            let mut hash: u64 = 1469598103934665603;
            for c in window {
                hash ^= *c as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SemanticCache {
        SemanticCache::new(
            Box::new(InMemoryKvStore::new()),
            Box::new(HashingEmbedder::default()),
        )
    }

    #[tokio::test]
    async fn test_exact_query_round_trips() {
        let cache = cache();
        assert!(cache.set("who is the president of France?", "Macron", None).await);

        let hit = cache.get("who is the president of France?").await.unwrap();
        assert_eq!(hit.answer, "Macron");
        assert_eq!(hit.cached_query, "who is the president of France?");
        assert!(hit.similarity > 0.999);
    }

    #[tokio::test]
    async fn test_dissimilar_query_misses() {
        let cache = cache();
        cache.set("who is the president of France?", "Macron", None).await;

        assert!(cache
            .get("how do I bake sourdough bread at home?")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_best_match_wins() {
        let cache = cache().with_threshold(0.5);
        cache.set("tell me about rust traits", "traits", None).await;
        cache.set("tell me about rust lifetimes", "lifetimes", None).await;

        let hit = cache.get("tell me about rust traits").await.unwrap();
        assert_eq!(hit.answer, "traits");
    }

    #[tokio::test]
    async fn test_expired_entries_do_not_hit() {
        let cache = SemanticCache::new(
            Box::new(InMemoryKvStore::new()),
            Box::new(HashingEmbedder::default()),
        )
        .with_ttl(Duration::from_millis(10));

        cache.set("short lived", "gone soon", None).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("short lived").await.is_none());
    }

    #[tokio::test]
    async fn test_embedder_failure_degrades_silently() {
        let cache = SemanticCache::new(
            Box::new(InMemoryKvStore::new()),
            Box::new(HashingEmbedder::new(0)),
        );

        assert!(cache.get("anything").await.is_none());
        assert!(!cache.set("anything", "answer", None).await);
    }

    #[tokio::test]
    async fn test_malformed_vector_is_skipped() {
        let kv = InMemoryKvStore::new();
        kv.set("vector:bad", "not json".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let cache = SemanticCache::new(Box::new(kv), Box::new(HashingEmbedder::default()));
        // The malformed entry is skipped rather than failing the lookup.
        assert!(cache.get("anything").await.is_none());
    }

    #[tokio::test]
    async fn test_storage_layout_uses_md5_keys() {
        let kv = std::sync::Arc::new(InMemoryKvStore::new());

        let cache = SemanticCache::new(
            Box::new(kv.clone()),
            Box::new(HashingEmbedder::default()),
        );
        cache.set("hello world", "hi", None).await;

        // md5("hello world")
        let hash = "5eb63bbbe01eeed093cb22bb8f5acdc3";
        assert!(kv
            .get(&format!("vector:{}", hash))
            .await
            .unwrap()
            .is_some());
        let entry = kv
            .get(&format!("query:{}", hash))
            .await
            .unwrap()
            .unwrap();
        assert!(entry.contains("\"answer\":\"hi\""));
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_normalized_and_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("the same text").await.unwrap();
        let b = embedder.embed("the same text").await.unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
