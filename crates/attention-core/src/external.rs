//! External collaborator traits: the typed seams the core
//! consumes but does not implement in production — durable storage, the
//! retrieval oracle, feature extraction, embedding/emotion providers, and
//! the notification sink. Every suspending call carries an explicit
//! deadline so a slow collaborator can't stall the caller indefinitely.

use crate::ids::{MemoryId, OwnerId};
use crate::memory::{FeatureBundle, LifecycleState, Memory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Filter parameters for `DurableStore::list` ("list by owner with
/// filters (date range, tags, tier)").
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub state: Option<LifecycleState>,
}

impl ListFilter {
    fn matches(&self, memory: &Memory) -> bool {
        if let Some(since) = self.since {
            if memory.timestamps.event_time < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if memory.timestamps.event_time > until {
                return false;
            }
        }
        if let Some(state) = self.state {
            if memory.state != state {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| memory.tags.contains(t)) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
    #[error("memory {0} not found")]
    NotFound(MemoryId),
}

/// Key/value durable store by memory id, with owner-scoped listing. No
/// transactional guarantees across keys — the core tolerates partial
/// writes via compensating updates, never via cross-key atomicity.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn put(&self, owner: OwnerId, memory: Memory) -> Result<(), StoreError>;
    async fn get(&self, owner: OwnerId, id: MemoryId) -> Result<Option<Memory>, StoreError>;
    async fn list(&self, owner: OwnerId, filter: ListFilter) -> Result<Vec<Memory>, StoreError>;
    async fn mark_state(&self, owner: OwnerId, id: MemoryId, state: LifecycleState) -> Result<(), StoreError>;
    async fn mark_forgotten(&self, owner: OwnerId, id: MemoryId, deadline: DateTime<Utc>) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct OwnerRecords {
    memories: HashMap<MemoryId, Memory>,
    scheduled_forget: HashMap<MemoryId, DateTime<Utc>>,
}

/// Reference `DurableStore` used by tests and small deployments. A real
/// backend (SQLite, a document store, ...) is out of scope for this
/// crate — it is the concrete implementation a deployment plugs in behind
/// the same trait.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shards: Arc<RwLock<HashMap<OwnerId, Arc<RwLock<OwnerRecords>>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, owner: OwnerId) -> Arc<RwLock<OwnerRecords>> {
        if let Some(shard) = self.shards.read().expect("store shards poisoned").get(&owner) {
            return shard.clone();
        }
        let mut write = self.shards.write().expect("store shards poisoned");
        write
            .entry(owner)
            .or_insert_with(|| Arc::new(RwLock::new(OwnerRecords::default())))
            .clone()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn put(&self, owner: OwnerId, memory: Memory) -> Result<(), StoreError> {
        let shard = self.shard(owner);
        shard.write().expect("store shard poisoned").memories.insert(memory.id, memory);
        Ok(())
    }

    async fn get(&self, owner: OwnerId, id: MemoryId) -> Result<Option<Memory>, StoreError> {
        let shard = self.shard(owner);
        Ok(shard.read().expect("store shard poisoned").memories.get(&id).cloned())
    }

    async fn list(&self, owner: OwnerId, filter: ListFilter) -> Result<Vec<Memory>, StoreError> {
        let shard = self.shard(owner);
        let guard = shard.read().expect("store shard poisoned");
        Ok(guard.memories.values().filter(|m| filter.matches(m)).cloned().collect())
    }

    async fn mark_state(&self, owner: OwnerId, id: MemoryId, state: LifecycleState) -> Result<(), StoreError> {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("store shard poisoned");
        let memory = guard.memories.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        memory.state = state;
        Ok(())
    }

    async fn mark_forgotten(&self, owner: OwnerId, id: MemoryId, deadline: DateTime<Utc>) -> Result<(), StoreError> {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("store shard poisoned");
        if !guard.memories.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        guard.scheduled_forget.insert(id, deadline);
        if let Some(m) = guard.memories.get_mut(&id) {
            m.scheduled_forget = Some(deadline);
        }
        Ok(())
    }
}

/// A single ranked hit from the retrieval oracle ("opaque
/// similarity score"). The core treats `score` as a prior only, re-scoring
/// with attention and the context gate before it reaches a consumer.
#[derive(Debug, Clone)]
pub struct OracleHit {
    pub memory_id: MemoryId,
    pub score: f64,
}

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("retrieval oracle unavailable: {0}")]
    Unavailable(String),
    #[error("retrieval oracle timed out")]
    TimedOut,
}

/// Opaque full-text/vector similarity search, out of scope to implement
/// here but consumed as a typed, deadline-bounded boundary.
#[async_trait]
pub trait RetrievalOracle: Send + Sync {
    async fn query(
        &self,
        owner: OwnerId,
        query: &str,
        deadline: Duration,
    ) -> Result<Vec<OracleHit>, OracleError>;
}

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("feature extractor unavailable: {0}")]
    Unavailable(String),
}

/// Result of an extraction attempt: either a bundle or a degraded
/// (heuristic-fallback) flag alongside it ("extractor failures
/// yield an empty bundle plus a degraded flag").
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub bundle: FeatureBundle,
    pub degraded: bool,
}

/// Turns raw content into a `FeatureBundle`. Two modes per: an
/// `external` call (Personal/General tiers only, deadline-bounded) and a
/// `heuristic` fallback (Vault and any external failure). Callers must
/// never invoke the external path for `PrivacyTier::Vault` content — this
/// is enforced by `Engine::store`, not by the trait itself, since the trait
/// boundary cannot see the tier check without threading it through every
/// implementation.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn extract_external(&self, content: &[u8], deadline: Duration) -> Result<ExtractionResult, ExtractionError>;
    fn extract_heuristic(&self, content: &[u8]) -> ExtractionResult;
}

/// A minimal heuristic extractor: keyword/punctuation counting only, no
/// network calls, safe for Vault content and as the degraded fallback.
#[derive(Debug, Clone, Default)]
pub struct HeuristicFeatureExtractor;

impl HeuristicFeatureExtractor {
    const EMOTION_KEYWORDS: &'static [&'static str] = &[
        "love", "hate", "scared", "worried", "excited", "furious", "devastated", "thrilled",
    ];

    fn naive_sentiment(text: &str) -> f64 {
        let positive = ["love", "excited", "thrilled", "great", "happy"];
        let negative = ["hate", "scared", "worried", "furious", "devastated", "sad"];
        let lower = text.to_lowercase();
        let pos = positive.iter().filter(|w| lower.contains(*w)).count() as f64;
        let neg = negative.iter().filter(|w| lower.contains(*w)).count() as f64;
        ((pos - neg) / (pos + neg + 1.0)).clamp(-1.0, 1.0)
    }
}

#[async_trait]
impl FeatureExtractor for HeuristicFeatureExtractor {
    async fn extract_external(&self, _content: &[u8], _deadline: Duration) -> Result<ExtractionResult, ExtractionError> {
        Err(ExtractionError::Unavailable("heuristic extractor has no external mode".to_string()))
    }

    fn extract_heuristic(&self, content: &[u8]) -> ExtractionResult {
        let text = String::from_utf8_lossy(content);
        let lower = text.to_lowercase();
        let keywords: Vec<String> = Self::EMOTION_KEYWORDS
            .iter()
            .filter(|k| lower.contains(*k))
            .map(|k| k.to_string())
            .collect();
        let mut bundle = FeatureBundle::empty();
        bundle.sentiment_intensity = Self::naive_sentiment(&text);
        bundle.emotion_keywords = keywords;
        bundle.degraded = true;
        ExtractionResult { bundle, degraded: true }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
}

/// Opaque embedding/emotion provider boundary: never called for
/// Vault content; the core only ever uses it as a black box.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, deadline: Duration) -> Result<Vec<f32>, EmbeddingError>;
    async fn detect_emotion(&self, text: &str, deadline: Duration) -> Result<String, EmbeddingError>;
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub action_id: uuid::Uuid,
    pub delivered_at: DateTime<Utc>,
}

/// Delivery is at-least-once; the core only records the attempted receipt.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, action: crate::daemon::Action) -> Result<DeliveryReceipt, NotifyError>;
}

/// A `NotificationSink` that only logs (useful as the default wiring in
/// tests and small deployments).
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, action: crate::daemon::Action) -> Result<DeliveryReceipt, NotifyError> {
        tracing::info!(?action, "notification sink: action recorded");
        Ok(DeliveryReceipt {
            action_id: uuid::Uuid::new_v4(),
            delivered_at: Utc::now(),
        })
    }
}
