//! Memory module — the central entity and its bounded satellite structures.
//!
//! Enum/newtype conventions follow `#[serde(rename_all = "snake_case")]`
//! on every state enum, and access history is a bounded `VecDeque` rather
//! than an unbounded log.

mod features;
mod tombstone;

pub use features::{ConsequentialSignals, FeatureBundle, NoveltyFlags, RelevanceSignals, SocialSignals};
pub use tombstone::Tombstone;

use crate::ids::{DeviceId, MemoryId, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of access timestamps retained per memory.
pub const MAX_ACCESS_HISTORY: usize = 256;

/// Grace period before a tombstoned memory is physically removed.
pub const TOMBSTONE_GRACE_DAYS: i64 = 30;

/// Who may see a memory's content, and which external services may touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyTier {
    General,
    Personal,
    Vault,
}

impl PrivacyTier {
    /// Vault content must never reach an external feature extractor, embedder,
    /// or emotion provider.
    pub fn allows_external_calls(&self) -> bool {
        !matches!(self, PrivacyTier::Vault)
    }
}

/// Lifecycle state of a memory record: a coarse
/// active/archived/suppressed/deleted switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Active,
    Archived,
    Suppressed,
    Deleted,
}

/// Which device/app produced a memory, and what kind of device it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Desktop,
    Wearable,
    Robotic,
    Voice,
}

impl DeviceType {
    /// Context-frame TTL for this device type ("30s for robotic
    /// devices up to 15 minutes for desktops").
    pub fn frame_ttl(&self) -> chrono::Duration {
        match self {
            DeviceType::Robotic => chrono::Duration::seconds(30),
            DeviceType::Wearable => chrono::Duration::minutes(2),
            DeviceType::Mobile => chrono::Duration::minutes(5),
            DeviceType::Voice => chrono::Duration::minutes(5),
            DeviceType::Desktop => chrono::Duration::minutes(15),
        }
    }
}

/// Device origin metadata attached to a memory at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceOrigin {
    pub device_id: DeviceId,
    pub device_type: DeviceType,
}

/// Monotonic ingestion time plus wall-clock event time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryTimestamps {
    /// When the core ingested this memory (always monotonic within a process).
    pub ingested_at: DateTime<Utc>,
    /// When the underlying event actually happened, per the source device.
    pub event_time: DateTime<Utc>,
}

/// The central entity: a single observation plus everything the core needs
/// to score, place, and gate it. `base_salience` is immutable once computed;
/// `effective_salience` is derived on demand by the attention window, never
/// stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub owner: OwnerId,
    pub timestamps: MemoryTimestamps,
    pub content: Vec<u8>,
    pub privacy_tier: PrivacyTier,
    pub device_origin: DeviceOrigin,
    pub tags: Vec<String>,
    pub features: FeatureBundle,
    /// Computed once at ingestion by the salience scorer; never rewritten.
    pub base_salience: f64,
    pub access_history: VecDeque<DateTime<Utc>>,
    pub state: LifecycleState,
    pub scheduled_forget: Option<DateTime<Utc>>,
}

impl Memory {
    pub fn new(
        owner: OwnerId,
        content: Vec<u8>,
        privacy_tier: PrivacyTier,
        device_origin: DeviceOrigin,
        features: FeatureBundle,
        base_salience: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            owner,
            timestamps: MemoryTimestamps {
                ingested_at: now,
                event_time: now,
            },
            content,
            privacy_tier,
            device_origin,
            tags: Vec::new(),
            features,
            base_salience: base_salience.clamp(0.0, 100.0),
            access_history: VecDeque::with_capacity(MAX_ACCESS_HISTORY),
            state: LifecycleState::Active,
            scheduled_forget: None,
        }
    }

    /// Record a recall/context-surfacing access (not a store). Bounded to
    /// `MAX_ACCESS_HISTORY` most-recent timestamps.
    pub fn record_access(&mut self, at: DateTime<Utc>) {
        self.access_history.push_back(at);
        while self.access_history.len() > MAX_ACCESS_HISTORY {
            self.access_history.pop_front();
        }
    }

    pub fn access_count(&self) -> usize {
        self.access_history.len()
    }

    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        self.access_history.back().copied()
    }

    /// Age in whole days since ingestion, used by the attention window's
    /// decay function.
    pub fn days_since_creation(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.timestamps.ingested_at)
            .num_days()
            .max(0)
    }

    pub fn mark_deleted(&mut self) -> Tombstone {
        self.state = LifecycleState::Deleted;
        Tombstone::new(self.clone())
    }
}
