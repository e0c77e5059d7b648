//! Open loops and pressure vectors: derived features stored
//! separately from their source memory because their lifecycle outlives it.
//!
//! An open loop is an obligation keyed by id, with a status enum and
//! optional due date, on either side of an owes/owed relationship.

use crate::ids::{EntityId, LoopId, MemoryId, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerSide {
    SelfOwes,
    OtherOwes,
    Mutual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Open,
    Closed,
    Cancelled,
    Overdue,
}

/// A commitment record derived from a memory ("Open loop").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenLoop {
    pub id: LoopId,
    pub source_memory: MemoryId,
    pub owner_side: OwnerSide,
    pub counterparty: EntityId,
    pub description: String,
    pub due: Option<DateTime<Utc>>,
    pub status: LoopStatus,
}

impl OpenLoop {
    pub fn new(
        source_memory: MemoryId,
        owner_side: OwnerSide,
        counterparty: EntityId,
        description: String,
        due: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: LoopId::new(),
            source_memory,
            owner_side,
            counterparty,
            description,
            due,
            status: LoopStatus::Open,
        }
    }

    /// Recompute `Overdue` status from a due date that has passed (status
    /// derivation is not automatic since only the caller knows "now").
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if self.status == LoopStatus::Open {
            if let Some(due) = self.due {
                if now > due {
                    self.status = LoopStatus::Overdue;
                }
            }
        }
    }
}

/// A directed affective quantity between two entities ("Pressure
/// vector"), accumulated across interactions and consumed by the Event
/// Daemon's care-circle alerting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PressureVector {
    pub from: EntityId,
    pub to: EntityId,
    pub magnitude: f64,
    pub valence: f64,
    pub timestamp: DateTime<Utc>,
    pub decay_rate: f64,
}

impl PressureVector {
    pub fn new(from: EntityId, to: EntityId, magnitude: f64, valence: f64, decay_rate: f64) -> Self {
        Self {
            from,
            to,
            magnitude,
            valence: valence.clamp(-1.0, 1.0),
            timestamp: Utc::now(),
            decay_rate: decay_rate.max(0.0),
        }
    }

    /// Exponentially decayed magnitude at `now`.
    pub fn magnitude_at(&self, now: DateTime<Utc>) -> f64 {
        let hours = now.signed_duration_since(self.timestamp).num_seconds().max(0) as f64 / 3600.0;
        (self.magnitude * (-self.decay_rate * hours).exp()).max(0.0)
    }

    /// Accumulate a new affective interaction into this vector ("Accumulated
    /// across affective interactions").
    pub fn accumulate(&mut self, magnitude: f64, valence: f64, now: DateTime<Utc>) {
        let current = self.magnitude_at(now);
        let total = current + magnitude;
        if total > 0.0 {
            self.valence = ((self.valence * current + valence * magnitude) / total).clamp(-1.0, 1.0);
        }
        self.magnitude = total;
        self.timestamp = now;
    }
}

#[derive(Debug, Default)]
struct OwnerDerivedFeatures {
    loops: HashMap<LoopId, OpenLoop>,
    pressure: HashMap<(EntityId, EntityId), PressureVector>,
}

/// Per-owner store of open loops and pressure vectors.
#[derive(Clone, Default)]
pub struct DerivedFeatureStore {
    shards: Arc<RwLock<HashMap<OwnerId, Arc<RwLock<OwnerDerivedFeatures>>>>>,
}

impl DerivedFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, owner: OwnerId) -> Arc<RwLock<OwnerDerivedFeatures>> {
        if let Some(shard) = self.shards.read().expect("derived feature shards poisoned").get(&owner) {
            return shard.clone();
        }
        let mut write = self.shards.write().expect("derived feature shards poisoned");
        write
            .entry(owner)
            .or_insert_with(|| Arc::new(RwLock::new(OwnerDerivedFeatures::default())))
            .clone()
    }

    pub fn record_loop(&self, owner: OwnerId, open_loop: OpenLoop) {
        let shard = self.shard(owner);
        shard
            .write()
            .expect("derived feature shard poisoned")
            .loops
            .insert(open_loop.id, open_loop);
    }

    pub fn list_loops(&self, owner: OwnerId, status: Option<LoopStatus>) -> Vec<OpenLoop> {
        let shard = self.shard(owner);
        let guard = shard.read().expect("derived feature shard poisoned");
        guard
            .loops
            .values()
            .filter(|l| status.map(|s| l.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn accumulate_pressure(&self, owner: OwnerId, from: EntityId, to: EntityId, magnitude: f64, valence: f64, now: DateTime<Utc>) {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("derived feature shard poisoned");
        guard
            .pressure
            .entry((from, to))
            .and_modify(|v| v.accumulate(magnitude, valence, now))
            .or_insert_with(|| PressureVector::new(from, to, magnitude, valence, 0.05));
    }

    pub fn pressure_between(&self, owner: OwnerId, from: EntityId, to: EntityId) -> Option<PressureVector> {
        let shard = self.shard(owner);
        shard
            .read()
            .expect("derived feature shard poisoned")
            .pressure
            .get(&(from, to))
            .copied()
    }
}
