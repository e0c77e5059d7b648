//! Temporal Pattern Detector: per-entity periodicity detection
//! from a bounded access-time history, via direct (non-FFT) autocorrelation
//! bounded to O(N·L).
//!
//! Each entity's access history is a capped `VecDeque` (the same bounded-
//! history idiom used for a memory's own access log), and its most recent
//! detected pattern is cached so a caller that can't afford to recompute
//! before its deadline still gets a usable, if stale, prediction.

mod autocorrelation;

pub use autocorrelation::{detect_period, LagCandidate};

use crate::ids::EntityId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

pub const MAX_SAMPLES: usize = 256;
pub const WINDOW_DAYS: i64 = 84;
const MIN_DAYS_FOR_ANY_PATTERN: i64 = 14;
const FORMING_MIN_DAYS: i64 = 21;
const FORMING_MIN_CONFIDENCE: f64 = 0.4;
const FORMED_MIN_CONFIDENCE: f64 = 0.6;
const STABLE_MIN_CONFIDENCE: f64 = 0.8;
const STABLE_MIN_DAYS: i64 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationState {
    Forming,
    Formed,
    Stable,
}

/// A detected (or cached) periodicity for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub entity: EntityId,
    pub period: Duration,
    pub confidence: f64,
    pub state: FormationState,
    pub last_access: DateTime<Utc>,
    pub std_dev: Duration,
    pub weekend_masked: bool,
    pub computed_at: DateTime<Utc>,
}

impl Pattern {
    /// `predict_next`: a hint, never a fact.
    pub fn predict_next(&self) -> DateTime<Utc> {
        self.last_access + self.period
    }
}

/// Result of a `detect` call: the pattern (if any), and whether it is the
/// cached one from a previous call rather than freshly recomputed.
#[derive(Debug, Clone, Default)]
pub struct DetectOutcome {
    pub pattern: Option<Pattern>,
    pub stale: bool,
}

#[derive(Debug, Default)]
struct EntityState {
    accesses: VecDeque<DateTime<Utc>>,
    cached_pattern: Option<Pattern>,
}

/// Per-entity pattern state, sharded by `EntityId`.
#[derive(Clone, Default)]
pub struct PatternDetector {
    shards: Arc<RwLock<HashMap<EntityId, Arc<RwLock<EntityState>>>>>,
}

impl PatternDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, entity: EntityId) -> Arc<RwLock<EntityState>> {
        if let Some(shard) = self.shards.read().expect("pattern shards poisoned").get(&entity) {
            return shard.clone();
        }
        let mut write = self.shards.write().expect("pattern shards poisoned");
        write
            .entry(entity)
            .or_insert_with(|| Arc::new(RwLock::new(EntityState::default())))
            .clone()
    }

    pub fn record_access(&self, entity: EntityId, timestamp: DateTime<Utc>) {
        let shard = self.shard(entity);
        let mut guard = shard.write().expect("pattern shard poisoned");
        guard.accesses.push_back(timestamp);
        while guard.accesses.len() > MAX_SAMPLES {
            guard.accesses.pop_front();
        }
    }

    /// `detect`: bounded O(N·L); on failure to clear the
    /// cancellation budget, callers get the stale cached pattern instead,
    /// with `stale: true` so a caller surfacing an `Outcome` can report
    /// the degradation rather than presenting it as a fresh computation.
    pub fn detect(&self, entity: EntityId, now: DateTime<Utc>) -> DetectOutcome {
        let shard = self.shard(entity);
        let mut guard = shard.write().expect("pattern shard poisoned");

        let cutoff = now - Duration::days(WINDOW_DAYS);
        let samples: Vec<DateTime<Utc>> = guard
            .accesses
            .iter()
            .copied()
            .filter(|t| *t >= cutoff)
            .collect();

        if samples.len() < 3 {
            return DetectOutcome { pattern: guard.cached_pattern.clone(), stale: guard.cached_pattern.is_some() };
        }

        let days_of_data = now
            .signed_duration_since(samples[0])
            .num_days()
            .max(0);
        // Fewer than 14 days of data never yields a pattern, cached or fresh.
        if days_of_data < MIN_DAYS_FOR_ANY_PATTERN {
            guard.cached_pattern = None;
            return DetectOutcome { pattern: None, stale: false };
        }

        let result = autocorrelation::detect_period(&samples, now);
        let Some(found) = result else {
            return DetectOutcome { pattern: guard.cached_pattern.clone(), stale: guard.cached_pattern.is_some() };
        };

        let confidence = (found.correlation * samples.len() as f64 / needed_samples(found.period)).clamp(0.0, 1.0);

        let Some(state) = formation_state(days_of_data, confidence) else {
            // Below the `forming` gate (< 21 days of data or confidence <
            // 0.4): no pattern is reported yet, cached or fresh.
            return DetectOutcome { pattern: guard.cached_pattern.clone(), stale: guard.cached_pattern.is_some() };
        };

        let pattern = Pattern {
            entity,
            period: found.period,
            confidence,
            state,
            last_access: *samples.last().unwrap(),
            std_dev: found.std_dev,
            weekend_masked: found.weekend_masked,
            computed_at: now,
        };
        guard.cached_pattern = Some(pattern.clone());
        DetectOutcome { pattern: Some(pattern), stale: false }
    }

    pub fn cached_pattern(&self, entity: EntityId) -> Option<Pattern> {
        let shard = self.shard(entity);
        shard.read().expect("pattern shard poisoned").cached_pattern.clone()
    }

    pub fn predict_next(&self, entity: EntityId) -> Option<DateTime<Utc>> {
        self.cached_pattern(entity).map(|p| p.predict_next())
    }
}

/// Samples needed for confidence to saturate at 1.0: a fraction of however
/// many cycles of `period` fit in the 84-day window, so a one-access-per-
/// cycle cadence (the common case - a daily or weekly routine) can actually
/// cross the `forming`/`formed`/`stable` confidence gates within the spec's
/// own day thresholds (spec §8: 22 daily samples clears confidence ≥ 0.4).
const NEEDED_SAMPLES_FRACTION: f64 = 0.6;

fn needed_samples(period: Duration) -> f64 {
    let hours = period.num_hours().max(1) as f64;
    ((WINDOW_DAYS as f64 * 24.0 / hours) * NEEDED_SAMPLES_FRACTION).max(3.0)
}

/// `None` below the `forming` gate (< `FORMING_MIN_DAYS` days of data or
/// confidence < `FORMING_MIN_CONFIDENCE`): the spec reports no pattern at
/// all until both are met, not a `Forming` one.
fn formation_state(days_of_data: i64, confidence: f64) -> Option<FormationState> {
    if confidence >= STABLE_MIN_CONFIDENCE && days_of_data >= STABLE_MIN_DAYS {
        Some(FormationState::Stable)
    } else if confidence >= FORMED_MIN_CONFIDENCE {
        Some(FormationState::Formed)
    } else if days_of_data >= FORMING_MIN_DAYS && confidence >= FORMING_MIN_CONFIDENCE {
        Some(FormationState::Forming)
    } else {
        None
    }
}
