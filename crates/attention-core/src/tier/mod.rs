//! Tier Manager: hot/warm/cold placement with opportunistic,
//! real-time maintenance — no background sweeper.
//!
//! Shares its per-owner `Arc<RwLock<HashMap<...>>>` sharding with
//! `neuroscience::hippocampal_index`, generalized to a placement map rather
//! than a content index. The deterministic neighbor-sampling substitute for
//! randomness is this module's own addition, avoiding a `rand` dependency
//! in core logic.

use crate::ids::{MemoryId, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub const HOT_THRESHOLD: f64 = 70.0;
pub const WARM_TO_COLD_DAYS: i64 = 30;
pub const WARM_TO_COLD_BASE_MAX: f64 = 40.0;
pub const HOT_TTL_HOURS: i64 = 1;
const MAINTENANCE_SAMPLE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

#[derive(Debug, Clone)]
struct Placement {
    tier: Tier,
    base_salience: f64,
    last_access: DateTime<Utc>,
    access_count_since_placement: u32,
    recent_access_within_hour: u8,
    stored_at: DateTime<Utc>,
    /// Monotonic counter used as the deterministic index for neighbor
    /// sampling during opportunistic maintenance.
    access_counter: u64,
}

#[derive(Debug, Default)]
struct OwnerTiers {
    placements: HashMap<MemoryId, Placement>,
    global_access_counter: u64,
}

/// Tier placements across all owners, sharded by `OwnerId`.
#[derive(Clone, Default)]
pub struct TierManager {
    shards: Arc<RwLock<HashMap<OwnerId, Arc<RwLock<OwnerTiers>>>>>,
}

impl TierManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, owner: OwnerId) -> Arc<RwLock<OwnerTiers>> {
        if let Some(shard) = self.shards.read().expect("tier shards poisoned").get(&owner) {
            return shard.clone();
        }
        let mut write = self.shards.write().expect("tier shards poisoned");
        write
            .entry(owner)
            .or_insert_with(|| Arc::new(RwLock::new(OwnerTiers::default())))
            .clone()
    }

    /// `store`: hot if `base >= HOT_THRESHOLD`, else warm.
    pub fn store(&self, owner: OwnerId, memory_id: MemoryId, base_salience: f64, now: DateTime<Utc>) -> Tier {
        let tier = if base_salience >= HOT_THRESHOLD { Tier::Hot } else { Tier::Warm };
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("tier shard poisoned");
        guard.placements.insert(
            memory_id,
            Placement {
                tier,
                base_salience,
                last_access: now,
                access_count_since_placement: 0,
                recent_access_within_hour: 0,
                stored_at: now,
                access_counter: 0,
            },
        );
        tier
    }

    /// `get`: idempotent; applies promotion/demotion policy for
    /// the touched item, then runs opportunistic maintenance on a
    /// deterministic sample of neighbors. Equivalent to `get_with_deadline`
    /// with a deadline generous enough that promotion is never skipped.
    pub fn get(&self, owner: OwnerId, memory_id: MemoryId, now: DateTime<Utc>) -> Option<Tier> {
        self.get_with_deadline(owner, memory_id, now, std::time::Duration::from_secs(1)).0
    }

    /// As `get`, but the promotion/demotion pass and maintenance sampling
    /// are skipped (the caller's tier is returned unchanged) if `deadline`
    /// elapses before they run. Returns `(tier, promotion_skipped)`.
    pub fn get_with_deadline(
        &self,
        owner: OwnerId,
        memory_id: MemoryId,
        now: DateTime<Utc>,
        deadline: std::time::Duration,
    ) -> (Option<Tier>, bool) {
        let start = std::time::Instant::now();
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("tier shard poisoned");

        if !guard.placements.contains_key(&memory_id) {
            return (None, false);
        }

        if start.elapsed() >= deadline {
            return (guard.placements.get(&memory_id).map(|p| p.tier), true);
        }

        guard.global_access_counter += 1;
        let counter = guard.global_access_counter;

        let tier = {
            let placement = guard.placements.get_mut(&memory_id).expect("checked above");
            apply_access(placement, now, counter);
            placement.tier
        };

        self.run_maintenance_sample(&mut guard, memory_id, now);
        (Some(tier), false)
    }

    /// Opportunistic maintenance ("runs opportunistically on each `get` for
    /// the touched item and sampled neighbors — there is no background
    /// sweeper"). Samples up to `MAINTENANCE_SAMPLE_SIZE` additional entries
    /// deterministically by indexing into the owner's sorted-by-id placement
    /// list using the access counter, avoiding any nondeterministic source.
    fn run_maintenance_sample(&self, guard: &mut OwnerTiers, touched: MemoryId, now: DateTime<Utc>) {
        let mut ids: Vec<MemoryId> = guard.placements.keys().copied().collect();
        ids.sort_by_key(|id| id.as_uuid());
        if ids.is_empty() {
            return;
        }
        let start = (guard.global_access_counter as usize) % ids.len();
        let sample: Vec<MemoryId> = ids
            .iter()
            .cycle()
            .skip(start)
            .take(MAINTENANCE_SAMPLE_SIZE)
            .copied()
            .filter(|id| *id != touched)
            .collect();

        for id in sample {
            if let Some(placement) = guard.placements.get_mut(&id) {
                demote_if_stale(placement, now);
            }
        }
    }

    pub fn current_tier(&self, owner: OwnerId, memory_id: MemoryId) -> Option<Tier> {
        let shard = self.shard(owner);
        let guard = shard.read().expect("tier shard poisoned");
        guard.placements.get(&memory_id).map(|p| p.tier)
    }
}

/// Promotion/access-policy application for a single touched placement.
fn apply_access(placement: &mut Placement, now: DateTime<Utc>, counter: u64) {
    let since_last = now.signed_duration_since(placement.last_access);
    let within_hour_of_previous = since_last <= chrono::Duration::hours(1);

    placement.access_count_since_placement += 1;
    placement.access_counter = counter;
    if within_hour_of_previous {
        placement.recent_access_within_hour = placement.recent_access_within_hour.saturating_add(1);
    } else {
        placement.recent_access_within_hour = 1;
    }
    placement.last_access = now;

    if placement.tier == Tier::Cold {
        // Cold -> warm on any access.
        placement.tier = Tier::Warm;
    }

    if placement.tier != Tier::Hot {
        let within_day = now.signed_duration_since(placement.stored_at).num_hours() <= 24;
        let earns_promotion =
            placement.recent_access_within_hour >= 2 || (placement.base_salience >= 60.0 && within_day);
        if earns_promotion {
            placement.tier = Tier::Hot;
        }
    }
}

/// Time-based demotion applied during maintenance sampling (hot TTL 1h,
/// warm→cold after 30 days untouched with base < 40).
fn demote_if_stale(placement: &mut Placement, now: DateTime<Utc>) {
    match placement.tier {
        Tier::Hot => {
            if now.signed_duration_since(placement.last_access).num_hours() >= HOT_TTL_HOURS {
                placement.tier = Tier::Warm;
            }
        }
        Tier::Warm => {
            let idle_days = now.signed_duration_since(placement.last_access).num_days();
            if idle_days >= WARM_TO_COLD_DAYS && placement.base_salience < WARM_TO_COLD_BASE_MAX {
                placement.tier = Tier::Cold;
            }
        }
        Tier::Cold => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::OwnerId;

    #[test]
    fn store_places_hot_or_warm_by_threshold() {
        let mgr = TierManager::new();
        let owner = OwnerId::new();
        let now = Utc::now();
        let hot = MemoryId::new();
        let warm = MemoryId::new();
        assert_eq!(mgr.store(owner, hot, 80.0, now), Tier::Hot);
        assert_eq!(mgr.store(owner, warm, 50.0, now), Tier::Warm);
    }

    #[test]
    fn two_accesses_within_an_hour_promote_to_hot() {
        let mgr = TierManager::new();
        let owner = OwnerId::new();
        let now = Utc::now();
        let mem = MemoryId::new();
        mgr.store(owner, mem, 50.0, now);
        mgr.get(owner, mem, now + chrono::Duration::minutes(10));
        let tier = mgr.get(owner, mem, now + chrono::Duration::minutes(20)).unwrap();
        assert_eq!(tier, Tier::Hot);
    }

    #[test]
    fn get_is_idempotent_on_already_hot() {
        let mgr = TierManager::new();
        let owner = OwnerId::new();
        let now = Utc::now();
        let mem = MemoryId::new();
        mgr.store(owner, mem, 90.0, now);
        let first = mgr.get(owner, mem, now).unwrap();
        let second = mgr.get(owner, mem, now).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_deadline_skips_promotion_and_reports_it() {
        let mgr = TierManager::new();
        let owner = OwnerId::new();
        let now = Utc::now();
        let mem = MemoryId::new();
        mgr.store(owner, mem, 50.0, now);
        let (tier, skipped) = mgr.get_with_deadline(owner, mem, now, std::time::Duration::from_secs(0));
        assert_eq!(tier, Some(Tier::Warm));
        assert!(skipped);
    }

    #[test]
    fn cold_promotes_to_warm_on_any_access() {
        let mgr = TierManager::new();
        let owner = OwnerId::new();
        let now = Utc::now();
        let mem = MemoryId::new();
        mgr.store(owner, mem, 10.0, now);
        {
            let shard = mgr.shard(owner);
            let mut guard = shard.write().unwrap();
            guard.placements.get_mut(&mem).unwrap().tier = Tier::Cold;
        }
        let tier = mgr.get(owner, mem, now + chrono::Duration::days(1)).unwrap();
        assert_ne!(tier, Tier::Cold);
    }
}
