//! Attention Window: the per-owner set of currently "in mind"
//! memories, ordered by effective salience.
//!
//! Shares its `Arc<RwLock<HashMap<...>>>` per-owner sharding with
//! `neuroscience::prospective_memory`, `neuroscience::hippocampal_index`,
//! and `neuroscience::predictive_retrieval` (each keeps its live state
//! behind `Arc<RwLock<HashMap<String, _>>>` fields on a struct constructed
//! once and shared). The CAS-guarded `touch` is this module's own
//! addition, since none of those need a per-entry optimistic-concurrency
//! guard.

mod entry;

pub use entry::{AttentionEntry, TouchToken};

use crate::error::{ComponentError, ErrorKind};
use crate::ids::{MemoryId, OwnerId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const COMPONENT: &str = "attention_window";
const MAX_CAS_RETRIES: u8 = 3;

/// Window-level TTL: 24 hours of inactivity before the whole set is
/// rebuilt ("attention_window (owner -> sorted set, TTL 24h)"), distinct
/// from each entry's own per-access decay.
const WINDOW_TTL_HOURS: i64 = 24;

#[derive(Debug, Default)]
struct OwnerAttention {
    entries: HashMap<MemoryId, AttentionEntry>,
    /// Timestamp of the most recent `add`/`touch`/`refresh_for_context`
    /// mutation to this owner's window, independent of any single entry's
    /// `last_touch`. `None` until the window has seen its first mutation.
    last_activity: Option<DateTime<Utc>>,
}

impl OwnerAttention {
    fn mark_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    /// `true` once 24h have elapsed since the window's own last mutation,
    /// regardless of any individual entry's decay state.
    fn is_idle(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity {
            Some(last) => now.signed_duration_since(last) >= chrono::Duration::hours(WINDOW_TTL_HOURS),
            None => false,
        }
    }

    /// Rebuild the whole set: recompute every entry's effective salience
    /// against `now` and drop anything that no longer clears `threshold`,
    /// then reset the idle clock.
    fn rebuild(&mut self, threshold: f64, now: DateTime<Utc>) -> Vec<MemoryId> {
        let dropped: Vec<MemoryId> = self
            .entries
            .values()
            .filter(|e| e.effective_salience_at(now) < threshold)
            .map(|e| e.memory_id)
            .collect();
        for id in &dropped {
            self.entries.remove(id);
        }
        self.last_activity = Some(now);
        dropped
    }

    fn sorted_ids(&self) -> Vec<MemoryId> {
        let mut ids: Vec<&AttentionEntry> = self.entries.values().collect();
        ids.sort_by(|a, b| {
            b.effective_salience()
                .partial_cmp(&a.effective_salience())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.last_touch.cmp(&a.last_touch))
                .then(a.memory_id.as_uuid().cmp(&b.memory_id.as_uuid()))
        });
        ids.into_iter().map(|e| e.memory_id).collect()
    }
}

/// The attention window across all owners, sharded by `OwnerId` (teacher
/// precedent: per-owner/per-key `Arc<RwLock<HashMap<...>>>` sharding).
#[derive(Clone, Default)]
pub struct AttentionWindow {
    shards: Arc<RwLock<HashMap<OwnerId, Arc<RwLock<OwnerAttention>>>>>,
    capacity: usize,
    threshold: f64,
}

impl AttentionWindow {
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Self {
            shards: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            threshold,
        }
    }

    fn shard(&self, owner: OwnerId) -> Arc<RwLock<OwnerAttention>> {
        if let Some(shard) = self.shards.read().expect("attention shards poisoned").get(&owner) {
            return shard.clone();
        }
        let mut write = self.shards.write().expect("attention shards poisoned");
        write
            .entry(owner)
            .or_insert_with(|| Arc::new(RwLock::new(OwnerAttention::default())))
            .clone()
    }

    /// Insert or refresh a memory's base salience. Only takes effect when
    /// the resulting effective salience clears the attention threshold
    /// ("`add` inserts when `effective >= ATTENTION_THRESHOLD`").
    pub fn add(&self, owner: OwnerId, memory_id: MemoryId, base_salience: f64, now: DateTime<Utc>) {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("attention shard poisoned");
        guard.mark_activity(now);
        let entry = guard
            .entries
            .entry(memory_id)
            .or_insert_with(|| AttentionEntry::new(memory_id, base_salience, now));
        entry.base_salience = base_salience;
        entry.created_at = entry.created_at.min(now);

        if entry.effective_salience_at(now) < self.threshold {
            guard.entries.remove(&memory_id);
            return;
        }
        self.evict_overflow(&mut guard);
    }

    /// Rebuild the owner's whole window once 24h have passed since its own
    /// last mutation ("attention_window (owner -> sorted set, TTL 24h)"),
    /// independent of each entry's per-access decay. A no-op, returning an
    /// empty vec, if the window has mutated more recently than that.
    pub fn rebuild_if_idle(&self, owner: OwnerId, now: DateTime<Utc>) -> Vec<MemoryId> {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("attention shard poisoned");
        if !guard.is_idle(now) {
            return Vec::new();
        }
        guard.rebuild(self.threshold, now)
    }

    fn evict_overflow(&self, guard: &mut OwnerAttention) {
        while guard.entries.len() > self.capacity {
            if let Some(lowest) = guard
                .entries
                .values()
                .min_by(|a, b| {
                    a.effective_salience()
                        .partial_cmp(&b.effective_salience())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|e| e.memory_id)
            {
                guard.entries.remove(&lowest);
            } else {
                break;
            }
        }
    }

    /// Compare-and-swap guarded touch: bumps access count and recomputes
    /// effective salience, retried internally on conflict up to
    /// `MAX_CAS_RETRIES` times before surfacing a conflict error.
    pub fn touch(&self, owner: OwnerId, memory_id: MemoryId, now: DateTime<Utc>) -> Result<(), ComponentError> {
        let shard = self.shard(owner);
        for _ in 0..MAX_CAS_RETRIES {
            let expected = {
                let guard = shard.read().expect("attention shard poisoned");
                match guard.entries.get(&memory_id) {
                    Some(e) => e.touch_token(),
                    None => {
                        return Err(ComponentError::new(
                            COMPONENT,
                            Some(owner),
                            ErrorKind::Invalid {
                                field: "memory_id".to_string(),
                                reason: "not present in attention window".to_string(),
                            },
                        ))
                    }
                }
            };

            let mut guard = shard.write().expect("attention shard poisoned");
            if let Some(entry) = guard.entries.get_mut(&memory_id) {
                if entry.touch_token() != expected {
                    continue; // lost the race, retry
                }
                entry.access_count += 1;
                entry.last_touch = now;
                if entry.effective_salience_at(now) < self.threshold {
                    guard.entries.remove(&memory_id);
                }
                guard.mark_activity(now);
                return Ok(());
            }
            return Err(ComponentError::new(
                COMPONENT,
                Some(owner),
                ErrorKind::Invalid {
                    field: "memory_id".to_string(),
                    reason: "not present in attention window".to_string(),
                },
            ));
        }
        Err(ComponentError::new(
            COMPONENT,
            Some(owner),
            ErrorKind::Conflict {
                owner,
                detail: format!("touch lost CAS race {MAX_CAS_RETRIES} times on {memory_id}"),
            },
        ))
    }

    /// The current effective salience of one entry, or `None` if it is not
    /// (or no longer) present in the owner's window.
    pub fn effective_salience(&self, owner: OwnerId, memory_id: MemoryId, now: DateTime<Utc>) -> Option<f64> {
        let shard = self.shard(owner);
        let guard = shard.read().expect("attention shard poisoned");
        guard.entries.get(&memory_id).map(|e| e.effective_salience_at(now))
    }

    /// Top `limit` memory ids, ordered by effective salience desc with
    /// most-recent-touch tie-break.
    pub fn get_top(&self, owner: OwnerId, limit: usize) -> Vec<MemoryId> {
        let shard = self.shard(owner);
        let guard = shard.read().expect("attention shard poisoned");
        guard.sorted_ids().into_iter().take(limit).collect()
    }

    /// Remove all entries whose effective salience has fallen below
    /// `threshold`.
    pub fn prune(&self, owner: OwnerId, threshold: f64, now: DateTime<Utc>) -> Vec<MemoryId> {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("attention shard poisoned");
        let dropped: Vec<MemoryId> = guard
            .entries
            .values()
            .filter(|e| e.effective_salience_at(now) < threshold)
            .map(|e| e.memory_id)
            .collect();
        for id in &dropped {
            guard.entries.remove(id);
        }
        dropped
    }

    /// Remove one entry outright, regardless of its current effective
    /// salience. Used when a memory is deleted or suppressed so it cannot
    /// keep surfacing through the attention window after its lifecycle
    /// state no longer permits recall.
    pub fn remove(&self, owner: OwnerId, memory_id: MemoryId) {
        let shard = self.shard(owner);
        shard.write().expect("attention shard poisoned").entries.remove(&memory_id);
    }

    /// Recompute relevance-derived effective salience against a new context
    /// frame, pruning anything that falls below threshold.
    /// `relevance_delta` supplies the recomputed relevance bonus per memory
    /// id, produced by the caller via the salience scorer against the new
    /// frame.
    pub fn refresh_for_context(
        &self,
        owner: OwnerId,
        relevance_delta: &HashMap<MemoryId, f64>,
        now: DateTime<Utc>,
    ) -> Vec<MemoryId> {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("attention shard poisoned");
        guard.mark_activity(now);
        for (id, delta) in relevance_delta {
            if let Some(entry) = guard.entries.get_mut(id) {
                entry.context_relevance_delta = *delta;
            }
        }
        let dropped: Vec<MemoryId> = guard
            .entries
            .values()
            .filter(|e| e.effective_salience_at(now) < self.threshold)
            .map(|e| e.memory_id)
            .collect();
        for id in &dropped {
            guard.entries.remove(id);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::OwnerId;

    #[test]
    fn add_below_threshold_is_dropped() {
        let window = AttentionWindow::new(100, 40.0);
        let owner = OwnerId::new();
        let now = Utc::now();
        window.add(owner, MemoryId::new(), 10.0, now);
        assert!(window.get_top(owner, 10).is_empty());
    }

    #[test]
    fn touch_bumps_access_and_keeps_entry_above_threshold() {
        let window = AttentionWindow::new(100, 40.0);
        let owner = OwnerId::new();
        let mem = MemoryId::new();
        let now = Utc::now();
        window.add(owner, mem, 50.0, now);
        window.touch(owner, mem, now).unwrap();
        let top = window.get_top(owner, 10);
        assert_eq!(top, vec![mem]);
    }

    #[test]
    fn capacity_evicts_lowest_effective() {
        let window = AttentionWindow::new(2, 40.0);
        let owner = OwnerId::new();
        let now = Utc::now();
        let low = MemoryId::new();
        let mid = MemoryId::new();
        let high = MemoryId::new();
        window.add(owner, low, 45.0, now);
        window.add(owner, mid, 60.0, now);
        window.add(owner, high, 90.0, now);
        let top = window.get_top(owner, 10);
        assert_eq!(top.len(), 2);
        assert!(top.contains(&high));
        assert!(top.contains(&mid));
        assert!(!top.contains(&low));
    }

    #[test]
    fn touch_on_missing_entry_errors() {
        let window = AttentionWindow::new(100, 40.0);
        let owner = OwnerId::new();
        let result = window.touch(owner, MemoryId::new(), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn rebuild_if_idle_is_noop_before_ttl() {
        let window = AttentionWindow::new(100, 40.0);
        let owner = OwnerId::new();
        let mem = MemoryId::new();
        let now = Utc::now();
        window.add(owner, mem, 90.0, now);
        let dropped = window.rebuild_if_idle(owner, now + chrono::Duration::hours(23));
        assert!(dropped.is_empty());
        assert_eq!(window.get_top(owner, 10), vec![mem]);
    }

    #[test]
    fn rebuild_if_idle_evicts_entries_that_decayed_while_untouched() {
        let window = AttentionWindow::new(100, 40.0);
        let owner = OwnerId::new();
        let mem = MemoryId::new();
        let now = Utc::now();
        window.add(owner, mem, 50.0, now);
        // nothing touches this owner's window for 40 days; decay alone would
        // eventually drop the entry on the next `add`/`touch`, but with
        // neither called nothing re-evaluates it until the window's own
        // 24h idle TTL forces a rebuild.
        let later = now + chrono::Duration::days(40);
        let dropped = window.rebuild_if_idle(owner, later);
        assert_eq!(dropped, vec![mem]);
        assert!(window.get_top(owner, 10).is_empty());
    }

    #[test]
    fn rebuild_if_idle_resets_the_clock() {
        let window = AttentionWindow::new(100, 40.0);
        let owner = OwnerId::new();
        let mem = MemoryId::new();
        let now = Utc::now();
        window.add(owner, mem, 90.0, now);
        let first = now + chrono::Duration::hours(25);
        window.rebuild_if_idle(owner, first);
        let second = first + chrono::Duration::hours(23);
        let dropped = window.rebuild_if_idle(owner, second);
        assert!(dropped.is_empty());
    }

    #[test]
    fn remove_clears_an_entry_regardless_of_salience() {
        let window = AttentionWindow::new(100, 40.0);
        let owner = OwnerId::new();
        let mem = MemoryId::new();
        let now = Utc::now();
        window.add(owner, mem, 90.0, now);
        window.remove(owner, mem);
        assert!(window.get_top(owner, 10).is_empty());
    }
}
