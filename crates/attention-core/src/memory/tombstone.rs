//! Tombstones: a deleted memory leaves a tombstone for a 30-day grace
//! period before physical removal; restoring within that window is
//! lossless.

use super::{Memory, TOMBSTONE_GRACE_DAYS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tombstone {
    /// The memory exactly as it was at deletion time, minus its access
    /// history since a restore should not fabricate surfacing events that
    /// never happened ("indistinguishable from the original except
    /// for its access history").
    pub record: Memory,
    pub deleted_at: DateTime<Utc>,
    pub purge_after: DateTime<Utc>,
}

impl Tombstone {
    pub fn new(record: Memory) -> Self {
        let deleted_at = Utc::now();
        Self {
            record,
            deleted_at,
            purge_after: deleted_at + chrono::Duration::days(TOMBSTONE_GRACE_DAYS),
        }
    }

    pub fn is_purgeable(&self, now: DateTime<Utc>) -> bool {
        now >= self.purge_after
    }

    /// Restore the tombstoned record, clearing its access history so a
    /// restore never fabricates surfacing events that never happened.
    pub fn restore(mut self) -> Memory {
        self.record.access_history.clear();
        self.record.state = super::LifecycleState::Active;
        self.record
    }
}
