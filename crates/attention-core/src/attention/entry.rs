//! A single attention-window entry and its effective-salience formula.

use crate::ids::MemoryId;
use chrono::{DateTime, Utc};

/// Opaque token identifying an entry's current touch generation, used for
/// the CAS guard in `AttentionWindow::touch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchToken {
    access_count: u32,
    last_touch_millis: i64,
}

#[derive(Debug, Clone)]
pub struct AttentionEntry {
    pub memory_id: MemoryId,
    pub base_salience: f64,
    pub created_at: DateTime<Utc>,
    pub last_touch: DateTime<Utc>,
    pub access_count: u32,
    /// Additive relevance adjustment from the most recent
    /// `refresh_for_context` call.
    pub context_relevance_delta: f64,
}

impl AttentionEntry {
    pub fn new(memory_id: MemoryId, base_salience: f64, now: DateTime<Utc>) -> Self {
        Self {
            memory_id,
            base_salience,
            created_at: now,
            last_touch: now,
            access_count: 0,
            context_relevance_delta: 0.0,
        }
    }

    pub fn touch_token(&self) -> TouchToken {
        TouchToken {
            access_count: self.access_count,
            last_touch_millis: self.last_touch.timestamp_millis(),
        }
    }

    /// `effective = base * decay * boost`, clamped to the decay floor and
    /// boost ceiling, plus the context relevance delta layered on top
    /// before final clamping.
    pub fn effective_salience_at(&self, now: DateTime<Utc>) -> f64 {
        let days = now
            .signed_duration_since(self.created_at)
            .num_days()
            .max(0) as f64;
        let decay = (1.0 - days * 0.01).max(0.3);
        let boost = (1.0 + self.access_count as f64 * 0.02).min(1.5);
        (self.base_salience * decay * boost + self.context_relevance_delta).clamp(0.0, 150.0)
    }

    pub fn effective_salience(&self) -> f64 {
        self.effective_salience_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_floors_at_point_three() {
        let now = Utc::now();
        let mut entry = AttentionEntry::new(MemoryId::new(), 100.0, now - chrono::Duration::days(365));
        entry.created_at = now - chrono::Duration::days(365);
        let eff = entry.effective_salience_at(now);
        assert!((eff - 30.0).abs() < 1.0);
    }

    #[test]
    fn boost_caps_at_one_point_five() {
        let now = Utc::now();
        let mut entry = AttentionEntry::new(MemoryId::new(), 100.0, now);
        entry.access_count = 1000;
        let eff = entry.effective_salience_at(now);
        assert!((eff - 150.0).abs() < 1.0);
    }

    #[test]
    fn touch_token_changes_after_access_bump() {
        let now = Utc::now();
        let mut entry = AttentionEntry::new(MemoryId::new(), 50.0, now);
        let before = entry.touch_token();
        entry.access_count += 1;
        assert_ne!(before, entry.touch_token());
    }
}
