//! The feature bundle: a closed, tagged variant over recognized feature
//! kinds — replaces dynamic polymorphism over feature bundles with a closed
//! tagged variant; unknown kinds are rejected.
//!
//! Produced by the feature extractor, treated as read-only downstream by
//! every consumer (salience scorer, context gate, pattern detector).

use crate::ids::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Novelty flags: did this observation introduce something new?
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NoveltyFlags {
    pub new_person: bool,
    pub new_location: bool,
    pub unusual_time: bool,
    /// Topics judged novel relative to the owner's history, 0..=1 per topic
    /// strength, already capped to a small set by the extractor.
    pub novel_topics: Vec<f64>,
}

/// Relevance signals: does this observation match things the owner already
/// cares about?
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelevanceSignals {
    pub owner_name_mentioned: bool,
    pub interest_matches: usize,
    pub close_contact_matches: usize,
    pub goal_matches: usize,
    pub self_action_items: usize,
    /// Raw activity/project/participant tokens extracted from the content,
    /// compared against the active context frame by the scorer's relevance
    /// component.
    pub activity_tokens: HashSet<String>,
    pub project_tokens: HashSet<String>,
    pub participant_tokens: HashSet<EntityId>,
}

/// Social signals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SocialSignals {
    /// Weighted sum of recognized relationship-event keywords (e.g. "first
    /// date", "breakup", "promotion"), pre-capped by the extractor.
    pub relationship_event_weight: f64,
    pub conflict: bool,
    pub intimacy: bool,
    pub group_size: usize,
    pub explicit_agreement: bool,
}

/// Consequential signals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsequentialSignals {
    pub action_items: usize,
    pub decisions: usize,
    pub money_mentioned: bool,
    pub commitments: usize,
    pub deadlines: usize,
}

/// The full, closed feature bundle. Unknown/unrecognized feature kinds
/// cannot be represented — any extractor output that doesn't fit this shape
/// is rejected at the boundary rather than passed through opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureBundle {
    pub emotion_keywords: Vec<String>,
    /// -1.0..=1.0
    pub sentiment_intensity: f64,
    pub novelty: NoveltyFlags,
    pub people_mentioned: HashSet<EntityId>,
    pub relevance: RelevanceSignals,
    pub social: SocialSignals,
    pub consequential: ConsequentialSignals,
    pub detected_emotion: Option<String>,
    pub topic_labels: Vec<String>,
    /// Set by the extractor when it fell back to the heuristic path.
    pub degraded: bool,
}

impl FeatureBundle {
    /// An empty bundle, used by the pipeline's retry-on-scorer-crash path
    /// and as the heuristic fallback input.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bundle_has_no_signal() {
        let b = FeatureBundle::empty();
        assert_eq!(b.sentiment_intensity, 0.0);
        assert!(b.people_mentioned.is_empty());
        assert!(!b.degraded);
    }
}
