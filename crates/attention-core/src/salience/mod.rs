//! Salience Scorer: turns a feature bundle plus context frame
//! into a base salience 0..=100 with a per-component breakdown.
//!
//! Shares its shape with `other_examples/.../importance_scorer.rs`'s
//! `AdvancedImportanceScorer`: one scoring method per component, a composite
//! weighted sum clipped to bounds, and a learned-weight adjustment path with
//! `normalize_weights`. Here the components are a fixed set of five rather
//! than six, and weighting adapts per owner from retrieval outcomes rather
//! than from a single global performance map.

mod weights;

pub use weights::{RetrievalOutcome, WeightLearner};

use crate::config::{AttentionConfig, ContextModifier};
use crate::context::{ContextFrame, ContextTag};
use crate::memory::FeatureBundle;
use serde::{Deserialize, Serialize};

/// Per-component breakdown of a computed salience score (mirrors the
/// teacher's `ImportanceFactors`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub emotional: f64,
    pub novelty: f64,
    pub relevance: f64,
    pub social: f64,
    pub consequential: f64,
    pub composite: f64,
}

fn clip(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

fn emotional_component(f: &FeatureBundle, intimate: bool) -> f64 {
    let keyword_score = (f.emotion_keywords.len() as f64 * 15.0).min(60.0);
    let sentiment = f.sentiment_intensity.abs().min(1.0) * 40.0;
    let extreme_bonus = if f.sentiment_intensity.abs() > 0.8 { 10.0 } else { 0.0 };
    let intimacy_boost = if intimate { 15.0 } else { 0.0 };
    clip(keyword_score + sentiment + extreme_bonus + intimacy_boost)
}

fn novelty_component(f: &FeatureBundle) -> f64 {
    let mut score = 0.0;
    if f.novelty.new_person {
        score += 25.0;
    }
    if f.novelty.new_location {
        score += 25.0;
    }
    if f.novelty.unusual_time {
        score += 20.0;
    }
    let topic_score: f64 = f.novelty.novel_topics.iter().sum();
    score += topic_score.clamp(0.0, 30.0);
    clip(score)
}

fn relevance_component(f: &FeatureBundle, frame: Option<&ContextFrame>) -> f64 {
    let mut score = 0.0;
    if f.relevance.owner_name_mentioned {
        score += 30.0;
    }
    score += (f.relevance.interest_matches as f64 * 10.0).min(30.0);
    score += (f.relevance.close_contact_matches as f64 * 10.0).min(40.0);
    score += (f.relevance.goal_matches as f64 * 10.0).min(30.0);
    score += (f.relevance.self_action_items as f64 * 10.0).min(30.0);

    if let Some(frame) = frame {
        let mut overlap = 0.0;
        if let Some(activity) = &frame.activity {
            if f.relevance.activity_tokens.contains(activity) {
                overlap += 20.0;
            }
        }
        if let Some(project) = &frame.project {
            if f.relevance.project_tokens.contains(project) {
                overlap += 10.0;
            }
        }
        let participant_overlap = f
            .relevance
            .participant_tokens
            .iter()
            .filter(|p| frame.participants.contains(p))
            .count();
        overlap += (participant_overlap as f64 * 5.0).min(10.0);
        score += overlap.min(40.0);
    }
    clip(score)
}

fn social_component(f: &FeatureBundle) -> f64 {
    let mut score = f.social.relationship_event_weight.clamp(0.0, 60.0);
    if f.social.conflict {
        score += 25.0;
    }
    if f.social.intimacy {
        score += 35.0;
    }
    if f.social.group_size > 2 {
        score += 10.0;
    }
    if f.social.explicit_agreement {
        score += 20.0;
    }
    clip(score)
}

fn consequential_component(f: &FeatureBundle) -> f64 {
    let mut score = (f.consequential.action_items as f64 * 15.0).min(60.0);
    score += (f.consequential.decisions as f64 * 10.0).min(40.0);
    if f.consequential.money_mentioned {
        score += 20.0;
    }
    score += (f.consequential.commitments as f64 * 10.0).min(40.0);
    score += (f.consequential.deadlines as f64 * 10.0).min(20.0);
    clip(score)
}

fn active_modifier(frame: Option<&ContextFrame>, config: &AttentionConfig) -> ContextModifier {
    let Some(frame) = frame else {
        return ContextModifier {
            emotional: 1.0,
            novelty: 1.0,
            relevance: 1.0,
            social: 1.0,
            consequential: 1.0,
        };
    };
    // A frame may carry several tags at once (fused from multiple devices);
    // apply the strongest (most divergent from 1.0) per component.
    let mut modifier = ContextModifier {
        emotional: 1.0,
        novelty: 1.0,
        relevance: 1.0,
        social: 1.0,
        consequential: 1.0,
    };
    for tag in &frame.tags {
        let m = config.context_modifier(*tag);
        modifier.emotional = pick_stronger(modifier.emotional, m.emotional);
        modifier.novelty = pick_stronger(modifier.novelty, m.novelty);
        modifier.relevance = pick_stronger(modifier.relevance, m.relevance);
        modifier.social = pick_stronger(modifier.social, m.social);
        modifier.consequential = pick_stronger(modifier.consequential, m.consequential);
    }
    modifier
}

fn pick_stronger(current: f64, candidate: f64) -> f64 {
    if (candidate - 1.0).abs() > (current - 1.0).abs() {
        candidate
    } else {
        current
    }
}

fn is_intimate_context(tags: &std::collections::HashSet<ContextTag>) -> bool {
    tags.contains(&ContextTag::OneOnOne) || tags.contains(&ContextTag::Private)
}

/// Stateless scoring entry point (failure semantics: "scoring is
/// pure and must not fail; missing features contribute 0"). `weights`
/// defaults to `config.component_weights` unless an owner has a confident
/// learned set (see `WeightLearner::active_weights`).
pub fn score(
    features: &FeatureBundle,
    frame: Option<&ContextFrame>,
    config: &AttentionConfig,
    weights: [f64; 5],
) -> ScoreBreakdown {
    let intimate = frame.map(|f| is_intimate_context(&f.tags)).unwrap_or(false);
    let modifier = active_modifier(frame, config);

    let emotional = clip(emotional_component(features, intimate) * modifier.emotional);
    let novelty = clip(novelty_component(features) * modifier.novelty);
    let relevance = clip(relevance_component(features, frame) * modifier.relevance);
    let social = clip(social_component(features) * modifier.social);
    let consequential = clip(consequential_component(features) * modifier.consequential);

    let composite = clip(
        emotional * weights[0]
            + novelty * weights[1]
            + relevance * weights[2]
            + social * weights[3]
            + consequential * weights[4],
    );

    ScoreBreakdown {
        emotional,
        novelty,
        relevance,
        social,
        consequential,
        composite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DeviceId;
    use crate::ids::OwnerId;
    use crate::memory::DeviceType;

    #[test]
    fn empty_bundle_scores_zero() {
        let cfg = AttentionConfig::default();
        let breakdown = score(&FeatureBundle::empty(), None, &cfg, cfg.component_weights);
        assert_eq!(breakdown.composite, 0.0);
    }

    #[test]
    fn emotional_keywords_and_extreme_sentiment_combine() {
        let cfg = AttentionConfig::default();
        let mut f = FeatureBundle::empty();
        f.emotion_keywords = vec!["urgent".to_string(), "love".to_string()];
        f.sentiment_intensity = 0.9;
        let breakdown = score(&f, None, &cfg, cfg.component_weights);
        // 2*15 + 0.9*40 + 10 extreme bonus = 76
        assert!((breakdown.emotional - 76.0).abs() < 1e-9);
    }

    #[test]
    fn relevance_reads_context_frame_overlap() {
        let cfg = AttentionConfig::default();
        let mut f = FeatureBundle::empty();
        f.relevance.activity_tokens.insert("hiking".to_string());

        let owner = OwnerId::new();
        let mut frame = ContextFrame::new(owner, DeviceId::new(), DeviceType::Mobile);
        frame.activity = Some("hiking".to_string());

        let without_frame = score(&f, None, &cfg, cfg.component_weights);
        let with_frame = score(&f, Some(&frame), &cfg, cfg.component_weights);
        assert!(with_frame.relevance > without_frame.relevance);
    }

    #[test]
    fn work_meeting_modifier_suppresses_social_boosts_consequential() {
        let cfg = AttentionConfig::default();
        let mut f = FeatureBundle::empty();
        f.social.intimacy = true;
        f.consequential.action_items = 2;

        let owner = OwnerId::new();
        let mut frame = ContextFrame::new(owner, DeviceId::new(), DeviceType::Desktop);
        frame.tags.insert(ContextTag::WorkMeeting);

        let baseline = score(&f, None, &cfg, cfg.component_weights);
        let in_meeting = score(&f, Some(&frame), &cfg, cfg.component_weights);
        assert!(in_meeting.social < baseline.social);
        assert!(in_meeting.consequential > baseline.consequential);
    }

    #[test]
    fn composite_never_exceeds_bounds() {
        let cfg = AttentionConfig::default();
        let mut f = FeatureBundle::empty();
        f.emotion_keywords = vec!["a".into(); 20];
        f.sentiment_intensity = 5.0;
        f.novelty.new_person = true;
        f.novelty.new_location = true;
        f.novelty.unusual_time = true;
        f.novelty.novel_topics = vec![100.0];
        f.social.relationship_event_weight = 1000.0;
        f.social.conflict = true;
        f.social.intimacy = true;
        f.social.group_size = 10;
        f.social.explicit_agreement = true;
        f.consequential.action_items = 100;
        f.consequential.decisions = 100;
        f.consequential.money_mentioned = true;
        f.consequential.commitments = 100;
        f.consequential.deadlines = 100;

        let breakdown = score(&f, None, &cfg, cfg.component_weights);
        assert!(breakdown.composite <= 100.0);
        assert!(breakdown.emotional <= 100.0);
    }
}
