//! The six spec-defined gate stages.

use super::{DropReason, GateCandidate, GateStage, GateStageOutcome, Purpose};
use crate::config::AttentionConfig;
use crate::context::ContextFrame;
use crate::memory::PrivacyTier;

fn keep_all(candidates: Vec<GateCandidate>) -> GateStageOutcome {
    GateStageOutcome {
        kept: candidates,
        dropped: Vec::new(),
        degraded: false,
    }
}

fn split<F>(candidates: Vec<GateCandidate>, stage: &'static str, mut veto: F) -> GateStageOutcome
where
    F: FnMut(&GateCandidate) -> Option<String>,
{
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for c in candidates {
        match veto(&c) {
            Some(detail) => dropped.push(DropReason {
                memory_id: c.memory_id,
                stage,
                detail,
            }),
            None => kept.push(c),
        }
    }
    GateStageOutcome {
        kept,
        dropped,
        degraded: false,
    }
}

/// Stage 1: Vault items never leave unless the query explicitly
/// names the memory id; Personal requires a trusted device; General is
/// unrestricted.
pub struct PrivacyTierStage;

impl GateStage for PrivacyTierStage {
    fn name(&self) -> &'static str {
        "privacy_tier"
    }

    fn apply(&self, candidates: Vec<GateCandidate>, _frame: Option<&ContextFrame>, purpose: Purpose, _config: &AttentionConfig) -> GateStageOutcome {
        split(candidates, self.name(), |c| match c.privacy_tier {
            PrivacyTier::Vault => match purpose {
                Purpose::ExplicitLookup { requested } if requested == c.memory_id => None,
                _ => Some("vault content requires an explicit memory id lookup".to_string()),
            },
            PrivacyTier::Personal if !c.device_trusted => {
                Some("personal content requires a trusted device".to_string())
            }
            _ => None,
        })
    }
}

/// Stage 2: location-based tag blocking.
pub struct LocationStage;

impl GateStage for LocationStage {
    fn name(&self) -> &'static str {
        "location"
    }

    fn apply(&self, candidates: Vec<GateCandidate>, frame: Option<&ContextFrame>, _purpose: Purpose, _config: &AttentionConfig) -> GateStageOutcome {
        let Some(location) = frame.and_then(|f| f.location.as_deref()) else {
            return keep_all(candidates);
        };
        let blocked: &[&str] = match location {
            "public" => &["medical", "financial", "intimate"],
            "office" => &["salary", "complaint"],
            "home" => &[],
            _ => &[],
        };
        split(candidates, self.name(), |c| {
            if c.privacy_tier == PrivacyTier::Vault {
                return None; // already handled by the privacy stage
            }
            if location == "home" {
                return None; // home relaxes all except Vault
            }
            blocked
                .iter()
                .find(|tag| c.tags.contains(*tag))
                .map(|tag| format!("location '{location}' blocks tag '{tag}'"))
        })
    }
}

/// Stage 3: device-class blocking.
pub struct DeviceStage;

impl GateStage for DeviceStage {
    fn name(&self) -> &'static str {
        "device"
    }

    fn apply(&self, candidates: Vec<GateCandidate>, _frame: Option<&ContextFrame>, _purpose: Purpose, _config: &AttentionConfig) -> GateStageOutcome {
        split(candidates, self.name(), |c| {
            if c.device_shared && c.privacy_tier == PrivacyTier::Personal && !c.device_reauthenticated {
                return Some("shared device requires re-authentication for personal content".to_string());
            }
            if c.device_work && c.tags.contains("personal") {
                return Some("work device blocks personal tags".to_string());
            }
            if c.device_public_display
                && matches!(c.privacy_tier, PrivacyTier::Personal | PrivacyTier::Vault)
            {
                return Some("public-display device blocks personal and vault content".to_string());
            }
            None
        })
    }
}

/// Stage 4: per-participant forbidden-tag sets.
pub struct ParticipantsStage;

impl GateStage for ParticipantsStage {
    fn name(&self) -> &'static str {
        "participants"
    }

    fn apply(&self, candidates: Vec<GateCandidate>, frame: Option<&ContextFrame>, _purpose: Purpose, config: &AttentionConfig) -> GateStageOutcome {
        let Some(frame) = frame else {
            return keep_all(candidates);
        };
        if frame.participants.is_empty() {
            return keep_all(candidates);
        }

        let relationships: Vec<&str> = frame
            .participants
            .iter()
            .filter(|p| !config.care_circle_exempt.contains(p))
            .map(|p| {
                config
                    .entity_relationships
                    .get(p)
                    .map(String::as_str)
                    .unwrap_or("stranger")
            })
            .collect();

        split(candidates, self.name(), |c| {
            for relationship in &relationships {
                if let Some(forbidden) = config.forbidden_tags_by_relationship.get(*relationship) {
                    if forbidden.contains("*") || c.tags.iter().any(|t| forbidden.contains(t)) {
                        return Some(format!("forbidden for relationship '{relationship}'"));
                    }
                }
            }
            None
        })
    }
}

/// Stage 5: owner emotional state blocking.
pub struct EmotionalStateStage;

const RUMINATION_TAGS: [&str; 2] = ["rumination", "trauma"];
const INFLAMMATORY_TAG: &str = "inflammatory";

impl GateStage for EmotionalStateStage {
    fn name(&self) -> &'static str {
        "emotional_state"
    }

    fn apply(&self, candidates: Vec<GateCandidate>, frame: Option<&ContextFrame>, _purpose: Purpose, _config: &AttentionConfig) -> GateStageOutcome {
        let Some(emotional) = frame.and_then(|f| f.emotional_state) else {
            return keep_all(candidates);
        };
        split(candidates, self.name(), |c| {
            if emotional.prosody_score < -10.0 && RUMINATION_TAGS.iter().any(|t| c.tags.contains(*t)) {
                return Some("owner distressed: rumination/trauma tags withheld".to_string());
            }
            if emotional.angry && c.tags.contains(INFLAMMATORY_TAG) {
                return Some("owner angry: inflammatory tag withheld".to_string());
            }
            None
        })
    }
}

/// Stage 6: trajectory-goal filtering, opt-in per
/// `AttentionConfig.trajectory_filtering_enabled` (DESIGN.md Open Question
/// resolution).
pub struct TrajectoryStage;

const COUNTERPRODUCTIVE_TAG: &str = "counterproductive_rumination";
const LESSON_LEARNED_TAG: &str = "lesson_learned";

impl GateStage for TrajectoryStage {
    fn name(&self) -> &'static str {
        "trajectory"
    }

    fn apply(&self, candidates: Vec<GateCandidate>, frame: Option<&ContextFrame>, _purpose: Purpose, config: &AttentionConfig) -> GateStageOutcome {
        if !config.trajectory_filtering_enabled {
            return keep_all(candidates);
        }
        let Some(_goal) = frame.and_then(|f| f.trajectory_goal.as_deref()) else {
            return keep_all(candidates);
        };
        split(candidates, self.name(), |c| {
            if c.tags.contains(COUNTERPRODUCTIVE_TAG) && !c.tags.contains(LESSON_LEARNED_TAG) {
                Some("counter-productive rumination without a lesson_learned tag".to_string())
            } else {
                None
            }
        })
    }
}
