//! Context Gate & Appropriateness Filter: a pipeline of
//! stages, each able to veto candidates, never promote them.
//!
//! Each stage is a small trait object composed into an ordered
//! `Vec<Box<dyn GateStage>>` pipeline, so stages can be reordered or
//! disabled from configuration instead of being wired into one monolithic
//! match.

mod stages;

pub use stages::{
    DeviceStage, EmotionalStateStage, LocationStage, ParticipantsStage, PrivacyTierStage, TrajectoryStage,
};

use crate::config::AttentionConfig;
use crate::context::ContextFrame;
use crate::ids::MemoryId;
use crate::memory::PrivacyTier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a caller is retrieving for; some stages vary behavior by purpose
/// (an explicit-memory-id lookup is the one exception that lets a Vault
/// item through the privacy stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Recall,
    WhatsRelevant,
    Anticipate,
    ExplicitLookup { requested: MemoryId },
}

/// A candidate passed through the gate pipeline. Stages read it, never
/// mutate it; they only decide to keep or drop.
#[derive(Debug, Clone)]
pub struct GateCandidate {
    pub memory_id: MemoryId,
    pub privacy_tier: PrivacyTier,
    pub tags: HashSet<String>,
    pub device_trusted: bool,
    pub device_shared: bool,
    pub device_work: bool,
    pub device_public_display: bool,
    pub device_reauthenticated: bool,
}

/// Why a candidate was dropped, for audit (a removed item carries a
/// structured reason).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropReason {
    pub memory_id: MemoryId,
    pub stage: &'static str,
    pub detail: String,
}

pub struct GateStageOutcome {
    pub kept: Vec<GateCandidate>,
    pub dropped: Vec<DropReason>,
    pub degraded: bool,
}

/// A single ordered stage in the gate pipeline.
pub trait GateStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, candidates: Vec<GateCandidate>, frame: Option<&ContextFrame>, purpose: Purpose, config: &AttentionConfig) -> GateStageOutcome;
}

/// Identifies one of the six stages so it can be named in configuration
/// (stages are configurable: enable/disable/reorder per owner);
/// `AttentionConfig.gate_stages` holds an ordered list of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStageKind {
    PrivacyTier,
    Location,
    Device,
    Participants,
    EmotionalState,
    Trajectory,
}

impl GateStageKind {
    /// The default ordering, all six stages enabled.
    pub fn default_order() -> Vec<Self> {
        vec![
            Self::PrivacyTier,
            Self::Location,
            Self::Device,
            Self::Participants,
            Self::EmotionalState,
            Self::Trajectory,
        ]
    }

    fn build(self) -> Box<dyn GateStage> {
        match self {
            Self::PrivacyTier => Box::new(PrivacyTierStage),
            Self::Location => Box::new(LocationStage),
            Self::Device => Box::new(DeviceStage),
            Self::Participants => Box::new(ParticipantsStage),
            Self::EmotionalState => Box::new(EmotionalStateStage),
            Self::Trajectory => Box::new(TrajectoryStage),
        }
    }
}

/// Final result of running the full pipeline.
pub struct FilterResult {
    pub kept: Vec<GateCandidate>,
    pub dropped: Vec<DropReason>,
    pub degraded: bool,
}

/// The ordered stage pipeline (privacy tier, location, device,
/// participants, emotional state, trajectory by default — reorderable and
/// individually disableable via the `stages` the caller assembles from
/// `AttentionConfig`).
pub struct ContextGate {
    stages: Vec<Box<dyn GateStage>>,
}

impl ContextGate {
    pub fn new(stages: Vec<Box<dyn GateStage>>) -> Self {
        Self { stages }
    }

    /// The default stage ordering, all enabled.
    pub fn default_pipeline() -> Self {
        Self::from_kinds(&GateStageKind::default_order())
    }

    /// Build a pipeline from an ordered, per-owner list of enabled stages.
    /// A stage kind absent from `kinds` is disabled; duplicates run more
    /// than once, which callers should avoid but which is not itself an
    /// error — each stage only ever vetoes, so running one twice is
    /// redundant, not unsafe.
    pub fn from_kinds(kinds: &[GateStageKind]) -> Self {
        Self::new(kinds.iter().map(|k| k.build()).collect())
    }

    /// Run every stage in order with no deadline. Equivalent to
    /// `filter_with_deadline` given a deadline no caller could plausibly
    /// exceed; kept for callers (and the unit tests below) that don't
    /// care about the suspension-point budget.
    pub fn filter(
        &self,
        candidates: Vec<GateCandidate>,
        frame: Option<&ContextFrame>,
        purpose: Purpose,
        config: &AttentionConfig,
    ) -> FilterResult {
        self.filter_with_deadline(candidates, frame, purpose, config, std::time::Duration::from_secs(3600))
    }

    /// Run every stage in order, fail-closed on `deadline`: once the budget
    /// is exhausted, remaining stages are skipped rather than run, their
    /// candidates are kept rather than dropped, and the result is flagged
    /// `degraded` ("a gate error is fail-closed: the stage drops nothing
    /// and flags the result degraded"). Each stage itself still runs
    /// in-process and can't be preempted mid-stage, so the check happens at
    /// the per-stage boundary rather than inside any one stage.
    pub fn filter_with_deadline(
        &self,
        candidates: Vec<GateCandidate>,
        frame: Option<&ContextFrame>,
        purpose: Purpose,
        config: &AttentionConfig,
        deadline: std::time::Duration,
    ) -> FilterResult {
        let start = std::time::Instant::now();
        let mut current = candidates;
        let mut all_dropped = Vec::new();
        let mut degraded = false;

        for stage in &self.stages {
            if start.elapsed() >= deadline {
                degraded = true;
                break;
            }
            let outcome = stage.apply(current, frame, purpose, config);
            current = outcome.kept;
            all_dropped.extend(outcome.dropped);
            degraded |= outcome.degraded;
        }

        FilterResult {
            kept: current,
            dropped: all_dropped,
            degraded,
        }
    }
}
