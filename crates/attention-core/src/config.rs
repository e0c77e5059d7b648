//! Immutable configuration snapshots, published atomically. No teacher
//! precedent for this exact snapshot-swap idiom was found in `examples/`;
//! a plain `Arc<RwLock<Arc<AttentionConfig>>>` is used instead since the
//! core's config updates are rare and never on a hot path.

use crate::context::ContextTag;
use crate::gate::GateStageKind;
use crate::ids::EntityId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Per-context-tag multiplicative modifiers applied to the five salience
/// components. Order: emotional, novelty, relevance, social, consequential.
#[derive(Debug, Clone, Copy)]
pub struct ContextModifier {
    pub emotional: f64,
    pub novelty: f64,
    pub relevance: f64,
    pub social: f64,
    pub consequential: f64,
}

impl ContextModifier {
    const NEUTRAL: Self = Self {
        emotional: 1.0,
        novelty: 1.0,
        relevance: 1.0,
        social: 1.0,
        consequential: 1.0,
    };
}

/// A single, immutable configuration snapshot. Replacing the active config
/// is an atomic pointer swap (`AttentionConfig::publish`); anything holding
/// an `Arc<AttentionConfig>` obtained before a swap keeps seeing the old
/// values for the lifetime of its current operation — config changes never
/// retroactively alter a memory's stored `base_salience`.
#[derive(Debug, Clone)]
pub struct AttentionConfig {
    /// Minimum effective salience for a memory to remain in the attention
    /// window at all.
    pub attention_threshold: f64,
    /// Effective salience above which a memory is considered "hot" for tier
    /// purposes.
    pub hot_threshold: f64,
    /// Attention window capacity per owner.
    pub window_capacity: usize,
    /// Salience component weights: emotional, novelty,
    /// relevance, social, consequential. Subject to adaptive re-weighting
    /// within `WeightLearner`'s bounds.
    pub component_weights: [f64; 5],
    pub context_modifiers: HashMap<ContextTag, ContextModifier>,
    /// Relationship-to-tag table used by the gate's participant stage to
    /// decide which tags are forbidden in front of a given participant.
    pub forbidden_tags_by_relationship: HashMap<String, HashSet<String>>,
    /// Known participant entities' relationship labels, used by the gate's
    /// participants stage to look up which forbidden-tag set applies.
    /// Entities absent from this map are treated as `"stranger"`.
    pub entity_relationships: HashMap<EntityId, String>,
    /// Per-owner gate stage overrides: entity considered part of the care
    /// circle and thus exempt from certain forbidden-tag checks.
    pub care_circle_exempt: HashSet<EntityId>,
    /// Whether the trajectory-filtering gate stage runs by default.
    pub trajectory_filtering_enabled: bool,
    /// Ordered, enable/disable-able context gate pipeline. A stage kind
    /// omitted here simply never runs; there is currently no per-owner
    /// override, only a process-wide default, but the field lives on
    /// `AttentionConfig` rather than being hardcoded so a future per-owner
    /// config layer can override it without touching `ContextGate`.
    pub gate_stages: Vec<GateStageKind>,
    /// Adaptive weight learner tunables.
    pub weight_learning_rate: f64,
    pub weight_learning_min_samples: usize,
    pub weight_learning_min_confidence: f64,
    pub weight_learning_window_days: i64,
    /// Whether `Engine::handle_event` persists the triggering event's text
    /// as a memory when the event daemon picks a threat-pattern-matched
    /// action for it. Off by default: most threat signals are ephemeral
    /// (a blocked phone call), and persisting them is a deliberate choice
    /// per deployment, not an automatic side effect.
    pub persist_threat_events: bool,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        let mut context_modifiers = HashMap::new();
        context_modifiers.insert(
            ContextTag::WorkMeeting,
            ContextModifier {
                emotional: 1.0,
                novelty: 1.0,
                relevance: 1.0,
                social: 0.7,
                consequential: 1.3,
            },
        );
        context_modifiers.insert(
            ContextTag::SocialEvent,
            ContextModifier {
                emotional: 1.2,
                novelty: 1.0,
                relevance: 1.0,
                social: 1.4,
                consequential: 0.6,
            },
        );
        context_modifiers.insert(
            ContextTag::Networking,
            ContextModifier {
                emotional: 1.0,
                novelty: 1.4,
                relevance: 1.0,
                social: 1.0,
                consequential: 1.2,
            },
        );
        context_modifiers.insert(
            ContextTag::OneOnOne,
            ContextModifier {
                emotional: 1.0,
                novelty: 1.0,
                relevance: 1.3,
                social: 1.0,
                consequential: 1.0,
            },
        );
        context_modifiers.insert(
            ContextTag::Private,
            ContextModifier {
                emotional: 1.4,
                novelty: 0.9,
                relevance: 1.0,
                social: 1.2,
                consequential: 0.9,
            },
        );
        context_modifiers.insert(ContextTag::Public, ContextModifier::NEUTRAL);

        Self {
            attention_threshold: 40.0,
            hot_threshold: 70.0,
            window_capacity: 100,
            component_weights: [0.30, 0.20, 0.20, 0.15, 0.15],
            context_modifiers,
            forbidden_tags_by_relationship: default_forbidden_tags(),
            entity_relationships: HashMap::new(),
            care_circle_exempt: HashSet::new(),
            trajectory_filtering_enabled: false,
            gate_stages: GateStageKind::default_order(),
            weight_learning_rate: 0.3,
            weight_learning_min_samples: 20,
            weight_learning_min_confidence: 0.5,
            weight_learning_window_days: 30,
            persist_threat_events: false,
        }
    }
}

/// Conservative default forbidden-tag table: financial and health topics
/// are withheld from acquaintances and coworkers by default; nothing is
/// withheld from a partner or the care circle itself (those exemptions are
/// handled separately via `care_circle_exempt`).
fn default_forbidden_tags() -> HashMap<String, HashSet<String>> {
    let mut m = HashMap::new();
    m.insert(
        "coworker".to_string(),
        ["health", "finances", "family_conflict"]
            .into_iter()
            .map(str::to_string)
            .collect(),
    );
    m.insert(
        "acquaintance".to_string(),
        ["health", "finances", "family_conflict", "relationship_status"]
            .into_iter()
            .map(str::to_string)
            .collect(),
    );
    m.insert("stranger".to_string(), {
        let mut all = HashSet::new();
        all.insert("*".to_string());
        all
    });
    m
}

impl AttentionConfig {
    pub fn context_modifier(&self, tag: ContextTag) -> ContextModifier {
        self.context_modifiers
            .get(&tag)
            .copied()
            .unwrap_or(ContextModifier::NEUTRAL)
    }
}

/// An atomically swappable handle to the active configuration. Cloning is
/// cheap (`Arc` bump); readers call `current` once per operation and hold
/// the returned `Arc` for that operation's duration.
#[derive(Clone)]
pub struct ConfigHandle(Arc<RwLock<Arc<AttentionConfig>>>);

impl ConfigHandle {
    pub fn new(initial: AttentionConfig) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(initial))))
    }

    pub fn current(&self) -> Arc<AttentionConfig> {
        self.0.read().expect("config lock poisoned").clone()
    }

    /// Publish a new configuration snapshot. In-flight operations holding
    /// an `Arc` from a prior `current` call are unaffected.
    pub fn publish(&self, new_config: AttentionConfig) {
        *self.0.write().expect("config lock poisoned") = Arc::new(new_config);
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(AttentionConfig::default())
    }
}
