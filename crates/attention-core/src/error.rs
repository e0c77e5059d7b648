//! Error taxonomy.
//!
//! Per-component errors are specific `thiserror` enums (see `salience`,
//! `attention`, `tier`, `pattern`, `gate`, `daemon`, `external`). This module
//! holds the taxonomy shared across all of them and the collapsed consumer
//! surface kind the `Engine` returns.

use crate::ids::OwnerId;
use thiserror::Error;

/// The five error kinds, independent of which component raised them.
/// Component errors carry one of these plus component/owner context.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    /// Dependency (durable store, external provider) temporarily unavailable.
    /// The consumer may retry.
    #[error("transient dependency failure: {0}")]
    Transient(String),

    /// A hard rule was about to be broken (Vault leaving the core,
    /// cross-owner access). Fatal: the call returns without partial effect.
    #[error("policy violation: {0}")]
    Policy(String),

    /// Malformed input naming the offending field. Never silently normalized.
    #[error("invalid input in field `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    /// A concurrent update lost its compare-and-swap. Retried internally up
    /// to 3 times before being surfaced as `Transient`.
    #[error("state conflict on owner {owner}: {detail}")]
    Conflict { owner: OwnerId, detail: String },
}

/// A component error: the kind plus identity of the component and owner
/// that raised it.
#[derive(Debug, Clone, Error)]
#[error("[{component}] owner={owner:?}: {kind}")]
pub struct ComponentError {
    pub component: &'static str,
    pub owner: Option<OwnerId>,
    #[source]
    pub kind: ErrorKind,
}

impl ComponentError {
    pub fn new(component: &'static str, owner: Option<OwnerId>, kind: ErrorKind) -> Self {
        Self {
            component,
            owner,
            kind,
        }
    }
}

/// A degraded-result reason, attached when a component succeeded but fell
/// back to reduced functionality (heuristic extractor, gate stage timeout,
/// stale cached pattern, skipped tier promotion).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    HeuristicExtractorUsed,
    GateStageTimedOut { stage: String },
    StalePatternReturned,
    TierPromotionSkipped,
    FeatureExtractionFailed,
    RetrievalOracleUnavailable,
}

/// The collapsed consumer-surface result kind: every component error gets
/// wrapped down into one of these five before it leaves the engine.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Ok(T),
    Degraded(T, Vec<DegradeReason>),
    Invalid(ComponentError),
    Unavailable(ComponentError),
    Denied(ComponentError),
}

impl<T> Outcome<T> {
    pub fn from_component_error(err: ComponentError) -> Self {
        match &err.kind {
            ErrorKind::Invalid { .. } => Outcome::Invalid(err),
            ErrorKind::Policy(_) => Outcome::Denied(err),
            ErrorKind::Transient(_) | ErrorKind::Conflict { .. } => Outcome::Unavailable(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_) | Outcome::Degraded(_, _))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::Degraded(v, reasons) => Outcome::Degraded(f(v), reasons),
            Outcome::Invalid(e) => Outcome::Invalid(e),
            Outcome::Unavailable(e) => Outcome::Unavailable(e),
            Outcome::Denied(e) => Outcome::Denied(e),
        }
    }
}
