//! # attention-core
//!
//! The attention and salience core of a personal memory system: the
//! subsystem that decides which memories are currently relevant, how their
//! importance decays and reinforces over time, and how incoming
//! observations are scored, filtered, and routed through storage tiers.
//!
//! Five tightly coupled subsystems, each its own module:
//!
//! - [`salience`] — the Salience Scorer: feature bundle + context frame ->
//!   a 0..=100 base salience with a per-component breakdown.
//! - [`attention`] — the Attention Window: a bounded, per-owner sorted set
//!   of currently relevant memory ids with dynamic effective salience.
//! - [`tier`] — the Tier Manager: hot/warm/cold placement with
//!   promotion/demotion and opportunistic maintenance.
//! - [`pattern`] — the Temporal Pattern Detector: per-entity periodicity
//!   detection via bounded autocorrelation.
//! - [`gate`] — the Context Gate & Appropriateness Filter: a composable
//!   stage pipeline that screens retrievals against active context.
//! - [`daemon`] — the Event Daemon (proactive arm): threat-pattern
//!   matching and scheduled-check evaluation over an external event
//!   stream.
//!
//! [`engine::Engine`] wires all of the above behind the consumer surface of
//! `store`/`recall`/`anticipate` plus context ops; [`external`] defines the
//! typed boundaries (durable store, retrieval oracle, feature extractor,
//! embedding provider, notification sink) the engine consumes but does not
//! implement in production.

pub mod attention;
pub mod config;
pub mod context;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod external;
pub mod gate;
pub mod ids;
pub mod memory;
pub mod openloop;
pub mod pattern;
pub mod salience;
pub mod tier;

pub use engine::Engine;
pub use error::{ComponentError, DegradeReason, ErrorKind, Outcome};
