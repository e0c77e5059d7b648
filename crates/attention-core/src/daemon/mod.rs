//! Event Daemon / Proactive Arm: reacts to an external event
//! stream, matches threat patterns and scheduled checks, consults the
//! Pattern Detector for anomaly, and picks the highest-severity action.
//!
//! Shares its trigger/action shape with `neuroscience::prospective_memory::Intention`
//! (event-based triggers, an escalating-priority action pick), generalized
//! from "remind me" intentions to a broader threat-pattern + scheduled-check
//! pipeline.

mod backlog;
mod threats;

pub use backlog::{Admission, EventBacklog};
pub use threats::{ThreatMatch, ThreatPattern, ThreatPatternKind, ThreatPatternLibrary};

use crate::ids::{EntityId, OwnerId};
use crate::pattern::PatternDetector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Event kinds the daemon consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhoneRing,
    PhoneCallContent,
    Doorbell,
    EmailReceived,
    CalendarReminder,
    TimeTrigger,
    SensorAlert,
    DeviceInput,
    SilenceDetected,
    LocationChange,
    MarketData,
    CustomWebhook,
}

/// One item from the ordered external event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub owner: OwnerId,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    /// Free-text payload (e.g. call transcript, email body); empty for
    /// events that carry no textual content (doorbell, sensor_alert).
    pub text: String,
    /// The entity this event concerns, for anomaly lookups against the
    /// Pattern Detector ("consult Pattern Detector for anomaly").
    pub subject_entity: Option<EntityId>,
}

/// Action kinds the daemon produces, ordered here by severity (highest
/// first) so the pipeline can pick the highest-severity action with a
/// plain `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Log = 0,
    Assist = 1,
    Remind = 2,
    Notify = 3,
    Alert = 4,
    Intercept = 5,
}

/// A produced action with its structured payload, delivered through the
/// notification sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub owner: OwnerId,
    pub kind: ActionKind,
    pub reason: String,
    pub source_event: EventKind,
    pub at: DateTime<Utc>,
    /// Populated only for `Notify`/`Alert`/`Intercept` actions directed at
    /// the care circle.
    pub recipients: Vec<EntityId>,
}

/// A per-owner configured care-circle recipient list.
#[derive(Debug, Clone, Default)]
pub struct CareCircleRegistry {
    by_owner: Arc<RwLock<HashMap<OwnerId, Vec<EntityId>>>>,
}

impl CareCircleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_recipients(&self, owner: OwnerId, recipients: Vec<EntityId>) {
        self.by_owner.write().expect("care circle lock poisoned").insert(owner, recipients);
    }

    pub fn recipients(&self, owner: OwnerId) -> Vec<EntityId> {
        self.by_owner
            .read()
            .expect("care circle lock poisoned")
            .get(&owner)
            .cloned()
            .unwrap_or_default()
    }
}

/// A scheduled check: a timer or silence-detection watch the daemon
/// evaluates on each matching event.
#[derive(Debug, Clone)]
pub enum ScheduledCheck {
    /// Fires `Remind` if no event of `awaited_kind` for `owner` arrives by
    /// `fire_at`.
    Timer {
        owner: OwnerId,
        fire_at: DateTime<Utc>,
        reason: String,
    },
    /// Fires `Alert` if `SilenceDetected` persists past `threshold`.
    SilenceWatch {
        owner: OwnerId,
        threshold: chrono::Duration,
        reason: String,
    },
}

/// Last-processed-timestamp tracking per owner: events for a single owner
/// are processed in monotonic timestamp order; across owners, concurrency
/// is unconstrained.
#[derive(Debug, Default)]
struct OwnerCursor {
    last_timestamp: Option<DateTime<Utc>>,
}

/// The proactive arm. Holds the threat-pattern library, the per-owner
/// event-ordering cursor, scheduled checks, and care-circle routing; reads
/// the Pattern Detector for anomaly but owns none of the other four core
/// components directly (those are wired by `Engine`).
#[derive(Clone)]
pub struct EventDaemon {
    threats: ThreatPatternLibrary,
    care_circle: CareCircleRegistry,
    confidence_threshold: f64,
    cursors: Arc<RwLock<HashMap<OwnerId, OwnerCursor>>>,
    scheduled: Arc<RwLock<Vec<ScheduledCheck>>>,
    backlog: EventBacklog,
    /// Per-owner timestamp of the first `SilenceDetected` event in the
    /// current unbroken silence run, backing `ScheduledCheck::SilenceWatch`'s
    /// `threshold` comparison. Cleared on any non-silence event.
    silence_onset: Arc<RwLock<HashMap<OwnerId, DateTime<Utc>>>>,
}

impl EventDaemon {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            threats: ThreatPatternLibrary::default_library(),
            care_circle: CareCircleRegistry::new(),
            confidence_threshold,
            cursors: Arc::new(RwLock::new(HashMap::new())),
            scheduled: Arc::new(RwLock::new(Vec::new())),
            backlog: EventBacklog::new(),
            silence_onset: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Backlog depth for `owner` (ingestion-queue metric).
    pub fn backlog_depth(&self, owner: OwnerId) -> usize {
        self.backlog.depth(owner)
    }

    /// Ingest one event from the external stream under the backpressure
    /// policy of spec §5: admit it into the per-owner backlog (evicting the
    /// oldest non-threat entry if the backlog is over capacity for this
    /// owner's traffic), then drain and process the front of that backlog.
    /// Threat-pattern events are never evicted, only ever processed.
    pub fn ingest(&self, event: Event, patterns: &PatternDetector) -> Option<Action> {
        let is_threat = self
            .threats
            .best_match(&event.text)
            .map(|m| m.confidence >= self.confidence_threshold)
            .unwrap_or(false);
        let owner = event.owner;
        if let Admission::AdmittedEvicting(dropped) = self.backlog.offer(event, is_threat) {
            tracing::info!(owner = %dropped.owner, kind = ?dropped.kind, "event daemon: dropped event under backpressure");
        }
        let next = self.backlog.pop_front(owner)?;
        self.process_event(&next, patterns)
    }

    pub fn care_circle(&self) -> &CareCircleRegistry {
        &self.care_circle
    }

    pub fn add_scheduled_check(&self, check: ScheduledCheck) {
        self.scheduled.write().expect("scheduled checks lock poisoned").push(check);
    }

    /// Reject (by returning `None`) an event whose timestamp regresses the
    /// owner's cursor. Callers that need strict ordering should queue
    /// events themselves; this guards against accidental out-of-order
    /// delivery within a single owner's stream.
    fn advance_cursor(&self, owner: OwnerId, at: DateTime<Utc>) -> bool {
        let mut cursors = self.cursors.write().expect("cursor lock poisoned");
        let cursor = cursors.entry(owner).or_default();
        if let Some(last) = cursor.last_timestamp {
            if at < last {
                return false;
            }
        }
        cursor.last_timestamp = Some(at);
        true
    }

    /// Process one event end to end (threat match, scheduled check,
    /// pattern anomaly, highest-severity pick), returning the chosen
    /// action, or `None` if the event was out-of-order and dropped.
    pub fn process_event(&self, event: &Event, patterns: &PatternDetector) -> Option<Action> {
        if !self.advance_cursor(event.owner, event.timestamp) {
            tracing::warn!(owner = %event.owner, "event daemon: dropping out-of-order event");
            return None;
        }
        self.update_silence_tracking(event);

        let mut candidates: Vec<(ActionKind, String)> = Vec::new();

        if let Some(ThreatMatch { kind, confidence }) = self.threats.best_match(&event.text) {
            if confidence >= self.confidence_threshold {
                candidates.push((ActionKind::Intercept, format!("threat pattern '{kind:?}' matched at confidence {confidence:.2}")));
            } else {
                candidates.push((ActionKind::Log, format!("threat pattern '{kind:?}' below confidence threshold ({confidence:.2})")));
            }
        }

        if let Some(check) = self.matching_scheduled_check(event) {
            candidates.push(check);
        }

        if let Some(entity) = event.subject_entity {
            if let Some(pattern) = patterns.detect(entity, event.timestamp).pattern {
                let expected = pattern.predict_next();
                let drift = (event.timestamp - expected).num_minutes().abs();
                if drift > 120 && pattern.confidence >= 0.6 {
                    candidates.push((
                        ActionKind::Alert,
                        format!("event deviates {drift}min from the detected pattern for this entity"),
                    ));
                }
            }
        }

        if candidates.is_empty() {
            candidates.push((ActionKind::Log, "no pattern, threat, or schedule matched".to_string()));
        }

        let (kind, reason) = candidates.into_iter().max_by_key(|(k, _)| *k)?;
        let recipients = if kind >= ActionKind::Alert {
            self.care_circle.recipients(event.owner)
        } else {
            Vec::new()
        };

        Some(Action {
            owner: event.owner,
            kind,
            reason,
            source_event: event.kind,
            at: event.timestamp,
            recipients,
        })
    }

    /// Update the per-owner silence-onset tracker: the first `SilenceDetected`
    /// event in a run records the onset timestamp; any other event kind
    /// means silence broke, so the onset is cleared.
    fn update_silence_tracking(&self, event: &Event) {
        let mut onset = self.silence_onset.write().expect("silence onset lock poisoned");
        if event.kind == EventKind::SilenceDetected {
            onset.entry(event.owner).or_insert(event.timestamp);
        } else {
            onset.remove(&event.owner);
        }
    }

    /// How long silence has persisted for `owner` as of `at`, if a run is
    /// currently tracked.
    fn silence_elapsed(&self, owner: OwnerId, at: DateTime<Utc>) -> Option<chrono::Duration> {
        let onset = self.silence_onset.read().expect("silence onset lock poisoned");
        onset.get(&owner).map(|&since| at - since)
    }

    fn matching_scheduled_check(&self, event: &Event) -> Option<(ActionKind, String)> {
        let scheduled = self.scheduled.read().expect("scheduled checks lock poisoned");
        for check in scheduled.iter() {
            match check {
                ScheduledCheck::Timer { owner, fire_at, reason } if *owner == event.owner => {
                    if event.timestamp >= *fire_at {
                        return Some((ActionKind::Remind, reason.clone()));
                    }
                }
                ScheduledCheck::SilenceWatch { owner, threshold, reason }
                    if *owner == event.owner && event.kind == EventKind::SilenceDetected =>
                {
                    if self.silence_elapsed(event.owner, event.timestamp).is_some_and(|elapsed| elapsed >= *threshold) {
                        return Some((ActionKind::Alert, reason.clone()));
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(owner: OwnerId, kind: EventKind, text: &str, at: DateTime<Utc>) -> Event {
        Event {
            owner,
            kind,
            timestamp: at,
            text: text.to_string(),
            subject_entity: None,
        }
    }

    #[test]
    fn gift_card_scam_triggers_intercept_above_threshold() {
        let daemon = EventDaemon::new(0.5);
        let owner = OwnerId::new();
        daemon.care_circle.set_recipients(owner, vec![EntityId::new()]);
        let e = event(
            owner,
            EventKind::PhoneCallContent,
            "I need you to buy gift cards and read me the codes right now, it's urgent",
            Utc::now(),
        );
        let action = daemon.process_event(&e, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Intercept);
        assert!(!action.recipients.is_empty());
    }

    #[test]
    fn unmatched_event_logs_only() {
        let daemon = EventDaemon::new(0.5);
        let owner = OwnerId::new();
        let e = event(owner, EventKind::Doorbell, "", Utc::now());
        let action = daemon.process_event(&e, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Log);
    }

    #[test]
    fn out_of_order_event_is_dropped() {
        let daemon = EventDaemon::new(0.5);
        let owner = OwnerId::new();
        let now = Utc::now();
        let first = event(owner, EventKind::Doorbell, "", now);
        let earlier = event(owner, EventKind::Doorbell, "", now - chrono::Duration::minutes(5));
        assert!(daemon.process_event(&first, &PatternDetector::new()).is_some());
        assert!(daemon.process_event(&earlier, &PatternDetector::new()).is_none());
    }

    #[test]
    fn below_threshold_threat_only_logs() {
        let daemon = EventDaemon::new(0.9);
        let owner = OwnerId::new();
        let e = event(owner, EventKind::PhoneCallContent, "gift card", Utc::now());
        let action = daemon.process_event(&e, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Log);
    }

    #[test]
    fn timer_check_fires_remind() {
        let daemon = EventDaemon::new(0.5);
        let owner = OwnerId::new();
        let now = Utc::now();
        daemon.add_scheduled_check(ScheduledCheck::Timer {
            owner,
            fire_at: now,
            reason: "take medication".to_string(),
        });
        let e = event(owner, EventKind::TimeTrigger, "", now);
        let action = daemon.process_event(&e, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Remind);
    }

    #[test]
    fn silence_watch_does_not_fire_before_threshold_elapses() {
        let daemon = EventDaemon::new(0.5);
        let owner = OwnerId::new();
        let now = Utc::now();
        daemon.add_scheduled_check(ScheduledCheck::SilenceWatch {
            owner,
            threshold: chrono::Duration::minutes(30),
            reason: "no check-in".to_string(),
        });
        let first = event(owner, EventKind::SilenceDetected, "", now);
        let action = daemon.process_event(&first, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Log);

        let still_within = event(owner, EventKind::SilenceDetected, "", now + chrono::Duration::minutes(10));
        let action = daemon.process_event(&still_within, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Log);
    }

    #[test]
    fn silence_watch_fires_alert_once_threshold_elapses() {
        let daemon = EventDaemon::new(0.5);
        let owner = OwnerId::new();
        let now = Utc::now();
        daemon.add_scheduled_check(ScheduledCheck::SilenceWatch {
            owner,
            threshold: chrono::Duration::minutes(30),
            reason: "no check-in".to_string(),
        });
        daemon
            .process_event(&event(owner, EventKind::SilenceDetected, "", now), &PatternDetector::new())
            .unwrap();
        let past_threshold = event(owner, EventKind::SilenceDetected, "", now + chrono::Duration::minutes(31));
        let action = daemon.process_event(&past_threshold, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Alert);
    }

    #[test]
    fn non_silence_event_resets_silence_onset() {
        let daemon = EventDaemon::new(0.5);
        let owner = OwnerId::new();
        let now = Utc::now();
        daemon.add_scheduled_check(ScheduledCheck::SilenceWatch {
            owner,
            threshold: chrono::Duration::minutes(30),
            reason: "no check-in".to_string(),
        });
        daemon
            .process_event(&event(owner, EventKind::SilenceDetected, "", now), &PatternDetector::new())
            .unwrap();
        // Silence broken by an unrelated event before the threshold elapses.
        daemon
            .process_event(&event(owner, EventKind::Doorbell, "", now + chrono::Duration::minutes(10)), &PatternDetector::new())
            .unwrap();
        let resumed = event(owner, EventKind::SilenceDetected, "", now + chrono::Duration::minutes(35));
        let action = daemon.process_event(&resumed, &PatternDetector::new()).unwrap();
        assert_eq!(action.kind, ActionKind::Log);
    }
}
