//! Context frame: per-owner, per-device current state, fused
//! across devices and fed to the salience scorer and context gate.
//!
//! A flat record of optional typed fields plus a version tag, rather than
//! a deep object tree — frame deltas are separate records applied in
//! order, so a device only ever publishes what it actually knows.

mod fusion;
mod store;

pub use fusion::fuse_frames;
pub use store::ContextFrameStore;

use crate::ids::{DeviceId, EntityId, OwnerId};
use crate::memory::DeviceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A recognized context tag, read by both the salience scorer's context
/// modifiers and the context gate's location/device stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTag {
    WorkMeeting,
    SocialEvent,
    Networking,
    OneOnOne,
    Private,
    Public,
}

impl ContextTag {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "work_meeting" => Some(Self::WorkMeeting),
            "social_event" => Some(Self::SocialEvent),
            "networking" => Some(Self::Networking),
            "one_on_one" => Some(Self::OneOnOne),
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Owner emotional state as reported by the emotion provider, reduced to
/// the fields the gate and scorer actually read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Roughly -100..=100, negative is distressed.
    pub prosody_score: f64,
    pub angry: bool,
}

/// A flat, versioned per-owner/per-device context frame. All fields are
/// optional: an unset field means "unknown", not "empty string" — the gate
/// and scorer treat unknown fields as non-matching rather than as a wildcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFrame {
    pub version: u64,
    pub owner: OwnerId,
    pub device_id: DeviceId,
    pub device_type: DeviceType,
    pub location: Option<String>,
    pub participants: HashSet<EntityId>,
    pub activity: Option<String>,
    pub project: Option<String>,
    pub tags: HashSet<ContextTag>,
    pub emotional_state: Option<EmotionalState>,
    pub trajectory_goal: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ContextFrame {
    pub fn new(owner: OwnerId, device_id: DeviceId, device_type: DeviceType) -> Self {
        Self {
            version: 0,
            owner,
            device_id,
            device_type,
            location: None,
            participants: HashSet::new(),
            activity: None,
            project: None,
            tags: HashSet::new(),
            emotional_state: None,
            trajectory_goal: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) > self.device_type.frame_ttl()
    }

    pub fn apply_delta(&mut self, delta: FrameDelta) {
        if let Some(v) = delta.location {
            self.location = Some(v);
        }
        if let Some(v) = delta.participants {
            self.participants = v;
        }
        if let Some(v) = delta.activity {
            self.activity = Some(v);
        }
        if let Some(v) = delta.project {
            self.project = Some(v);
        }
        if let Some(v) = delta.tags {
            self.tags = v;
        }
        if let Some(v) = delta.emotional_state {
            self.emotional_state = Some(v);
        }
        if let Some(v) = delta.trajectory_goal {
            self.trajectory_goal = Some(v);
        }
        self.version += 1;
        self.timestamp = Utc::now();
    }
}

/// A delta applied to a context frame ("frame deltas are separate
/// records applied in order").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameDelta {
    pub location: Option<String>,
    pub participants: Option<HashSet<EntityId>>,
    pub activity: Option<String>,
    pub project: Option<String>,
    pub tags: Option<HashSet<ContextTag>>,
    pub emotional_state: Option<EmotionalState>,
    pub trajectory_goal: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DeviceId;

    #[test]
    fn delta_application_bumps_version_and_timestamp() {
        let owner = OwnerId::new();
        let mut frame = ContextFrame::new(owner, DeviceId::new(), DeviceType::Mobile);
        assert_eq!(frame.version, 0);

        frame.apply_delta(FrameDelta {
            activity: Some("one_on_one".to_string()),
            ..Default::default()
        });
        assert_eq!(frame.version, 1);
        assert_eq!(frame.activity.as_deref(), Some("one_on_one"));
    }

    #[test]
    fn robotic_frame_expires_fast_desktop_frame_lingers() {
        let owner = OwnerId::new();
        let mut robotic = ContextFrame::new(owner, DeviceId::new(), DeviceType::Robotic);
        robotic.timestamp = Utc::now() - chrono::Duration::seconds(31);
        assert!(robotic.is_expired(Utc::now()));

        let mut desktop = ContextFrame::new(owner, DeviceId::new(), DeviceType::Desktop);
        desktop.timestamp = Utc::now() - chrono::Duration::minutes(10);
        assert!(!desktop.is_expired(Utc::now()));
    }
}
