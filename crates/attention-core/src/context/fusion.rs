//! Multi-device context fusion ("Frames from different devices are
//! fused (most recent wins per dimension by default, with device-type
//! priorities: mobile wins for location, desktop wins for activity)").

use super::ContextFrame;
use crate::memory::DeviceType;

/// Per-dimension device priority, used to break same-timestamp ties:
/// mobile wins for location, desktop wins for activity. Dimensions without
/// an explicit priority fall back to most-recent-wins only.
fn location_priority(device_type: DeviceType) -> u8 {
    match device_type {
        DeviceType::Mobile => 5,
        DeviceType::Wearable => 4,
        DeviceType::Robotic => 3,
        DeviceType::Voice => 2,
        DeviceType::Desktop => 1,
    }
}

fn activity_priority(device_type: DeviceType) -> u8 {
    match device_type {
        DeviceType::Desktop => 5,
        DeviceType::Voice => 4,
        DeviceType::Mobile => 3,
        DeviceType::Wearable => 2,
        DeviceType::Robotic => 1,
    }
}

/// Fuse an owner's live (non-expired) device frames into one effective
/// frame. Expects all frames to belong to the same owner; panics in debug
/// builds otherwise via `debug_assert`. Returns `None` if no frames are live.
pub fn fuse_frames(frames: &[ContextFrame]) -> Option<ContextFrame> {
    if frames.is_empty() {
        return None;
    }
    let owner = frames[0].owner;
    debug_assert!(frames.iter().all(|f| f.owner == owner));

    // Most-recent-wins as the baseline frame; location/activity are then
    // independently re-resolved by their own per-dimension device priority.
    let newest = frames
        .iter()
        .max_by_key(|f| f.timestamp)
        .expect("frames is non-empty");
    let mut fused = newest.clone();

    if let Some(best) = frames
        .iter()
        .filter(|f| f.location.is_some())
        .max_by_key(|f| (f.timestamp, location_priority(f.device_type)))
    {
        fused.location = best.location.clone();
    }
    if let Some(best) = frames
        .iter()
        .filter(|f| f.activity.is_some())
        .max_by_key(|f| (f.timestamp, activity_priority(f.device_type)))
    {
        fused.activity = best.activity.clone();
    }

    // Union tags and participants across all live frames: the owner is
    // "in" every context their devices jointly observe.
    for frame in frames {
        fused.tags.extend(frame.tags.iter().copied());
        fused.participants.extend(frame.participants.iter().copied());
    }

    Some(fused)
}
