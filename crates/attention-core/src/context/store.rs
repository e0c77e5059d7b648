//! Per-owner, per-device context frame storage with device-type TTLs
//! ("context_frames (owner,device) -> frame, TTL per device type").
//!
//! Grounded on the same per-owner `Arc<RwLock<HashMap<...>>>` sharding used
//! throughout `attention`/`tier`/`pattern`, here additionally sharded one
//! level deeper by device so stale devices expire independently.

use super::{fuse_frames, ContextFrame, FrameDelta};
use crate::ids::{DeviceId, OwnerId};
use crate::memory::DeviceType;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct OwnerFrames {
    by_device: HashMap<DeviceId, ContextFrame>,
}

/// Live context frames across all owners, sharded by `OwnerId`.
#[derive(Clone, Default)]
pub struct ContextFrameStore {
    shards: Arc<RwLock<HashMap<OwnerId, Arc<RwLock<OwnerFrames>>>>>,
}

impl ContextFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, owner: OwnerId) -> Arc<RwLock<OwnerFrames>> {
        if let Some(shard) = self.shards.read().expect("context shards poisoned").get(&owner) {
            return shard.clone();
        }
        let mut write = self.shards.write().expect("context shards poisoned");
        write
            .entry(owner)
            .or_insert_with(|| Arc::new(RwLock::new(OwnerFrames::default())))
            .clone()
    }

    /// Apply a frame delta for one owner/device, creating the frame if this
    /// is the device's first report ("frame deltas are separate
    /// records applied in order").
    pub fn set_context(
        &self,
        owner: OwnerId,
        device_id: DeviceId,
        device_type: DeviceType,
        delta: FrameDelta,
    ) {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("context shard poisoned");
        let frame = guard
            .by_device
            .entry(device_id)
            .or_insert_with(|| ContextFrame::new(owner, device_id, device_type));
        frame.apply_delta(delta);
    }

    /// Drop an owner's context for one device, e.g. on sign-out.
    pub fn clear_device(&self, owner: OwnerId, device_id: DeviceId) {
        let shard = self.shard(owner);
        shard
            .write()
            .expect("context shard poisoned")
            .by_device
            .remove(&device_id);
    }

    /// Drop every device frame for an owner (backs the engine's
    /// `clear_context` verb).
    pub fn clear_all(&self, owner: OwnerId) {
        let shard = self.shard(owner);
        shard.write().expect("context shard poisoned").by_device.clear();
    }

    /// The owner's fused effective frame across all live (non-expired)
    /// devices, or `None` if the owner has no live device state.
    pub fn active_frame(&self, owner: OwnerId, now: DateTime<Utc>) -> Option<ContextFrame> {
        let shard = self.shard(owner);
        let mut guard = shard.write().expect("context shard poisoned");
        guard.by_device.retain(|_, frame| !frame.is_expired(now));
        let live: Vec<ContextFrame> = guard.by_device.values().cloned().collect();
        fuse_frames(&live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextTag;

    #[test]
    fn set_context_then_active_frame_reflects_delta() {
        let store = ContextFrameStore::new();
        let owner = OwnerId::new();
        let device = DeviceId::new();
        store.set_context(
            owner,
            device,
            DeviceType::Mobile,
            FrameDelta {
                location: Some("cafe".to_string()),
                tags: Some([ContextTag::SocialEvent].into_iter().collect()),
                ..Default::default()
            },
        );
        let frame = store.active_frame(owner, Utc::now()).unwrap();
        assert_eq!(frame.location.as_deref(), Some("cafe"));
    }

    #[test]
    fn expired_device_frames_are_pruned_from_fusion() {
        let store = ContextFrameStore::new();
        let owner = OwnerId::new();
        let device = DeviceId::new();
        store.set_context(owner, device, DeviceType::Robotic, FrameDelta::default());
        let later = Utc::now() + chrono::Duration::seconds(60);
        assert!(store.active_frame(owner, later).is_none());
    }

    #[test]
    fn clear_all_removes_every_device() {
        let store = ContextFrameStore::new();
        let owner = OwnerId::new();
        store.set_context(owner, DeviceId::new(), DeviceType::Mobile, FrameDelta::default());
        store.set_context(owner, DeviceId::new(), DeviceType::Desktop, FrameDelta::default());
        store.clear_all(owner);
        assert!(store.active_frame(owner, Utc::now()).is_none());
    }
}
