//! Newtype identifiers used throughout the core.
//!
//! Every partition key in the system (owner, memory, entity) is a UUID
//! wrapped in its own type so the compiler catches cross-partition mixups —
//! an `OwnerId` can never be passed where a `MemoryId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(OwnerId);
uuid_id!(MemoryId);
uuid_id!(EntityId);
uuid_id!(DeviceId);
uuid_id!(LoopId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_round_trip_through_string() {
        let owner = OwnerId::new();
        let s = owner.to_string();
        let parsed: OwnerId = s.parse().unwrap();
        assert_eq!(owner, parsed);
    }

    #[test]
    fn default_generates_fresh_ids() {
        assert_ne!(MemoryId::default(), MemoryId::default());
    }
}
