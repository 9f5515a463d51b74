//! Newtype identifiers for every owned entity in the data model.
//!
//! All identifiers are 128-bit UUIDs (see persisted state layout). Newtypes
//! keep a `VmId` from being accidentally passed where an `AgentId` is
//! expected, which matters once the coordinator starts threading half a
//! dozen ids through a single operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
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

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(UserId);
uuid_id!(OrganizationId);
uuid_id!(OuId);
uuid_id!(ProjectId);
uuid_id!(GroupId);
uuid_id!(AgentId);
uuid_id!(VmId);
uuid_id!(QuotaId);
uuid_id!(JoinTokenId);
uuid_id!(ReservationId);
uuid_id!(ApiKeyId);

/// X.509 serials are 128-bit random integers, not UUIDs, but we keep them in
/// the same newtype family for consistent `Display`/ordering behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateSerial(pub u128);

impl fmt::Display for CertificateSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}
