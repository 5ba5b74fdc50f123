use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TypesError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
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

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> crate::Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| TypesError::InvalidId(s.to_string()))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a registered agent or MCP server
    AgentId
);
uuid_id!(
    /// Identifier of the organization owning an agent
    OrganizationId
);
uuid_id!(
    /// Identifier of a single capability grant
    GrantId
);
uuid_id!(
    /// Identifier of a security alert
    AlertId
);

/// Audit identifier of a verification record.
///
/// Audit ids are UUIDv7 values minted by an [`AuditIdGenerator`], so their
/// natural ordering is the order in which decisions were made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(pub Uuid);

impl AuditId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuditId {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TypesError::InvalidId(s.to_string()))
    }
}

/// Largest sequence value that fits the 12 counter bits of a UUIDv7
const MAX_SEQUENCE: u16 = 0x0FFF;

/// Mints strictly increasing audit ids.
///
/// The millisecond timestamp goes into the UUIDv7 time field and a 12-bit
/// sequence into `rand_a`, so ids minted within the same millisecond still
/// sort in issue order. A clock that steps backwards keeps the last
/// timestamp.
#[derive(Debug, Default)]
pub struct AuditIdGenerator {
    last: Mutex<(u64, u16)>,
}

impl AuditIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next id for a decision taken at `now`
    pub fn next_id(&self, now: DateTime<Utc>) -> AuditId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);

        let (millis, sequence) = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            let (last_millis, last_sequence) = *last;
            let next = if millis > last_millis {
                (millis, 0)
            } else if last_sequence < MAX_SEQUENCE {
                (last_millis, last_sequence + 1)
            } else {
                (last_millis + 1, 0)
            };
            *last = next;
            next
        };

        let mut bytes = [0u8; 10];
        rand::thread_rng().fill_bytes(&mut bytes[2..]);
        bytes[0] = ((sequence >> 8) as u8) & 0x0F;
        bytes[1] = (sequence & 0xFF) as u8;

        AuditId(uuid::Builder::from_unix_timestamp_millis(millis, &bytes).into_uuid())
    }
}
