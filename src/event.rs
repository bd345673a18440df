use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a room, assigned by the server at creation.
#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug, Ord, PartialOrd)]
pub struct RoomId(pub String);

/// Stable identifier of a user, shared across all rooms of a connection.
#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug, Ord, PartialOrd)]
pub struct UserId(pub String);

/// Server-assigned identifier of a single event.
#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug, Ord, PartialOrd)]
pub struct EventId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(RoomId);
string_id!(UserId);
string_id!(EventId);

/// The local user's relationship to a room.
#[derive(Serialize, Deserialize, Eq, PartialEq, Copy, Clone, Debug, Default)]
pub enum JoinState {
    #[default]
    Join,
    Leave,
    Invite,
}

/// Membership value carried by a member event. Only `Join` and `Leave`
/// affect the room's membership bookkeeping; the remaining values are
/// accepted and left to callers to interpret.
#[derive(Serialize, Deserialize, Eq, PartialEq, Copy, Clone, Debug)]
pub enum Membership {
    Join,
    Leave,
    Invite,
    Ban,
    Knock,
}

/// One user's read receipt for an event.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct UserReceipt {
    pub user_id: UserId,
    pub ts: DateTime<Utc>,
}

/// All receipts a receipt event carries for a single timeline event.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct ReceiptEntry {
    pub event_id: EventId,
    pub receipts: Vec<UserReceipt>,
}

/// Payload of an event, closed over the kinds this client understands.
///
/// Kinds the wire layer does not recognize arrive as `Unknown` and are
/// dropped by every handler, so newer servers never break older clients.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub enum EventContent {
    RoomName {
        name: String,
    },
    RoomAliases {
        aliases: Vec<String>,
    },
    RoomCanonicalAlias {
        alias: String,
    },
    RoomTopic {
        topic: String,
    },
    RoomMember {
        user_id: UserId,
        membership: Membership,
        display_name: Option<String>,
    },
    /// A plain timeline message; the body stays opaque to this crate.
    Message {
        msgtype: String,
        body: serde_json::Value,
    },
    Typing {
        user_ids: Vec<UserId>,
    },
    Receipt {
        entries: Vec<ReceiptEntry>,
    },
    Unknown {
        kind: String,
    },
}

impl EventContent {
    /// Protocol kind string for this payload.
    pub fn kind(&self) -> &str {
        match self {
            Self::RoomName { .. } => "room.name",
            Self::RoomAliases { .. } => "room.aliases",
            Self::RoomCanonicalAlias { .. } => "room.canonical_alias",
            Self::RoomTopic { .. } => "room.topic",
            Self::RoomMember { .. } => "room.member",
            Self::Message { .. } => "room.message",
            Self::Typing { .. } => "typing",
            Self::Receipt { .. } => "receipt",
            Self::Unknown { kind } => kind,
        }
    }

    /// True for payloads that mutate persistent room state.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            Self::RoomName { .. }
                | Self::RoomAliases { .. }
                | Self::RoomCanonicalAlias { .. }
                | Self::RoomTopic { .. }
                | Self::RoomMember { .. }
        )
    }

    /// True for transient, non-persisted signals.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Typing { .. } | Self::Receipt { .. })
    }
}

/// An immutable event as delivered by the sync or pagination layers.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Event {
    pub id: EventId,
    pub sender: UserId,
    pub origin_ts: DateTime<Utc>,
    /// Intra-timeline ordering key assigned by the transport layer; the
    /// timeline stays sorted by it. Not wall-clock order.
    pub order: u64,
    pub content: EventContent,
}
