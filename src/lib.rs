//! Client-side room model for the Brook chat protocol.
//!
//! The crate reconciles per-room state out of the server's incremental sync
//! batches: membership and metadata, the ordered message timeline, ephemeral
//! signals (typing, read receipts), the derived room display name, and
//! backward pagination of history. Transport, wire formats and storage live
//! elsewhere; this crate only defines the collaborator traits it calls into.

/// Event sum type, ids and membership enums.
pub mod event;
/// Change notices a room broadcasts to observers.
pub mod notify;
/// The room reconciliation engine.
pub mod room;
/// Per-room sync batch value object.
pub mod sync;
/// Connection-wide user records keyed by stable id.
pub mod user;

pub use event::{
    Event, EventContent, EventId, JoinState, Membership, ReceiptEntry, RoomId, UserId, UserReceipt,
};
pub use notify::{NoticeBus, RoomNotice};
pub use room::pagination::{
    fetch_older, BackFetch, FetchError, FetchState, MessageFetcher, TimelineChunk,
};
pub use room::timeline::Timeline;
pub use room::{ReceiptPoster, Room};
pub use sync::SyncRoomData;
pub use user::{User, UserRegistry};
