use crate::event::{Event, JoinState};
use serde::{Deserialize, Serialize};

/// Per-room slice of one synchronization response.
///
/// Consumed once by [`Room::update_data`](crate::room::Room::update_data)
/// and discarded; it carries no identity of its own.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
pub struct SyncRoomData {
    pub join_state: JoinState,
    /// Token marking the oldest point covered by `timeline`, used to fetch
    /// earlier history. `None` when the server sent none.
    pub timeline_prev_batch: Option<String>,
    pub state: Vec<Event>,
    pub timeline: Vec<Event>,
    pub ephemeral: Vec<Event>,
    pub highlight_count: u32,
    pub notification_count: u32,
}
