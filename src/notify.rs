use crate::event::{Event, JoinState, UserId};
use tokio::sync::broadcast;

/// State-change notifications a room emits while applying sync batches,
/// pagination results and rename updates.
#[derive(Clone, Debug, PartialEq)]
pub enum RoomNotice {
    JoinStateChanged { old: JoinState, new: JoinState },
    TopicChanged { topic: String },
    HighlightCountChanged { count: u32 },
    NotificationCountChanged { count: u32 },
    UserAdded { user_id: UserId },
    UserRemoved { user_id: UserId },
    DisplaynameChanged { displayname: String },
    TypingChanged { user_ids: Vec<UserId> },
    NewMessage { event: Event },
}

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast fan-out for room notices. Emission is best-effort: with no
/// subscribers the notice is dropped, lagged subscribers are handled by
/// `broadcast`.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<RoomNotice>,
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast a notice to all subscribers. Returns the receiver count.
    pub fn emit(&self, notice: RoomNotice) -> usize {
        self.tx.send(notice).unwrap_or(0)
    }

    /// Subscribe to the notice stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomNotice> {
        self.tx.subscribe()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
