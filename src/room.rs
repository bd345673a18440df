pub mod displayname;
pub mod pagination;
pub mod timeline;

use crate::event::{Event, EventContent, EventId, JoinState, Membership, RoomId, UserId};
use crate::notify::{NoticeBus, RoomNotice};
use crate::room::pagination::FetchState;
use crate::room::timeline::Timeline;
use crate::sync::SyncRoomData;
use crate::user::UserRegistry;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;

/// Collaborator that tells the server an event was read. Fire-and-forget;
/// deciding *when* to mark something read is the caller's business.
pub trait ReceiptPoster {
    fn post_receipt(&self, room_id: &RoomId, event_id: &EventId);
}

/// Client-side view of one conversation.
///
/// A room ingests sync batches through [`update_data`](Self::update_data)
/// and keeps membership, metadata, the ordered timeline and ephemeral
/// signals consistent, emitting a [`RoomNotice`] for every observable
/// change. Users are referenced by id only; their records live in the
/// connection's shared [`UserRegistry`].
///
/// All mutations are synchronous and lock-free. Callers feeding the same
/// room from several tasks must serialize them (the pagination driver in
/// [`pagination`] shows the intended pattern).
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    local_user: UserId,
    join_state: JoinState,
    name: String,
    canonical_alias: String,
    aliases: Vec<String>,
    topic: String,
    displayname: String,
    highlight_count: u32,
    notification_count: u32,
    timeline: Timeline,
    /// Current members, bucketed by bare display name. One user sits under
    /// exactly one name at a time; namesakes share a bucket.
    members: HashMap<String, Vec<UserId>>,
    users_left: Vec<UserId>,
    last_read: HashMap<UserId, EventId>,
    typing: Vec<UserId>,
    prev_batch: Option<String>,
    fetch_state: FetchState,
    notices: NoticeBus,
}

impl Room {
    pub fn new(id: RoomId, local_user: UserId) -> Self {
        debug!(room = %id, "new room");
        let displayname = format!("Empty room <{id}>");
        Self {
            id,
            local_user,
            join_state: JoinState::Join,
            name: String::new(),
            canonical_alias: String::new(),
            aliases: Vec::new(),
            topic: String::new(),
            displayname,
            highlight_count: 0,
            notification_count: 0,
            timeline: Timeline::new(),
            members: HashMap::new(),
            users_left: Vec::new(),
            last_read: HashMap::new(),
            typing: Vec::new(),
            prev_batch: None,
            fetch_state: FetchState::Idle,
            notices: NoticeBus::default(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    pub fn join_state(&self) -> JoinState {
        self.join_state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canonical_alias(&self) -> &str {
        &self.canonical_alias
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Derived human-readable label; never authoritative.
    pub fn display_name(&self) -> &str {
        &self.displayname
    }

    pub fn highlight_count(&self) -> u32 {
        self.highlight_count
    }

    pub fn notification_count(&self) -> u32 {
        self.notification_count
    }

    pub fn timeline_events(&self) -> &[Event] {
        self.timeline.events()
    }

    pub fn members(&self) -> impl Iterator<Item = &UserId> {
        self.members.values().flatten()
    }

    pub fn member_count(&self) -> usize {
        self.members.values().map(Vec::len).sum()
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.members.values().any(|bucket| bucket.contains(user_id))
    }

    pub fn users_typing(&self) -> &[UserId] {
        &self.typing
    }

    pub fn users_left(&self) -> &[UserId] {
        &self.users_left
    }

    /// Last event the given user is known to have read.
    pub fn last_read_event(&self, user_id: &UserId) -> Option<&EventId> {
        self.last_read.get(user_id)
    }

    /// Subscribe to this room's change notices.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomNotice> {
        self.notices.subscribe()
    }

    pub fn set_join_state(&mut self, state: JoinState) {
        if state == self.join_state {
            return;
        }
        let old = self.join_state;
        self.join_state = state;
        self.notices
            .emit(RoomNotice::JoinStateChanged { old, new: state });
    }

    pub fn reset_notification_count(&mut self) {
        if self.notification_count == 0 {
            return;
        }
        self.notification_count = 0;
        self.notices
            .emit(RoomNotice::NotificationCountChanged { count: 0 });
    }

    pub fn reset_highlight_count(&mut self) {
        if self.highlight_count == 0 {
            return;
        }
        self.highlight_count = 0;
        self.notices
            .emit(RoomNotice::HighlightCountChanged { count: 0 });
    }

    /// Tell the server the local user read `event_id`.
    pub fn mark_message_as_read(&self, poster: &impl ReceiptPoster, event_id: &EventId) {
        poster.post_receipt(&self.id, event_id);
    }

    /// Apply one sync batch.
    ///
    /// Within the batch, state events are applied before the timeline
    /// events that follow them and ephemeral events after both; this
    /// ordering is observable, since timeline events may reference users
    /// that earlier state events in the same batch established.
    pub fn update_data(&mut self, users: &mut UserRegistry, data: SyncRoomData) {
        let SyncRoomData {
            join_state,
            timeline_prev_batch,
            state,
            timeline,
            ephemeral,
            highlight_count,
            notification_count,
        } = data;

        // The first batch establishes the history boundary; afterwards only
        // successful backward fetches move it.
        if self.prev_batch.is_none() {
            self.prev_batch = timeline_prev_batch;
        }

        self.set_join_state(join_state);

        for event in &state {
            self.apply_state_event(users, event);
        }

        for event in timeline {
            self.receive_timeline_event(users, event);
        }

        for event in &ephemeral {
            self.apply_ephemeral_event(users, event);
        }

        if highlight_count != self.highlight_count {
            self.highlight_count = highlight_count;
            self.notices.emit(RoomNotice::HighlightCountChanged {
                count: highlight_count,
            });
        }
        if notification_count != self.notification_count {
            self.notification_count = notification_count;
            self.notices.emit(RoomNotice::NotificationCountChanged {
                count: notification_count,
            });
        }
    }

    /// Add a single live message outside a sync batch.
    pub fn add_message(&mut self, event: Event) {
        let received = event.clone();
        self.timeline.insert(event);
        self.notices.emit(RoomNotice::NewMessage { event: received });
    }

    /// Apply a single state event outside a sync batch (initial sync).
    pub fn add_initial_state(&mut self, users: &mut UserRegistry, event: &Event) {
        self.apply_state_event(users, event);
    }

    /// Full timeline path for one event: insert, raise the new-message
    /// notice, then let any piggybacked state change through.
    pub(crate) fn receive_timeline_event(&mut self, users: &mut UserRegistry, event: Event) {
        let received = event.clone();
        self.timeline.insert(event);
        self.notices.emit(RoomNotice::NewMessage {
            event: received.clone(),
        });
        self.apply_state_event(users, &received);
    }

    fn apply_state_event(&mut self, users: &mut UserRegistry, event: &Event) {
        match &event.content {
            EventContent::RoomName { name } => {
                self.name = name.clone();
                debug!(room = %self.id, name = %self.name, "room name");
                self.refresh_display_name(users);
            }
            EventContent::RoomAliases { aliases } => {
                self.aliases = aliases.clone();
                debug!(room = %self.id, aliases = ?self.aliases, "room aliases");
                self.refresh_display_name(users);
            }
            EventContent::RoomCanonicalAlias { alias } => {
                self.canonical_alias = alias.clone();
                debug!(room = %self.id, alias = %self.canonical_alias, "room canonical alias");
                self.refresh_display_name(users);
            }
            EventContent::RoomTopic { topic } => {
                self.topic = topic.clone();
                self.notices.emit(RoomNotice::TopicChanged {
                    topic: self.topic.clone(),
                });
            }
            EventContent::RoomMember {
                user_id,
                membership,
                display_name,
            } => {
                self.apply_member_event(users, user_id, *membership, display_name.as_deref());
            }
            EventContent::Unknown { kind } => {
                debug!(room = %self.id, kind = %kind, "ignoring unknown event kind");
            }
            // Not state events; nothing to do here.
            EventContent::Message { .. }
            | EventContent::Typing { .. }
            | EventContent::Receipt { .. } => {}
        }
    }

    fn apply_member_event(
        &mut self,
        users: &mut UserRegistry,
        user_id: &UserId,
        membership: Membership,
        display_name: Option<&str>,
    ) {
        // The user absorbs its profile payload first; if that renamed a
        // tracked member, the name bucket has to move before the
        // membership change below reads the current name.
        if let Some(old_name) = users.apply_member_event(user_id, display_name) {
            self.user_renamed(users, user_id, &old_name);
        }

        match membership {
            Membership::Join => {
                if let Some(pos) = self.users_left.iter().position(|u| u == user_id) {
                    self.users_left.remove(pos);
                }
                let current = users.name_of(user_id).to_owned();
                let bucket = self.members.entry(current).or_default();
                if bucket.contains(user_id) {
                    return;
                }
                bucket.push(user_id.clone());
                self.notices.emit(RoomNotice::UserAdded {
                    user_id: user_id.clone(),
                });
                self.refresh_display_name(users);
            }
            Membership::Leave => {
                // A leave for someone we never tracked as joined is normal
                // under a replicated event log; removal is a no-op then.
                self.unbind_member(users.name_of(user_id), user_id);
                if !self.users_left.contains(user_id) {
                    self.users_left.push(user_id.clone());
                }
                self.notices.emit(RoomNotice::UserRemoved {
                    user_id: user_id.clone(),
                });
                self.refresh_display_name(users);
            }
            Membership::Invite | Membership::Ban | Membership::Knock => {}
        }
    }

    /// Move a tracked member to its new name bucket after a rename.
    ///
    /// Only acts when the user still sits under `old_name`, which makes
    /// duplicate rename deliveries harmless. Public because connection-level
    /// profile updates are routed through here as well.
    pub fn user_renamed(&mut self, users: &UserRegistry, user_id: &UserId, old_name: &str) {
        if !self.unbind_member(old_name, user_id) {
            return;
        }
        let current = users.name_of(user_id).to_owned();
        self.members.entry(current).or_default().push(user_id.clone());
        self.refresh_display_name(users);
    }

    /// Remove one (name, user) binding. Returns whether it was present.
    fn unbind_member(&mut self, name: &str, user_id: &UserId) -> bool {
        let mut removed = false;
        let mut now_empty = false;
        if let Some(bucket) = self.members.get_mut(name) {
            if let Some(pos) = bucket.iter().position(|u| u == user_id) {
                bucket.remove(pos);
                removed = true;
            }
            now_empty = bucket.is_empty();
        }
        if now_empty {
            self.members.remove(name);
        }
        removed
    }

    fn apply_ephemeral_event(&mut self, users: &mut UserRegistry, event: &Event) {
        match &event.content {
            EventContent::Typing { user_ids } => {
                // Whole-set replacement; stale entries never carry over.
                self.typing = user_ids
                    .iter()
                    .map(|user_id| {
                        users.resolve(user_id);
                        user_id.clone()
                    })
                    .collect();
                self.notices.emit(RoomNotice::TypingChanged {
                    user_ids: self.typing.clone(),
                });
            }
            EventContent::Receipt { entries } => {
                // Last write wins per user; later entries in the same batch
                // overwrite earlier ones.
                for entry in entries {
                    for receipt in &entry.receipts {
                        users.resolve(&receipt.user_id);
                        self.last_read
                            .insert(receipt.user_id.clone(), entry.event_id.clone());
                    }
                }
            }
            EventContent::Unknown { kind } => {
                debug!(room = %self.id, kind = %kind, "ignoring unknown event kind");
            }
            // Not ephemeral events; nothing to do here.
            EventContent::RoomName { .. }
            | EventContent::RoomAliases { .. }
            | EventContent::RoomCanonicalAlias { .. }
            | EventContent::RoomTopic { .. }
            | EventContent::RoomMember { .. }
            | EventContent::Message { .. } => {}
        }
    }
}
