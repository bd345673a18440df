use crate::event::UserId;
use crate::notify::RoomNotice;
use crate::room::Room;
use crate::user::UserRegistry;
use tracing::debug;

impl Room {
    /// Label for a member as shown next to their messages: the bare display
    /// name when it is unique in this room, `"name <id>"` when other members
    /// share it, and the id when the user has no name at all.
    pub fn member_label(&self, users: &UserRegistry, user_id: &UserId) -> String {
        let name = users.name_of(user_id);
        if name.is_empty() {
            return user_id.to_string();
        }

        let namesakes = self.members.get(name).map(Vec::as_slice).unwrap_or(&[]);
        if namesakes.len() == 1 {
            return name.to_owned();
        }

        if !namesakes.iter().any(|u| u == user_id) {
            // Also covers an empty namesake bucket.
            debug!(room = %self.id, user = %user_id, "member label for a user not tracked under its own name");
            return name.to_owned();
        }

        format!("{name} <{user_id}>")
    }

    /// `a` sorts before `b` when picking members for the room label.
    /// The local user never wins a slot; everyone else orders by id.
    fn precedes(&self, a: &UserId, b: &UserId) -> bool {
        (a == &self.local_user, a) < (b == &self.local_user, b)
    }

    /// Room label derived from a member pool: the two lowest-ranked members
    /// (partial top-2 selection, no full sort), rendered as one name, a
    /// pair, or a pair head plus a remainder count. Pools of fewer than two
    /// yield nothing and let the caller fall through.
    fn label_from_members<'a, I>(&self, users: &UserRegistry, pool: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        let mut count = 0usize;
        let mut first: Option<&UserId> = None;
        let mut second: Option<&UserId> = None;
        for user_id in pool {
            count += 1;
            if first.map_or(true, |f| self.precedes(user_id, f)) {
                second = first;
                first = Some(user_id);
            } else if second.map_or(true, |s| self.precedes(user_id, s)) {
                second = Some(user_id);
            }
        }

        match count {
            2 => Some(self.member_label(users, first?)),
            3 => Some(format!(
                "{} and {}",
                self.member_label(users, first?),
                self.member_label(users, second?)
            )),
            n if n > 3 => Some(format!(
                "{} and {} others",
                self.member_label(users, first?),
                n - 3
            )),
            _ => None,
        }
    }

    fn compute_display_name(&self, users: &UserRegistry) -> String {
        // 1. Explicit room name, with the canonical alias stacked on when
        //    both are present.
        if !self.name.is_empty() {
            if self.canonical_alias.is_empty() {
                return self.name.clone();
            }
            return format!("{} <{}>", self.name, self.canonical_alias);
        }

        // 2. Canonical alias alone.
        if !self.canonical_alias.is_empty() {
            return self.canonical_alias.clone();
        }

        // 3. Current members.
        if let Some(label) = self.label_from_members(users, self.members.values().flatten()) {
            return label;
        }

        // 4. Members who left.
        if let Some(label) = self.label_from_members(users, &self.users_left) {
            return label;
        }

        // 5. Nothing to go on.
        format!("Empty room ({})", self.id)
    }

    /// Recompute the derived display name and notify only when the value
    /// actually changed.
    pub(crate) fn refresh_display_name(&mut self, users: &UserRegistry) {
        let computed = self.compute_display_name(users);
        if computed != self.displayname {
            self.displayname = computed;
            self.notices.emit(RoomNotice::DisplaynameChanged {
                displayname: self.displayname.clone(),
            });
        }
    }
}
