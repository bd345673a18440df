use crate::event::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user as known to the connection. Identity is the id; the display name
/// follows whatever the server last told us.
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug)]
pub struct User {
    id: UserId,
    display_name: String,
}

impl User {
    fn new(id: UserId) -> Self {
        Self {
            id,
            display_name: String::new(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Bare display name; empty when the server never supplied one.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Connection-wide user store, keyed by stable id and shared across rooms.
///
/// Rooms hold [`UserId`]s only and read current user state from here, so a
/// rename is a single registry update followed by
/// [`Room::user_renamed`](crate::room::Room::user_renamed) for each room
/// that tracks the user.
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, Default)]
pub struct UserRegistry {
    users: HashMap<UserId, User>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a user up, creating the record if this id was never seen.
    pub fn resolve(&mut self, user_id: &UserId) -> &User {
        self.users
            .entry(user_id.clone())
            .or_insert_with_key(|id| User::new(id.clone()))
    }

    pub fn get(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    /// Current bare display name for an id; empty for unknown users.
    pub fn name_of(&self, user_id: &UserId) -> &str {
        self.users
            .get(user_id)
            .map(|u| u.display_name.as_str())
            .unwrap_or("")
    }

    /// Update a user's display name, returning the old name when it
    /// actually changed.
    pub fn set_display_name(&mut self, user_id: &UserId, name: &str) -> Option<String> {
        let user = self
            .users
            .entry(user_id.clone())
            .or_insert_with_key(|id| User::new(id.clone()));
        if name == user.display_name {
            return None;
        }
        Some(std::mem::replace(&mut user.display_name, name.to_owned()))
    }

    /// Deliver a member-event payload to its user. Returns the old display
    /// name when the payload renamed the user, `None` otherwise (including
    /// payloads that carry no name at all, common on leave events).
    pub fn apply_member_event(
        &mut self,
        user_id: &UserId,
        display_name: Option<&str>,
    ) -> Option<String> {
        match display_name {
            Some(name) => self.set_display_name(user_id, name),
            None => {
                self.resolve(user_id);
                None
            }
        }
    }
}
