//! Username-to-user cache owned by one resolver.
//!
//! A cache lives only as long as the resolver that owns it, which in turn
//! lives for one service call. It never crosses requests, so it needs no
//! locking and cannot serve stale users to another caller.

use std::collections::HashMap;

use super::{User, Username};

/// Positive lookups made during one request.
#[derive(Debug, Default, Clone)]
pub struct UserCache {
    users: HashMap<Username, User>,
}

impl UserCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached user for `username`, if any.
    pub fn get(&self, username: &Username) -> Option<&User> {
        self.users.get(username)
    }

    /// Whether `username` has been resolved.
    pub fn contains(&self, username: &Username) -> bool {
        self.users.contains_key(username)
    }

    /// Remember a resolved user under its username.
    pub fn insert(&mut self, user: User) {
        self.users.insert(user.username().clone(), user);
    }

    /// Number of cached users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The subset of `usernames` not yet cached, deduplicated and in first-seen order.
    pub fn missing<'a>(&self, usernames: &'a [Username]) -> Vec<&'a Username> {
        let mut seen = Vec::new();
        for username in usernames {
            if !self.contains(username) && !seen.contains(&username) {
                seen.push(username);
            }
        }
        seen
    }
}
