//! Per-user conversation state.
//!
//! Each user id owns one [`UserRecord`] behind its own mutex, so replies for
//! different users run in parallel while two replies for the same user are
//! serialised. The outer map is only write-locked to create or drop records.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::{DEFAULT_TOPIC, UNDEF_TAG, UNDEFINED};

/// How many past inputs and replies are remembered per user.
pub(crate) const HISTORY_SIZE: usize = 9;

#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    vars: HashMap<String, String>,
    topic: String,
    inputs: VecDeque<String>,
    replies: VecDeque<String>,
    pub last_match: Option<String>,
}

impl Default for UserRecord {
    fn default() -> Self {
        UserRecord::new()
    }
}

impl UserRecord {
    pub fn new() -> Self {
        UserRecord {
            vars: HashMap::new(),
            topic: DEFAULT_TOPIC.to_string(),
            inputs: std::iter::repeat_n(UNDEFINED.to_string(), HISTORY_SIZE).collect(),
            replies: std::iter::repeat_n(UNDEFINED.to_string(), HISTORY_SIZE).collect(),
            last_match: None,
        }
    }

    /// Read a variable; `topic` is the current topic.
    pub fn get(&self, name: &str) -> String {
        if name == "topic" {
            return self.topic.clone();
        }
        self.vars.get(name).cloned().unwrap_or_else(|| UNDEFINED.to_string())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        if name == "topic" {
            self.set_topic(value);
        } else if value == UNDEF_TAG {
            self.vars.remove(name);
        } else {
            self.vars.insert(name.to_string(), value.to_string());
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn set_topic(&mut self, topic: &str) {
        let topic = topic.trim();
        self.topic = if topic.is_empty() || topic == UNDEF_TAG { DEFAULT_TOPIC.to_string() } else { topic.to_lowercase() };
    }

    /// `n`-th most recent input, 1-based.
    pub fn input(&self, n: usize) -> Option<String> {
        n.checked_sub(1).and_then(|i| self.inputs.get(i)).cloned()
    }

    /// `n`-th most recent reply, 1-based.
    pub fn reply(&self, n: usize) -> Option<String> {
        n.checked_sub(1).and_then(|i| self.replies.get(i)).cloned()
    }

    pub fn last_reply(&self) -> &str {
        self.replies.front().map_or(UNDEFINED, String::as_str)
    }

    pub fn push_history(&mut self, input: &str, reply: &str) {
        self.inputs.push_front(input.to_string());
        self.replies.push_front(reply.to_string());
        self.inputs.truncate(HISTORY_SIZE);
        self.replies.truncate(HISTORY_SIZE);
    }

    /// All variables including `topic`.
    pub fn vars(&self) -> HashMap<String, String> {
        let mut vars = self.vars.clone();
        vars.insert("topic".to_string(), self.topic.clone());
        vars
    }
}

/// What [`Bot::thaw_uservars`](crate::Bot::thaw_uservars) does with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThawAction {
    /// Restore the snapshot and delete it.
    Thaw,
    /// Delete the snapshot without restoring it.
    Discard,
    /// Restore the snapshot and keep it for later.
    Keep,
}

#[derive(Debug, Default)]
pub(crate) struct UserStore {
    users: RwLock<HashMap<String, Arc<Mutex<UserRecord>>>>,
    frozen: Mutex<HashMap<String, UserRecord>>,
}

impl UserStore {
    /// The record for `user`, created on first use.
    pub fn record(&self, user: &str) -> Arc<Mutex<UserRecord>> {
        if let Some(record) = self.users.read().get(user) {
            return Arc::clone(record);
        }
        let mut users = self.users.write();
        Arc::clone(users.entry(user.to_string()).or_default())
    }

    fn existing(&self, user: &str) -> Option<Arc<Mutex<UserRecord>>> {
        self.users.read().get(user).cloned()
    }

    pub fn get_var(&self, user: &str, name: &str) -> String {
        self.existing(user).map_or_else(|| UNDEFINED.to_string(), |record| record.lock().get(name))
    }

    pub fn set_var(&self, user: &str, name: &str, value: &str) {
        self.record(user).lock().set(name, value);
    }

    pub fn set_vars(&self, user: &str, vars: &HashMap<String, String>) {
        let record = self.record(user);
        let mut record = record.lock();
        for (name, value) in vars {
            record.set(name, value);
        }
    }

    pub fn vars(&self, user: &str) -> Option<HashMap<String, String>> {
        self.existing(user).map(|record| record.lock().vars())
    }

    pub fn last_match(&self, user: &str) -> Option<String> {
        self.existing(user).and_then(|record| record.lock().last_match.clone())
    }

    pub fn clear(&self, user: &str) {
        self.users.write().remove(user);
    }

    pub fn clear_all(&self) {
        self.users.write().clear();
    }

    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.users.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot `user`'s state. Returns `false` for unknown users.
    pub fn freeze(&self, user: &str) -> bool {
        let Some(record) = self.existing(user) else {
            return false;
        };
        let snapshot = record.lock().clone();
        self.frozen.lock().insert(user.to_string(), snapshot);
        true
    }

    /// Apply `action` to `user`'s snapshot. Returns `false` when there is none.
    pub fn thaw(&self, user: &str, action: ThawAction) -> bool {
        let mut frozen = self.frozen.lock();
        let snapshot = match action {
            ThawAction::Discard => return frozen.remove(user).is_some(),
            ThawAction::Thaw => frozen.remove(user),
            ThawAction::Keep => frozen.get(user).cloned(),
        };
        let Some(snapshot) = snapshot else {
            return false;
        };
        *self.record(user).lock() = snapshot;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_defaults() {
        let record = UserRecord::new();
        assert_eq!(record.get("name"), UNDEFINED);
        assert_eq!(record.get("topic"), DEFAULT_TOPIC);
        assert_eq!(record.input(1).as_deref(), Some(UNDEFINED));
        assert_eq!(record.reply(HISTORY_SIZE).as_deref(), Some(UNDEFINED));
        assert_eq!(record.reply(HISTORY_SIZE + 1), None);
        assert_eq!(record.input(0), None);
    }

    #[test]
    fn history_keeps_most_recent_first() {
        let mut record = UserRecord::new();
        for i in 0..12 {
            record.push_history(&format!("in {i}"), &format!("out {i}"));
        }
        assert_eq!(record.input(1).as_deref(), Some("in 11"));
        assert_eq!(record.reply(2).as_deref(), Some("out 10"));
        assert_eq!(record.reply(9).as_deref(), Some("out 3"));
        assert_eq!(record.last_reply(), "out 11");
    }

    #[test]
    fn undef_removes_and_topic_is_a_variable() {
        let mut record = UserRecord::new();
        record.set("name", "bob");
        record.set("name", UNDEF_TAG);
        assert_eq!(record.get("name"), UNDEFINED);

        record.set("topic", "Sorry");
        assert_eq!(record.topic(), "sorry");
        assert_eq!(record.vars().get("topic").map(String::as_str), Some("sorry"));
    }

    #[test]
    fn freeze_and_thaw() {
        let store = UserStore::default();
        assert!(!store.freeze("ghost"));

        store.set_var("u1", "name", "alice");
        assert!(store.freeze("u1"));
        store.set_var("u1", "name", "mallory");

        assert!(store.thaw("u1", ThawAction::Keep));
        assert_eq!(store.get_var("u1", "name"), "alice");

        store.set_var("u1", "name", "eve");
        assert!(store.thaw("u1", ThawAction::Thaw));
        assert_eq!(store.get_var("u1", "name"), "alice");
        assert!(!store.thaw("u1", ThawAction::Thaw));

        assert!(store.freeze("u1"));
        assert!(store.thaw("u1", ThawAction::Discard));
        assert!(!store.thaw("u1", ThawAction::Keep));
    }

    #[test]
    fn clear_forgets_users() {
        let store = UserStore::default();
        store.set_var("a", "x", "1");
        store.set_var("b", "x", "2");
        assert_eq!(store.user_ids(), vec!["a", "b"]);
        store.clear("a");
        assert_eq!(store.vars("a"), None);
        store.clear_all();
        assert!(store.user_ids().is_empty());
    }
}
