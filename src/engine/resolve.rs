//! Reply resolution.
//!
//! Given a normalised message and a locked user record, the resolver finds the
//! first matching trigger in the user's topic and expands one of its replies:
//!
//! ```text
//! message ─┬─ begin block? ── resolve "request" in __begin__ ─┐
//!          │                                                  │ {ok}
//!          └──────────────────────────────────────────────────┴─▶ get_reply(depth 0)
//!
//! get_reply(msg, depth)
//!   ├─ depth > limit            ─▶ Err(DeepRecursion)
//!   ├─ %previous triggers       (depth 0 only, against the last bot reply)
//!   ├─ topic sort buffer        (first match wins)
//!   ├─ @redirect                ─▶ get_reply(target, depth + 1)
//!   ├─ *conditions              (first true one wins)
//!   ├─ weighted random reply
//!   └─ tag expansion (tags.rs)  may re-enter get_reply for {@..} and <call>
//! ```
//!
//! The depth counter is threaded through every re-entry; the limit is
//! `Options::depth`. Going over it unwinds the whole reply with
//! [`ReplyError::DeepRecursion`], which `Bot::reply` reports as
//! [`ERR_DEEP_RECURSION`](crate::ERR_DEEP_RECURSION).

use std::cell::Cell;
use std::sync::Arc;

use rand::seq::SliceRandom;

use super::matcher::{Bindings, match_words};
use super::normalize::normalize;
use super::topics::SortedIndex;
use crate::objects::ObjectRegistry;
use crate::users::UserRecord;
use crate::{BEGIN_TOPIC, Brain, DEFAULT_TOPIC, ERR_NO_MATCH, ERR_NO_REPLY, Options, ReplyError, Trigger, UNDEFINED};

/// Everything loaded and sorted: read-only while replies are served.
#[derive(Clone, Copy)]
pub(crate) struct Frozen<'a> {
    pub brain: &'a Brain,
    pub sorted: &'a SortedIndex,
    pub objects: &'a ObjectRegistry,
    pub options: &'a Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    Normal,
    Begin,
}

/// A matched trigger and what its wildcards captured.
#[derive(Debug)]
pub(super) struct Hit {
    pub trigger: Arc<Trigger>,
    pub stars: Vec<String>,
    /// Captures from the `%` pattern against the previous bot reply.
    pub botstars: Vec<String>,
}

pub(crate) struct Resolver<'a> {
    pub(super) frozen: Frozen<'a>,
    pub(super) user_id: &'a str,
    pub(super) user: &'a mut UserRecord,
    input: String,
    deepest: usize,
    tested: Cell<usize>,
}

impl<'a> Resolver<'a> {
    pub fn new(frozen: Frozen<'a>, user_id: &'a str, user: &'a mut UserRecord) -> Self {
        Resolver { frozen, user_id, user, input: String::new(), deepest: 0, tested: Cell::new(0) }
    }

    /// The message as it was matched.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn deepest(&self) -> usize {
        self.deepest
    }

    pub fn patterns_tested(&self) -> usize {
        self.tested.get()
    }

    /// Produce the reply to one raw message.
    pub fn respond(&mut self, message: &str) -> Result<String, ReplyError> {
        self.input = normalize(message, Some(&self.frozen.sorted.subs), self.frozen.options);
        self.user.last_match = None;
        let input = self.input.clone();

        let reply = if self.frozen.brain.topics.contains_key(BEGIN_TOPIC) {
            let begin = self.get_reply("request", Mode::Begin, 0)?;
            if begin.contains("{ok}") {
                let reply = self.get_reply(&input, Mode::Normal, 0)?;
                begin.replacen("{ok}", &reply, 1)
            } else {
                begin
            }
        } else {
            self.get_reply(&input, Mode::Normal, 0)?
        };
        Ok(reply.trim().to_string())
    }

    pub(super) fn get_reply(&mut self, message: &str, mode: Mode, depth: usize) -> Result<String, ReplyError> {
        if depth > self.frozen.options.depth {
            log::warn!("[reply] deep recursion for user {} at depth {depth}", self.user_id);
            return Err(ReplyError::DeepRecursion(depth));
        }
        self.deepest = self.deepest.max(depth);

        let topic = match mode {
            Mode::Begin => BEGIN_TOPIC.to_string(),
            Mode::Normal => self.active_topic(),
        };
        let words: Vec<&str> = message.split_whitespace().collect();

        let Some(hit) = self.find_match(&topic, &words, mode == Mode::Normal && depth == 0) else {
            log::debug!("[reply] no match for \"{message}\" in topic '{topic}'");
            return Ok(ERR_NO_MATCH.to_string());
        };
        log::debug!("[reply] \"{message}\" matched \"{}\" in topic '{topic}' (depth {depth})", hit.trigger.pattern.text);
        if mode == Mode::Normal {
            self.user.last_match = Some(hit.trigger.pattern.text.clone());
        }

        if let Some(target) = &hit.trigger.redirect {
            let target = self.process_tags(target, &hit, depth)?;
            let target = normalize(&target, None, self.frozen.options);
            log::debug!("[reply] redirect to \"{target}\"");
            return self.get_reply(&target, mode, depth + 1);
        }

        match self.pick_reply(&hit, depth)? {
            Some(template) => self.process_tags(&template, &hit, depth),
            None => {
                log::warn!("[reply] trigger \"{}\" has no usable reply", hit.trigger.pattern.text);
                Ok(ERR_NO_REPLY.to_string())
            }
        }
    }

    /// The user's topic, reset to the default one when it no longer exists.
    fn active_topic(&mut self) -> String {
        let topic = self.user.topic().to_string();
        if self.frozen.sorted.topics.contains_key(&topic) {
            return topic;
        }
        log::warn!("[reply] user {} was in an empty topic named '{topic}'", self.user_id);
        self.user.set_topic(DEFAULT_TOPIC);
        DEFAULT_TOPIC.to_string()
    }

    fn find_match(&self, topic: &str, words: &[&str], check_previous: bool) -> Option<Hit> {
        let thats = if check_previous { self.frozen.sorted.thats.get(topic) } else { None };
        if let Some(entries) = thats {
            let last = normalize(self.user.last_reply(), None, self.frozen.options);
            let last_words: Vec<&str> = last.split_whitespace().collect();
            for entry in entries {
                let Some(previous) = &entry.trigger.previous else {
                    continue;
                };
                self.tested.set(self.tested.get() + 1);
                let Some(botstars) = match_words(previous, &last_words, self) else {
                    continue;
                };
                if let Some(stars) = match_words(&entry.trigger.pattern, words, self) {
                    return Some(Hit { trigger: Arc::clone(&entry.trigger), stars, botstars });
                }
            }
        }

        for entry in self.frozen.sorted.topics.get(topic)? {
            self.tested.set(self.tested.get() + 1);
            if let Some(stars) = match_words(&entry.trigger.pattern, words, self) {
                return Some(Hit { trigger: Arc::clone(&entry.trigger), stars, botstars: Vec::new() });
            }
        }
        None
    }

    /// First true condition, else a weighted random reply. `None` when the
    /// trigger has nothing to say.
    fn pick_reply(&mut self, hit: &Hit, depth: usize) -> Result<Option<String>, ReplyError> {
        for condition in &hit.trigger.conditions {
            let left = self.process_tags(&condition.left, hit, depth)?;
            let right = self.process_tags(&condition.right, hit, depth)?;
            let left = if left.is_empty() { UNDEFINED } else { left.as_str() };
            let right = if right.is_empty() { UNDEFINED } else { right.as_str() };
            if condition.op.holds(left, right) {
                return Ok(Some(condition.reply.clone()));
            }
        }

        let mut rng = rand::thread_rng();
        Ok(hit.trigger.replies.choose_weighted(&mut rng, |r| r.weight).ok().map(|r| r.text.clone()))
    }
}

impl Bindings for Resolver<'_> {
    fn array(&self, name: &str) -> Option<&[String]> {
        self.frozen.brain.arrays.get(name).map(Vec::as_slice)
    }

    fn bot_var(&self, name: &str) -> String {
        self.frozen.brain.bot_var(name)
    }

    fn user_var(&self, name: &str) -> String {
        self.user.get(name)
    }
}
