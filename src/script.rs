//! Script loading.
//!
//! Loading is two steps:
//!
//! ```text
//! source text ── parse (parser.rs) ──▶ ast::Root ── ingest ──▶ Brain
//! ```
//!
//! `parse` only reads syntax; `ingest` merges a [`ast::Root`] into the bot's
//! brain, applying `<undef>` deletions and compiling trigger patterns.
//! Several documents may be loaded in any order; later definitions win and
//! topics accumulate triggers.

#[path = "script/ast.rs"]
pub mod ast;
#[path = "script/parser.rs"]
mod parser;

#[cfg(test)]
#[path = "script/tests.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

pub use parser::parse;

use crate::engine::Pattern;
use crate::objects::ObjectRegistry;
use crate::{Brain, Condition, ReplyTemplate, Trigger, UNDEF_TAG};

/// Store `value` under `key`, or delete `key` when `value` is `<undef>`.
pub(crate) fn define(map: &mut HashMap<String, String>, key: &str, value: &str) {
    if value == UNDEF_TAG {
        map.remove(key);
    } else {
        map.insert(key.to_string(), value.to_string());
    }
}

/// Merge a parsed document into `brain`.
pub(crate) fn ingest(brain: &mut Brain, objects: &mut ObjectRegistry, root: ast::Root) {
    let begin = root.begin;
    for (key, value) in &begin.global {
        define(brain.globals.get_mut(), key, value);
    }
    for (key, value) in &begin.var {
        define(brain.vars.get_mut(), key, value);
    }
    for (key, value) in &begin.sub {
        define(&mut brain.subs, key, value);
    }
    for (key, value) in &begin.person {
        define(&mut brain.person, key, value);
    }
    for (name, items) in begin.array {
        if matches!(items.as_slice(), [only] if only == UNDEF_TAG) {
            brain.arrays.remove(&name);
        } else {
            brain.arrays.insert(name, items);
        }
    }

    for (name, topic) in root.topics {
        let entry = brain.topics.entry(name.clone()).or_default();
        for include in topic.includes {
            if !entry.includes.contains(&include) {
                entry.includes.push(include);
            }
        }
        for inherit in topic.inherits {
            if !entry.inherits.contains(&inherit) {
                entry.inherits.push(inherit);
            }
        }
        entry.triggers.extend(topic.triggers.into_iter().map(|t| Arc::new(compile_trigger(&name, t))));
    }

    for object in root.objects {
        if !objects.has_handler(&object.language) {
            log::warn!("no handler for '{}' objects, skipping '{}'", object.language, object.name);
            continue;
        }
        match objects.load(&object.name, &object.language, &object.code) {
            Ok(()) => log::debug!("loaded object macro '{}' ({})", object.name, object.language),
            Err(err) => log::warn!("object macro '{}' failed to load: {err}", object.name),
        }
    }
}

fn compile_trigger(topic: &str, trigger: ast::Trigger) -> Trigger {
    Trigger {
        topic: topic.to_string(),
        pattern: Pattern::compile(&trigger.pattern),
        previous: trigger.previous.as_deref().map(Pattern::compile),
        replies: trigger.replies.iter().map(|r| ReplyTemplate::parse(r)).collect(),
        conditions: trigger.conditions.iter().filter_map(|c| Condition::parse(c)).collect(),
        redirect: trigger.redirect,
    }
}
