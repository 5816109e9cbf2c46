//! Parsed script contents, before compilation.
//!
//! This is the hand-off point between a script reader and the engine: any
//! front end that can produce a [`Root`] can feed `Bot::load_ast`.

use std::collections::{BTreeMap, HashMap};

/// One parsed document (or several merged ones).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Root {
    pub begin: Begin,
    /// Keyed by lower-cased topic name. Triggers outside any `> topic`
    /// block live in `random`.
    pub topics: BTreeMap<String, Topic>,
    pub objects: Vec<ObjectMacro>,
}

/// Definitions (`!` lines). A value of `<undef>` deletes the key on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Begin {
    pub global: HashMap<String, String>,
    pub var: HashMap<String, String>,
    pub sub: HashMap<String, String>,
    pub person: HashMap<String, String>,
    pub array: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topic {
    pub triggers: Vec<Trigger>,
    pub includes: Vec<String>,
    pub inherits: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    /// `+` line.
    pub pattern: String,
    /// `-` lines, possibly carrying `{weight=N}`.
    pub replies: Vec<String>,
    /// `*` lines, unparsed (`lhs op rhs => reply`).
    pub conditions: Vec<String>,
    /// `@` line.
    pub redirect: Option<String>,
    /// `%` line.
    pub previous: Option<String>,
}

/// The body of a `> object name language` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMacro {
    pub name: String,
    pub language: String,
    pub code: Vec<String>,
}
