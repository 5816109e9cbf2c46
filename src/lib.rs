extern crate self as rivescript;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod objects;
pub mod script;
mod users;

pub use api::{Bot, Options, ReplyDetails, SortedTrigger, TopicSummary};
pub use engine::ReplyMetrics;
pub use error::{LoadError, MacroError, ReplyError};
pub use objects::{CallContext, ObjectHandler, Subroutine};
pub use users::ThawAction;

use crate::engine::Pattern;

// --- Sentinels --------------------------------------------------------------

/// Value read back for any variable that was never set.
pub const UNDEFINED: &str = "undefined";

/// Reply when no trigger in the active topic chain matches the input.
pub const ERR_NO_MATCH: &str = "ERR: No Reply Matched";

/// Reply when a trigger matched but produced no usable reply.
pub const ERR_NO_REPLY: &str = "ERR: No Reply Found";

/// Reply when a redirect or macro chain exceeds [`Options::depth`].
pub const ERR_DEEP_RECURSION: &str = "ERR: Deep Recursion Detected";

/// Inline text substituted for a `<call>` to an unregistered macro.
pub const ERR_OBJECT_NOT_FOUND: &str = "[ERR: Object Not Found]";

/// Definition value that removes a key instead of storing it.
pub(crate) const UNDEF_TAG: &str = "<undef>";

pub(crate) const DEFAULT_TOPIC: &str = "random";
pub(crate) const BEGIN_TOPIC: &str = "__begin__";

// --- Internal types ---------------------------------------------------------

/// A loaded trigger with its pattern(s) compiled.
///
/// Triggers are shared between a topic and every sort buffer that can see it,
/// so they live behind an `Arc` and are never mutated after loading.
#[derive(Debug)]
pub(crate) struct Trigger {
    pub topic: String,
    pub pattern: Pattern,
    /// The bot reply this trigger answers (`%` line), if any.
    pub previous: Option<Pattern>,
    pub replies: Vec<ReplyTemplate>,
    pub conditions: Vec<Condition>,
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReplyTemplate {
    pub text: String,
    pub weight: u32,
}

impl ReplyTemplate {
    /// Split an inline `{weight=N}` marker out of `raw`.
    pub fn parse(raw: &str) -> Self {
        let re = regex!(r"\{weight=(\d+)\}");
        let weight = re
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);
        let text = re.replace_all(raw, "").trim().to_string();
        ReplyTemplate { text, weight }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CondOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CondOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" | "eq" => Some(CondOp::Eq),
            "!=" | "ne" | "<>" => Some(CondOp::Ne),
            "<" => Some(CondOp::Lt),
            "<=" => Some(CondOp::Le),
            ">" => Some(CondOp::Gt),
            ">=" => Some(CondOp::Ge),
            _ => None,
        }
    }

    /// Compare two already-expanded operands. Ordering operators are numeric
    /// and fail when either side is not a number.
    pub fn holds(self, left: &str, right: &str) -> bool {
        let numbers = || Some((left.trim().parse::<f64>().ok()?, right.trim().parse::<f64>().ok()?));
        match self {
            CondOp::Eq => left == right,
            CondOp::Ne => left != right,
            CondOp::Lt => numbers().is_some_and(|(l, r)| l < r),
            CondOp::Le => numbers().is_some_and(|(l, r)| l <= r),
            CondOp::Gt => numbers().is_some_and(|(l, r)| l > r),
            CondOp::Ge => numbers().is_some_and(|(l, r)| l >= r),
        }
    }
}

/// `lhs op rhs => reply`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Condition {
    pub left: String,
    pub op: CondOp,
    pub right: String,
    pub reply: String,
}

impl Condition {
    pub fn parse(raw: &str) -> Option<Self> {
        let (test, reply) = raw.split_once("=>")?;
        let caps = regex!(r"^(.+?)\s+(==|eq|!=|ne|<>|<=|>=|<|>)\s+(.*)$").captures(test.trim())?;
        Some(Condition {
            left: caps[1].trim().to_string(),
            op: CondOp::from_token(&caps[2])?,
            right: caps[3].trim().to_string(),
            reply: ReplyTemplate::parse(reply).text,
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct Topic {
    pub triggers: Vec<Arc<Trigger>>,
    pub includes: Vec<String>,
    pub inherits: Vec<String>,
}

/// Everything loaded from scripts, plus the bot/global variables that tags may
/// rewrite at reply time.
#[derive(Debug, Default)]
pub(crate) struct Brain {
    pub topics: HashMap<String, Topic>,
    pub globals: RwLock<HashMap<String, String>>,
    pub vars: RwLock<HashMap<String, String>>,
    pub subs: HashMap<String, String>,
    pub person: HashMap<String, String>,
    pub arrays: HashMap<String, Vec<String>>,
}

impl Brain {
    pub fn bot_var(&self, name: &str) -> String {
        self.vars.read().get(name).cloned().unwrap_or_else(|| UNDEFINED.to_string())
    }

    pub fn global(&self, name: &str) -> String {
        self.globals.read().get(name).cloned().unwrap_or_else(|| UNDEFINED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_marker_is_stripped() {
        let reply = ReplyTemplate::parse("Hello there human.{weight=19}");
        assert_eq!(reply.text, "Hello there human.");
        assert_eq!(reply.weight, 19);

        let plain = ReplyTemplate::parse("Hey!");
        assert_eq!(plain.weight, 1);

        assert_eq!(ReplyTemplate::parse("zero {weight=0}").weight, 1);
    }

    #[test]
    fn condition_parses_operators() {
        let cond = Condition::parse("<get name> == undefined => What is your name?").unwrap();
        assert_eq!(cond.left, "<get name>");
        assert_eq!(cond.op, CondOp::Eq);
        assert_eq!(cond.right, "undefined");
        assert_eq!(cond.reply, "What is your name?");

        let cond = Condition::parse("<get age> >= 18 => Adult").unwrap();
        assert_eq!(cond.op, CondOp::Ge);

        let cond = Condition::parse("<get age> < 13 => Too young.{weight=4}").unwrap();
        assert_eq!(cond.op, CondOp::Lt);
        assert_eq!(cond.reply, "Too young.");

        assert!(Condition::parse("no arrow here").is_none());
        assert!(Condition::parse("a ~~ b => nope").is_none());
    }

    #[test]
    fn numeric_ops_need_numbers() {
        assert!(CondOp::Lt.holds("3", "10"));
        assert!(!CondOp::Lt.holds("three", "10"));
        assert!(CondOp::Ne.holds("a", "b"));
        assert!(CondOp::Ge.holds(" 5", "5"));
    }
}
