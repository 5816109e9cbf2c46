//! Matching and reply engine.
//!
//! The engine owns everything between a loaded script and a reply string. It
//! is split into focused submodules under `src/engine/`:
//!
//! ```text
//! scripts ──▶ Trigger { pattern: Pattern::compile(..) }      (pattern.rs)
//!                              │
//!         Bot::sort_replies    v
//!         topic_levels ──▶ sort_levels ──▶ SortedIndex       (topics.rs, sorter.rs)
//!                              │
//! message ── normalize ───────┼─ Substitutions                (normalize.rs)
//!                              v
//!                     Resolver::respond                       (resolve.rs)
//!                       - %previous, topic buffer
//!                       - match_words (backtracking)          (matcher.rs)
//!                       - redirects, conditions, weights
//!                              │
//!                              v
//!                     process_tags                            (tags.rs)
//!                       - captures, formatters, variables
//!                       - {@..} and <call> re-enter the resolver
//!                              │
//!                              v
//!                     reply + ReplyMetrics                    (metrics.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `pattern.rs`: compiles trigger text into atoms and classifies it into a
//!   priority bucket.
//! - `sorter.rs`: orders one inheritance level of triggers by bucket and rank.
//! - `topics.rs`: walks includes/inherits and builds the frozen [`SortedIndex`].
//! - `normalize.rs`: lowercasing, substitutions and punctuation stripping.
//! - `matcher.rs`: matches a compiled pattern against input words.
//! - `resolve.rs`: picks the trigger and the reply, tracks recursion depth.
//! - `tags.rs`: expands reply tags.
//! - `metrics.rs`: counters returned by `Bot::reply_verbose`.
//!
//! ## Debugging
//!
//! Every stage logs through the `log` facade: `debug` shows which trigger
//! matched and where redirects went, `trace` shows every successful pattern
//! alignment. With the bundled CLI, `RUST_LOG=rivescript=trace` or `-vvv`.

#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/normalize.rs"]
mod normalize;
#[path = "engine/pattern.rs"]
mod pattern;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/sorter.rs"]
mod sorter;
#[path = "engine/tags.rs"]
mod tags;
#[path = "engine/topics.rs"]
mod topics;


pub use metrics::ReplyMetrics;
pub(crate) use pattern::Pattern;
pub(crate) use resolve::{Frozen, Resolver};
pub(crate) use sorter::SortedEntry;
pub(crate) use topics::{SortedIndex, topic_levels};
