//! Reply metrics.
//!
//! Collected on every reply (they are cheap counters) and surfaced through
//! [`Bot::reply_verbose`](crate::Bot::reply_verbose) for debugging scripts:
//! why a message landed on a given trigger, how deep the redirect chain went,
//! and how much of the sort buffer had to be scanned.

use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplyMetrics {
    /// Wall time for the whole reply, begin block included.
    pub total: Duration,
    /// Deepest redirect/macro level reached (0 = no redirect).
    pub deepest: usize,
    /// Patterns tried against the input or the previous reply.
    pub patterns_tested: usize,
}
