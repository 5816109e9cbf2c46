//! Trigger priority sorting.
//!
//! One inheritance level of triggers is ordered by bucket (see
//! [`Bucket`]), then by descending rank inside a bucket. The sort is stable:
//! triggers of equal rank keep their load order, so sorting the same scripts
//! twice yields identical buffers.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::pattern::Bucket;
use crate::Trigger;

/// A sort buffer entry: the pattern text and the trigger that owns it.
#[derive(Debug, Clone)]
pub(crate) struct SortedEntry {
    pub pattern: String,
    pub trigger: Arc<Trigger>,
}

/// Order one level of triggers by matching priority.
pub(crate) fn sort_triggers(triggers: &[Arc<Trigger>]) -> Vec<SortedEntry> {
    let mut buckets: BTreeMap<Bucket, BTreeMap<usize, Vec<&Arc<Trigger>>>> = BTreeMap::new();
    for trigger in triggers {
        let pattern = &trigger.pattern;
        buckets.entry(pattern.bucket()).or_default().entry(pattern.rank()).or_default().push(trigger);
    }

    let mut sorted = Vec::with_capacity(triggers.len());
    for bucket in Bucket::ALL {
        let Some(ranks) = buckets.remove(&bucket) else {
            continue;
        };
        for (_, group) in ranks.into_iter().rev() {
            sorted.extend(
                group.into_iter().map(|t| SortedEntry { pattern: t.pattern.text.clone(), trigger: Arc::clone(t) }),
            );
        }
    }
    sorted
}

/// Sort every level separately and concatenate, highest level first.
pub(crate) fn sort_levels(levels: &[Vec<Arc<Trigger>>]) -> Vec<SortedEntry> {
    levels.iter().flat_map(|level| sort_triggers(level)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Pattern;

    fn trigger(pattern: &str) -> Arc<Trigger> {
        Arc::new(Trigger {
            topic: "random".to_string(),
            pattern: Pattern::compile(pattern),
            previous: None,
            replies: Vec::new(),
            conditions: Vec::new(),
            redirect: None,
        })
    }

    fn order(entries: &[SortedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.pattern.as_str()).collect()
    }

    #[test]
    fn buckets_then_word_count() {
        let triggers: Vec<_> = [
            "*",
            "hello *",
            "#",
            "hello",
            "how [are] you",
            "i am _ years old",
            "i am # years old",
            "my name is *",
            "hello bot how are you",
            "_",
        ]
        .into_iter()
        .map(trigger)
        .collect();

        let sorted = sort_triggers(&triggers);
        assert_eq!(order(&sorted), vec![
            "hello bot how are you",
            "hello",
            "how [are] you",
            "i am _ years old",
            "i am # years old",
            "my name is *",
            "hello *",
            "#",
            "_",
            "*",
        ]);
    }

    #[test]
    fn wildcards_rank_by_literal_words() {
        let triggers: Vec<_> = ["* says * is *", "tell me about *", "# is #", "what is # plus #"].into_iter().map(trigger).collect();
        let sorted = sort_triggers(&triggers);
        assert_eq!(order(&sorted), vec!["what is # plus #", "# is #", "tell me about *", "* says * is *"]);
    }

    #[test]
    fn ties_keep_load_order() {
        let triggers: Vec<_> = ["tell me a joke", "what is your name", "who made you"].into_iter().map(trigger).collect();
        let sorted = sort_triggers(&triggers);
        assert_eq!(order(&sorted), vec!["tell me a joke", "what is your name", "who made you"]);

        let again = sort_triggers(&triggers);
        assert_eq!(order(&sorted), order(&again));
    }

    #[test]
    fn lower_levels_follow_even_when_more_specific() {
        let levels = vec![vec![trigger("*")], vec![trigger("hello there bot")]];
        assert_eq!(order(&sort_levels(&levels)), vec!["*", "hello there bot"]);
    }
}
