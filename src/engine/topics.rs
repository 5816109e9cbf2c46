//! Topic graph traversal and the sorted index.
//!
//! A topic sees its own triggers, those of every topic it *includes*
//! (transitively, at the same priority level) and, one level lower each time,
//! those of every topic it *inherits*. The graph may contain cycles; each
//! topic is visited once, at the highest level it is reachable from.
//!
//! ```text
//! > topic alpha includes beta inherits gamma
//!
//! level 0: alpha, beta (+ beta's includes)
//! level 1: gamma (+ gamma's includes)
//! level 2: whatever gamma inherits ...
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::normalize::Substitutions;
use super::sorter::{SortedEntry, sort_levels};
use crate::{Brain, Options, Topic, Trigger};

/// Topic names visible from `topic`, grouped by inheritance level.
pub(crate) fn topic_levels(topics: &HashMap<String, Topic>, topic: &str) -> Vec<Vec<String>> {
    let mut visited = HashSet::new();
    let mut levels = Vec::new();
    let mut frontier = vec![topic.to_string()];

    while !frontier.is_empty() {
        let mut level = Vec::new();
        let mut next = Vec::new();
        let mut queue: VecDeque<String> = frontier.into_iter().collect();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            match topics.get(&name) {
                Some(data) => {
                    queue.extend(data.includes.iter().cloned());
                    next.extend(data.inherits.iter().cloned());
                }
                None => log::debug!("topic '{name}' is referenced but has no triggers"),
            }
            level.push(name);
        }

        if !level.is_empty() {
            levels.push(level);
        }
        frontier = next;
    }

    levels
}

fn level_triggers(topics: &HashMap<String, Topic>, level: &[String], keep: fn(&Trigger) -> bool) -> Vec<Arc<Trigger>> {
    level
        .iter()
        .filter_map(|name| topics.get(name))
        .flat_map(|topic| topic.triggers.iter())
        .filter(|t| keep(t))
        .cloned()
        .collect()
}

/// The frozen, query-side view built by `Bot::sort_replies`.
#[derive(Debug, Default)]
pub(crate) struct SortedIndex {
    /// Per topic: every trigger without a `%` line visible from it.
    pub topics: HashMap<String, Vec<SortedEntry>>,
    /// Per topic: triggers carrying a `%` line.
    pub thats: HashMap<String, Vec<SortedEntry>>,
    pub subs: Substitutions,
    pub person: Substitutions,
}

impl SortedIndex {
    pub fn build(brain: &Brain, options: &Options) -> Self {
        let mut index = SortedIndex {
            subs: Substitutions::new(&brain.subs),
            person: Substitutions::new(&brain.person),
            ..SortedIndex::default()
        };
        log::debug!("compiled {} substitutions and {} person swaps", index.subs.len(), index.person.len());

        for name in brain.topics.keys() {
            let levels = topic_levels(&brain.topics, name);

            let primary: Vec<_> = levels.iter().map(|l| level_triggers(&brain.topics, l, |t| t.previous.is_none())).collect();
            let that_levels = if options.inherit_that_triggers { &levels[..] } else { &levels[..levels.len().min(1)] };
            let thats: Vec<_> =
                that_levels.iter().map(|l| level_triggers(&brain.topics, l, |t| t.previous.is_some())).collect();

            let primary = sort_levels(&primary);
            let thats = sort_levels(&thats);
            log::debug!("sorted topic '{name}': {} triggers, {} with %previous", primary.len(), thats.len());

            index.topics.insert(name.clone(), primary);
            if !thats.is_empty() {
                index.thats.insert(name.clone(), thats);
            }
        }

        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str], &[&str])]) -> HashMap<String, Topic> {
        edges
            .iter()
            .map(|(name, includes, inherits)| {
                let topic = Topic {
                    triggers: Vec::new(),
                    includes: includes.iter().map(|s| s.to_string()).collect(),
                    inherits: inherits.iter().map(|s| s.to_string()).collect(),
                };
                (name.to_string(), topic)
            })
            .collect()
    }

    #[test]
    fn includes_share_a_level_and_inherits_go_below() {
        let topics = graph(&[("alpha", &["beta"], &["gamma"]), ("beta", &[], &[]), ("gamma", &["delta"], &[])]);
        assert_eq!(topic_levels(&topics, "alpha"), vec![vec!["alpha", "beta"], vec!["gamma", "delta"]]);
    }

    #[test]
    fn cycles_terminate() {
        let topics = graph(&[("a", &["b"], &[]), ("b", &["a"], &["a"])]);
        assert_eq!(topic_levels(&topics, "a"), vec![vec!["a", "b"]]);
    }

    #[test]
    fn highest_level_wins_for_shared_topics() {
        let topics = graph(&[("a", &["c"], &["b"]), ("b", &["c"], &[]), ("c", &[], &[])]);
        assert_eq!(topic_levels(&topics, "a"), vec![vec!["a", "c"], vec!["b"]]);
    }
}
