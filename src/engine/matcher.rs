//! Word-level backtracking matcher.
//!
//! Matching walks a compiled [`Pattern`] against the normalised input words.
//! Every choice point (how many words a `*` eats, which alternative of a group
//! applies, whether an optional is present) forks a [`Frame`]; frames live on an
//! explicit stack instead of the call stack, so deeply nested groups cannot
//! overflow it.
//!
//! ```text
//! pattern: [Word(add), Pound, Word(and), Pound]
//! input:   add 5 and 7
//!          ^ position
//! frame.pending (top = next): Pound, Word(and), Pound
//! ```
//!
//! Exploration order is fixed, which makes the chosen alignment deterministic:
//!
//! - `*` tries the longest span first (greedy), then shorter ones.
//! - groups and optionals try alternatives in declared order; an optional tries
//!   "absent" last.
//!
//! A failed match has no side effects: captures are only handed back once a
//! frame consumes the whole input.

use super::pattern::{Atom, Pattern};

/// Values that a pattern resolves at match time.
pub(crate) trait Bindings {
    fn array(&self, name: &str) -> Option<&[String]>;
    fn bot_var(&self, name: &str) -> String;
    fn user_var(&self, name: &str) -> String;
}

#[derive(Debug, Clone)]
enum Step<'p> {
    /// A pattern atom, and whether its wildcards record captures.
    Atom(&'p Atom, bool),
    /// A word produced by expanding an array or a variable.
    Literal(String),
    /// Closes a capturing group that started at `start`.
    GroupEnd { start: usize },
}

#[derive(Debug, Clone)]
struct Frame<'p> {
    /// Remaining steps; the last element is matched next.
    pending: Vec<Step<'p>>,
    position: usize,
    captures: Vec<String>,
}

/// Match `words` against `pattern`, returning the captures in pattern order.
pub(crate) fn match_words(pattern: &Pattern, words: &[&str], bindings: &dyn Bindings) -> Option<Vec<String>> {
    // A bare `*` also accepts an empty message.
    if let [Atom::Star] = pattern.atoms.as_slice() {
        return Some(vec![words.join(" ")]);
    }

    let pending = pattern.atoms.iter().rev().map(|atom| Step::Atom(atom, true)).collect();
    let mut stack = vec![Frame { pending, position: 0, captures: Vec::new() }];

    while let Some(frame) = stack.pop() {
        if let Some(captures) = advance(frame, words, bindings, &mut stack) {
            log::trace!("[match] pattern=\"{}\" captures={:?}", pattern.text, captures);
            return Some(captures);
        }
    }
    None
}

/// Run `frame` forward until it completes, dies, or has to branch. Branches
/// other than the preferred one are pushed on `stack` lowest-priority first.
fn advance<'p>(
    mut frame: Frame<'p>,
    words: &[&str],
    bindings: &dyn Bindings,
    stack: &mut Vec<Frame<'p>>,
) -> Option<Vec<String>> {
    loop {
        let Some(step) = frame.pending.pop() else {
            return (frame.position == words.len()).then_some(frame.captures);
        };
        let pos = frame.position;

        match step {
            Step::Literal(word) => {
                if words.get(pos) != Some(&word.as_str()) {
                    return None;
                }
                frame.position += 1;
            }
            Step::GroupEnd { start } => frame.captures.push(words[start..pos].join(" ")),
            Step::Atom(atom, capture) => match atom {
                Atom::Word(word) => {
                    if words.get(pos) != Some(&word.as_str()) {
                        return None;
                    }
                    frame.position += 1;
                }
                Atom::Pound => {
                    let word = words.get(pos).filter(|w| w.chars().all(|c| c.is_ascii_digit()))?;
                    if capture {
                        frame.captures.push(word.to_string());
                    }
                    frame.position += 1;
                }
                Atom::Under => {
                    let word = words.get(pos).filter(|w| w.chars().all(char::is_alphabetic))?;
                    if capture {
                        frame.captures.push(word.to_string());
                    }
                    frame.position += 1;
                }
                Atom::Star => {
                    let available = words.len().checked_sub(pos).filter(|n| *n > 0)?;
                    for span in 1..available {
                        let mut shorter = frame.clone();
                        shorter.position = pos + span;
                        if capture {
                            shorter.captures.push(words[pos..pos + span].join(" "));
                        }
                        stack.push(shorter);
                    }
                    if capture {
                        frame.captures.push(words[pos..].join(" "));
                    }
                    frame.position = words.len();
                }
                Atom::Optional(alternatives) => {
                    // "absent" is the last resort, so it goes on the stack first.
                    stack.push(frame.clone());
                    let branches: Vec<Vec<Step<'p>>> =
                        alternatives.iter().map(|alt| alt.iter().rev().map(|a| Step::Atom(a, false)).collect()).collect();
                    fork(&mut frame, branches, stack)?;
                }
                Atom::Group(alternatives) => {
                    let branches = alternatives
                        .iter()
                        .map(|alt| {
                            let mut steps = Vec::with_capacity(alt.len() + 1);
                            if capture {
                                steps.push(Step::GroupEnd { start: pos });
                            }
                            steps.extend(alt.iter().rev().map(|a| Step::Atom(a, false)));
                            steps
                        })
                        .collect();
                    fork(&mut frame, branches, stack)?;
                }
                Atom::Array(name) => {
                    let entries = bindings.array(name)?;
                    let branches = entries
                        .iter()
                        .map(|entry| word_steps(entry))
                        .filter(|steps| !steps.is_empty())
                        .collect();
                    fork(&mut frame, branches, stack)?;
                }
                Atom::BotVar(name) => frame.pending.extend(word_steps(&bindings.bot_var(name))),
                Atom::UserVar(name) => frame.pending.extend(word_steps(&bindings.user_var(name))),
            },
        }
    }
}

/// Continue `frame` down the first branch and stack the others behind it.
/// Each branch is a list of steps in pending order (last = next). Returns
/// `None` when there is no branch to take.
fn fork<'p>(frame: &mut Frame<'p>, branches: Vec<Vec<Step<'p>>>, stack: &mut Vec<Frame<'p>>) -> Option<()> {
    let mut branches = branches.into_iter();
    let first = branches.next()?;
    let rest: Vec<Vec<Step<'p>>> = branches.collect();
    for steps in rest.into_iter().rev() {
        let mut alt = frame.clone();
        alt.pending.extend(steps);
        stack.push(alt);
    }
    frame.pending.extend(first);
    Some(())
}

/// Expand free text into literal steps, in pending order.
fn word_steps<'p>(text: &str) -> Vec<Step<'p>> {
    let cleaned: String =
        text.to_lowercase().chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect();
    cleaned.split_whitespace().rev().map(|w| Step::Literal(w.to_string())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Env {
        arrays: HashMap<String, Vec<String>>,
        vars: HashMap<String, String>,
    }

    impl Bindings for Env {
        fn array(&self, name: &str) -> Option<&[String]> {
            self.arrays.get(name).map(|v| v.as_slice())
        }
        fn bot_var(&self, name: &str) -> String {
            self.vars.get(name).cloned().unwrap_or_else(|| "undefined".to_string())
        }
        fn user_var(&self, name: &str) -> String {
            self.bot_var(name)
        }
    }

    fn try_match(pattern: &str, input: &str) -> Option<Vec<String>> {
        try_match_with(&Env::default(), pattern, input)
    }

    fn try_match_with(env: &Env, pattern: &str, input: &str) -> Option<Vec<String>> {
        let words: Vec<&str> = input.split_whitespace().collect();
        match_words(&Pattern::compile(pattern), &words, env)
    }

    #[test]
    fn literal_patterns_need_the_whole_input() {
        assert_eq!(try_match("hello bot", "hello bot"), Some(vec![]));
        assert_eq!(try_match("hello bot", "hello bot today"), None);
        assert_eq!(try_match("hello bot", "hello"), None);
    }

    #[test]
    fn numeric_wildcards_capture_in_order() {
        assert_eq!(try_match("add # and #", "add 5 and 7"), Some(vec!["5".to_string(), "7".to_string()]));
        assert_eq!(try_match("add # and #", "add five and 7"), None);
    }

    #[test]
    fn alpha_wildcard_rejects_digits() {
        assert_eq!(try_match("i am _", "i am happy"), Some(vec!["happy".to_string()]));
        assert_eq!(try_match("i am _", "i am 42"), None);
    }

    #[test]
    fn star_is_greedy_and_backtracks() {
        assert_eq!(
            try_match("* and *", "salt and pepper and vinegar"),
            Some(vec!["salt and pepper".to_string(), "vinegar".to_string()])
        );
        assert_eq!(try_match("my name is *", "my name is"), None);
        assert_eq!(try_match("* is *", "the sky is blue"), Some(vec!["the sky".to_string(), "blue".to_string()]));
    }

    #[test]
    fn lone_star_matches_anything() {
        assert_eq!(try_match("*", ""), Some(vec![String::new()]));
        assert_eq!(try_match("*", "what is up"), Some(vec!["what is up".to_string()]));
    }

    #[test]
    fn optionals_do_not_capture() {
        assert_eq!(try_match("how [are] you", "how you"), Some(vec![]));
        assert_eq!(try_match("how [are] you", "how are you"), Some(vec![]));
        assert_eq!(try_match("what is [the|a] *", "what is a cat"), Some(vec!["cat".to_string()]));
        assert_eq!(try_match("hello [*]", "hello there friend"), Some(vec![]));
        assert_eq!(try_match("hello [*]", "hello"), Some(vec![]));
    }

    #[test]
    fn groups_capture_the_chosen_alternative() {
        assert_eq!(try_match("i (love|really like) *", "i really like cake"), Some(vec![
            "really like".to_string(),
            "cake".to_string()
        ]));
        assert_eq!(try_match("(hello|hi)", "hey"), None);
    }

    #[test]
    fn arrays_expand_to_alternatives() {
        let mut env = Env::default();
        env.arrays.insert("colors".to_string(), vec!["red".to_string(), "light blue".to_string()]);

        assert_eq!(try_match_with(&env, "i like @colors", "i like light blue"), Some(vec![]));
        assert_eq!(try_match_with(&env, "i like (@colors) things", "i like red things"), Some(vec!["red".to_string()]));
        assert_eq!(try_match_with(&env, "i like @colors", "i like green"), None);
        assert_eq!(try_match_with(&env, "i like @shapes", "i like red"), None);
    }

    #[test]
    fn variables_resolve_at_match_time() {
        let mut env = Env::default();
        env.vars.insert("name".to_string(), "Aiden".to_string());
        assert_eq!(try_match_with(&env, "is your name <bot name>", "is your name aiden"), Some(vec![]));
        assert_eq!(try_match_with(&env, "is your name <bot name>", "is your name bob"), None);
    }

    #[test]
    fn same_input_same_alignment() {
        let first = try_match("* [very] *", "i am very very tired");
        for _ in 0..5 {
            assert_eq!(try_match("* [very] *", "i am very very tired"), first);
        }
    }
}
