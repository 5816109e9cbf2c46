//! Input normalisation (message pre-processing).
//!
//! Every message is reduced to a canonical word stream before it meets a
//! pattern:
//!
//! ```text
//! "What's   your NAME?" ── lowercase ──▶ "what's   your name?"
//!                       ── sub table ──▶ "what is   your name?"
//!                       ── punctuation ▶ "what is   your name"
//!                       ── whitespace ─▶ "what is your name"
//! ```
//!
//! The previous bot reply (for `%` matching) and redirect targets go through
//! the same steps minus the substitution table.
//!
//! ## Punctuation
//!
//! - Default mode keeps only ASCII letters, digits and whitespace.
//! - UTF-8 mode removes `\`, `/` and whatever `Options::unicode_punctuation`
//!   matches, leaving non-ASCII letters intact.

use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::Options;

/// A compiled word-substitution table (`! sub` or `! person`).
///
/// All keys are folded into one alternation, longest phrase first, and
/// applied in a single left-to-right pass so a replacement is never itself
/// substituted again.
#[derive(Debug, Clone, Default)]
pub(crate) struct Substitutions {
    matcher: Option<Regex>,
    table: HashMap<String, String>,
}

impl Substitutions {
    pub fn new(source: &HashMap<String, String>) -> Self {
        let table: HashMap<String, String> = source
            .iter()
            .filter(|(k, _)| !k.trim().is_empty())
            .map(|(k, v)| (k.trim().to_lowercase(), v.clone()))
            .collect();
        if table.is_empty() {
            return Substitutions::default();
        }

        let mut keys: Vec<&String> = table.keys().collect();
        keys.sort_by(|a, b| {
            let words = |s: &str| s.split_whitespace().count();
            words(b).cmp(&words(a)).then(b.len().cmp(&a.len())).then(a.cmp(b))
        });

        let alternation = keys
            .iter()
            .map(|key| {
                let open = if key.starts_with(is_word_char) { r"\b" } else { "" };
                let close = if key.ends_with(is_word_char) { r"\b" } else { "" };
                format!("{open}{}{close}", regex::escape(key))
            })
            .collect::<Vec<_>>()
            .join("|");

        match Regex::new(&format!("(?i)(?:{alternation})")) {
            Ok(matcher) => Substitutions { matcher: Some(matcher), table },
            Err(err) => {
                log::warn!("substitution table could not be compiled: {err}");
                Substitutions::default()
            }
        }
    }

    pub fn apply(&self, text: &str) -> String {
        let Some(matcher) = &self.matcher else {
            return text.to_string();
        };
        matcher
            .replace_all(text, |caps: &Captures| {
                self.table.get(&caps[0].to_lowercase()).cloned().unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Canonicalise `text` for matching. `subs` is `None` for bot replies and
/// redirect targets.
pub(crate) fn normalize(text: &str, subs: Option<&Substitutions>, options: &Options) -> String {
    let mut text = text.to_lowercase();
    if let Some(subs) = subs {
        text = subs.apply(&text);
    }

    let stripped = if options.utf8 {
        let text = regex!(r"[\\/]").replace_all(&text, "");
        options.unicode_punctuation.replace_all(&text, "").into_owned()
    } else {
        regex!(r"[^a-z0-9\s]").replace_all(&text, "").into_owned()
    };

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn strips_punctuation_and_spacing() {
        let opts = Options::default();
        assert_eq!(normalize("  Hello,   BOT!! ", None, &opts), "hello bot");
        assert_eq!(normalize("what's up?", None, &opts), "whats up");
    }

    #[test]
    fn substitutions_run_before_stripping() {
        let subs = Substitutions::new(&table(&[("what's", "what is"), ("i'm", "i am")]));
        let opts = Options::default();
        assert_eq!(normalize("What's up? I'm bored.", Some(&subs), &opts), "what is up i am bored");
    }

    #[test]
    fn longest_phrase_wins_and_no_resubstitution() {
        let subs = Substitutions::new(&table(&[("i am", "you are"), ("you are", "I am"), ("i", "you")]));
        assert_eq!(subs.apply("i am sure you are right"), "you are sure I am right");
        assert_eq!(subs.apply("i think"), "you think");
        // Whole words only.
        assert_eq!(subs.apply("ice"), "ice");
    }

    #[test]
    fn utf8_mode_keeps_letters() {
        let opts = Options { utf8: true, ..Options::default() };
        assert_eq!(normalize("Ça va? Très bien/merci.", None, &opts), "ça va très bienmerci");
    }

    #[test]
    fn empty_table_is_identity() {
        let subs = Substitutions::new(&HashMap::new());
        assert_eq!(subs.len(), 0);
        assert_eq!(subs.apply("anything at all"), "anything at all");
    }
}
