//! Reply tag expansion.
//!
//! Tags are expanded in a fixed order, each stage seeing the output of the
//! previous one:
//!
//! 1. shortcuts (`<person>`, `<formal>`, `<@>` ...) become their long forms
//! 2. captures and history: `<star>`, `<botstar>`, `<input>`, `<reply>`, `<id>`
//! 3. escapes: `\s`, `\n`, `\#`
//! 4. `{random}...{/random}` and `(@array)`
//! 5. formatters: `{person}`, `{formal}`, `{sentence}`, `{uppercase}`, `{lowercase}`
//! 6. angle tags, innermost first: `<bot>`, `<env>`, `<get>`, `<set>`, math,
//!    then formatters again for bodies that held angle tags
//! 7. `{topic=...}`
//! 8. inline redirects `{@...}`
//! 9. `<call>...</call>`
//!
//! Text that comes from outside the template (captures, variables, macro
//! output) is spliced in with its `<>{}` swapped for private-use characters,
//! so it is never parsed as a tag; the swap is undone once at the end.

use rand::seq::SliceRandom;
use regex::{Captures, Regex};

use super::normalize::normalize;
use super::resolve::{Hit, Mode, Resolver};
use crate::{ReplyError, UNDEFINED};

const SHIELD: [(char, char); 4] = [('<', '\u{E000}'), ('>', '\u{E001}'), ('{', '\u{E002}'), ('}', '\u{E003}')];

fn protect(text: &str) -> String {
    text.chars().map(|c| SHIELD.iter().find(|(raw, _)| *raw == c).map_or(c, |(_, safe)| *safe)).collect()
}

fn unprotect(text: &str) -> String {
    text.chars().map(|c| SHIELD.iter().find(|(_, safe)| *safe == c).map_or(c, |(raw, _)| *raw)).collect()
}

impl Resolver<'_> {
    /// Expand every tag in `template` for the trigger in `hit`.
    pub(super) fn process_tags(&mut self, template: &str, hit: &Hit, depth: usize) -> Result<String, ReplyError> {
        let text = expand_shortcuts(template);
        let text = self.expand_captures(&text, hit);
        let text = expand_escapes(&text);
        let text = self.expand_random(&text);
        let text = self.expand_formatters(&text);
        let text = self.expand_angle_tags(&text);
        let text = self.expand_formatters(&text);
        let text = self.expand_topic(&text);
        let text = self.expand_inline_redirects(&text, depth)?;
        let text = self.expand_calls(&text, depth)?;
        Ok(unprotect(&text))
    }

    fn expand_captures(&self, text: &str, hit: &Hit) -> String {
        let text = regex!(r"<(star|botstar|input|reply)(\d*)>").replace_all(text, |caps: &Captures| {
            let index = caps[2].parse::<usize>().unwrap_or(1);
            let nth = |list: &[String]| index.checked_sub(1).and_then(|i| list.get(i)).cloned();
            let value = match &caps[1] {
                "star" => nth(hit.stars.as_slice()),
                "botstar" => nth(hit.botstars.as_slice()),
                "input" => self.user.input(index),
                _ => self.user.reply(index),
            };
            protect(&value.unwrap_or_else(|| UNDEFINED.to_string()))
        });
        text.replace("<id>", &protect(self.user_id))
    }

    fn expand_random(&self, text: &str) -> String {
        let mut rng = rand::thread_rng();
        let text = regex!(r"(?s)\{random\}(.*?)\{/random\}").replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let choices: Vec<&str> =
                if body.contains('|') { body.split('|').collect() } else { body.split_whitespace().collect() };
            choices.choose(&mut rng).map(|c| c.trim().to_string()).unwrap_or_default()
        });
        regex!(r"\(@([A-Za-z0-9_]+)\)")
            .replace_all(&text, |caps: &Captures| match self.frozen.brain.arrays.get(&caps[1]) {
                Some(items) => items.choose(&mut rng).map(|item| protect(item)).unwrap_or_default(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn expand_formatters(&self, text: &str) -> String {
        let formatters: [(&Regex, fn(&Resolver<'_>, &str) -> String); 5] = [
            (regex!(r"\{person\}([^{}<>]*)\{/person\}"), |r, s| r.frozen.sorted.person.apply(s)),
            (regex!(r"\{formal\}([^{}<>]*)\{/formal\}"), |_, s| {
                s.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
            }),
            (regex!(r"\{sentence\}([^{}<>]*)\{/sentence\}"), |_, s| capitalize(s)),
            (regex!(r"\{uppercase\}([^{}<>]*)\{/uppercase\}"), |_, s| s.to_uppercase()),
            (regex!(r"\{lowercase\}([^{}<>]*)\{/lowercase\}"), |_, s| s.to_lowercase()),
        ];

        let mut text = text.to_string();
        loop {
            let mut changed = false;
            for (re, format) in &formatters {
                if re.is_match(&text) {
                    text = re
                        .replace_all(&text, |caps: &Captures| {
                            let inner = unprotect(&caps[1]);
                            protect(&format(self, &inner))
                        })
                        .into_owned();
                    changed = true;
                }
            }
            if !changed {
                return text;
            }
        }
    }

    /// `<bot>`, `<env>`, `<get>`, `<set>` and math tags, innermost first so
    /// `<set name=<get other>>` sees the expanded value. Unknown tags stay.
    fn expand_angle_tags(&mut self, text: &str) -> String {
        let re = regex!(r"<([^<>]+)>");
        let mut text = text.to_string();
        let mut cursor = 0;

        while let Some((range, tag)) =
            re.captures_at(&text, cursor).and_then(|caps| Some((caps.get(0)?.range(), caps[1].to_string())))
        {
            match self.angle_tag(&tag) {
                Some(value) => {
                    let start = range.start;
                    text.replace_range(range, &protect(&value));
                    cursor = text[..start].rfind('<').unwrap_or(start);
                }
                None => cursor = range.end,
            }
        }
        text
    }

    fn angle_tag(&mut self, tag: &str) -> Option<String> {
        let (kind, data) = match tag.trim().split_once(char::is_whitespace) {
            Some((kind, data)) => (kind, data.trim()),
            None => (tag.trim(), ""),
        };
        let assignment = data.split_once('=').map(|(name, value)| (name.trim(), unprotect(value.trim())));
        let brain = self.frozen.brain;

        match (kind, assignment) {
            ("bot", None) => Some(brain.bot_var(data)),
            ("bot", Some((name, value))) => {
                crate::script::define(&mut brain.vars.write(), name, &value);
                Some(String::new())
            }
            ("env", None) => Some(brain.global(data)),
            ("env", Some((name, value))) => {
                crate::script::define(&mut brain.globals.write(), name, &value);
                Some(String::new())
            }
            ("get", None) => Some(self.user.get(data)),
            ("set", Some((name, value))) => {
                self.user.set(name, &value);
                Some(String::new())
            }
            ("add" | "sub" | "mult" | "div", Some((name, value))) => Some(self.math(kind, name, &value)),
            _ => None,
        }
    }

    /// Apply a math tag to a user variable. Returns the inline text: empty on
    /// success, an `[ERR: ...]` marker otherwise.
    fn math(&mut self, op: &str, name: &str, value: &str) -> String {
        let Ok(operand) = value.parse::<i64>() else {
            return format!("[ERR: Math can't '{op}' non-numeric value '{value}']");
        };
        let current = self.user.get(name);
        let current = if current == UNDEFINED {
            0
        } else {
            match current.parse::<i64>() {
                Ok(n) => n,
                Err(_) => return format!("[ERR: Math can't '{op}' non-numeric user variable '{name}']"),
            }
        };

        let result = match op {
            "add" => current.checked_add(operand),
            "sub" => current.checked_sub(operand),
            "mult" => current.checked_mul(operand),
            _ if operand == 0 => return "[ERR: Can't Divide By Zero]".to_string(),
            _ => current.checked_div(operand),
        };
        match result {
            Some(n) => {
                self.user.set(name, &n.to_string());
                String::new()
            }
            None => format!("[ERR: Math overflow in '{op}' on '{name}']"),
        }
    }

    fn expand_topic(&mut self, text: &str) -> String {
        let user = &mut *self.user;
        regex!(r"\{topic=([^{}]+)\}")
            .replace_all(text, |caps: &Captures| {
                user.set_topic(&unprotect(&caps[1]));
                ""
            })
            .into_owned()
    }

    fn expand_inline_redirects(&mut self, text: &str, depth: usize) -> Result<String, ReplyError> {
        let re = regex!(r"\{@([^{}]*)\}");
        let mut text = text.to_string();
        while let Some((range, target)) =
            re.captures(&text).and_then(|caps| Some((caps.get(0)?.range(), unprotect(&caps[1]))))
        {
            let target = normalize(&target, None, self.frozen.options);
            let reply = self.get_reply(&target, Mode::Normal, depth + 1)?;
            text.replace_range(range, &protect(&reply));
        }
        Ok(text)
    }

    fn expand_calls(&mut self, text: &str, depth: usize) -> Result<String, ReplyError> {
        let re = regex!(r"(?s)<call>(.*?)</call>");
        let mut text = text.to_string();
        while let Some((range, body)) =
            re.captures(&text).and_then(|caps| Some((caps.get(0)?.range(), unprotect(&caps[1]))))
        {
            if depth + 1 > self.frozen.options.depth {
                return Err(ReplyError::DeepRecursion(depth + 1));
            }

            let mut args = split_args(&body);
            let output = if args.is_empty() {
                String::new()
            } else {
                let name = args.remove(0);
                log::debug!("[call] {name} {args:?}");
                let mut ctx = crate::CallContext::new(self.user_id, self.user, self.frozen.brain);
                self.frozen.objects.invoke(&mut ctx, &name, &args)
            };
            text.replace_range(range, &protect(&output));
        }
        Ok(text)
    }
}

fn expand_shortcuts(text: &str) -> String {
    text.replace("<person>", "{person}<star>{/person}")
        .replace("<@>", "{@<star>}")
        .replace("<formal>", "{formal}<star>{/formal}")
        .replace("<sentence>", "{sentence}<star>{/sentence}")
        .replace("<uppercase>", "{uppercase}<star>{/uppercase}")
        .replace("<lowercase>", "{lowercase}<star>{/lowercase}")
}

fn expand_escapes(text: &str) -> String {
    text.replace("\\s", " ").replace("\\n", "\n").replace("\\#", "#")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split macro arguments on whitespace, keeping `"quoted strings"` whole.
fn split_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.trim().chars() {
        match c {
            '"' => {
                if quoted || !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shielding_is_reversible() {
        let raw = "<b>{x}</b> plain";
        let safe = protect(raw);
        assert!(!safe.contains('<') && !safe.contains('{'));
        assert_eq!(unprotect(&safe), raw);
    }

    #[test]
    fn shortcuts_expand_to_star_forms() {
        assert_eq!(expand_shortcuts("hi <formal>"), "hi {formal}<star>{/formal}");
        assert_eq!(expand_shortcuts("<@>"), "{@<star>}");
    }

    #[test]
    fn capitalize_handles_unicode_and_empty() {
        assert_eq!(capitalize("émile"), "Émile");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn args_respect_quotes() {
        assert_eq!(split_args(r#"greet bob "new york" 3"#), vec!["greet", "bob", "new york", "3"]);
        assert_eq!(split_args("  "), Vec::<String>::new());
        assert_eq!(split_args(r#"say """#), vec!["say", ""]);
    }
}
