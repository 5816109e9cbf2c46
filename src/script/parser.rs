//! Line-oriented script reader.
//!
//! Each non-blank line starts with a command character:
//!
//! ```text
//! ! type name = value     definition (global, var, sub, person, array, local)
//! > begin | topic | object  open a block;  < closes it
//! + pattern               start a trigger
//! - reply                 add a reply (may carry {weight=N})
//! * lhs op rhs => reply   add a condition
//! % pattern               previous bot reply the trigger answers
//! @ target                redirect
//! ^ text                  continue the previous line
//! ```
//!
//! Comments are `//` (whole line or after whitespace) and `/* ... */`.
//! Syntax problems never abort a load: the line is reported through
//! `log::warn!` with its file and line number and skipped.

use crate::script::ast::{ObjectMacro, Root, Trigger};
use crate::{BEGIN_TOPIC, Condition, DEFAULT_TOPIC, Options};

/// Highest script format version this reader understands.
const SUPPORTED_VERSION: f64 = 2.0;

/// How `^` continuations are joined onto `-` replies (`! local concat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Concat {
    None,
    Space,
    Newline,
}

impl Concat {
    fn joiner(self) -> &'static str {
        match self {
            Concat::None => "",
            Concat::Space => " ",
            Concat::Newline => "\n",
        }
    }
}

struct Reader<'a> {
    filename: &'a str,
    options: &'a Options,
    root: Root,
    topic: String,
    /// The trigger being built and the topic it belongs to.
    current: Option<(String, Trigger)>,
    /// Set after a rejected `+` line so its reply lines are dropped too.
    skipping: bool,
    concat: Concat,
}

/// Parse one document. Never fails; see the module docs.
pub fn parse(filename: &str, source: &str, options: &Options) -> Root {
    let mut reader = Reader {
        filename,
        options,
        root: Root::default(),
        topic: DEFAULT_TOPIC.to_string(),
        current: None,
        skipping: false,
        concat: Concat::None,
    };
    reader.run(source);
    reader.root
}

impl Reader<'_> {
    fn run(&mut self, source: &str) {
        let lines: Vec<&str> = source.lines().collect();
        let mut object: Option<ObjectMacro> = None;
        let mut in_comment = false;
        let mut idx = 0;

        while idx < lines.len() {
            let lineno = idx + 1;
            let raw = lines[idx];
            idx += 1;

            // Object bodies are kept verbatim.
            if object.is_some() {
                if raw.trim().starts_with("< object") {
                    self.root.objects.extend(object.take());
                } else if let Some(obj) = object.as_mut() {
                    obj.code.push(raw.to_string());
                }
                continue;
            }

            let mut line = raw.trim();
            if in_comment {
                match line.find("*/") {
                    Some(end) => {
                        in_comment = false;
                        line = line[end + 2..].trim();
                    }
                    None => continue,
                }
            }
            if line.starts_with("//") {
                continue;
            }
            if line.starts_with("/*") {
                in_comment = !line.contains("*/");
                continue;
            }
            if let Some(pos) = line.find(" //").or_else(|| line.find("\t//")) {
                line = line[..pos].trim();
            }
            if line.is_empty() {
                continue;
            }

            let mut chars = line.chars();
            let Some(cmd) = chars.next() else {
                continue;
            };
            let mut data = chars.as_str().trim().to_string();

            // Pull in `^` continuation lines.
            while let Some(rest) = lines.get(idx).and_then(|next| next.trim().strip_prefix('^')) {
                let joiner = match cmd {
                    '-' => self.concat.joiner(),
                    _ => " ",
                };
                data.push_str(joiner);
                data.push_str(rest.trim());
                idx += 1;
            }

            if cmd == '>' && data.split_whitespace().next() == Some("object") {
                self.flush();
                object = Some(self.open_object(&data, lineno));
                continue;
            }
            self.command(cmd, &data, lineno);
        }

        if let Some(obj) = object {
            self.warn(&format!("object '{}' was never closed", obj.name), lines.len());
            self.root.objects.push(obj);
        }
        self.flush();
    }

    fn command(&mut self, cmd: char, data: &str, lineno: usize) {
        match cmd {
            '!' => self.definition(data, lineno),
            '>' => self.open_label(data, lineno),
            '<' => {
                self.flush();
                self.topic = DEFAULT_TOPIC.to_string();
            }
            '+' => self.start_trigger(data, lineno),
            '-' | '*' | '%' | '@' => self.trigger_line(cmd, data, lineno),
            '^' => self.warn("continuation line with nothing to continue", lineno),
            other => self.warn(&format!("unknown command '{other}'"), lineno),
        }
    }

    fn definition(&mut self, data: &str, lineno: usize) {
        let Some((left, value)) = data.split_once('=') else {
            self.warn("definition is missing '='", lineno);
            return;
        };
        let value = value.trim();
        let (kind, name) = match left.trim().split_once(char::is_whitespace) {
            Some((kind, name)) => (kind, name.trim()),
            None => (left.trim(), ""),
        };

        match kind {
            "version" => match value.parse::<f64>() {
                Ok(version) if version <= SUPPORTED_VERSION => {}
                _ => self.warn(&format!("unsupported script version {value}"), lineno),
            },
            "local" => match (name, value) {
                ("concat", "none") => self.concat = Concat::None,
                ("concat", "space") => self.concat = Concat::Space,
                ("concat", "newline") => self.concat = Concat::Newline,
                _ => self.warn(&format!("unknown local option '{name} = {value}'"), lineno),
            },
            _ if name.is_empty() => self.warn(&format!("'{kind}' definition without a name"), lineno),
            "global" => {
                self.root.begin.global.insert(name.to_string(), value.to_string());
            }
            "var" => {
                self.root.begin.var.insert(name.to_string(), value.to_string());
            }
            "sub" => {
                self.root.begin.sub.insert(name.to_lowercase(), value.to_string());
            }
            "person" => {
                self.root.begin.person.insert(name.to_lowercase(), value.to_string());
            }
            "array" => {
                self.root.begin.array.insert(name.to_string(), array_items(value));
            }
            other => self.warn(&format!("unknown definition type '{other}'"), lineno),
        }
    }

    fn open_label(&mut self, data: &str, lineno: usize) {
        self.flush();
        let mut tokens = data.split_whitespace();
        match tokens.next() {
            Some("begin") => self.topic = BEGIN_TOPIC.to_string(),
            Some("topic") => {
                let Some(name) = tokens.next() else {
                    self.warn("topic without a name", lineno);
                    return;
                };
                let name = name.to_lowercase();
                let topic = self.root.topics.entry(name.clone()).or_default();

                let mut mode = None;
                for token in tokens {
                    match token {
                        "includes" | "inherits" => mode = Some(token),
                        other => {
                            let list = match mode {
                                Some("includes") => &mut topic.includes,
                                Some(_) => &mut topic.inherits,
                                None => continue,
                            };
                            let other = other.to_lowercase();
                            if !list.contains(&other) {
                                list.push(other);
                            }
                        }
                    }
                }
                self.topic = name;
            }
            Some(other) => self.warn(&format!("unknown block type '{other}'"), lineno),
            None => self.warn("empty '>' label", lineno),
        }
    }

    fn open_object(&self, data: &str, lineno: usize) -> ObjectMacro {
        let mut tokens = data.split_whitespace().skip(1);
        let Some(name) = tokens.next() else {
            self.warn("object without a name", lineno);
            return ObjectMacro::default();
        };
        let language = tokens.next().unwrap_or_default().to_lowercase();
        if language.is_empty() {
            self.warn(&format!("object '{name}' has no language"), lineno);
        }
        ObjectMacro { name: name.to_string(), language, code: Vec::new() }
    }

    fn start_trigger(&mut self, data: &str, lineno: usize) {
        self.flush();
        if let Err(problem) = check_pattern(data, self.options) {
            self.warn(&format!("bad trigger '{data}': {problem}"), lineno);
            if self.options.strict {
                self.skipping = true;
                return;
            }
        }
        self.current = Some((self.topic.clone(), Trigger { pattern: data.to_string(), ..Trigger::default() }));
    }

    fn trigger_line(&mut self, cmd: char, data: &str, lineno: usize) {
        if self.skipping {
            return;
        }
        if cmd == '*' && Condition::parse(data).is_none() {
            self.warn(&format!("malformed condition '{data}'"), lineno);
            return;
        }
        let Some((_, trigger)) = self.current.as_mut() else {
            self.warn(&format!("'{cmd}' line found before any trigger"), lineno);
            return;
        };
        match cmd {
            '-' => trigger.replies.push(data.to_string()),
            '*' => trigger.conditions.push(data.to_string()),
            '%' => trigger.previous = Some(data.to_string()),
            _ => trigger.redirect = Some(data.to_string()),
        }
    }

    /// Move the trigger being built into its topic.
    fn flush(&mut self) {
        self.skipping = false;
        if let Some((topic, trigger)) = self.current.take() {
            self.root.topics.entry(topic).or_default().triggers.push(trigger);
        }
    }

    fn warn(&self, message: &str, lineno: usize) {
        log::warn!("{message} at {} line {lineno}", self.filename);
    }
}

/// Split an array definition: on `|` when present, else on whitespace.
fn array_items(value: &str) -> Vec<String> {
    let items: Vec<&str> = if value.contains('|') { value.split('|').collect() } else { value.split_whitespace().collect() };
    items.into_iter().map(|item| item.trim().replace("\\s", " ")).filter(|item| !item.is_empty()).collect()
}

/// Syntax checks for a `+` or `%` pattern.
fn check_pattern(pattern: &str, options: &Options) -> Result<(), String> {
    if pattern.is_empty() {
        return Err("empty pattern".to_string());
    }
    if options.utf8 {
        if pattern.chars().any(char::is_uppercase) {
            return Err("triggers may not contain uppercase letters".to_string());
        }
    } else if !regex!(r"^[a-z0-9 *#_@|(){}\[\]<>=]+$").is_match(pattern) {
        return Err("triggers may only contain lowercase letters, numbers and pattern symbols".to_string());
    }

    for (open, close) in [('(', ')'), ('[', ']'), ('{', '}'), ('<', '>')] {
        let opened = pattern.chars().filter(|c| *c == open).count();
        let closed = pattern.chars().filter(|c| *c == close).count();
        if opened != closed {
            return Err(format!("unmatched '{open}'"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_split_on_pipes_or_spaces() {
        assert_eq!(array_items("red blue  green"), vec!["red", "blue", "green"]);
        assert_eq!(array_items("light blue|dark\\sred|"), vec!["light blue", "dark red"]);
    }

    #[test]
    fn pattern_checks() {
        let opts = Options::default();
        assert!(check_pattern("hello [there] (bob|alice) *", &opts).is_ok());
        assert!(check_pattern("Hello", &opts).is_err());
        assert!(check_pattern("hello (there", &opts).is_err());
        assert!(check_pattern("what's up", &opts).is_err());

        let utf8 = Options { utf8: true, ..Options::default() };
        assert!(check_pattern("ça va", &utf8).is_ok());
        assert!(check_pattern("Ça va", &utf8).is_err());
    }
}
