//! Trigger pattern compilation.
//!
//! A pattern such as `what is [the] (name|title) of *` is compiled once, at load
//! time, into a flat list of [`Atom`]s. Optional and alternation groups nest
//! their alternatives as atom lists of their own, so the matcher can backtrack
//! through them without ever re-reading the pattern text.
//!
//! Nothing here depends on the loaded arrays or variables: `@array`,
//! `<bot name>` and `<get name>` are kept symbolic and resolved at match time,
//! which keeps a compiled pattern valid across later loads.
//!
//! The [`PatternFlags`] mask summarises which features occur anywhere in the
//! pattern (including inside groups). The sorter uses it to pick a priority
//! bucket; see `sorter.rs`.

bitflags::bitflags! {
    /// Features present anywhere in a pattern.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PatternFlags: u8 {
        const ALPHA       = 1 << 0;
        const NUMBER      = 1 << 1;
        const WILD        = 1 << 2;
        const OPTIONAL    = 1 << 3;
        const ALTERNATION = 1 << 4;
        const ARRAY       = 1 << 5;
        const VARIABLE    = 1 << 6;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// A literal, lower-cased word.
    Word(String),
    /// `*`: one or more words.
    Star,
    /// `#`: one all-digit word.
    Pound,
    /// `_`: one all-alphabetic word.
    Under,
    /// `[a|b c]`: one alternative or nothing. Never captures.
    Optional(Vec<Vec<Atom>>),
    /// `(a|b c)`: exactly one alternative. Captures the words it consumed.
    Group(Vec<Vec<Atom>>),
    /// `@name`: any entry of the named array.
    Array(String),
    /// `<bot name>`
    BotVar(String),
    /// `<get name>`
    UserVar(String),
}

/// Priority class of a pattern, in matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Atomic,
    Optional,
    Alpha,
    Number,
    Wild,
    LonePound,
    LoneUnder,
    LoneStar,
}

impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Bucket::Atomic,
        Bucket::Optional,
        Bucket::Alpha,
        Bucket::Number,
        Bucket::Wild,
        Bucket::LonePound,
        Bucket::LoneUnder,
        Bucket::LoneStar,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Atomic => "atomic",
            Bucket::Optional => "optional",
            Bucket::Alpha => "alpha",
            Bucket::Number => "number",
            Bucket::Wild => "wild",
            Bucket::LonePound => "lone #",
            Bucket::LoneUnder => "lone _",
            Bucket::LoneStar => "lone *",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub text: String,
    pub atoms: Vec<Atom>,
    pub flags: PatternFlags,
}

impl Pattern {
    pub fn compile(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let atoms = parse_sequence(&chars);
        let flags = flags_of(&atoms);
        Pattern { text: text.trim().to_string(), atoms, flags }
    }

    /// Which priority bucket this pattern sorts into.
    ///
    /// When several features are present the wildcard classes win, in the
    /// order `_`, `#`, `*`; optionals only decide the bucket of an otherwise
    /// wildcard-free pattern.
    pub fn bucket(&self) -> Bucket {
        match self.atoms.as_slice() {
            [Atom::Pound] => Bucket::LonePound,
            [Atom::Under] => Bucket::LoneUnder,
            [Atom::Star] => Bucket::LoneStar,
            _ if self.flags.contains(PatternFlags::ALPHA) => Bucket::Alpha,
            _ if self.flags.contains(PatternFlags::NUMBER) => Bucket::Number,
            _ if self.flags.contains(PatternFlags::WILD) => Bucket::Wild,
            _ if self.flags.contains(PatternFlags::OPTIONAL) => Bucket::Optional,
            _ => Bucket::Atomic,
        }
    }

    /// Top-level tokens that must match a fixed word: everything but
    /// wildcards and optionals. A whole `(..)` group counts once.
    pub fn literal_count(&self) -> usize {
        self.atoms.iter().filter(|a| !matches!(a, Atom::Star | Atom::Pound | Atom::Under | Atom::Optional(_))).count()
    }

    /// The rank used inside a bucket, higher first.
    pub fn rank(&self) -> usize {
        self.literal_count()
    }
}

fn parse_sequence(chars: &[char]) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '[' | '(' => {
                let close = if c == '[' { ']' } else { ')' };
                let end = find_closing(chars, i, c, close);
                let alternatives = split_alternatives(&chars[i + 1..end]).into_iter().map(parse_sequence).collect();
                atoms.push(if c == '[' { Atom::Optional(alternatives) } else { Atom::Group(alternatives) });
                i = end + 1;
            }
            // Inline markers such as `{weight=10}` are not part of the pattern.
            '{' => i = find_closing(chars, i, '{', '}') + 1,
            '<' => {
                let end = chars[i..].iter().position(|&ch| ch == '>').map_or(chars.len(), |p| i + p);
                let tag: String = chars[i + 1..end].iter().collect();
                atoms.push(tag_atom(&tag));
                i = end + 1;
            }
            '@' => {
                let name: String = chars[i + 1..].iter().take_while(|ch| ch.is_alphanumeric() || **ch == '_').collect();
                i += 1 + name.chars().count();
                if name.is_empty() {
                    atoms.push(Atom::Word("@".to_string()));
                } else {
                    atoms.push(Atom::Array(name));
                }
            }
            _ => {
                let word: String = chars[i..]
                    .iter()
                    .take_while(|ch| !ch.is_whitespace() && !matches!(**ch, '[' | '(' | '<' | '{'))
                    .collect();
                i += word.chars().count();
                atoms.push(match word.as_str() {
                    "*" => Atom::Star,
                    "#" => Atom::Pound,
                    "_" => Atom::Under,
                    _ => Atom::Word(word.to_lowercase()),
                });
            }
        }
    }

    atoms
}

/// Index of the bracket closing the one at `open_at`, or `chars.len()` when
/// it is never closed.
fn find_closing(chars: &[char], open_at: usize, open: char, close: char) -> usize {
    let mut depth = 0usize;
    for (idx, &ch) in chars.iter().enumerate().skip(open_at) {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                return idx;
            }
        }
    }
    chars.len()
}

/// Split on `|` that are not nested inside another group.
fn split_alternatives(chars: &[char]) -> Vec<&[char]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, &ch) in chars.iter().enumerate() {
        match ch {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                parts.push(&chars[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&chars[start..]);
    parts
}

fn tag_atom(tag: &str) -> Atom {
    let tag = tag.trim();
    match tag.split_once(char::is_whitespace) {
        Some(("bot", name)) => Atom::BotVar(name.trim().to_string()),
        Some(("get", name)) => Atom::UserVar(name.trim().to_string()),
        _ => Atom::Word(format!("<{}>", tag.to_lowercase())),
    }
}

fn flags_of(atoms: &[Atom]) -> PatternFlags {
    let nested = |alts: &[Vec<Atom>]| alts.iter().fold(PatternFlags::empty(), |acc, alt| acc | flags_of(alt));
    atoms.iter().fold(PatternFlags::empty(), |acc, atom| {
        acc | match atom {
            Atom::Word(_) => PatternFlags::empty(),
            Atom::Star => PatternFlags::WILD,
            Atom::Pound => PatternFlags::NUMBER,
            Atom::Under => PatternFlags::ALPHA,
            Atom::Optional(alts) => PatternFlags::OPTIONAL | nested(alts.as_slice()),
            Atom::Group(alts) => PatternFlags::ALTERNATION | nested(alts.as_slice()),
            Atom::Array(_) => PatternFlags::ARRAY,
            Atom::BotVar(_) | Atom::UserVar(_) => PatternFlags::VARIABLE,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(w: &str) -> Atom {
        Atom::Word(w.to_string())
    }

    #[test]
    fn compiles_words_and_wildcards() {
        let p = Pattern::compile("add # and #");
        assert_eq!(p.atoms, vec![word("add"), Atom::Pound, word("and"), Atom::Pound]);
        assert_eq!(p.flags, PatternFlags::NUMBER);
        assert_eq!(p.bucket(), Bucket::Number);
        assert_eq!(p.rank(), 2);
    }

    #[test]
    fn compiles_nested_groups() {
        let p = Pattern::compile("what is [the|a] (big red|@colors) thing [*]");
        assert_eq!(
            p.atoms,
            vec![
                word("what"),
                word("is"),
                Atom::Optional(vec![vec![word("the")], vec![word("a")]]),
                Atom::Group(vec![vec![word("big"), word("red")], vec![Atom::Array("colors".to_string())]]),
                word("thing"),
                Atom::Optional(vec![vec![Atom::Star]]),
            ]
        );
        assert!(p.flags.contains(PatternFlags::OPTIONAL | PatternFlags::ALTERNATION | PatternFlags::ARRAY));
        // The `*` hidden in an optional still makes this a wildcard pattern.
        assert_eq!(p.bucket(), Bucket::Wild);
        assert_eq!(p.literal_count(), 4);
    }

    #[test]
    fn lone_wildcards_have_their_own_buckets() {
        assert_eq!(Pattern::compile("*").bucket(), Bucket::LoneStar);
        assert_eq!(Pattern::compile("#").bucket(), Bucket::LonePound);
        assert_eq!(Pattern::compile("_").bucket(), Bucket::LoneUnder);
        assert_eq!(Pattern::compile("_ *").bucket(), Bucket::Alpha);
    }

    #[test]
    fn optional_rank_ignores_optional_words() {
        let p = Pattern::compile("how [are|is] you [today]");
        assert_eq!(p.bucket(), Bucket::Optional);
        assert_eq!(p.rank(), 2);
        assert_eq!(Pattern::compile("hello bot").bucket(), Bucket::Atomic);
    }

    #[test]
    fn wildcards_do_not_add_rank() {
        assert_eq!(Pattern::compile("* says * is *").rank(), 2);
        assert_eq!(Pattern::compile("tell me about *").rank(), 3);
        assert_eq!(Pattern::compile("i am # years [very] old").rank(), 4);
        assert_eq!(Pattern::compile("*").rank(), 0);
    }

    #[test]
    fn groups_rank_as_one_word() {
        assert_eq!(Pattern::compile("i (really really like|love) cats").rank(), 3);
        assert_eq!(Pattern::compile("i like @colors").rank(), 3);
    }

    #[test]
    fn tags_and_markers() {
        let p = Pattern::compile("my name is <bot name>{weight=5}");
        assert_eq!(p.atoms, vec![word("my"), word("name"), word("is"), Atom::BotVar("name".to_string())]);
        assert_eq!(p.bucket(), Bucket::Atomic);

        let p = Pattern::compile("is <get pet> here");
        assert_eq!(p.atoms[1], Atom::UserVar("pet".to_string()));
    }

    #[test]
    fn unclosed_group_consumes_rest() {
        let p = Pattern::compile("hello (there|you");
        assert_eq!(p.atoms.len(), 2);
        assert!(matches!(p.atoms[1], Atom::Group(ref alts) if alts.len() == 2));
    }
}
