use rivescript::{ReplyDetails, SortedTrigger, TopicSummary};

/// What a piece of report text is, mapped to an SGR code when color is on.
#[derive(Clone, Copy)]
enum Role {
    Rule,
    Input,
    Matched,
    Topic,
    Count,
    Previous,
    Faint,
}

impl Role {
    fn sgr(self) -> &'static str {
        match self {
            Role::Rule => "90",
            Role::Input => "36",
            Role::Matched => "1;32",
            Role::Topic => "34",
            Role::Count | Role::Previous => "33",
            Role::Faint => "2",
        }
    }
}

struct Painter {
    color: bool,
}

impl Painter {
    fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, role: Role, text: impl AsRef<str>) -> String {
        if self.color { format!("\x1b[{}m{}\x1b[0m", role.sgr(), text.as_ref()) } else { text.as_ref().to_string() }
    }

    fn rule(&self, title: &str) -> String {
        self.paint(Role::Rule, format!("━━━ {title} ━━━"))
    }
}

fn field(p: &Painter, label: &str, value: String) -> String {
    format!("  {} {}", p.paint(Role::Faint, format!("{label}:")), value)
}

pub fn print_reply(details: &ReplyDetails, color: bool) {
    let p = Painter::new(color);
    println!("{}", p.rule("Trace"));
    println!("{}", field(&p, "input", p.paint(Role::Input, format!("\"{}\"", details.input))));
    let matched = match &details.matched {
        Some(pattern) => p.paint(Role::Matched, pattern),
        None => p.paint(Role::Faint, "✗ nothing"),
    };
    println!("{}", field(&p, "matched", matched));
    println!("{}", field(&p, "topic", p.paint(Role::Topic, &details.topic)));
    println!(
        "  {:?}  │  depth {}  │  {} patterns tested",
        details.elapsed(),
        p.paint(Role::Count, details.metrics.deepest.to_string()),
        p.paint(Role::Count, details.metrics.patterns_tested.to_string()),
    );
}

pub fn print_topics(topics: &[TopicSummary], color: bool) {
    let p = Painter::new(color);
    for topic in topics {
        println!("\n{}", p.rule(&topic.name));
        if !topic.includes.is_empty() {
            println!("{}", field(&p, "includes", p.paint(Role::Topic, topic.includes.join(", "))));
        }
        if !topic.inherits.is_empty() {
            println!("{}", field(&p, "inherits", p.paint(Role::Topic, topic.inherits.join(", "))));
        }
        for (depth, level) in topic.levels.iter().enumerate() {
            println!("{}", field(&p, &format!("level {depth}"), level.join(", ")));
        }
        for trigger in &topic.triggers {
            println!("    + {}", p.paint(Role::Input, trigger));
        }
    }
    println!();
}

pub fn print_sorted(topics: &[TopicSummary], color: bool) {
    let p = Painter::new(color);
    for topic in topics {
        println!("\n{}", p.rule(&topic.name));
        if topic.sorted.is_empty() && topic.thats.is_empty() {
            println!("  {}", p.paint(Role::Faint, "not sorted, or no triggers"));
            continue;
        }
        if !topic.thats.is_empty() {
            println!("  {}", p.paint(Role::Previous, "%previous"));
            for (idx, entry) in topic.thats.iter().enumerate() {
                println!("{}", sorted_line(&p, &topic.name, idx, entry));
            }
        }
        for (idx, entry) in topic.sorted.iter().enumerate() {
            println!("{}", sorted_line(&p, &topic.name, idx, entry));
        }
    }
    println!();
}

fn sorted_line(p: &Painter, topic: &str, idx: usize, entry: &SortedTrigger) -> String {
    let mut line = format!(
        "  {} {} {}",
        p.paint(Role::Rule, format!("[{idx}]")),
        p.paint(Role::Matched, &entry.pattern),
        p.paint(Role::Faint, format!("│ {}", entry.bucket)),
    );
    if entry.topic != topic {
        line.push_str(&p.paint(Role::Faint, format!(" │ from {}", entry.topic)));
    }
    if let Some(previous) = &entry.previous {
        line.push_str(&p.paint(Role::Previous, format!(" │ % {previous}")));
    }
    line
}
