use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::engine::{Frozen, ReplyMetrics, Resolver, SortedIndex, topic_levels};
use crate::objects::{ObjectHandler, ObjectRegistry, Subroutine};
use crate::script::{self, ast};
use crate::users::{ThawAction, UserStore};
use crate::{Brain, ERR_DEEP_RECURSION, LoadError, ReplyError};

/// Options that affect loading and reply behavior.
#[derive(Debug, Clone)]
pub struct Options {
    /// Skip triggers that fail the syntax checks instead of loading them anyway.
    pub strict: bool,
    /// Maximum redirect / inline-redirect / macro nesting per reply.
    pub depth: usize,
    /// Keep non-ASCII letters in messages (and allow them in triggers).
    pub utf8: bool,
    /// Characters stripped from messages in UTF-8 mode.
    pub unicode_punctuation: Regex,
    /// Whether `%` triggers of inherited topics stay reachable.
    pub inherit_that_triggers: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict: true,
            depth: 50,
            utf8: false,
            unicode_punctuation: regex!(r"[.,!?;:]").clone(),
            inherit_that_triggers: true,
        }
    }
}

/// Result from [`Bot::reply_verbose`].
#[derive(Debug, Clone)]
pub struct ReplyDetails {
    pub reply: String,
    /// The message after normalisation, as it was matched.
    pub input: String,
    /// The user's topic after the reply.
    pub topic: String,
    /// Pattern of the last trigger matched while producing the reply.
    pub matched: Option<String>,
    pub metrics: ReplyMetrics,
}

impl ReplyDetails {
    pub fn elapsed(&self) -> Duration {
        self.metrics.total
    }
}

/// A sorted trigger as seen from one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedTrigger {
    pub pattern: String,
    /// The topic that defines the trigger (differs for included/inherited ones).
    pub topic: String,
    pub bucket: &'static str,
    pub previous: Option<String>,
}

/// A compact description of one topic, for dumps and debugging.
#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub name: String,
    pub includes: Vec<String>,
    pub inherits: Vec<String>,
    /// Triggers in load order.
    pub triggers: Vec<String>,
    /// Topics visible from this one, per inheritance level.
    pub levels: Vec<Vec<String>>,
    /// Matching order, empty until [`Bot::sort_replies`] has run.
    pub sorted: Vec<SortedTrigger>,
    /// `%` triggers in matching order.
    pub thats: Vec<SortedTrigger>,
}

/// A chatbot: loaded scripts, sort buffers, macros and per-user state.
///
/// Loading and sorting take `&mut self`; replying takes `&self`, so a sorted
/// bot can be shared between threads (for example in an `Arc`) and serve
/// many users at once.
///
/// ```
/// use rivescript::{Bot, Options};
///
/// let mut bot = Bot::new(Options::default());
/// bot.stream("+ hello bot\n- Hello, human!");
/// bot.sort_replies();
/// assert_eq!(bot.reply("alice", "Hello bot").unwrap(), "Hello, human!");
/// ```
#[derive(Debug, Default)]
pub struct Bot {
    options: Options,
    brain: Brain,
    sorted: Option<SortedIndex>,
    users: UserStore,
    objects: ObjectRegistry,
}

impl Bot {
    pub fn new(options: Options) -> Self {
        Self { options, ..Self::default() }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    // --- Loading ----------------------------------------------------------------

    /// Load script source held in memory.
    pub fn stream(&mut self, code: &str) {
        self.load_source("stream()", code);
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let code = std::fs::read_to_string(path)
            .map_err(|source| LoadError::Io { path: path.display().to_string(), source })?;
        log::info!("loading {}", path.display());
        self.load_source(&path.display().to_string(), &code);
        Ok(())
    }

    /// Load every file in `dir` whose extension is listed (`.rive` and `.rs`
    /// when `extensions` is empty), in file name order. Returns the number of
    /// files loaded.
    pub fn load_directory(&mut self, dir: impl AsRef<Path>, extensions: &[&str]) -> Result<usize, LoadError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LoadError::NotADirectory(dir.display().to_string()));
        }
        let io_err = |source| LoadError::Io { path: dir.display().to_string(), source };
        let extensions: Vec<&str> = if extensions.is_empty() { vec![".rive", ".rs"] } else { extensions.to_vec() };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let wanted = path.is_file()
                && path.extension().and_then(|e| e.to_str()).is_some_and(|ext| {
                    extensions.iter().any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
                });
            if wanted {
                files.push(path);
            }
        }
        files.sort();

        for path in &files {
            self.load_file(path)?;
        }
        Ok(files.len())
    }

    /// Merge an already parsed document.
    pub fn load_ast(&mut self, root: ast::Root) {
        script::ingest(&mut self.brain, &mut self.objects, root);
        self.sorted = None;
    }

    fn load_source(&mut self, name: &str, code: &str) {
        let root = script::parse(name, code, &self.options);
        self.load_ast(root);
    }

    /// Build the sort buffers. Required after loading and before replying.
    pub fn sort_replies(&mut self) {
        let start = Instant::now();
        self.sorted = Some(SortedIndex::build(&self.brain, &self.options));
        log::info!("sorted {} topics in {:?}", self.brain.topics.len(), start.elapsed());
    }

    // --- Replies ----------------------------------------------------------------

    /// Reply to `message` from `user`.
    ///
    /// Script-level problems come back as reply text (see the `ERR_*`
    /// constants); the only error is replying before [`Bot::sort_replies`].
    pub fn reply(&self, user: &str, message: &str) -> Result<String, ReplyError> {
        Ok(self.reply_verbose(user, message)?.reply)
    }

    /// Like [`Bot::reply`], with what matched and how long it took.
    pub fn reply_verbose(&self, user: &str, message: &str) -> Result<ReplyDetails, ReplyError> {
        let start = Instant::now();
        let sorted = self.sorted.as_ref().ok_or(ReplyError::NotSorted)?;
        let frozen = Frozen { brain: &self.brain, sorted, objects: &self.objects, options: &self.options };

        let record = self.users.record(user);
        let mut record = record.lock();
        let mut resolver = Resolver::new(frozen, user, &mut record);
        let outcome = resolver.respond(message);
        let input = resolver.input().to_string();
        let mut metrics =
            ReplyMetrics { deepest: resolver.deepest(), patterns_tested: resolver.patterns_tested(), ..Default::default() };

        let reply = match outcome {
            Ok(reply) => {
                record.push_history(&input, &reply);
                reply
            }
            Err(ReplyError::DeepRecursion(depth)) => {
                log::warn!("reply for user {user} gave up at depth {depth}");
                ERR_DEEP_RECURSION.to_string()
            }
            Err(err) => return Err(err),
        };
        metrics.total = start.elapsed();

        Ok(ReplyDetails { reply, input, topic: record.topic().to_string(), matched: record.last_match.clone(), metrics })
    }

    // --- Macros -----------------------------------------------------------------

    /// Register a Rust function callable as `<call>name args</call>`.
    pub fn set_subroutine<F>(&mut self, name: &str, subroutine: F)
    where
        F: Subroutine + 'static,
    {
        self.objects.set_subroutine(name, Arc::new(subroutine));
    }

    /// Register the handler for `> object name <language>` blocks. Blocks
    /// loaded before their handler was registered are not retried.
    pub fn set_handler(&mut self, language: &str, handler: impl ObjectHandler + 'static) {
        self.objects.set_handler(language, Box::new(handler));
    }

    // --- Bot state --------------------------------------------------------------

    pub fn set_variable(&self, name: &str, value: &str) {
        script::define(&mut self.brain.vars.write(), name, value);
    }

    pub fn get_variable(&self, name: &str) -> String {
        self.brain.bot_var(name)
    }

    pub fn set_global(&self, name: &str, value: &str) {
        script::define(&mut self.brain.globals.write(), name, value);
    }

    pub fn get_global(&self, name: &str) -> String {
        self.brain.global(name)
    }

    /// Add or (with `<undef>`) remove a substitution. Takes effect at the next
    /// [`Bot::sort_replies`].
    pub fn set_substitution(&mut self, pattern: &str, output: &str) {
        script::define(&mut self.brain.subs, &pattern.to_lowercase(), output);
        self.sorted = None;
    }

    /// Same as [`Bot::set_substitution`] for the `{person}` table.
    pub fn set_person(&mut self, pattern: &str, output: &str) {
        script::define(&mut self.brain.person, &pattern.to_lowercase(), output);
        self.sorted = None;
    }

    // --- User state -------------------------------------------------------------

    pub fn set_uservar(&self, user: &str, name: &str, value: &str) {
        self.users.set_var(user, name, value);
    }

    pub fn set_uservars(&self, user: &str, vars: &HashMap<String, String>) {
        self.users.set_vars(user, vars);
    }

    /// `"undefined"` when the user or the variable does not exist.
    pub fn get_uservar(&self, user: &str, name: &str) -> String {
        self.users.get_var(user, name)
    }

    pub fn get_uservars(&self, user: &str) -> Option<HashMap<String, String>> {
        self.users.vars(user)
    }

    pub fn clear_uservars(&self, user: &str) {
        self.users.clear(user);
    }

    pub fn clear_all_uservars(&self) {
        self.users.clear_all();
    }

    /// Snapshot a user's variables and history. `false` for unknown users.
    pub fn freeze_uservars(&self, user: &str) -> bool {
        self.users.freeze(user)
    }

    /// Restore and/or drop a snapshot. `false` when none exists.
    pub fn thaw_uservars(&self, user: &str, action: ThawAction) -> bool {
        self.users.thaw(user, action)
    }

    /// Pattern of the trigger that produced the user's last reply.
    pub fn last_match(&self, user: &str) -> Option<String> {
        self.users.last_match(user)
    }

    pub fn users(&self) -> Vec<String> {
        self.users.user_ids()
    }

    // --- Introspection ----------------------------------------------------------

    /// One summary per topic, sorted by name.
    pub fn topic_summaries(&self) -> Vec<TopicSummary> {
        let mut names: Vec<&String> = self.brain.topics.keys().collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| {
                let topic = self.brain.topics.get(name)?;
                let describe = |entries: Option<&Vec<crate::engine::SortedEntry>>| {
                    entries
                        .map(|entries| {
                            entries
                                .iter()
                                .map(|e| SortedTrigger {
                                    pattern: e.pattern.clone(),
                                    topic: e.trigger.topic.clone(),
                                    bucket: e.trigger.pattern.bucket().label(),
                                    previous: e.trigger.previous.as_ref().map(|p| p.text.clone()),
                                })
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default()
                };
                let sorted = self.sorted.as_ref();
                Some(TopicSummary {
                    name: name.clone(),
                    includes: topic.includes.clone(),
                    inherits: topic.inherits.clone(),
                    triggers: topic.triggers.iter().map(|t| t.pattern.text.clone()).collect(),
                    levels: topic_levels(&self.brain.topics, name),
                    sorted: describe(sorted.and_then(|s| s.topics.get(name))),
                    thats: describe(sorted.and_then(|s| s.thats.get(name))),
                })
            })
            .collect()
    }
}
