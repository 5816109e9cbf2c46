use thiserror::Error;

/// Errors raised while reading scripts from disk.
///
/// Syntax problems inside a script are not errors: they are logged with their
/// location and the offending line is skipped.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not a directory: {0}")]
    NotADirectory(String),
}

/// Errors surfaced by [`Bot::reply`](crate::Bot::reply).
///
/// Everything a script can cause (no match, runaway redirects, failing macros)
/// is turned into reply text instead; only misuse of the engine reaches the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("replies are not sorted; call sort_replies() after loading")]
    NotSorted,

    /// Internal: unwinds a resolution that went past the depth limit. `reply`
    /// converts it into [`ERR_DEEP_RECURSION`](crate::ERR_DEEP_RECURSION).
    #[error("deep recursion detected at depth {0}")]
    DeepRecursion(usize),
}

/// Failure reported by an object macro.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    #[error("{0}")]
    Failed(String),

    #[error("no handler for language {0}")]
    UnsupportedLanguage(String),
}
