//! Object macros: host functions invoked from replies with `<call>`.
//!
//! Two kinds of macro exist:
//!
//! - [`Subroutine`]s registered directly from Rust (`Bot::set_subroutine`).
//! - Code found in `> object name lang` blocks, handed to the
//!   [`ObjectHandler`] registered for `lang`. Blocks in a language with no
//!   handler are skipped at load time with a warning.
//!
//! A macro that fails or panics is contained: its `<call>` is replaced by an
//! `[ERR: ...]` marker and the rest of the reply is still produced.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::users::UserRecord;
use crate::{Brain, ERR_OBJECT_NOT_FOUND, MacroError};

/// What a macro can see and change while it runs.
///
/// The calling user's record is locked for the duration of the call, so
/// variables set here are visible to the rest of the reply.
pub struct CallContext<'a> {
    user_id: &'a str,
    user: &'a mut UserRecord,
    brain: &'a Brain,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(user_id: &'a str, user: &'a mut UserRecord, brain: &'a Brain) -> Self {
        CallContext { user_id, user, brain }
    }

    pub fn user_id(&self) -> &str {
        self.user_id
    }

    pub fn get_uservar(&self, name: &str) -> String {
        self.user.get(name)
    }

    pub fn set_uservar(&mut self, name: &str, value: &str) {
        self.user.set(name, value);
    }

    /// A bot variable (`! var`).
    pub fn get_variable(&self, name: &str) -> String {
        self.brain.bot_var(name)
    }

    pub fn set_variable(&self, name: &str, value: &str) {
        crate::script::define(&mut self.brain.vars.write(), name, value);
    }

    /// A global (`! global`).
    pub fn get_global(&self, name: &str) -> String {
        self.brain.global(name)
    }
}

/// A macro implemented in Rust.
pub trait Subroutine: Send + Sync {
    fn call(&self, ctx: &mut CallContext<'_>, args: &[String]) -> Result<String, MacroError>;
}

impl<F> Subroutine for F
where
    F: Fn(&mut CallContext<'_>, &[String]) -> Result<String, MacroError> + Send + Sync,
{
    fn call(&self, ctx: &mut CallContext<'_>, args: &[String]) -> Result<String, MacroError> {
        self(ctx, args)
    }
}

/// Runs object blocks written in some scripting language.
pub trait ObjectHandler: Send + Sync {
    /// Receive the body of `> object <name> <lang>`, one entry per line.
    fn load(&mut self, name: &str, code: &[String]) -> Result<(), MacroError>;

    fn call(&self, ctx: &mut CallContext<'_>, name: &str, args: &[String]) -> Result<String, MacroError>;
}

#[derive(Default)]
pub(crate) struct ObjectRegistry {
    subroutines: HashMap<String, Arc<dyn Subroutine>>,
    handlers: HashMap<String, Box<dyn ObjectHandler>>,
    /// Macro name -> language of the handler that loaded it.
    languages: HashMap<String, String>,
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut subroutines: Vec<_> = self.subroutines.keys().collect();
        subroutines.sort();
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("ObjectRegistry")
            .field("subroutines", &subroutines)
            .field("handlers", &handlers)
            .field("languages", &self.languages)
            .finish()
    }
}

impl ObjectRegistry {
    pub fn set_subroutine(&mut self, name: &str, subroutine: Arc<dyn Subroutine>) {
        self.subroutines.insert(name.to_string(), subroutine);
    }

    pub fn set_handler(&mut self, language: &str, handler: Box<dyn ObjectHandler>) {
        self.handlers.insert(language.to_lowercase(), handler);
    }

    pub fn has_handler(&self, language: &str) -> bool {
        self.handlers.contains_key(&language.to_lowercase())
    }

    /// Hand an object block to its language handler.
    pub fn load(&mut self, name: &str, language: &str, code: &[String]) -> Result<(), MacroError> {
        let language = language.to_lowercase();
        let handler =
            self.handlers.get_mut(&language).ok_or_else(|| MacroError::UnsupportedLanguage(language.clone()))?;
        handler.load(name, code)?;
        self.languages.insert(name.to_string(), language);
        Ok(())
    }

    /// Run macro `name`, turning every failure into inline reply text.
    pub fn invoke(&self, ctx: &mut CallContext<'_>, name: &str, args: &[String]) -> String {
        let outcome = if let Some(subroutine) = self.subroutines.get(name) {
            catch_unwind(AssertUnwindSafe(|| subroutine.call(ctx, args)))
        } else if let Some(handler) = self.languages.get(name).and_then(|lang| self.handlers.get(lang)) {
            catch_unwind(AssertUnwindSafe(|| handler.call(ctx, name, args)))
        } else {
            log::warn!("object macro '{name}' not found");
            return ERR_OBJECT_NOT_FOUND.to_string();
        };

        match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                log::warn!("object macro '{name}' failed: {err}");
                format!("[ERR: {err}]")
            }
            Err(_) => {
                log::error!("object macro '{name}' panicked");
                "[ERR: Object Macro Panicked]".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        loaded: HashMap<String, Vec<String>>,
    }

    impl ObjectHandler for Echo {
        fn load(&mut self, name: &str, code: &[String]) -> Result<(), MacroError> {
            self.loaded.insert(name.to_string(), code.to_vec());
            Ok(())
        }

        fn call(&self, _ctx: &mut CallContext<'_>, name: &str, args: &[String]) -> Result<String, MacroError> {
            let code = self.loaded.get(name).map(|c| c.join(";")).unwrap_or_default();
            Ok(format!("{code}({})", args.join(",")))
        }
    }

    fn invoke(registry: &ObjectRegistry, user: &mut UserRecord, name: &str, args: &[&str]) -> String {
        let brain = Brain::default();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut ctx = CallContext::new("tester", user, &brain);
        registry.invoke(&mut ctx, name, &args)
    }

    #[test]
    fn subroutines_see_and_change_user_state() {
        let mut registry = ObjectRegistry::default();
        registry.set_subroutine(
            "remember",
            Arc::new(|ctx: &mut CallContext<'_>, args: &[String]| -> Result<String, MacroError> {
                ctx.set_uservar("memo", &args.join(" "));
                Ok(format!("noted for {}", ctx.user_id()))
            }),
        );

        let mut user = UserRecord::new();
        assert_eq!(invoke(&registry, &mut user, "remember", &["buy", "milk"]), "noted for tester");
        assert_eq!(user.get("memo"), "buy milk");
    }

    #[test]
    fn failures_become_inline_errors() {
        let mut registry = ObjectRegistry::default();
        registry.set_subroutine(
            "broken",
            Arc::new(|_: &mut CallContext<'_>, _: &[String]| -> Result<String, MacroError> {
                Err(MacroError::Failed("bad input".to_string()))
            }),
        );
        registry.set_subroutine(
            "explodes",
            Arc::new(|_: &mut CallContext<'_>, _: &[String]| -> Result<String, MacroError> { panic!("boom") }),
        );

        let mut user = UserRecord::new();
        assert_eq!(invoke(&registry, &mut user, "broken", &[]), "[ERR: bad input]");
        assert_eq!(invoke(&registry, &mut user, "explodes", &[]), "[ERR: Object Macro Panicked]");
        assert_eq!(invoke(&registry, &mut user, "missing", &[]), ERR_OBJECT_NOT_FOUND);
    }

    #[test]
    fn handlers_load_object_blocks() {
        let mut registry = ObjectRegistry::default();
        assert_eq!(
            registry.load("hello", "echo", &[]),
            Err(MacroError::UnsupportedLanguage("echo".to_string()))
        );

        registry.set_handler("Echo", Box::new(Echo { loaded: HashMap::new() }));
        assert!(registry.has_handler("echo"));
        registry.load("hello", "echo", &["a".to_string(), "b".to_string()]).unwrap();

        let mut user = UserRecord::new();
        assert_eq!(invoke(&registry, &mut user, "hello", &["x"]), "a;b(x)");
    }
}
