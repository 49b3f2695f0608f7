//! Declarative handler bindings with owner-scoped name resolution.
//!
//! A consuming component declares its command and character handlers once in
//! a [`HandlerSet`], then attaches and detaches the whole set as it comes and
//! goes. Names are resolved against the owner's name at attach time, and the
//! exact (resolved name, token) pairs are retained so detach removes
//! precisely what attach registered — even if the owner's name changes in
//! between.

use std::sync::Arc;

use tracing::warn;

use kataru_core::{Dialogue, Value};

use crate::error::HandlerError;
use crate::registry::{CharacterHandler, CommandHandler, Delegates, HandlerId, HandlerKind};

/// How a binding's registered name is derived from its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingName {
    /// The bound name is exactly the owner's own name. The default for
    /// character handlers: a component named "Alice" handles Alice's lines.
    PrefixOnly,
    /// The bound name is the given suffix, unscoped. The default for
    /// command handlers: `Global("SaveGame")` handles `SaveGame`.
    Global(String),
    /// The bound name is `"{owner}.{suffix}"`. Used for commands scoped to
    /// an owning entity: `Scoped("Wave")` on "Alice" handles `Alice.Wave`.
    Scoped(String),
}

impl BindingName {
    /// Resolve the registered name for an owner.
    pub fn resolve(&self, owner: &str) -> String {
        match self {
            BindingName::PrefixOnly => owner.to_string(),
            BindingName::Global(suffix) => suffix.clone(),
            BindingName::Scoped(suffix) => format!("{owner}.{suffix}"),
        }
    }
}

enum Declaration {
    Command(BindingName, CommandHandler),
    Character(BindingName, CharacterHandler),
}

enum Attached {
    Command(String, HandlerId),
    Character(String, HandlerId),
}

/// A consumer's declared handler bindings and their registration lifecycle.
pub struct HandlerSet {
    owner: String,
    declarations: Vec<Declaration>,
    attached: Vec<Attached>,
}

impl HandlerSet {
    /// Create an empty set owned by the named entity.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            declarations: Vec::new(),
            attached: Vec::new(),
        }
    }

    /// The owning entity's name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Rename the owner. Affects future attaches only; an attached set keeps
    /// the names it registered under until detached.
    pub fn set_owner(&mut self, owner: impl Into<String>) {
        self.owner = owner.into();
    }

    /// Declare a command handler.
    pub fn on_command(
        mut self,
        name: BindingName,
        params: impl IntoIterator<Item = impl Into<String>>,
        action: impl Fn(&[Value]) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        self.declarations.push(Declaration::Command(
            name,
            CommandHandler::new(params, action),
        ));
        self
    }

    /// Declare a character handler.
    pub fn on_character(
        mut self,
        name: BindingName,
        handler: impl Fn(&Dialogue) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        self.declarations
            .push(Declaration::Character(name, Arc::new(handler)));
        self
    }

    /// Whether the set is currently registered.
    pub fn is_attached(&self) -> bool {
        !self.attached.is_empty()
    }

    /// Resolve every declared binding against the current owner name and
    /// register it. A warned no-op if already attached.
    pub fn attach(&mut self, delegates: &Delegates) {
        if self.is_attached() {
            warn!(owner = %self.owner, "handler set attached twice; ignoring");
            return;
        }
        for declaration in &self.declarations {
            match declaration {
                Declaration::Command(name, handler) => {
                    let resolved = name.resolve(&self.owner);
                    let id = delegates.commands.register(resolved.clone(), handler.clone());
                    self.attached.push(Attached::Command(resolved, id));
                }
                Declaration::Character(name, handler) => {
                    let resolved = name.resolve(&self.owner);
                    let id = delegates
                        .characters
                        .register(resolved.clone(), handler.clone());
                    self.attached.push(Attached::Character(resolved, id));
                }
            }
        }
    }

    /// Unregister exactly what [`HandlerSet::attach`] registered.
    pub fn detach(&mut self, delegates: &Delegates) {
        for attached in self.attached.drain(..) {
            match attached {
                Attached::Command(name, id) => {
                    delegates.commands.unregister(&name, id);
                }
                Attached::Character(name, id) => {
                    delegates.characters.unregister(&name, id);
                }
            }
        }
    }

    /// Resolved names the set would register under, in declaration order.
    pub fn resolved_names(&self) -> Vec<(HandlerKind, String)> {
        self.declarations
            .iter()
            .map(|declaration| match declaration {
                Declaration::Command(name, _) => (HandlerKind::Command, name.resolve(&self.owner)),
                Declaration::Character(name, _) => {
                    (HandlerKind::Character, name.resolve(&self.owner))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_resolution() {
        assert_eq!(BindingName::PrefixOnly.resolve("Alice"), "Alice");
        assert_eq!(
            BindingName::Global("SaveGame".to_string()).resolve("Alice"),
            "SaveGame"
        );
        assert_eq!(
            BindingName::Scoped("Wave".to_string()).resolve("Alice"),
            "Alice.Wave"
        );
    }

    #[test]
    fn attach_registers_resolved_names() {
        let delegates = Delegates::new();
        let mut set = HandlerSet::new("Alice")
            .on_character(BindingName::PrefixOnly, |_| Ok(()))
            .on_command(BindingName::Scoped("Wave".to_string()), ["speed"], |_| {
                Ok(())
            })
            .on_command(BindingName::Global("SaveGame".to_string()), Vec::<&str>::new(), |_| Ok(()));

        set.attach(&delegates);

        assert!(delegates.characters.contains("Alice"));
        assert!(delegates.commands.contains("Alice.Wave"));
        assert!(delegates.commands.contains("SaveGame"));
    }

    #[test]
    fn detach_removes_exactly_what_attach_registered() {
        let delegates = Delegates::new();
        let mut set = HandlerSet::new("Alice")
            .on_character(BindingName::PrefixOnly, |_| Ok(()))
            .on_command(BindingName::Scoped("Wave".to_string()), Vec::<&str>::new(), |_| Ok(()));

        set.attach(&delegates);
        // Renaming after attach must not orphan the registrations.
        set.set_owner("Bob");
        set.detach(&delegates);

        assert!(!delegates.characters.contains("Alice"));
        assert!(!delegates.commands.contains("Alice.Wave"));
        assert!(!set.is_attached());
    }

    #[test]
    fn reattach_after_rename_uses_new_owner() {
        let delegates = Delegates::new();
        let mut set = HandlerSet::new("Alice").on_character(BindingName::PrefixOnly, |_| Ok(()));

        set.attach(&delegates);
        set.detach(&delegates);
        set.set_owner("Bob");
        set.attach(&delegates);

        assert!(!delegates.characters.contains("Alice"));
        assert!(delegates.characters.contains("Bob"));
    }

    #[test]
    fn double_attach_is_a_noop() {
        let delegates = Delegates::new();
        let mut set = HandlerSet::new("Alice").on_character(BindingName::PrefixOnly, |_| Ok(()));

        set.attach(&delegates);
        set.attach(&delegates);

        assert_eq!(delegates.characters.handler_count("Alice"), 1);
    }

    #[test]
    fn shared_delegates_count_both_sets() {
        let delegates = Delegates::new();
        let mut first = HandlerSet::new("Alice").on_character(BindingName::PrefixOnly, |_| Ok(()));
        let mut second = HandlerSet::new("Alice").on_character(BindingName::PrefixOnly, |_| Ok(()));

        first.attach(&delegates);
        second.attach(&delegates);
        assert_eq!(delegates.characters.handler_count("Alice"), 2);

        first.detach(&delegates);
        assert_eq!(delegates.characters.handler_count("Alice"), 1);
    }
}
