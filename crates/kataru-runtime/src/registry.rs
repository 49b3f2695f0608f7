//! Name-keyed delegate registries.
//!
//! A [`DelegateMap`] is a multi-map from a logical name (character or
//! command) to a set of registered handlers, keyed by registry-issued
//! [`HandlerId`] tokens. Identity keys make re-registration non-aliasing and
//! removal exact. Registration and removal may race dispatch: handler
//! components attach and detach while the runner is mid-passage, so the map
//! lives behind a lock and dispatch invokes a snapshot taken under it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use strsim::jaro_winkler;
use tracing::error;

use kataru_core::{Dialogue, Value};

use crate::error::{HandlerError, RuntimeError, RuntimeResult};

/// Minimum similarity for a missing-handler name suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Identity token for a registered handler.
///
/// Issued by the registry at registration; removal requires the exact token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Issue the next token from a registry's counter.
    pub(crate) fn next(counter: &AtomicU64) -> Self {
        HandlerId(counter.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which registry a handler belongs to, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Dialogue handlers keyed by speaker name.
    Character,
    /// Command handlers keyed by command name.
    Command,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Character => write!(f, "character"),
            HandlerKind::Command => write!(f, "command"),
        }
    }
}

/// A callback handling a character's dialogue lines.
pub type CharacterHandler = Arc<dyn Fn(&Dialogue) -> Result<(), HandlerError> + Send + Sync>;

/// A callback handling a named command, with its declared parameter names.
///
/// Positional arguments are resolved by matching the command's parameter map
/// against `params` in declared order before the action is invoked.
#[derive(Clone)]
pub struct CommandHandler {
    /// Declared parameter names, in call order.
    pub params: Vec<String>,
    /// The callback receiving the resolved arguments.
    pub action: Arc<dyn Fn(&[Value]) -> Result<(), HandlerError> + Send + Sync>,
}

impl CommandHandler {
    /// Create a command handler from declared parameter names and an action.
    pub fn new(
        params: impl IntoIterator<Item = impl Into<String>>,
        action: impl Fn(&[Value]) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            action: Arc::new(action),
        }
    }
}

impl fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandler")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Result of a fan-out dispatch.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// How many handlers were invoked.
    pub invoked: usize,
    /// Per-handler failures, by identity token. A failure here never
    /// prevented the remaining handlers from running.
    pub failures: Vec<(HandlerId, String)>,
}

/// A concurrent multi-map from logical names to registered handlers.
pub struct DelegateMap<H> {
    kind: HandlerKind,
    entries: RwLock<HashMap<String, BTreeMap<HandlerId, H>>>,
    next_id: AtomicU64,
}

impl<H: Clone> DelegateMap<H> {
    /// Create an empty registry of the given kind.
    pub fn new(kind: HandlerKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Which registry this is.
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Add a handler to the set bound to `name`, returning its identity.
    pub fn register(&self, name: impl Into<String>, handler: H) -> HandlerId {
        let id = HandlerId::next(&self.next_id);
        self.entries
            .write()
            .entry(name.into())
            .or_default()
            .insert(id, handler);
        id
    }

    /// Remove one handler from `name`'s set. No-op returning `false` if the
    /// name or the token is absent.
    pub fn unregister(&self, name: &str, id: HandlerId) -> bool {
        let mut entries = self.entries.write();
        let Some(handlers) = entries.get_mut(name) else {
            return false;
        };
        let removed = handlers.remove(&id).is_some();
        if handlers.is_empty() {
            entries.remove(name);
        }
        removed
    }

    /// Whether any handler is bound to `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .get(name)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// How many handlers are bound to `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.entries.read().get(name).map_or(0, BTreeMap::len)
    }

    /// Snapshot of the handlers currently bound to `name`.
    pub fn handlers(&self, name: &str) -> Vec<(HandlerId, H)> {
        self.entries.read().get(name).map_or_else(Vec::new, |h| {
            h.iter().map(|(id, handler)| (*id, handler.clone())).collect()
        })
    }

    /// All names with at least one bound handler.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Remove every binding.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// The registered name most similar to `name`, if any is close enough.
    pub fn closest(&self, name: &str) -> Option<String> {
        let entries = self.entries.read();
        entries
            .keys()
            .map(|candidate| (candidate, jaro_winkler(name, candidate)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(candidate, _)| candidate.clone())
    }

    /// Invoke every handler currently bound to `name`.
    ///
    /// Handlers are snapshotted under the read lock and invoked outside it,
    /// so listeners may register or unregister while a dispatch is in
    /// flight. Zero bound handlers is an error, not a silent no-op. One
    /// handler failing does not prevent the rest from running; each failure
    /// is captured in the outcome and logged.
    pub fn dispatch_with(
        &self,
        name: &str,
        invoke: impl Fn(&H) -> Result<(), HandlerError>,
    ) -> RuntimeResult<DispatchOutcome> {
        let snapshot = self.handlers(name);
        if snapshot.is_empty() {
            return Err(RuntimeError::missing_handler(
                self.kind,
                name,
                self.closest(name),
            ));
        }

        let mut outcome = DispatchOutcome::default();
        for (id, handler) in &snapshot {
            outcome.invoked += 1;
            if let Err(err) = invoke(handler) {
                error!(name, handler = ?id, %err, "handler failed during dispatch");
                outcome.failures.push((*id, err.to_string()));
            }
        }
        Ok(outcome)
    }
}

/// The command and character registries a runner dispatches through.
///
/// Shared between the runner and attached [`crate::HandlerSet`]s, so
/// components can bind and unbind from other contexts while the runner is
/// mid-dispatch.
pub struct Delegates {
    /// Command handlers, keyed by command name.
    pub commands: DelegateMap<CommandHandler>,
    /// Character handlers, keyed by speaker name.
    pub characters: DelegateMap<CharacterHandler>,
}

impl Delegates {
    /// Create empty registries.
    pub fn new() -> Self {
        Self {
            commands: DelegateMap::new(HandlerKind::Command),
            characters: DelegateMap::new(HandlerKind::Character),
        }
    }
}

impl Default for Delegates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn character_handler(log: Arc<Mutex<Vec<String>>>, tag: &str) -> CharacterHandler {
        let tag = tag.to_string();
        Arc::new(move |dialogue: &Dialogue| {
            log.lock().unwrap().push(format!("{tag}:{}", dialogue.text));
            Ok(())
        })
    }

    #[test]
    fn register_and_dispatch() {
        let map = DelegateMap::new(HandlerKind::Character);
        let log = Arc::new(Mutex::new(Vec::new()));
        map.register("Alice", character_handler(log.clone(), "a"));
        map.register("Alice", character_handler(log.clone(), "b"));

        let line = Dialogue::new("Alice", "hi");
        let outcome = map.dispatch_with("Alice", |h| h(&line)).unwrap();

        assert_eq!(outcome.invoked, 2);
        assert!(outcome.failures.is_empty());
        let seen: HashSet<_> = log.lock().unwrap().iter().cloned().collect();
        assert_eq!(seen, HashSet::from(["a:hi".to_string(), "b:hi".to_string()]));
    }

    #[test]
    fn dispatch_to_unbound_name_errors_without_side_effect() {
        let map = DelegateMap::new(HandlerKind::Command);
        let calls = Arc::new(Mutex::new(0));
        let calls_in = calls.clone();
        map.register(
            "GiveItem",
            CommandHandler::new(Vec::<String>::new(), move |_| {
                *calls_in.lock().unwrap() += 1;
                Ok(())
            }),
        );

        let err = map
            .dispatch_with("TakeItem", |h| (h.action)(&[]))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MissingHandler { .. }));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn missing_handler_suggests_closest_name() {
        let map: DelegateMap<CharacterHandler> = DelegateMap::new(HandlerKind::Character);
        map.register("Alice", Arc::new(|_: &Dialogue| Ok(())) as CharacterHandler);

        let err = map
            .dispatch_with("Alcie", |h| h(&Dialogue::new("Alcie", "")))
            .unwrap_err();
        match err {
            RuntimeError::MissingHandler { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("Alice"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failing_handler_does_not_block_siblings() {
        let map: DelegateMap<CharacterHandler> = DelegateMap::new(HandlerKind::Character);
        let calls = Arc::new(Mutex::new(0));

        map.register(
            "Alice",
            Arc::new(|_: &Dialogue| Err("first handler broke".into())) as CharacterHandler,
        );
        let calls_in = calls.clone();
        map.register(
            "Alice",
            Arc::new(move |_: &Dialogue| {
                *calls_in.lock().unwrap() += 1;
                Ok(())
            }) as CharacterHandler,
        );

        let line = Dialogue::new("Alice", "hi");
        let outcome = map.dispatch_with("Alice", |h| h(&line)).unwrap();

        assert_eq!(outcome.invoked, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].1.contains("first handler broke"));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn unregister_is_exact() {
        let map: DelegateMap<CharacterHandler> = DelegateMap::new(HandlerKind::Character);
        let a = map.register("Alice", Arc::new(|_: &Dialogue| Ok(())) as CharacterHandler);
        let b = map.register("Alice", Arc::new(|_: &Dialogue| Ok(())) as CharacterHandler);

        assert!(map.unregister("Alice", a));
        assert!(!map.unregister("Alice", a));
        assert_eq!(map.handler_count("Alice"), 1);

        assert!(map.unregister("Alice", b));
        assert!(!map.contains("Alice"));
    }

    #[test]
    fn registration_during_dispatch_is_tolerated() {
        // A handler that mutates the registry mid-fan-out: the snapshot
        // taken at dispatch must not observe the mutation or deadlock.
        let map = Arc::new(DelegateMap::new(HandlerKind::Character));
        let map_in = map.clone();
        map.register(
            "Alice",
            Arc::new(move |_: &Dialogue| {
                map_in.register("Alice", Arc::new(|_: &Dialogue| Ok(())) as CharacterHandler);
                Ok(())
            }) as CharacterHandler,
        );

        let line = Dialogue::new("Alice", "hi");
        let outcome = map.dispatch_with("Alice", |h| h(&line)).unwrap();
        assert_eq!(outcome.invoked, 1);
        assert_eq!(map.handler_count("Alice"), 2);
    }

    proptest! {
        // Replaying any interleaving of register/unregister against a model
        // yields the same bound set.
        #[test]
        fn register_unregister_replays_faithfully(ops in proptest::collection::vec((0usize..3, 0usize..8), 0..64)) {
            let names = ["Alice", "Bob", "GiveItem"];
            let map: DelegateMap<CharacterHandler> = DelegateMap::new(HandlerKind::Character);
            let mut model: HashMap<String, HashSet<HandlerId>> = HashMap::new();
            let mut issued: Vec<(String, HandlerId)> = Vec::new();

            for (name_idx, op) in ops {
                let name = names[name_idx % names.len()];
                if op % 2 == 0 || issued.is_empty() {
                    let id = map.register(name, Arc::new(|_: &Dialogue| Ok(())) as CharacterHandler);
                    model.entry(name.to_string()).or_default().insert(id);
                    issued.push((name.to_string(), id));
                } else {
                    let (name, id) = issued.remove(op % issued.len());
                    let model_removed = model.get_mut(&name).is_some_and(|set| set.remove(&id));
                    let map_removed = map.unregister(&name, id);
                    prop_assert_eq!(model_removed, map_removed);
                }
            }

            for name in names {
                let expected: HashSet<HandlerId> =
                    model.get(name).cloned().unwrap_or_default();
                let actual: HashSet<HandlerId> =
                    map.handlers(name).into_iter().map(|(id, _)| id).collect();
                prop_assert_eq!(expected, actual);
            }
        }
    }
}
