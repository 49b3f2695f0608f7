//! Broadcast event signals.
//!
//! Unlike the delegate registries, these are global signals: any number of
//! listeners may subscribe, and emitting to zero listeners is fine — an
//! observer that only cares about progression is optional, a character
//! handler is not.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use parking_lot::RwLock;

use kataru_core::{Choices, InputCommand, LineTag};

use crate::registry::HandlerId;

/// A broadcast signal carrying payloads of type `T`.
pub struct Signal<T> {
    listeners: RwLock<BTreeMap<HandlerId, Arc<dyn Fn(&T) + Send + Sync>>>,
    next_id: AtomicU64,
}

impl<T> Signal<T> {
    /// Create a signal with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Subscribe a listener, returning a token for [`Signal::disconnect`].
    pub fn connect(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId::next(&self.next_id);
        self.listeners.write().insert(id, Arc::new(listener));
        id
    }

    /// Unsubscribe a listener. No-op returning `false` if the token is
    /// unknown.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Number of connected listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Invoke every connected listener with `payload`.
    ///
    /// Listeners are snapshotted first, so connecting or disconnecting from
    /// inside a listener is safe.
    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<_> = self.listeners.read().values().cloned().collect();
        for listener in snapshot {
            listener(payload);
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The broadcast events a runner exposes to the host application.
#[derive(Default)]
pub struct RunnerEvents {
    /// A line was produced, carrying its tag. Fires once per accepted
    /// advance, after branch handling, regardless of branch.
    pub line: Signal<LineTag>,
    /// A choice set was offered.
    pub choices: Signal<Choices>,
    /// The last selection did not match any offered choice.
    pub invalid_choice: Signal<()>,
    /// The dialogue stream ended (end of passage or forced exit).
    pub dialogue_end: Signal<()>,
    /// The story requested free-text input.
    pub input_command: Signal<InputCommand>,
}

impl RunnerEvents {
    /// Create an event set with no listeners.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emit_reaches_all_listeners() {
        let signal = Signal::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = seen.clone();
        signal.connect(move |tag: &LineTag| seen_a.lock().unwrap().push(("a", *tag)));
        let seen_b = seen.clone();
        signal.connect(move |tag: &LineTag| seen_b.lock().unwrap().push(("b", *tag)));

        signal.emit(&LineTag::Dialogue);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("a", LineTag::Dialogue), ("b", LineTag::Dialogue)]
        );
    }

    #[test]
    fn disconnect_stops_delivery() {
        let signal = Signal::new();
        let count = Arc::new(Mutex::new(0));

        let count_in = count.clone();
        let id = signal.connect(move |_: &()| *count_in.lock().unwrap() += 1);

        signal.emit(&());
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(&());

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn disconnect_from_inside_listener() {
        let signal: Arc<Signal<()>> = Arc::new(Signal::new());
        let count = Arc::new(Mutex::new(0));

        let signal_in = signal.clone();
        let count_in = count.clone();
        let id = Arc::new(Mutex::new(None));
        let id_in = id.clone();
        let token = signal.connect(move |_: &()| {
            *count_in.lock().unwrap() += 1;
            if let Some(own) = *id_in.lock().unwrap() {
                signal_in.disconnect(own);
            }
        });
        *id.lock().unwrap() = Some(token);

        signal.emit(&());
        signal.emit(&());
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
