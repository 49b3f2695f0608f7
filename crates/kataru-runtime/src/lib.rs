//! Dispatch runtime for Kataru stories.
//!
//! This crate mediates between a [`kataru_core::StoryEngine`] — the external
//! dialogue interpreter — and a host application's registered handlers. The
//! [`Runner`] drives the engine one step at a time, classifies each step by
//! tag, fetches the typed payload, and routes it either through name-keyed
//! delegate registries (character and command handlers) or through broadcast
//! event signals (choices offered, invalid choice, dialogue ended, input
//! requested, line produced).

/// Declarative handler bindings with owner-scoped name resolution.
pub mod bindings;
/// Error types for the runtime.
pub mod error;
/// Broadcast event signals.
pub mod events;
/// Name-keyed delegate registries.
pub mod registry;
/// The dispatch loop driving the story engine.
pub mod runner;
/// A playback engine for pre-structured story fixtures.
pub mod scripted;
/// Session path configuration.
pub mod session;

/// Re-export binding types.
pub use bindings::{BindingName, HandlerSet};
/// Re-export error types.
pub use error::{HandlerError, RuntimeError, RuntimeResult};
/// Re-export event types.
pub use events::{RunnerEvents, Signal};
/// Re-export registry types.
pub use registry::{
    CharacterHandler, CommandHandler, Delegates, DelegateMap, DispatchOutcome, HandlerId,
    HandlerKind,
};
/// Re-export the dispatch loop.
pub use runner::Runner;
/// Re-export the fixture playback engine.
pub use scripted::{ChoiceOption, Script, ScriptedLine, ScriptedStory};
/// Re-export session configuration types.
pub use session::{SessionPaths, Settings};
