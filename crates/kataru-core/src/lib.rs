//! Core types for the Kataru host runtime.
//!
//! This crate defines the tagged line protocol — the contract describing the
//! result of advancing one step of dialogue — and the [`StoryEngine`] trait
//! that models the external interpreter's synchronous call surface. It is
//! independent of any particular engine: the dispatch runtime in
//! `kataru-runtime` drives whatever implementation it is given.

/// Command payloads and positional parameter resolution.
pub mod command;
/// The story engine boundary and its error channel.
pub mod engine;
/// The line tag and the payload types it discriminates.
pub mod line;
/// Namespace conventions for story identifiers.
pub mod namespace;
/// Dynamically typed parameter values.
pub mod value;

/// Re-export command types.
pub use command::{Command, MissingParameter};
/// Re-export engine boundary types.
pub use engine::{EngineError, EngineResult, StoryEngine};
/// Re-export line protocol types.
pub use line::{AttributedSpan, Choices, Dialogue, InputCommand, LineTag};
/// Re-export the value type.
pub use value::Value;
