//! The story engine boundary and its error channel.

use std::path::Path;

use thiserror::Error;

use crate::command::Command;
use crate::line::{Choices, Dialogue, InputCommand, LineTag};
use crate::value::Value;

/// An error reported by the story engine's out-of-band error channel.
///
/// The engine never signals failure through a line tag; every call either
/// succeeds or produces one of these. Engine failures are fatal to the
/// operation that triggered them — the dispatch loop does not retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("story engine error: {message}")]
pub struct EngineError {
    /// The engine's error message.
    pub message: String,
}

impl EngineError {
    /// Create an engine error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// The external interpreter's synchronous call surface.
///
/// The interpreter — story parsing, validation, state management, branch
/// evaluation — is a fixed collaborator that lives outside this repository.
/// This trait models its flat call surface so the dispatch runtime can drive
/// any implementation: the native library behind a foreign-function shim, or
/// a scripted playback double in tests.
///
/// The engine is not reentrant: callers must keep at most one advancement
/// in flight, which the runner enforces with its waiting flag.
pub trait StoryEngine {
    /// Load a compiled story artifact from `path`.
    fn load_story(&mut self, path: &Path) -> EngineResult<()>;

    /// Persist the loaded story artifact to `path`.
    fn save_story(&self, path: &Path) -> EngineResult<()>;

    /// Validate the loaded story, reporting the first problem found.
    fn validate(&self) -> EngineResult<()>;

    /// Generate a source-constants artifact from identifier names at `path`.
    fn codegen_consts(&self, path: &Path) -> EngineResult<()>;

    /// Load bookmark (session) state from `path`.
    fn load_bookmark(&mut self, path: &Path) -> EngineResult<()>;

    /// Persist the current bookmark state to `path`.
    fn save_bookmark(&self, path: &Path) -> EngineResult<()>;

    /// Save the current bookmark state under an in-memory snapshot name.
    fn save_snapshot(&mut self, name: &str) -> EngineResult<()>;

    /// Restore bookmark state from a named snapshot.
    fn load_snapshot(&mut self, name: &str) -> EngineResult<()>;

    /// Prepare the internal runner after story and bookmark are loaded.
    fn init_runner(&mut self) -> EngineResult<()>;

    /// Set a named state value.
    fn set_state(&mut self, key: &str, value: Value) -> EngineResult<()>;

    /// Get a named state value, if set.
    fn get_state(&self, key: &str) -> EngineResult<Option<Value>>;

    /// Set the current line pointer within the current passage.
    fn set_line(&mut self, line: usize) -> EngineResult<()>;

    /// Jump to the passage named `passage`.
    fn goto_passage(&mut self, passage: &str) -> EngineResult<()>;

    /// Name of the current passage.
    fn current_passage(&self) -> EngineResult<String>;

    /// Advance one step, optionally answering an input prompt or selecting
    /// a choice, and return the resulting tag.
    ///
    /// After a successful advance exactly one of the typed payload
    /// accessors is valid; calling any other is a contract violation the
    /// implementation reports through the error channel.
    fn next(&mut self, input: &str) -> EngineResult<LineTag>;

    /// Tag of the last advance.
    fn tag(&self) -> LineTag;

    /// Payload accessor valid after [`LineTag::Dialogue`].
    fn dialogue(&self) -> EngineResult<Dialogue>;

    /// Payload accessor valid after [`LineTag::Command`].
    fn command(&self) -> EngineResult<Command>;

    /// Payload accessor valid after [`LineTag::Choices`].
    fn choices(&self) -> EngineResult<Choices>;

    /// Payload accessor valid after [`LineTag::InputCommand`].
    fn input_command(&self) -> EngineResult<InputCommand>;
}
