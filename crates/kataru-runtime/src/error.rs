//! Error types for the runtime.

use thiserror::Error;

use kataru_core::{EngineError, MissingParameter};

use crate::registry::HandlerKind;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// The error type handlers may fail with.
///
/// Handler failures are captured per-handler during dispatch; one handler
/// failing does not prevent the remaining handlers for the same name from
/// running.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!("; closest registered name is '{name}'"),
        None => String::new(),
    }
}

/// Errors raised by the dispatch runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The story engine's error channel reported a failure. Fatal to the
    /// operation that triggered it; the runner does not retry.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A dispatch targeted a name with zero registered handlers.
    /// Recoverable by registering the missing binding and retrying.
    #[error("no {kind} handler registered for '{name}'{}", suggestion_suffix(.suggestion))]
    MissingHandler {
        /// Which registry the lookup went through.
        kind: HandlerKind,
        /// The unmet name.
        name: String,
        /// A registered name close to the unmet one, if any.
        suggestion: Option<String>,
    },

    /// A command handler declared a parameter the command did not supply.
    #[error(transparent)]
    MissingParameter(#[from] MissingParameter),

    /// The engine produced a command with an empty name. Usually a global
    /// command misrouted as a character command in the story script.
    #[error("received a command with an empty name; was a global command used as a character command?")]
    EmptyCommandName,

    /// Settings could not be parsed.
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    /// A filesystem operation on a session path failed.
    #[error("session i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Build a missing-handler error, suggesting the closest registered name.
    pub fn missing_handler(
        kind: HandlerKind,
        name: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        RuntimeError::MissingHandler {
            kind,
            name: name.into(),
            suggestion,
        }
    }
}
