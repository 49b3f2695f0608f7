//! The line tag and the payload types it discriminates.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Discriminator identifying which payload kind resulted from the last
/// advancement step.
///
/// Exactly one tag is produced per step, and it determines which payload
/// accessor on the engine is valid next. `End` carries no payload and
/// signals the current passage is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineTag {
    /// A set of choices is being offered.
    Choices,
    /// The last selection did not match any offered choice.
    InvalidChoice,
    /// A character spoke a line of dialogue.
    Dialogue,
    /// The story invoked a named command.
    Command,
    /// The story is requesting free-text input.
    InputCommand,
    /// The current passage is exhausted.
    End,
}

/// A text range annotated with named markup parameters.
///
/// Offsets index into the dialogue text the span was produced with. Spans
/// are produced fresh per line; there is no cross-line identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedSpan {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
    /// Named markup parameters (e.g. styling or timing cues).
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl AttributedSpan {
    /// Create a span over `start..end` with no parameters.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            params: BTreeMap::new(),
        }
    }

    /// Add a named parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A single line of character dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    /// The speaking character's name. Character handlers are keyed by it.
    pub speaker: String,
    /// Display text, already stripped of inline markup.
    pub text: String,
    /// Markup ranges over the text, in order of appearance.
    #[serde(default)]
    pub spans: Vec<AttributedSpan>,
}

impl Dialogue {
    /// Create a dialogue line with no attributed spans.
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            spans: Vec::new(),
        }
    }

    /// Add an attributed span.
    pub fn with_span(mut self, span: AttributedSpan) -> Self {
        self.spans.push(span);
        self
    }
}

/// An ordered set of choices offered to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choices {
    /// Choice labels, in presentation order.
    pub options: Vec<String>,
    /// Timeout in seconds. Zero or negative means no timeout; enforcement
    /// is the host's responsibility.
    #[serde(default)]
    pub timeout: f64,
}

impl Choices {
    /// Create a choice set with no timeout.
    pub fn new(options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            timeout: 0.0,
        }
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = seconds;
        self
    }

    /// The timeout as a duration, or `None` when the choice does not expire.
    ///
    /// Values a `Duration` cannot represent (non-finite or overflowing)
    /// are treated as no timeout.
    pub fn timeout_duration(&self) -> Option<Duration> {
        if self.timeout > 0.0 {
            Duration::try_from_secs_f64(self.timeout).ok()
        } else {
            None
        }
    }
}

/// A prompt requesting free-text input from the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    /// The prompt shown to the player.
    pub prompt: String,
}

impl InputCommand {
    /// Create an input prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}
