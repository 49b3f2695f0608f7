//! The dispatch loop driving the story engine.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use kataru_core::{LineTag, StoryEngine, Value};

use crate::error::{RuntimeError, RuntimeResult};
use crate::events::RunnerEvents;
use crate::registry::Delegates;
use crate::session::SessionPaths;

/// What resumes a pending delayed advance.
enum AdvanceTrigger {
    /// Remaining unscaled wall-clock time.
    After(Duration),
    /// A caller-supplied condition, polled every tick.
    When(Box<dyn Fn() -> bool + Send>),
}

struct PendingAdvance {
    trigger: AdvanceTrigger,
    input: String,
}

impl PendingAdvance {
    fn ready(&mut self, elapsed: Duration) -> bool {
        match &mut self.trigger {
            AdvanceTrigger::After(remaining) => {
                *remaining = remaining.saturating_sub(elapsed);
                remaining.is_zero()
            }
            AdvanceTrigger::When(predicate) => predicate(),
        }
    }
}

/// Drives a [`StoryEngine`] one step at a time, routing each step's payload
/// to registered handlers or broadcast events.
///
/// One runner owns one session: the engine, the delegate registries, the
/// broadcast events, and the session state (current tag, running flag,
/// waiting flag). Construct several runners for several independent
/// sessions. External callers may read the state through the accessors but
/// only the runner mutates it.
pub struct Runner<E: StoryEngine> {
    engine: E,
    paths: SessionPaths,
    delegates: Arc<Delegates>,
    events: RunnerEvents,
    tag: LineTag,
    running: bool,
    waiting: bool,
    pending: Option<PendingAdvance>,
}

impl<E: StoryEngine> Runner<E> {
    /// Create a runner and load the story artifact from the configured path.
    pub fn new(mut engine: E, paths: SessionPaths) -> RuntimeResult<Self> {
        engine.load_story(&paths.story)?;
        Ok(Self::with_engine(engine, paths))
    }

    /// Create a runner around an engine whose story was loaded out of band.
    pub fn with_engine(engine: E, paths: SessionPaths) -> Self {
        Self {
            engine,
            paths,
            delegates: Arc::new(Delegates::new()),
            events: RunnerEvents::new(),
            tag: LineTag::End,
            running: false,
            waiting: false,
            pending: None,
        }
    }

    /// The delegate registries, shareable with [`crate::HandlerSet`]s.
    pub fn delegates(&self) -> Arc<Delegates> {
        self.delegates.clone()
    }

    /// The broadcast events.
    pub fn events(&self) -> &RunnerEvents {
        &self.events
    }

    /// The configured session paths.
    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Tag of the last accepted advance.
    pub fn tag(&self) -> LineTag {
        self.tag
    }

    /// Whether a passage is currently running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a delayed advance is pending. Ordinary [`Runner::next`] calls
    /// are rejected while this is set.
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    // ------------------------------------------------------------------
    // Bookmark/session lifecycle
    // ------------------------------------------------------------------

    /// Persist the engine's session state to the save path, creating the
    /// parent directory if missing.
    pub fn save(&mut self) -> RuntimeResult<()> {
        if let Some(parent) = self.paths.save.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(path = %self.paths.save.display(), "saving bookmark");
        self.engine.save_bookmark(&self.paths.save)?;
        Ok(())
    }

    /// Whether a save file exists at the save path.
    pub fn save_exists(&self) -> bool {
        self.paths.save.exists()
    }

    /// Remove the save file. No-op if absent.
    pub fn delete_save(&self) -> RuntimeResult<()> {
        if self.save_exists() {
            fs::remove_file(&self.paths.save)?;
        }
        Ok(())
    }

    /// Load session state from the save file if one exists, falling back to
    /// the default bookmark, then initialize the engine's internal runner.
    pub fn load(&mut self) -> RuntimeResult<()> {
        let path = if self.save_exists() {
            &self.paths.save
        } else {
            &self.paths.bookmark
        };
        debug!(path = %path.display(), "loading bookmark");
        self.engine.load_bookmark(path)?;
        self.engine.init_runner()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Engine pass-throughs
    // ------------------------------------------------------------------

    /// Save the session state under a named in-memory snapshot.
    pub fn save_snapshot(&mut self, name: &str) -> RuntimeResult<()> {
        Ok(self.engine.save_snapshot(name)?)
    }

    /// Restore the session state from a named snapshot.
    pub fn load_snapshot(&mut self, name: &str) -> RuntimeResult<()> {
        Ok(self.engine.load_snapshot(name)?)
    }

    /// Set a named state value in the engine.
    pub fn set_state(&mut self, key: &str, value: impl Into<Value>) -> RuntimeResult<()> {
        Ok(self.engine.set_state(key, value.into())?)
    }

    /// Get a named state value from the engine.
    pub fn get_state(&self, key: &str) -> RuntimeResult<Option<Value>> {
        Ok(self.engine.get_state(key)?)
    }

    /// Set the current line pointer.
    pub fn set_line(&mut self, line: usize) -> RuntimeResult<()> {
        Ok(self.engine.set_line(line)?)
    }

    /// Jump to a passage without advancing.
    pub fn goto_passage(&mut self, passage: &str) -> RuntimeResult<()> {
        Ok(self.engine.goto_passage(passage)?)
    }

    /// Name of the current passage.
    pub fn current_passage(&self) -> RuntimeResult<String> {
        Ok(self.engine.current_passage()?)
    }

    // ------------------------------------------------------------------
    // Dispatch loop
    // ------------------------------------------------------------------

    /// Advance the story one step and route the result.
    ///
    /// `input` answers a pending input prompt or selects a choice; pass `""`
    /// otherwise. While a delayed advance is pending the call is rejected
    /// with a warning and returns [`LineTag::End`] without touching the
    /// engine.
    ///
    /// Engine failures are fatal to the operation. Missing-handler,
    /// missing-parameter, and empty-command-name conditions abort the step
    /// after the line-produced event has fired; registering the missing
    /// binding and retrying recovers the first two.
    pub fn next(&mut self, input: &str) -> RuntimeResult<LineTag> {
        if self.waiting {
            warn!("next() called while a delayed advance is pending; ignoring");
            return Ok(LineTag::End);
        }

        self.tag = self.engine.next(input)?;
        debug!(tag = ?self.tag, "line produced");

        let routed = self.route();
        self.events.line.emit(&self.tag);
        routed.map(|()| self.tag)
    }

    fn route(&mut self) -> RuntimeResult<()> {
        match self.tag {
            LineTag::Choices => {
                let choices = self.engine.choices()?;
                self.events.choices.emit(&choices);
            }
            LineTag::InvalidChoice => {
                self.events.invalid_choice.emit(&());
            }
            LineTag::Dialogue => {
                let dialogue = self.engine.dialogue()?;
                let outcome = self
                    .delegates
                    .characters
                    .dispatch_with(&dialogue.speaker, |handler| handler(&dialogue))?;
                if !outcome.failures.is_empty() {
                    error!(
                        speaker = %dialogue.speaker,
                        failed = outcome.failures.len(),
                        "character handler failures"
                    );
                }
            }
            LineTag::Command => {
                let command = self.engine.command()?;
                if command.name.is_empty() {
                    return Err(RuntimeError::EmptyCommandName);
                }
                // Positional arguments are resolved against the first bound
                // handler's declared parameter names.
                let handlers = self.delegates.commands.handlers(&command.name);
                let Some((_, first)) = handlers.first() else {
                    return Err(RuntimeError::missing_handler(
                        self.delegates.commands.kind(),
                        &command.name,
                        self.delegates.commands.closest(&command.name),
                    ));
                };
                let args = command.args_for(&first.params)?;
                let outcome = self
                    .delegates
                    .commands
                    .dispatch_with(&command.name, |handler| (handler.action)(&args))?;
                if !outcome.failures.is_empty() {
                    error!(
                        command = %command.name,
                        failed = outcome.failures.len(),
                        "command handler failures"
                    );
                }
            }
            LineTag::InputCommand => {
                let prompt = self.engine.input_command()?;
                self.events.input_command.emit(&prompt);
            }
            LineTag::End => {
                self.exit();
            }
        }
        Ok(())
    }

    /// Jump to a passage, mark the session running, and run its first line.
    pub fn run_passage(&mut self, passage: &str) -> RuntimeResult<LineTag> {
        self.running = true;
        self.engine.goto_passage(passage)?;
        self.next("")
    }

    /// Run a passage until the first tag that is neither dialogue nor
    /// command, then force-exit. Returns whether a choice set was reached.
    pub fn run_passage_until_choice(&mut self, passage: &str) -> RuntimeResult<bool> {
        self.run_passage(passage)?;
        while matches!(self.tag, LineTag::Dialogue | LineTag::Command) {
            self.next("")?;
        }
        let reached_choice = self.tag == LineTag::Choices;
        self.exit();
        Ok(reached_choice)
    }

    /// Exit the current passage: clears the running flag and fires the
    /// dialogue-ended event. May be used to forcibly leave an incomplete
    /// passage.
    pub fn exit(&mut self) {
        self.running = false;
        self.events.dialogue_end.emit(&());
    }

    // ------------------------------------------------------------------
    // Delayed advance
    // ------------------------------------------------------------------

    /// Schedule a [`Runner::next`] with `input` after `delay` of unscaled
    /// wall-clock time. Sets the waiting flag; ordinary `next` calls are
    /// rejected until the advance fires or is cancelled.
    pub fn next_in(&mut self, delay: Duration, input: impl Into<String>) {
        if self.waiting {
            warn!("delayed advance already pending; ignoring next_in");
            return;
        }
        self.pending = Some(PendingAdvance {
            trigger: AdvanceTrigger::After(delay),
            input: input.into(),
        });
        self.waiting = true;
    }

    /// Schedule a [`Runner::next`] with `input` for when `predicate` first
    /// returns true. Sets the waiting flag like [`Runner::next_in`].
    pub fn next_when(
        &mut self,
        predicate: impl Fn() -> bool + Send + 'static,
        input: impl Into<String>,
    ) {
        if self.waiting {
            warn!("delayed advance already pending; ignoring next_when");
            return;
        }
        self.pending = Some(PendingAdvance {
            trigger: AdvanceTrigger::When(Box::new(predicate)),
            input: input.into(),
        });
        self.waiting = true;
    }

    /// Abandon a pending delayed advance, clearing the waiting flag.
    /// Returns whether anything was pending.
    pub fn cancel_delayed(&mut self) -> bool {
        self.waiting = false;
        self.pending.take().is_some()
    }

    /// Drive the pending delayed advance.
    ///
    /// The host calls this with the unscaled wall-clock time since the last
    /// tick, so a paused game-time scale cannot starve the resume. When the
    /// trigger fires, the waiting flag is cleared first and the scheduled
    /// advance runs; its tag is returned.
    pub fn tick(&mut self, elapsed: Duration) -> RuntimeResult<Option<LineTag>> {
        let ready = match self.pending.as_mut() {
            None => return Ok(None),
            Some(pending) => pending.ready(elapsed),
        };
        if !ready {
            return Ok(None);
        }
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        self.waiting = false;
        self.next(&pending.input).map(Some)
    }
}
