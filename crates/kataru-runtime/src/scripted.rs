//! A playback engine for pre-structured story fixtures.
//!
//! [`ScriptedStory`] implements [`StoryEngine`] over a [`Script`]: named
//! passages of already line-structured steps, loadable from JSON. It stands
//! in for the native interpreter in tests, tooling, and demos. It performs
//! no parsing or compilation of a dialogue scripting language — a fixture is
//! authored in its final line form.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use kataru_core::{
    Choices, Command, Dialogue, EngineError, EngineResult, InputCommand, LineTag, StoryEngine,
    Value, namespace,
};

/// One selectable option in a scripted choice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// The label shown to (and matched against) the player.
    pub label: String,
    /// Passage to jump to when selected. Falls through to the next line
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goto: Option<String>,
}

impl ChoiceOption {
    /// An option that falls through to the next line.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            goto: None,
        }
    }

    /// Jump to a passage when selected.
    pub fn with_goto(mut self, passage: impl Into<String>) -> Self {
        self.goto = Some(passage.into());
        self
    }
}

/// One pre-structured step of a scripted passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedLine {
    /// A character speaks.
    Dialogue(Dialogue),
    /// The story invokes a command.
    Command(Command),
    /// The story offers choices and holds until one is selected.
    Choices {
        /// The selectable options.
        options: Vec<ChoiceOption>,
        /// Timeout in seconds; zero or negative means none.
        #[serde(default)]
        timeout: f64,
    },
    /// The story requests free-text input and holds until answered.
    Input(InputCommand),
}

fn default_start() -> String {
    "start".to_string()
}

/// A story fixture: named passages of scripted lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// The passage the cursor starts in.
    #[serde(default = "default_start")]
    pub start: String,
    /// Passages by name.
    #[serde(default)]
    pub passages: BTreeMap<String, Vec<ScriptedLine>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            start: default_start(),
            passages: BTreeMap::new(),
        }
    }
}

impl Script {
    /// Create an empty script starting at `start`.
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            passages: BTreeMap::new(),
        }
    }

    /// Add a passage.
    pub fn with_passage(
        mut self,
        name: impl Into<String>,
        lines: impl IntoIterator<Item = ScriptedLine>,
    ) -> Self {
        self.passages
            .insert(name.into(), lines.into_iter().collect());
        self
    }

    /// Total number of lines across all passages.
    pub fn line_count(&self) -> usize {
        self.passages.values().map(Vec::len).sum()
    }
}

/// Cursor and state, the part of a session the engine persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Bookmark {
    passage: String,
    line: usize,
    #[serde(default)]
    state: BTreeMap<String, Value>,
}

/// A [`StoryEngine`] that replays a [`Script`].
///
/// Dialogue and command lines consume the cursor as they are served;
/// choice and input lines hold it until the player answers, so re-advancing
/// with a non-matching selection yields [`LineTag::InvalidChoice`] without
/// losing position.
pub struct ScriptedStory {
    script: Script,
    state: BTreeMap<String, Value>,
    passage: String,
    line: usize,
    tag: LineTag,
    current: Option<ScriptedLine>,
    snapshots: BTreeMap<String, Bookmark>,
}

impl ScriptedStory {
    /// Create an engine with no story loaded.
    pub fn new() -> Self {
        Self::from_script(Script::default())
    }

    /// Create an engine over an in-memory script.
    pub fn from_script(script: Script) -> Self {
        let passage = script.start.clone();
        Self {
            script,
            state: BTreeMap::new(),
            passage,
            line: 0,
            tag: LineTag::End,
            current: None,
            snapshots: BTreeMap::new(),
        }
    }

    /// The loaded script.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// All passage names, sorted.
    pub fn passage_names(&self) -> Vec<String> {
        self.script.passages.keys().cloned().collect()
    }

    /// All speaker names appearing in dialogue lines, sorted.
    pub fn character_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for lines in self.script.passages.values() {
            for line in lines {
                if let ScriptedLine::Dialogue(dialogue) = line {
                    names.insert(dialogue.speaker.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    /// All command names appearing in command lines, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for lines in self.script.passages.values() {
            for line in lines {
                if let ScriptedLine::Command(command) = line {
                    names.insert(command.name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    fn bookmark(&self) -> Bookmark {
        Bookmark {
            passage: self.passage.clone(),
            line: self.line,
            state: self.state.clone(),
        }
    }

    fn restore(&mut self, bookmark: Bookmark) -> EngineResult<()> {
        if !self.script.passages.contains_key(&bookmark.passage) {
            return Err(EngineError::new(format!(
                "bookmark points at unknown passage '{}'",
                bookmark.passage
            )));
        }
        self.passage = bookmark.passage;
        self.line = bookmark.line;
        self.state = bookmark.state;
        Ok(())
    }

    fn line_at_cursor(&self) -> Option<&ScriptedLine> {
        self.script
            .passages
            .get(&self.passage)
            .and_then(|lines| lines.get(self.line))
    }

    /// Resolve a pending choice line against the player's selection.
    /// Returns whether the selection matched.
    fn select_choice(&mut self, input: &str) -> EngineResult<bool> {
        let Some(ScriptedLine::Choices { options, .. }) = self.line_at_cursor() else {
            return Err(EngineError::new("choice pending but cursor is not on one"));
        };
        let Some(option) = options.iter().find(|option| option.label == input) else {
            return Ok(false);
        };
        match option.goto.clone() {
            Some(target) => {
                if !self.script.passages.contains_key(&target) {
                    return Err(EngineError::new(format!(
                        "choice '{input}' jumps to unknown passage '{target}'"
                    )));
                }
                self.passage = target;
                self.line = 0;
            }
            None => self.line += 1,
        }
        Ok(true)
    }

    fn wrong_accessor(&self, wanted: &str) -> EngineError {
        EngineError::new(format!(
            "no {wanted} payload available after tag {:?}",
            self.tag
        ))
    }
}

impl Default for ScriptedStory {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(err: std::io::Error) -> EngineError {
    EngineError::new(err.to_string())
}

fn json_error(err: serde_json::Error) -> EngineError {
    EngineError::new(err.to_string())
}

impl StoryEngine for ScriptedStory {
    fn load_story(&mut self, path: &Path) -> EngineResult<()> {
        let text = fs::read_to_string(path).map_err(io_error)?;
        let script: Script = serde_json::from_str(&text).map_err(json_error)?;
        *self = Self::from_script(script);
        Ok(())
    }

    fn save_story(&self, path: &Path) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(&self.script).map_err(json_error)?;
        fs::write(path, text).map_err(io_error)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.script.passages.is_empty() {
            return Err(EngineError::new("story has no passages"));
        }
        if !self.script.passages.contains_key(&self.script.start) {
            return Err(EngineError::new(format!(
                "start passage '{}' does not exist",
                self.script.start
            )));
        }
        for (passage, lines) in &self.script.passages {
            for (index, line) in lines.iter().enumerate() {
                let fail = |problem: String| {
                    Err(EngineError::new(format!("{passage}:{index}: {problem}")))
                };
                match line {
                    ScriptedLine::Dialogue(dialogue) => {
                        if dialogue.speaker.is_empty() {
                            return fail("dialogue line has no speaker".to_string());
                        }
                    }
                    ScriptedLine::Command(command) => {
                        if command.name.is_empty() {
                            return fail("command line has an empty name".to_string());
                        }
                    }
                    ScriptedLine::Choices { options, .. } => {
                        if options.is_empty() {
                            return fail("choice line offers no options".to_string());
                        }
                        for option in options {
                            if option.label.is_empty() {
                                return fail("choice option has an empty label".to_string());
                            }
                            if let Some(target) = &option.goto {
                                if !self.script.passages.contains_key(target) {
                                    return fail(format!(
                                        "choice '{}' jumps to unknown passage '{target}'",
                                        option.label
                                    ));
                                }
                            }
                        }
                    }
                    ScriptedLine::Input(input) => {
                        if input.prompt.is_empty() {
                            return fail("input line has an empty prompt".to_string());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn codegen_consts(&self, path: &Path) -> EngineResult<()> {
        let mut out = String::new();
        out.push_str("//! Generated constants for story identifiers.\n");
        out.push_str("//! Do not edit manually; regenerate with `kataru codegen`.\n");

        let sections = [
            ("passages", self.passage_names()),
            ("characters", self.character_names()),
            ("commands", self.command_names()),
        ];
        for (section, names) in sections {
            let _ = write!(out, "\n/// {section} identifiers.\npub mod {section} {{\n");
            let mut seen = BTreeSet::new();
            for name in names {
                let ident = namespace::const_ident(&name);
                if ident.is_empty() || !seen.insert(ident.clone()) {
                    continue;
                }
                let _ = write!(out, "    /// `{name}`\n    pub const {ident}: &str = \"{name}\";\n");
            }
            out.push_str("}\n");
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, out).map_err(io_error)
    }

    fn load_bookmark(&mut self, path: &Path) -> EngineResult<()> {
        let text = fs::read_to_string(path).map_err(io_error)?;
        let bookmark: Bookmark = serde_json::from_str(&text).map_err(json_error)?;
        self.restore(bookmark)
    }

    fn save_bookmark(&self, path: &Path) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(&self.bookmark()).map_err(json_error)?;
        fs::write(path, text).map_err(io_error)
    }

    fn save_snapshot(&mut self, name: &str) -> EngineResult<()> {
        let bookmark = self.bookmark();
        self.snapshots.insert(name.to_string(), bookmark);
        Ok(())
    }

    fn load_snapshot(&mut self, name: &str) -> EngineResult<()> {
        let bookmark = self
            .snapshots
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::new(format!("no snapshot named '{name}'")))?;
        self.restore(bookmark)
    }

    fn init_runner(&mut self) -> EngineResult<()> {
        self.tag = LineTag::End;
        self.current = None;
        Ok(())
    }

    fn set_state(&mut self, key: &str, value: Value) -> EngineResult<()> {
        self.state.insert(key.to_string(), value);
        Ok(())
    }

    fn get_state(&self, key: &str) -> EngineResult<Option<Value>> {
        Ok(self.state.get(key).cloned())
    }

    fn set_line(&mut self, line: usize) -> EngineResult<()> {
        self.line = line;
        Ok(())
    }

    fn goto_passage(&mut self, passage: &str) -> EngineResult<()> {
        if !self.script.passages.contains_key(passage) {
            return Err(EngineError::new(format!("unknown passage '{passage}'")));
        }
        self.passage = passage.to_string();
        self.line = 0;
        Ok(())
    }

    fn current_passage(&self) -> EngineResult<String> {
        Ok(self.passage.clone())
    }

    fn next(&mut self, input: &str) -> EngineResult<LineTag> {
        // Resolve a held interactive line before serving the next one.
        match self.tag {
            LineTag::Choices | LineTag::InvalidChoice => {
                if !self.select_choice(input)? {
                    self.tag = LineTag::InvalidChoice;
                    return Ok(self.tag);
                }
            }
            LineTag::InputCommand => {
                if let Some(ScriptedLine::Input(prompt)) = &self.current {
                    self.state
                        .insert(prompt.prompt.clone(), Value::String(input.to_string()));
                }
                self.line += 1;
            }
            _ => {}
        }

        let Some(line) = self.line_at_cursor().cloned() else {
            self.current = None;
            self.tag = LineTag::End;
            return Ok(self.tag);
        };
        self.tag = match &line {
            ScriptedLine::Dialogue(_) => {
                self.line += 1;
                LineTag::Dialogue
            }
            ScriptedLine::Command(_) => {
                self.line += 1;
                LineTag::Command
            }
            ScriptedLine::Choices { .. } => LineTag::Choices,
            ScriptedLine::Input(_) => LineTag::InputCommand,
        };
        self.current = Some(line);
        Ok(self.tag)
    }

    fn tag(&self) -> LineTag {
        self.tag
    }

    fn dialogue(&self) -> EngineResult<Dialogue> {
        match (&self.tag, &self.current) {
            (LineTag::Dialogue, Some(ScriptedLine::Dialogue(dialogue))) => Ok(dialogue.clone()),
            _ => Err(self.wrong_accessor("dialogue")),
        }
    }

    fn command(&self) -> EngineResult<Command> {
        match (&self.tag, &self.current) {
            (LineTag::Command, Some(ScriptedLine::Command(command))) => Ok(command.clone()),
            _ => Err(self.wrong_accessor("command")),
        }
    }

    fn choices(&self) -> EngineResult<Choices> {
        match (&self.tag, &self.current) {
            (LineTag::Choices, Some(ScriptedLine::Choices { options, timeout })) => Ok(Choices {
                options: options.iter().map(|option| option.label.clone()).collect(),
                timeout: *timeout,
            }),
            _ => Err(self.wrong_accessor("choices")),
        }
    }

    fn input_command(&self) -> EngineResult<InputCommand> {
        match (&self.tag, &self.current) {
            (LineTag::InputCommand, Some(ScriptedLine::Input(prompt))) => Ok(prompt.clone()),
            _ => Err(self.wrong_accessor("input")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn demo_script() -> Script {
        Script::new("intro")
            .with_passage(
                "intro",
                [
                    ScriptedLine::Dialogue(Dialogue::new("Alice", "Welcome.")),
                    ScriptedLine::Command(Command::new("FadeIn")),
                    ScriptedLine::Choices {
                        options: vec![
                            ChoiceOption::new("Stay"),
                            ChoiceOption::new("Leave").with_goto("farewell"),
                        ],
                        timeout: 0.0,
                    },
                    ScriptedLine::Dialogue(Dialogue::new("Alice", "Glad you stayed.")),
                ],
            )
            .with_passage(
                "farewell",
                [ScriptedLine::Dialogue(Dialogue::new("Alice", "Goodbye."))],
            )
    }

    #[test]
    fn plays_back_in_order() {
        let mut engine = ScriptedStory::from_script(demo_script());

        assert_eq!(engine.next("").unwrap(), LineTag::Dialogue);
        assert_eq!(engine.dialogue().unwrap().text, "Welcome.");
        assert_eq!(engine.next("").unwrap(), LineTag::Command);
        assert_eq!(engine.command().unwrap().name, "FadeIn");
        assert_eq!(engine.next("").unwrap(), LineTag::Choices);
        assert_eq!(
            engine.choices().unwrap().options,
            vec!["Stay".to_string(), "Leave".to_string()]
        );
    }

    #[test]
    fn choice_fall_through_and_goto() {
        let mut engine = ScriptedStory::from_script(demo_script());
        for _ in 0..3 {
            engine.next("").unwrap();
        }

        assert_eq!(engine.next("Stay").unwrap(), LineTag::Dialogue);
        assert_eq!(engine.dialogue().unwrap().text, "Glad you stayed.");

        let mut engine = ScriptedStory::from_script(demo_script());
        for _ in 0..3 {
            engine.next("").unwrap();
        }
        assert_eq!(engine.next("Leave").unwrap(), LineTag::Dialogue);
        assert_eq!(engine.dialogue().unwrap().text, "Goodbye.");
    }

    #[test]
    fn invalid_choice_holds_position() {
        let mut engine = ScriptedStory::from_script(demo_script());
        for _ in 0..3 {
            engine.next("").unwrap();
        }

        assert_eq!(engine.next("Dance").unwrap(), LineTag::InvalidChoice);
        assert_eq!(engine.next("").unwrap(), LineTag::InvalidChoice);
        // A valid selection still works after any number of misses.
        assert_eq!(engine.next("Stay").unwrap(), LineTag::Dialogue);
    }

    #[test]
    fn input_answer_recorded_in_state() {
        let script = Script::new("start").with_passage(
            "start",
            [
                ScriptedLine::Input(InputCommand::new("player_name")),
                ScriptedLine::Dialogue(Dialogue::new("Alice", "Nice to meet you.")),
            ],
        );
        let mut engine = ScriptedStory::from_script(script);

        assert_eq!(engine.next("").unwrap(), LineTag::InputCommand);
        assert_eq!(engine.input_command().unwrap().prompt, "player_name");
        assert_eq!(engine.next("Taro").unwrap(), LineTag::Dialogue);
        assert_eq!(
            engine.get_state("player_name").unwrap(),
            Some(Value::String("Taro".to_string()))
        );
    }

    #[test]
    fn runs_out_to_end() {
        let script = Script::new("start").with_passage(
            "start",
            [ScriptedLine::Dialogue(Dialogue::new("Alice", "One line."))],
        );
        let mut engine = ScriptedStory::from_script(script);

        assert_eq!(engine.next("").unwrap(), LineTag::Dialogue);
        assert_eq!(engine.next("").unwrap(), LineTag::End);
        assert_eq!(engine.next("").unwrap(), LineTag::End);
    }

    #[test]
    fn wrong_accessor_is_reported() {
        let mut engine = ScriptedStory::from_script(demo_script());
        engine.next("").unwrap();

        assert!(engine.command().is_err());
        assert!(engine.choices().is_err());
        assert!(engine.dialogue().is_ok());
    }

    #[test]
    fn bookmark_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmark.json");

        let mut engine = ScriptedStory::from_script(demo_script());
        engine.next("").unwrap();
        engine.set_state("met_alice", Value::Bool(true)).unwrap();
        engine.save_bookmark(&path).unwrap();

        let mut restored = ScriptedStory::from_script(demo_script());
        restored.load_bookmark(&path).unwrap();
        restored.init_runner().unwrap();

        assert_eq!(
            restored.get_state("met_alice").unwrap(),
            Some(Value::Bool(true))
        );
        // Cursor resumes after the first dialogue line.
        assert_eq!(restored.next("").unwrap(), LineTag::Command);
    }

    #[test]
    fn snapshots_restore_cursor_and_state() {
        let mut engine = ScriptedStory::from_script(demo_script());
        engine.next("").unwrap();
        engine.save_snapshot("before_command").unwrap();

        engine.next("").unwrap();
        engine.set_state("k", Value::Number(1.0)).unwrap();

        engine.load_snapshot("before_command").unwrap();
        assert_eq!(engine.get_state("k").unwrap(), None);
        assert_eq!(engine.next("").unwrap(), LineTag::Command);

        assert!(engine.load_snapshot("missing").is_err());
    }

    #[test]
    fn story_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("story.json");

        let original = ScriptedStory::from_script(demo_script());
        original.save_story(&path).unwrap();

        let mut loaded = ScriptedStory::new();
        loaded.load_story(&path).unwrap();
        assert_eq!(loaded.script(), original.script());
    }

    #[test]
    fn validate_rejects_dangling_goto() {
        let script = Script::new("start").with_passage(
            "start",
            [ScriptedLine::Choices {
                options: vec![ChoiceOption::new("Go").with_goto("nowhere")],
                timeout: 0.0,
            }],
        );
        let err = ScriptedStory::from_script(script).validate().unwrap_err();
        assert!(err.message.contains("nowhere"));
    }

    #[test]
    fn validate_rejects_empty_command_name() {
        let script = Script::new("start")
            .with_passage("start", [ScriptedLine::Command(Command::new(""))]);
        let err = ScriptedStory::from_script(script).validate().unwrap_err();
        assert!(err.message.contains("empty name"));
    }

    #[test]
    fn validate_rejects_missing_start() {
        let script = Script::new("missing")
            .with_passage("start", [ScriptedLine::Command(Command::new("X"))]);
        let err = ScriptedStory::from_script(script).validate().unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn codegen_writes_constants() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("generated/consts.rs");

        let engine = ScriptedStory::from_script(demo_script());
        engine.codegen_consts(&path).unwrap();

        let out = fs::read_to_string(&path).unwrap();
        assert!(out.contains("pub mod passages"));
        assert!(out.contains("pub const INTRO: &str = \"intro\";"));
        assert!(out.contains("pub const ALICE: &str = \"Alice\";"));
        assert!(out.contains("pub const FADE_IN: &str = \"FadeIn\";"));
    }

    #[test]
    fn identifier_listings() {
        let engine = ScriptedStory::from_script(demo_script());
        assert_eq!(engine.passage_names(), vec!["farewell", "intro"]);
        assert_eq!(engine.character_names(), vec!["Alice"]);
        assert_eq!(engine.command_names(), vec!["FadeIn"]);
    }
}
