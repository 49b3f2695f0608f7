use std::io::{self, BufRead};
use std::path::Path;

use colored::Colorize;

use kataru_core::{Choices, Dialogue, InputCommand, LineTag, StoryEngine, Value};
use kataru_runtime::{
    CommandHandler, Runner, Script, ScriptedLine, ScriptedStory, SessionPaths,
};

pub fn run(story: &Path, passage: Option<&str>) -> Result<(), String> {
    let parent = story.parent().unwrap_or_else(|| Path::new("."));
    let paths = SessionPaths::new(
        story,
        parent.join("bookmark.json"),
        parent.join("save.json"),
    );

    let mut runner =
        Runner::new(ScriptedStory::new(), paths).map_err(|e| e.to_string())?;
    runner
        .engine()
        .validate()
        .map_err(|e| format!("story is invalid: {}", e.message))?;

    register_print_handlers(&runner);
    subscribe_events(&runner);

    let start = passage
        .map(str::to_string)
        .unwrap_or_else(|| runner.engine().script().start.clone());

    let mut tag = runner.run_passage(&start).map_err(|e| e.to_string())?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut offered: Vec<String> = Vec::new();

    while tag != LineTag::End {
        let input = match tag {
            LineTag::Choices | LineTag::InvalidChoice => {
                if tag == LineTag::Choices {
                    offered = runner.engine().choices().map_err(|e| e.to_string())?.options;
                }
                let Some(Ok(line)) = lines.next() else { break };
                resolve_selection(&line, &offered)
            }
            LineTag::InputCommand => {
                let Some(Ok(line)) = lines.next() else { break };
                line.trim().to_string()
            }
            _ => String::new(),
        };
        tag = runner.next(&input).map_err(|e| e.to_string())?;
    }

    println!();
    println!("  The end.");

    Ok(())
}

/// Register a printing handler for every character and command name
/// appearing in the fixture, so nothing dispatches into the void.
fn register_print_handlers(runner: &Runner<ScriptedStory>) {
    let delegates = runner.delegates();

    for name in runner.engine().character_names() {
        delegates.characters.register(
            name,
            std::sync::Arc::new(|dialogue: &Dialogue| {
                println!("  {}: {}", dialogue.speaker.bold(), dialogue.text);
                Ok(())
            }),
        );
    }

    for name in runner.engine().command_names() {
        let params = declared_params(runner.engine().script(), &name);
        let label = name.clone();
        delegates.commands.register(
            name,
            CommandHandler::new(params, move |args: &[Value]| {
                let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
                println!("  {}", format!("[{} {}]", label, rendered.join(" ")).dimmed());
                Ok(())
            }),
        );
    }
}

fn subscribe_events(runner: &Runner<ScriptedStory>) {
    runner.events().choices.connect(|choices: &Choices| {
        println!();
        for (index, option) in choices.options.iter().enumerate() {
            println!("  {}. {}", index + 1, option);
        }
    });
    runner.events().invalid_choice.connect(|_: &()| {
        println!("  {}", "That is not one of the choices.".dimmed());
    });
    runner
        .events()
        .input_command
        .connect(|prompt: &InputCommand| {
            println!("  {}?", prompt.prompt.italic());
        });
}

/// The declared parameter names for a command, taken from its first
/// occurrence in the fixture.
fn declared_params(script: &Script, name: &str) -> Vec<String> {
    script
        .passages
        .values()
        .flatten()
        .find_map(|line| match line {
            ScriptedLine::Command(command) if command.name == name => {
                Some(command.params.keys().cloned().collect())
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// Accept either a choice label or its 1-based number.
fn resolve_selection(input: &str, offered: &[String]) -> String {
    let trimmed = input.trim();
    match trimmed.parse::<usize>() {
        Ok(index) if index >= 1 && index <= offered.len() => offered[index - 1].clone(),
        _ => trimmed.to_string(),
    }
}
