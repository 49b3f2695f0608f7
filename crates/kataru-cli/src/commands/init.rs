use std::fs;
use std::path::Path;

use kataru_core::{Command, Dialogue, StoryEngine};
use kataru_runtime::{ChoiceOption, Script, ScriptedLine, ScriptedStory, Settings};

pub fn run(name: &str) -> Result<(), String> {
    let dir = Path::new(name);

    if dir.exists() {
        return Err(format!("directory '{name}' already exists"));
    }

    fs::create_dir_all(dir).map_err(|e| format!("cannot create directory: {e}"))?;

    let engine = ScriptedStory::from_script(demo_script());
    engine
        .save_story(&dir.join("story.json"))
        .map_err(|e| format!("cannot write story.json: {}", e.message))?;
    engine
        .save_bookmark(&dir.join("bookmark.json"))
        .map_err(|e| format!("cannot write bookmark.json: {}", e.message))?;

    let settings = Settings {
        story_path: "story.json".to_string(),
        bookmark_path: "bookmark.json".to_string(),
        save_path: "save.json".to_string(),
        codegen_path: None,
    };
    settings
        .save(&dir.join("settings.json"))
        .map_err(|e| format!("cannot write settings.json: {e}"))?;

    println!("Created story '{name}' in {name}/");
    println!("  story.json     — demo story fixture");
    println!("  bookmark.json  — default bookmark");
    println!("  settings.json  — session paths");
    println!();
    println!("Get started:");
    println!("  kataru check {name}/story.json");
    println!("  kataru play {name}/story.json");

    Ok(())
}

fn demo_script() -> Script {
    Script::new("intro")
        .with_passage(
            "intro",
            [
                ScriptedLine::Command(Command::new("FadeIn").with_param("duration", 0.5)),
                ScriptedLine::Dialogue(Dialogue::new("Kaede", "Welcome to your new story.")),
                ScriptedLine::Dialogue(Dialogue::new("Kaede", "Shall we begin?")),
                ScriptedLine::Choices {
                    options: vec![
                        ChoiceOption::new("Begin"),
                        ChoiceOption::new("Leave").with_goto("farewell"),
                    ],
                    timeout: 0.0,
                },
                ScriptedLine::Dialogue(Dialogue::new("Kaede", "Wonderful. Edit story.json to make it yours.")),
            ],
        )
        .with_passage(
            "farewell",
            [ScriptedLine::Dialogue(Dialogue::new("Kaede", "Until next time."))],
        )
}
