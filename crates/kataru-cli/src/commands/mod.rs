pub mod check;
pub mod codegen;
pub mod init;
pub mod play;

use std::path::Path;

use kataru_core::StoryEngine;
use kataru_runtime::ScriptedStory;

/// Load a story fixture and validate it.
fn load_checked(story: &Path) -> Result<ScriptedStory, String> {
    let mut engine = ScriptedStory::new();
    engine
        .load_story(story)
        .map_err(|e| format!("cannot load '{}': {}", story.display(), e.message))?;
    engine
        .validate()
        .map_err(|e| format!("story is invalid: {}", e.message))?;
    Ok(engine)
}
