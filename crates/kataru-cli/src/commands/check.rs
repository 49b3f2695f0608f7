use std::path::Path;

pub fn run(story: &Path) -> Result<(), String> {
    let engine = super::load_checked(story)?;

    println!("  All checks passed for '{}'.", story.display());
    println!(
        "  {} passages, {} lines, {} characters, {} commands",
        engine.passage_names().len(),
        engine.script().line_count(),
        engine.character_names().len(),
        engine.command_names().len()
    );

    Ok(())
}
