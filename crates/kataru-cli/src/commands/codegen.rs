use std::path::Path;

use kataru_core::StoryEngine;

pub fn run(story: &Path, output: &Path) -> Result<(), String> {
    let engine = super::load_checked(story)?;

    engine
        .codegen_consts(output)
        .map_err(|e| format!("cannot write constants: {}", e.message))?;

    println!("  Generated constants at {}", output.display());

    Ok(())
}
