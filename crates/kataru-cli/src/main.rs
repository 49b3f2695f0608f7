//! CLI frontend for the Kataru story runtime.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kataru",
    about = "Kataru — drive narrative story fixtures from the command line",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new story directory with a demo fixture
    Init {
        /// Name of the story directory to create
        name: String,
    },

    /// Load and validate a story fixture
    Check {
        /// Path to the story fixture (JSON)
        story: PathBuf,
    },

    /// Play a story fixture interactively
    Play {
        /// Path to the story fixture (JSON)
        story: PathBuf,

        /// Passage to start from (default: the fixture's start passage)
        #[arg(short, long)]
        passage: Option<String>,
    },

    /// Generate a Rust constants file from story identifiers
    Codegen {
        /// Path to the story fixture (JSON)
        story: PathBuf,

        /// Output file for the generated constants
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { name } => commands::init::run(&name),
        Commands::Check { story } => commands::check::run(&story),
        Commands::Play { story, passage } => commands::play::run(&story, passage.as_deref()),
        Commands::Codegen { story, output } => commands::codegen::run(&story, &output),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
