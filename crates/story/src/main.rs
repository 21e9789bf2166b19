//! # plate-toolbar-story
//!
//! Replays a JSON script of toolbar actions against a headless editor and
//! prints the resulting document and toolbar state.

mod script;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;

use crate::script::{DEMO_SCRIPT, Script};

#[derive(Parser)]
#[command(name = "plate-toolbar-story")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Script to replay (defaults to the bundled demo)
    #[arg(long)]
    script: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let source = match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?,
        None => DEMO_SCRIPT.to_string(),
    };

    let report = Script::from_json_str(&source)?.run()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
