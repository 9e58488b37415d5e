//! qforge CLI: topic question discovery and refinement.
//!
//! Turns a list of topics into a table of refined, use-case framed questions
//! sourced from Stack Exchange search and an LLM.

mod commands;
mod progress;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
