//! VM translator command-line driver.

#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;

/// Translator for Hack VM code.
#[derive(Parser)]
#[command(name = "vm-translator", version)]
struct Cli {
    /// .vm file, or a directory whose .vm files are translated as one
    /// program with bootstrap code.
    target: PathBuf,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    vm_translator::translate_target(&cli.target)
        .with_context(|| format!("failed to translate {}", cli.target.display()))?;
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}
