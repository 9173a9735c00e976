//! Hack assembler command-line driver.

#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use log::info;

/// Assembler for the Hack assembly language.
#[derive(Parser)]
#[command(name = "hack-assembler", version)]
struct Cli {
    /// .asm file to assemble; the output is a sibling .hack file.
    #[arg(short, long, value_name = "PATH")]
    file: PathBuf,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let output = hack_assembler::assemble_file(&cli.file)
        .with_context(|| format!("failed to assemble {}", cli.file.display()))?;
    info!("assembled {} -> {}", cli.file.display(), output.display());
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
