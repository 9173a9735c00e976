//! Jack compiler command-line driver.

#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use jack_compiler::Mode;

/// Compiler for the Jack programming language.
#[derive(Parser)]
#[command(name = "jack-compiler", version)]
struct Cli {
    /// .jack file or directory of .jack files; each compiled file produces
    /// a sibling output.
    target: PathBuf,

    /// t = token markup (*T.xml), p = parse-tree markup (*P.xml),
    /// g = VM code (*.vm).
    #[arg(short, long, value_enum, default_value = "g")]
    mode: ModeArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    #[value(name = "t")]
    Tokenize,
    #[value(name = "p")]
    Parse,
    #[value(name = "g")]
    Generate,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Tokenize => Mode::Tokenize,
            ModeArg::Parse => Mode::Parse,
            ModeArg::Generate => Mode::Generate,
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    jack_compiler::compile_target(&cli.target, cli.mode.into())
        .with_context(|| format!("failed to compile {}", cli.target.display()))?;
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
