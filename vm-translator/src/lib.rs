//! Translator from Hack VM code to Hack assembly.
//!
//! Lowers the stack-machine commands of `.vm` files into straight-line
//! assembly against the standard pointer cells (`SP`, `LCL`, `ARG`, `THIS`,
//! `THAT`), the scratch cells R13/R14 and the temp window at RAM 5-12.
//!
//! # Architecture
//!
//! - [`parser`]: line-level parsing into the tagged [`Command`] form
//! - [`code_writer`]: per-command lowering, label minting and the
//!   call/return protocol
//!
//! A single [`CodeWriter`] instance spans one `.asm` output. In directory
//! mode that one instance translates every `.vm` file after a bootstrap
//! prologue, so minted labels stay unique across the whole program and each
//! file keeps its own `static` namespace.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod code_writer;
pub mod error;
pub mod parser;

pub use code_writer::CodeWriter;
pub use error::TranslateError;
pub use parser::{ArithmeticOp, Command, Parser, Segment};

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{debug, info};

/// Translates a single `.vm` file into a sibling `.asm` file.
///
/// No bootstrap code is emitted; the file's stem becomes the static-segment
/// unit. Returns the output path.
pub fn translate_file(input: &Path) -> Result<PathBuf, TranslateError> {
    let output = input.with_extension("asm");
    let mut writer = CodeWriter::new(BufWriter::new(File::create(&output)?));

    translate_into(&mut writer, input)?;
    writer.finish()?;

    info!("translated {} -> {}", input.display(), output.display());
    Ok(output)
}

/// Translates every `.vm` file in `dir` into one combined
/// `dir/<basename>.asm`, preceded by the bootstrap prologue.
///
/// Any pre-existing output is removed first so reruns are idempotent. Files
/// are translated in sorted order; ordering is not semantically significant
/// because labels are globally unique by construction.
pub fn translate_dir(dir: &Path) -> Result<PathBuf, TranslateError> {
    let sources = vm_files_in(dir)?;
    if sources.is_empty() {
        return Err(TranslateError::NoVmFiles {
            dir: dir.to_path_buf(),
        });
    }

    let output = dir.join(format!("{}.asm", dir_basename(dir)?));
    if output.exists() {
        fs::remove_file(&output)?;
    }

    let mut writer = CodeWriter::new(BufWriter::new(File::create(&output)?));
    writer.write_bootstrap()?;
    for source in &sources {
        translate_into(&mut writer, source)?;
    }
    writer.finish()?;

    info!(
        "translated {} file(s) -> {}",
        sources.len(),
        output.display()
    );
    Ok(output)
}

/// Translates a `.vm` file or a directory of `.vm` files.
pub fn translate_target(target: &Path) -> Result<PathBuf, TranslateError> {
    if target.is_dir() {
        translate_dir(target)
    } else {
        translate_file(target)
    }
}

/// Parses one source file through an existing writer.
fn translate_into<W: std::io::Write>(
    writer: &mut CodeWriter<W>,
    source: &Path,
) -> Result<(), TranslateError> {
    let unit = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Unknown");
    writer.set_unit(unit);
    debug!("translating {} as unit {unit}", source.display());

    for command in Parser::open(source)? {
        writer.write_command(&command?)?;
    }
    Ok(())
}

/// The `.vm` files of a directory, sorted for deterministic output.
fn vm_files_in(dir: &Path) -> Result<Vec<PathBuf>, TranslateError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "vm"))
        .collect();
    files.sort();
    Ok(files)
}

/// Basename used for the combined output of directory mode.
fn dir_basename(dir: &Path) -> Result<String, TranslateError> {
    // `file_name` is None for paths like `..`; canonicalize to recover one.
    if let Some(name) = dir.file_name().and_then(|name| name.to_str()) {
        return Ok(name.to_string());
    }
    let canonical = dir.canonicalize()?;
    Ok(canonical
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("out")
        .to_string())
}
