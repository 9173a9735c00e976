//! Compiler from the Jack language to Hack VM code.
//!
//! A hand-written front-end in three layers:
//!
//! - [`tokenizer`]: lazy lexer with string-literal, comment and
//!   symbol-adjacency handling
//! - [`symbol_table`]: the two scoped tables behind identifier resolution
//! - [`engine`]: recursive-descent parser driving the [`generator`] VM
//!   writer during the descent
//!
//! Two diagnostic modes stop the pipeline early: token markup (`*T.xml`)
//! straight off the tokenizer, and parse-tree markup (`*P.xml`) from the
//! syntax-only [`analyzer`]. The default mode emits one `.vm` file per
//! compiled class.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod analyzer;
pub mod engine;
pub mod error;
pub mod generator;
pub mod symbol_table;
pub mod tokenizer;
pub mod xml;

pub use analyzer::XmlAnalyzer;
pub use engine::CompilationEngine;
pub use error::CompileError;
pub use generator::{Segment, VmOp, VmWriter};
pub use symbol_table::{SymbolTable, VarEntry, VarKind};
pub use tokenizer::{Token, TokenKind, Tokenizer};

use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

/// What the compiler emits for each source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Token markup, `<Stem>T.xml`.
    Tokenize,
    /// Parse-tree markup, `<Stem>P.xml`.
    Parse,
    /// VM code, `<Stem>.vm`.
    Generate,
}

/// Output path for a source file under a mode, next to the input.
#[must_use]
pub fn output_path(input: &Path, mode: Mode) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match mode {
        Mode::Tokenize => format!("{stem}T.xml"),
        Mode::Parse => format!("{stem}P.xml"),
        Mode::Generate => format!("{stem}.vm"),
    };
    input.with_file_name(name)
}

/// Compiles one `.jack` file; returns the written output path.
pub fn compile_file(input: &Path, mode: Mode) -> Result<PathBuf, CompileError> {
    let tokenizer = Tokenizer::open(input)?;
    let output = output_path(input, mode);
    let out = BufWriter::new(File::create(&output)?);

    match mode {
        Mode::Tokenize => {
            write_tokens(tokenizer, out)?;
        }
        Mode::Parse => {
            XmlAnalyzer::new(tokenizer, out)?.analyze()?;
        }
        Mode::Generate => {
            CompilationEngine::new(tokenizer, VmWriter::new(out))?.compile()?;
        }
    }

    info!("compiled {} -> {}", input.display(), output.display());
    Ok(output)
}

/// Compiles a `.jack` file or every `.jack` file in a directory.
pub fn compile_target(target: &Path, mode: Mode) -> Result<Vec<PathBuf>, CompileError> {
    if !target.is_dir() {
        return Ok(vec![compile_file(target, mode)?]);
    }

    let mut sources: Vec<PathBuf> = fs::read_dir(target)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jack"))
        .collect();
    sources.sort();
    if sources.is_empty() {
        return Err(CompileError::NoJackFiles {
            dir: target.to_path_buf(),
        });
    }

    sources
        .iter()
        .map(|source| compile_file(source, mode))
        .collect()
}

/// Drains the tokenizer into `<tokens>` markup.
fn write_tokens<R: BufRead, W: Write>(
    mut tokenizer: Tokenizer<R>,
    mut out: W,
) -> Result<W, CompileError> {
    writeln!(out, "<tokens>")?;
    while tokenizer.has_more_tokens()? {
        tokenizer.advance();
        if let Some(token) = tokenizer.current() {
            xml::write_token(&mut out, token)?;
        }
    }
    writeln!(out, "</tokens>")?;
    out.flush()?;
    Ok(out)
}
