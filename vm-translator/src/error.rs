//! Error type for the VM translator.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A fatal translation error. The translator stops at the first violation.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// A line whose first word is not a VM command.
    #[error("unknown command `{line}`")]
    UnknownCommand { line: String },

    /// A recognized command with the wrong shape (arity, index, operand).
    #[error("malformed command `{line}`")]
    MalformedCommand { line: String },

    /// A `push`/`pop` naming a segment that does not exist.
    #[error("unknown segment `{segment}`")]
    UnknownSegment { segment: String },

    /// `pop constant` is meaningless: constants have no storage.
    #[error("cannot pop to the constant segment")]
    PopToConstant,

    /// Directory mode found nothing to translate.
    #[error("no .vm files found in `{dir}`")]
    NoVmFiles { dir: PathBuf },

    #[error(transparent)]
    Io(#[from] io::Error),
}
