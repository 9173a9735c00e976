//! Error type for the Jack compiler front-end.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A fatal compilation error: lexical, syntactic or resolution.
///
/// The compiler stops at the first violation; no recovery, no partial
/// output guarantees.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A character sequence that is no Jack token.
    #[error("invalid token `{0}`")]
    InvalidToken(String),

    /// A `/* …` block comment that never closes.
    #[error("unclosed block comment starting at `{line}`")]
    UnclosedComment { line: String },

    /// A line with an odd number of string quotes.
    #[error("unclosed quote in `{line}`")]
    UnclosedQuote { line: String },

    /// Grammar mismatch against a concrete expected token.
    #[error("expected `{expected}`, got `{found}`")]
    ExpectedToken { expected: String, found: String },

    /// Grammar position that requires an identifier.
    #[error("expected an identifier, got `{found}`")]
    ExpectedIdentifier { found: String },

    /// The token stream ended inside a production.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A name used where storage is required, found in neither scope.
    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    /// A name declared twice in the same scope.
    #[error("symbol `{name}` already defined in this scope")]
    DuplicateSymbol { name: String },

    /// `pop constant` is meaningless: constants have no storage.
    #[error("cannot pop to the constant segment")]
    PopToConstant,

    /// Directory mode found nothing to compile.
    #[error("no .jack files found in `{dir}`")]
    NoJackFiles { dir: PathBuf },

    #[error(transparent)]
    Io(#[from] io::Error),
}
