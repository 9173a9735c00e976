//! Error type shared by every stage of the assembler.

use std::io;
use thiserror::Error;

/// A fatal assembly error.
///
/// The assembler stops at the first violation; every variant names the
/// offending lexeme so the diagnostic can be acted on without re-reading
/// the source.
#[derive(Debug, Error)]
pub enum AsmError {
    /// A `comp`, `dest` or `jump` field that is not in the instruction set.
    #[error("unknown {field} mnemonic `{mnemonic}`")]
    UnknownMnemonic {
        field: &'static str,
        mnemonic: String,
    },

    /// A line that matches none of the three instruction forms.
    #[error("malformed instruction `{line}`")]
    MalformedInstruction { line: String },

    /// A numeric A-instruction operand that does not fit in 15 bits.
    #[error("A-instruction operand `{value}` exceeds the maximum address 32767")]
    AddressOutOfRange { value: String },

    /// A label defined twice, or shadowing a predefined symbol.
    #[error("duplicate label `{symbol}`")]
    DuplicateLabel { symbol: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}
