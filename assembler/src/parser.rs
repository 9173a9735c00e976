//! Parser for Hack assembly source.
//!
//! Lines are classified into the three instruction forms without allocating:
//! every [`Instruction`] borrows its fields from the input line. Comment and
//! whitespace stripping use byte-level scans on the hot path.

use crate::error::AsmError;

/// A single parsed instruction.
///
/// Borrowed from the source line it was parsed from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction<'a> {
    /// `@operand` where operand is a decimal constant or a symbol.
    A(&'a str),
    /// `dest=comp;jump`, with `dest=` and `;jump` each optional.
    C {
        dest: &'a str,
        comp: &'a str,
        jump: &'a str,
    },
    /// `(LABEL)` pseudo-instruction; contributes no output.
    Label(&'a str),
}

/// Iterator over the real instructions of a source listing.
///
/// Skips blank lines and comments; yields an error for any line that matches
/// none of the three instruction forms.
pub struct ParserLines<'a> {
    lines: std::slice::Iter<'a, String>,
}

impl<'a> ParserLines<'a> {
    /// Creates a parser over a slice of raw source lines.
    #[must_use]
    pub fn from_lines(lines: &'a [String]) -> Self {
        Self {
            lines: lines.iter(),
        }
    }

    /// Strips a trailing `// …` comment using a byte scan.
    #[inline]
    fn strip_comment(line: &str) -> &str {
        let bytes = line.as_bytes();
        for i in 0..bytes.len().saturating_sub(1) {
            if bytes[i] == b'/' && bytes[i + 1] == b'/' {
                return &line[..i];
            }
        }
        line
    }
}

impl<'a> Iterator for ParserLines<'a> {
    type Item = Result<Instruction<'a>, AsmError>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            if line.is_empty() {
                continue;
            }
            let trimmed = Self::strip_comment(line).trim();
            if !trimmed.is_empty() {
                return Some(parse_instruction(trimmed));
            }
        }
        None
    }
}

/// Parses one cleaned, non-empty line into an [`Instruction`].
///
/// Mnemonic validity of C-instruction fields is checked later, at encoding
/// time; this stage only enforces the line shapes.
pub fn parse_instruction(line: &str) -> Result<Instruction<'_>, AsmError> {
    let malformed = || AsmError::MalformedInstruction {
        line: line.to_string(),
    };
    if line.is_empty() {
        return Err(malformed());
    }

    match line.as_bytes()[0] {
        b'@' => {
            let operand = &line[1..];
            if operand.is_empty() || !is_valid_operand(operand) {
                return Err(malformed());
            }
            Ok(Instruction::A(operand))
        }
        b'(' => {
            let symbol = line
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(malformed)?;
            if symbol.is_empty() || !is_valid_symbol(symbol) {
                return Err(malformed());
            }
            Ok(Instruction::Label(symbol))
        }
        _ => {
            let (dest, rest) = match line.find('=') {
                Some(pos) => (&line[..pos], &line[pos + 1..]),
                None => ("", line),
            };
            let (comp, jump) = match rest.find(';') {
                Some(pos) => (&rest[..pos], &rest[pos + 1..]),
                None => (rest, ""),
            };
            if comp.is_empty() {
                return Err(malformed());
            }
            Ok(Instruction::C { dest, comp, jump })
        }
    }
}

/// An A-operand is either all digits or a symbol.
#[inline]
fn is_valid_operand(operand: &str) -> bool {
    let bytes = operand.as_bytes();
    if bytes[0].is_ascii_digit() {
        bytes.iter().all(u8::is_ascii_digit)
    } else {
        is_valid_symbol(operand)
    }
}

/// Symbols are drawn from letters, digits, `_`, `.`, `$` and `:`, and must
/// not start with a digit.
#[inline]
fn is_valid_symbol(symbol: &str) -> bool {
    let bytes = symbol.as_bytes();
    !bytes[0].is_ascii_digit()
        && bytes
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'$' | b':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_instruction_classification() {
        assert_eq!(parse_instruction("@100").unwrap(), Instruction::A("100"));
        assert_eq!(
            parse_instruction("(LOOP)").unwrap(),
            Instruction::Label("LOOP")
        );
        assert_eq!(
            parse_instruction("D=M").unwrap(),
            Instruction::C {
                dest: "D",
                comp: "M",
                jump: ""
            }
        );
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(ParserLines::strip_comment("@100 // comment"), "@100 ");
        assert_eq!(ParserLines::strip_comment("D=M"), "D=M");
        assert_eq!(ParserLines::strip_comment("// only comment"), "");
    }

    #[test]
    fn test_skips_blanks_and_comments() {
        let lines = to_lines(&["// comment", "", "@100", "D=M // inline"]);
        let parsed: Vec<_> = ParserLines::from_lines(&lines)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            parsed,
            vec![
                Instruction::A("100"),
                Instruction::C {
                    dest: "D",
                    comp: "M",
                    jump: ""
                }
            ]
        );
    }

    #[test]
    fn test_c_instruction_full() {
        assert_eq!(
            parse_instruction("MD=D+1;JMP").unwrap(),
            Instruction::C {
                dest: "MD",
                comp: "D+1",
                jump: "JMP"
            }
        );
    }

    #[test]
    fn test_c_instruction_no_dest() {
        assert_eq!(
            parse_instruction("D+1;JMP").unwrap(),
            Instruction::C {
                dest: "",
                comp: "D+1",
                jump: "JMP"
            }
        );
    }

    #[test]
    fn test_c_instruction_no_jump() {
        assert_eq!(
            parse_instruction("D=D+1").unwrap(),
            Instruction::C {
                dest: "D",
                comp: "D+1",
                jump: ""
            }
        );
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_instruction("@").is_err());
        assert!(parse_instruction("(LOOP").is_err());
        assert!(parse_instruction("()").is_err());
        assert!(parse_instruction("D=").is_err());
        assert!(parse_instruction("@12abc").is_err());
        assert!(parse_instruction("(2LOOP)").is_err());
    }

    #[test]
    fn test_whitespace_handling() {
        let lines = to_lines(&["   @i   ", "  M=1  // set  "]);
        let parsed: Vec<_> = ParserLines::from_lines(&lines)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(parsed[0], Instruction::A("i"));
        assert_eq!(
            parsed[1],
            Instruction::C {
                dest: "M",
                comp: "1",
                jump: ""
            }
        );
    }

    #[test]
    fn test_symbol_charset() {
        assert_eq!(
            parse_instruction("@Sys.init$ret.0").unwrap(),
            Instruction::A("Sys.init$ret.0")
        );
        assert_eq!(
            parse_instruction("(Main.fibonacci)").unwrap(),
            Instruction::Label("Main.fibonacci")
        );
    }
}
