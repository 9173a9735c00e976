//! Parser for Hack VM source.
//!
//! Each non-empty, non-comment line is one command; commands are parsed into
//! the tagged [`Command`] form so the code writer dispatches on structure
//! instead of re-inspecting strings.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::TranslateError;

/// A VM memory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Local,
    Argument,
    This,
    That,
    Temp,
    Pointer,
    Static,
}

impl Segment {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "constant" => Some(Self::Constant),
            "local" => Some(Self::Local),
            "argument" => Some(Self::Argument),
            "this" => Some(Self::This),
            "that" => Some(Self::That),
            "temp" => Some(Self::Temp),
            "pointer" => Some(Self::Pointer),
            "static" => Some(Self::Static),
            _ => None,
        }
    }

    /// The assembly symbol of the base pointer for the indirect segments.
    pub(crate) fn pointer_symbol(self) -> Option<&'static str> {
        match self {
            Self::Local => Some("LCL"),
            Self::Argument => Some("ARG"),
            Self::This => Some("THIS"),
            Self::That => Some("THAT"),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::Local => "local",
            Self::Argument => "argument",
            Self::This => "this",
            Self::That => "that",
            Self::Temp => "temp",
            Self::Pointer => "pointer",
            Self::Static => "static",
        };
        f.write_str(name)
    }
}

/// An arithmetic or logical stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl ArithmeticOp {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "neg" => Some(Self::Neg),
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        };
        f.write_str(name)
    }
}

/// One parsed VM command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Arithmetic(ArithmeticOp),
    Push { segment: Segment, index: u16 },
    Pop { segment: Segment, index: u16 },
    Label(String),
    Goto(String),
    IfGoto(String),
    Function { name: String, locals: u16 },
    Call { name: String, args: u16 },
    Return,
}

impl fmt::Display for Command {
    /// Canonical command text, used for the `// …` echo comments in the
    /// emitted assembly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arithmetic(op) => write!(f, "{op}"),
            Self::Push { segment, index } => write!(f, "push {segment} {index}"),
            Self::Pop { segment, index } => write!(f, "pop {segment} {index}"),
            Self::Label(label) => write!(f, "label {label}"),
            Self::Goto(label) => write!(f, "goto {label}"),
            Self::IfGoto(label) => write!(f, "if-goto {label}"),
            Self::Function { name, locals } => write!(f, "function {name} {locals}"),
            Self::Call { name, args } => write!(f, "call {name} {args}"),
            Self::Return => f.write_str("return"),
        }
    }
}

/// Parses one source line. Returns `None` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, TranslateError> {
    let code = match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    };
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }

    let malformed = || TranslateError::MalformedCommand {
        line: code.to_string(),
    };
    let mut parts = code.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };

    let command = if let Some(op) = ArithmeticOp::from_name(word) {
        Command::Arithmetic(op)
    } else {
        match word {
            "push" | "pop" => {
                let segment_name = parts.next().ok_or_else(malformed)?;
                let segment = Segment::from_name(segment_name).ok_or_else(|| {
                    TranslateError::UnknownSegment {
                        segment: segment_name.to_string(),
                    }
                })?;
                let index: u16 = parts
                    .next()
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(malformed)?;
                if segment == Segment::Pointer && index > 1 {
                    return Err(malformed());
                }
                if word == "push" {
                    Command::Push { segment, index }
                } else {
                    if segment == Segment::Constant {
                        return Err(TranslateError::PopToConstant);
                    }
                    Command::Pop { segment, index }
                }
            }
            "label" | "goto" | "if-goto" => {
                let label = parts.next().ok_or_else(malformed)?.to_string();
                match word {
                    "label" => Command::Label(label),
                    "goto" => Command::Goto(label),
                    _ => Command::IfGoto(label),
                }
            }
            "function" | "call" => {
                let name = parts.next().ok_or_else(malformed)?.to_string();
                let count: u16 = parts
                    .next()
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(malformed)?;
                if word == "function" {
                    Command::Function {
                        name,
                        locals: count,
                    }
                } else {
                    Command::Call { name, args: count }
                }
            }
            "return" => Command::Return,
            _ => {
                return Err(TranslateError::UnknownCommand {
                    line: code.to_string(),
                })
            }
        }
    };

    if parts.next().is_some() {
        return Err(malformed());
    }
    Ok(Some(command))
}

/// Streaming command reader over any line source.
pub struct Parser<R> {
    lines: io::Lines<R>,
}

impl Parser<BufReader<File>> {
    /// Opens a `.vm` file for parsing.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> Iterator for Parser<R> {
    type Item = Result<Command, TranslateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            match parse_line(&line) {
                Ok(Some(command)) => return Some(Ok(command)),
                Ok(None) => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
