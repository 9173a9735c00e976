//! Jack tokenizer.
//!
//! Reads lines on demand and keeps decoded tokens in a queue drained by
//! [`Tokenizer::advance`]. A line goes through a fixed pipeline: trim,
//! discard full-line and block comments, strip trailing `// …`, split quoted
//! spans out verbatim, whitespace-split the rest, then decompose composites
//! like `foo.bar(` into sub-tokens.
//!
//! The fixed lexicons are compile-time perfect hash sets; composite
//! decomposition uses a compiled alternation of the symbol, identifier and
//! digit patterns.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use phf::phf_set;
use regex::Regex;

use crate::error::CompileError;

/// The 21 Jack keywords.
static KEYWORDS: phf::Set<&'static str> = phf_set! {
    "class", "constructor", "function", "method", "field", "static", "var",
    "int", "char", "boolean", "void", "true", "false", "null", "this",
    "let", "do", "if", "else", "while", "return",
};

/// The 19 single-character symbols.
static SYMBOLS: phf::Set<&'static str> = phf_set! {
    "{", "}", "(", ")", "[", "]", ".", ",", ";",
    "+", "-", "*", "/", "&", "|", "<", ">", "=", "~",
};

/// Sub-token alternation: a symbol, an identifier or a digit run.
static COMPOSITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[{}()\[\].,;+\-*/&|<>=~]|[A-Za-z_]\w*|\d+").unwrap());

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

/// Largest integer constant the language admits.
pub const MAX_INT_CONST: u16 = 32767;

/// Token classification, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Symbol,
    IntConst,
    StringConst,
    Identifier,
}

impl fmt::Display for TokenKind {
    /// The markup tag names of the diagnostic XML forms.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Keyword => "keyword",
            Self::Symbol => "symbol",
            Self::IntConst => "integerConstant",
            Self::StringConst => "stringConstant",
            Self::Identifier => "identifier",
        };
        f.write_str(name)
    }
}

/// One token: its kind and its lexeme.
///
/// String constants carry the lexeme with the surrounding quotes stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

/// Classifies a chunk, trying each category in precedence order.
fn classify(chunk: &str) -> Option<TokenKind> {
    if KEYWORDS.contains(chunk) {
        Some(TokenKind::Keyword)
    } else if SYMBOLS.contains(chunk) {
        Some(TokenKind::Symbol)
    } else if is_int_const(chunk) {
        Some(TokenKind::IntConst)
    } else if chunk.len() >= 2 && chunk.starts_with('"') && chunk.ends_with('"') {
        Some(TokenKind::StringConst)
    } else if IDENTIFIER_RE.is_match(chunk) {
        Some(TokenKind::Identifier)
    } else {
        None
    }
}

/// Integer constants are plain decimal, at most 32767, with no leading zero
/// unless the token is exactly `0`.
fn is_int_const(chunk: &str) -> bool {
    if chunk.is_empty() || !chunk.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if chunk.len() > 1 && chunk.starts_with('0') {
        return false;
    }
    chunk
        .parse::<u32>()
        .is_ok_and(|value| value <= u32::from(MAX_INT_CONST))
}

/// Lazy, queue-backed token source over any line reader.
pub struct Tokenizer<R> {
    lines: io::Lines<R>,
    queue: VecDeque<Token>,
    current: Option<Token>,
}

impl Tokenizer<BufReader<File>> {
    /// Opens a `.jack` source file.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            queue: VecDeque::new(),
            current: None,
        }
    }

    /// True if another token is available, refilling the queue from the
    /// source when it runs dry.
    pub fn has_more_tokens(&mut self) -> Result<bool, CompileError> {
        if self.queue.is_empty() {
            self.refill()?;
        }
        Ok(!self.queue.is_empty())
    }

    /// Dequeues the next token into the current slot.
    ///
    /// After EOF with an empty queue the current token becomes `None` and
    /// further advances are no-ops.
    pub fn advance(&mut self) {
        self.current = self.queue.pop_front();
    }

    /// The token most recently dequeued by [`Tokenizer::advance`].
    #[must_use]
    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// Peeks the token that the next [`Tokenizer::advance`] would yield.
    pub fn peek(&mut self) -> Result<Option<&Token>, CompileError> {
        if self.queue.is_empty() {
            self.refill()?;
        }
        Ok(self.queue.front())
    }

    /// Reads lines until one yields tokens, then decodes it into the queue.
    fn refill(&mut self) -> Result<(), CompileError> {
        debug_assert!(self.queue.is_empty());

        let line = loop {
            let Some(line) = self.lines.next() else {
                return Ok(()); // EOF
            };
            let line = line?;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }
            if trimmed.starts_with("/*") {
                let opening = trimmed.to_string();
                let mut tail = trimmed.to_string();
                while !tail.ends_with("*/") {
                    let Some(next) = self.lines.next() else {
                        return Err(CompileError::UnclosedComment { line: opening });
                    };
                    tail = next?.trim().to_string();
                }
                continue;
            }

            // Strip a trailing inline comment. This runs before quote
            // handling, so a literal `//` inside a string ends the line.
            let code = match trimmed.find("//") {
                Some(pos) => trimmed[..pos].trim_end(),
                None => trimmed,
            };
            if code.is_empty() {
                continue;
            }
            break code.to_string();
        };

        self.decode_line(&line)
    }

    /// Splits a code line into chunks, preserving each `"…"` span verbatim,
    /// and enqueues the decoded tokens.
    fn decode_line(&mut self, line: &str) -> Result<(), CompileError> {
        if !line.contains('"') {
            for chunk in line.split_whitespace() {
                self.enqueue(chunk)?;
            }
            return Ok(());
        }

        let quotes: Vec<usize> = line.match_indices('"').map(|(pos, _)| pos).collect();
        if quotes.len() % 2 != 0 {
            return Err(CompileError::UnclosedQuote {
                line: line.to_string(),
            });
        }

        for chunk in line[..quotes[0]].split_whitespace() {
            self.enqueue(chunk)?;
        }
        for (pair, span) in quotes.chunks(2).enumerate() {
            let (start, end) = (span[0], span[1]);
            self.enqueue(&line[start..=end])?;
            let gap_end = quotes
                .get(2 * pair + 2)
                .copied()
                .unwrap_or(line.len());
            for chunk in line[end + 1..gap_end].split_whitespace() {
                self.enqueue(chunk)?;
            }
        }
        Ok(())
    }

    /// Classifies one whitespace-delimited chunk, decomposing composites.
    fn enqueue(&mut self, chunk: &str) -> Result<(), CompileError> {
        if let Some(kind) = classify(chunk) {
            let lexeme = if kind == TokenKind::StringConst {
                chunk[1..chunk.len() - 1].to_string()
            } else {
                chunk.to_string()
            };
            self.queue.push_back(Token { kind, lexeme });
            return Ok(());
        }

        // Composite: every character must be consumed by some sub-token.
        let residue = COMPOSITE_RE.replace_all(chunk, "");
        if !residue.is_empty() {
            return Err(CompileError::InvalidToken(chunk.to_string()));
        }
        for found in COMPOSITE_RE.find_iter(chunk) {
            let sub = found.as_str();
            let kind =
                classify(sub).ok_or_else(|| CompileError::InvalidToken(sub.to_string()))?;
            self.queue.push_back(Token {
                kind,
                lexeme: sub.to_string(),
            });
        }
        Ok(())
    }
}
