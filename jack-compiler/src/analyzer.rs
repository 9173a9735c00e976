//! Parse-tree markup emitter.
//!
//! A recursive-descent walk of the same grammar as the compilation engine,
//! emitting the non-terminal XML markup instead of VM code. Pure syntax:
//! no symbol tables and no code generation, so it is usable before the
//! semantic layers and serves as the `-m p` diagnostic mode.

use std::io::{BufRead, Write};

use crate::error::CompileError;
use crate::tokenizer::{Token, TokenKind, Tokenizer};
use crate::xml;

pub struct XmlAnalyzer<R, W: Write> {
    tokenizer: Tokenizer<R>,
    out: W,
}

impl<R: BufRead, W: Write> XmlAnalyzer<R, W> {
    /// Creates an analyzer and primes the first token.
    pub fn new(mut tokenizer: Tokenizer<R>, out: W) -> Result<Self, CompileError> {
        if tokenizer.has_more_tokens()? {
            tokenizer.advance();
        }
        Ok(Self { tokenizer, out })
    }

    /// Analyzes one class and returns the underlying output sink.
    pub fn analyze(mut self) -> Result<W, CompileError> {
        self.compile_class()?;
        self.out.flush()?;
        Ok(self.out)
    }

    // ---- token plumbing -----------------------------------------------

    fn current(&self) -> Result<&Token, CompileError> {
        self.tokenizer.current().ok_or(CompileError::UnexpectedEof)
    }

    fn current_lexeme(&self) -> Result<&str, CompileError> {
        Ok(self.current()?.lexeme.as_str())
    }

    fn bump(&mut self) -> Result<(), CompileError> {
        if self.tokenizer.has_more_tokens()? {
            self.tokenizer.advance();
        }
        Ok(())
    }

    /// Writes the current token as a leaf and consumes it; it must equal
    /// `expected`.
    fn process(&mut self, expected: &str) -> Result<(), CompileError> {
        let token = self.current()?.clone();
        if token.lexeme != expected {
            return Err(CompileError::ExpectedToken {
                expected: expected.to_string(),
                found: token.lexeme,
            });
        }
        xml::write_token(&mut self.out, &token)?;
        self.bump()
    }

    /// Writes the current token, which must be an identifier, and consumes
    /// it.
    fn process_identifier(&mut self) -> Result<(), CompileError> {
        let token = self.current()?.clone();
        if token.kind != TokenKind::Identifier {
            return Err(CompileError::ExpectedIdentifier {
                found: token.lexeme,
            });
        }
        xml::write_token(&mut self.out, &token)?;
        self.bump()
    }

    /// Writes and consumes the current token, whatever it is.
    fn process_current(&mut self) -> Result<(), CompileError> {
        let token = self.current()?.clone();
        xml::write_token(&mut self.out, &token)?;
        self.bump()
    }

    fn open(&mut self, tag: &str) -> Result<(), CompileError> {
        writeln!(self.out, "<{tag}>")?;
        Ok(())
    }

    fn close(&mut self, tag: &str) -> Result<(), CompileError> {
        writeln!(self.out, "</{tag}>")?;
        Ok(())
    }

    // ---- grammar ------------------------------------------------------

    fn compile_class(&mut self) -> Result<(), CompileError> {
        self.open("class")?;
        self.process("class")?;
        self.process_identifier()?;
        self.process("{")?;
        while matches!(self.current_lexeme()?, "static" | "field") {
            self.compile_class_var_dec()?;
        }
        while matches!(self.current_lexeme()?, "constructor" | "function" | "method") {
            self.compile_subroutine_dec()?;
        }
        self.process("}")?;
        self.close("class")
    }

    fn compile_class_var_dec(&mut self) -> Result<(), CompileError> {
        self.open("classVarDec")?;
        self.process_current()?; // static | field
        self.compile_type()?;
        self.process_identifier()?;
        while self.current_lexeme()? == "," {
            self.process(",")?;
            self.process_identifier()?;
        }
        self.process(";")?;
        self.close("classVarDec")
    }

    fn compile_subroutine_dec(&mut self) -> Result<(), CompileError> {
        self.open("subroutineDec")?;
        self.process_current()?; // constructor | function | method
        if self.current_lexeme()? == "void" {
            self.process("void")?;
        } else {
            self.compile_type()?;
        }
        self.process_identifier()?;
        self.process("(")?;
        self.compile_parameter_list()?;
        self.process(")")?;
        self.compile_subroutine_body()?;
        self.close("subroutineDec")
    }

    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        self.open("parameterList")?;
        while self.current_lexeme()? != ")" {
            self.compile_type()?;
            self.process_identifier()?;
            if self.current_lexeme()? == "," {
                self.process(",")?;
            }
        }
        self.close("parameterList")
    }

    fn compile_subroutine_body(&mut self) -> Result<(), CompileError> {
        self.open("subroutineBody")?;
        self.process("{")?;
        while self.current_lexeme()? == "var" {
            self.compile_var_dec()?;
        }
        self.compile_statements()?;
        self.process("}")?;
        self.close("subroutineBody")
    }

    fn compile_var_dec(&mut self) -> Result<(), CompileError> {
        self.open("varDec")?;
        self.process("var")?;
        self.compile_type()?;
        self.process_identifier()?;
        while self.current_lexeme()? == "," {
            self.process(",")?;
            self.process_identifier()?;
        }
        self.process(";")?;
        self.close("varDec")
    }

    fn compile_statements(&mut self) -> Result<(), CompileError> {
        self.open("statements")?;
        loop {
            match self.current_lexeme()? {
                "let" => self.compile_let()?,
                "if" => self.compile_if()?,
                "while" => self.compile_while()?,
                "do" => self.compile_do()?,
                "return" => self.compile_return()?,
                _ => break,
            }
        }
        self.close("statements")
    }

    fn compile_let(&mut self) -> Result<(), CompileError> {
        self.open("letStatement")?;
        self.process("let")?;
        self.process_identifier()?;
        if self.current_lexeme()? == "[" {
            self.process("[")?;
            self.compile_expression()?;
            self.process("]")?;
        }
        self.process("=")?;
        self.compile_expression()?;
        self.process(";")?;
        self.close("letStatement")
    }

    fn compile_if(&mut self) -> Result<(), CompileError> {
        self.open("ifStatement")?;
        self.process("if")?;
        self.process("(")?;
        self.compile_expression()?;
        self.process(")")?;
        self.process("{")?;
        self.compile_statements()?;
        self.process("}")?;
        if self.current_lexeme()? == "else" {
            self.process("else")?;
            self.process("{")?;
            self.compile_statements()?;
            self.process("}")?;
        }
        self.close("ifStatement")
    }

    fn compile_while(&mut self) -> Result<(), CompileError> {
        self.open("whileStatement")?;
        self.process("while")?;
        self.process("(")?;
        self.compile_expression()?;
        self.process(")")?;
        self.process("{")?;
        self.compile_statements()?;
        self.process("}")?;
        self.close("whileStatement")
    }

    fn compile_do(&mut self) -> Result<(), CompileError> {
        self.open("doStatement")?;
        self.process("do")?;
        self.compile_subroutine_call()?;
        self.process(";")?;
        self.close("doStatement")
    }

    fn compile_return(&mut self) -> Result<(), CompileError> {
        self.open("returnStatement")?;
        self.process("return")?;
        if self.current_lexeme()? != ";" {
            self.compile_expression()?;
        }
        self.process(";")?;
        self.close("returnStatement")
    }

    fn compile_subroutine_call(&mut self) -> Result<(), CompileError> {
        self.process_identifier()?;
        if self.current_lexeme()? == "." {
            self.process(".")?;
            self.process_identifier()?;
        }
        self.process("(")?;
        self.compile_expression_list()?;
        self.process(")")
    }

    fn compile_expression(&mut self) -> Result<(), CompileError> {
        self.open("expression")?;
        self.compile_term()?;
        while matches!(
            self.current_lexeme()?,
            "+" | "-" | "*" | "/" | "&" | "|" | "<" | ">" | "="
        ) {
            self.process_current()?;
            self.compile_term()?;
        }
        self.close("expression")
    }

    fn compile_term(&mut self) -> Result<(), CompileError> {
        self.open("term")?;
        let token = self.current()?.clone();
        match token.kind {
            TokenKind::IntConst | TokenKind::StringConst => self.process_current()?,
            TokenKind::Keyword
                if matches!(token.lexeme.as_str(), "true" | "false" | "null" | "this") =>
            {
                self.process_current()?;
            }
            TokenKind::Symbol if token.lexeme == "(" => {
                self.process("(")?;
                self.compile_expression()?;
                self.process(")")?;
            }
            TokenKind::Symbol if matches!(token.lexeme.as_str(), "-" | "~") => {
                self.process_current()?;
                self.compile_term()?;
            }
            _ => {
                self.process_identifier()?;
                match self.current_lexeme()? {
                    "[" => {
                        self.process("[")?;
                        self.compile_expression()?;
                        self.process("]")?;
                    }
                    "." => {
                        self.process(".")?;
                        self.compile_subroutine_call()?;
                    }
                    "(" => {
                        self.process("(")?;
                        self.compile_expression_list()?;
                        self.process(")")?;
                    }
                    _ => {}
                }
            }
        }
        self.close("term")
    }

    fn compile_expression_list(&mut self) -> Result<(), CompileError> {
        self.open("expressionList")?;
        if self.current_lexeme()? != ")" {
            self.compile_expression()?;
            while self.current_lexeme()? == "," {
                self.process(",")?;
                self.compile_expression()?;
            }
        }
        self.close("expressionList")
    }

    fn compile_type(&mut self) -> Result<(), CompileError> {
        let token = self.current()?;
        if token.kind == TokenKind::Keyword
            && matches!(token.lexeme.as_str(), "int" | "char" | "boolean")
        {
            self.process_current()
        } else {
            self.process_identifier()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_source(source: &str) -> String {
        let tokenizer = Tokenizer::new(source.as_bytes());
        let analyzer = XmlAnalyzer::new(tokenizer, Vec::new()).unwrap();
        String::from_utf8(analyzer.analyze().unwrap()).unwrap()
    }

    #[test]
    fn test_minimal_class() {
        let markup = analyze_source("class Main { }");
        assert_eq!(
            markup,
            "<class>\n\
             <keyword> class </keyword>\n\
             <identifier> Main </identifier>\n\
             <symbol> { </symbol>\n\
             <symbol> } </symbol>\n\
             </class>\n"
        );
    }

    #[test]
    fn test_let_statement_markup() {
        let markup = analyze_source(
            "class Main { function void f() { var int x; let x = 1; return; } }",
        );
        assert!(markup.contains(
            "<letStatement>\n\
             <keyword> let </keyword>\n\
             <identifier> x </identifier>\n\
             <symbol> = </symbol>\n\
             <expression>\n\
             <term>\n\
             <integerConstant> 1 </integerConstant>\n\
             </term>\n\
             </expression>\n\
             <symbol> ; </symbol>\n\
             </letStatement>\n"
        ));
    }

    #[test]
    fn test_operator_escaping() {
        let markup = analyze_source(
            "class Main { function boolean f(int a, int b) { return a < b; } }",
        );
        assert!(markup.contains("<symbol> &lt; </symbol>"));
    }

    #[test]
    fn test_empty_parameter_and_expression_lists_are_marked() {
        let markup = analyze_source(
            "class Main { function void f() { do Sys.wait(); return; } }",
        );
        assert!(markup.contains("<parameterList>\n</parameterList>\n"));
        assert!(markup.contains("<expressionList>\n</expressionList>\n"));
    }

    #[test]
    fn test_nested_statements() {
        let markup = analyze_source(
            "class Main { function void f(int c) { if (c) { while (c) { do Sys.wait(); } } else { return; } return; } }",
        );
        assert!(markup.contains("<ifStatement>"));
        assert!(markup.contains("<whileStatement>"));
        assert!(markup.contains("<keyword> else </keyword>"));
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let tokenizer = Tokenizer::new("class Main { function }".as_bytes());
        let analyzer = XmlAnalyzer::new(tokenizer, Vec::new()).unwrap();
        assert!(matches!(
            analyzer.analyze(),
            Err(CompileError::ExpectedIdentifier { .. })
        ));
    }
}
