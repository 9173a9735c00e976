//! Recursive-descent compilation engine.
//!
//! A single pass over the token stream: declarations populate the two scoped
//! symbol tables, and VM code is emitted directly during the descent. The
//! engine tracks the current class, the current subroutine's kind and name,
//! and two monotonic label counters (one for `if`, one for `while`).

use std::io::{BufRead, Write};

use crate::error::CompileError;
use crate::generator::{Segment, VmOp, VmWriter};
use crate::symbol_table::{SymbolTable, VarEntry, VarKind};
use crate::tokenizer::{Token, TokenKind, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

/// Storage kinds map onto fixed VM segments.
fn segment_of(kind: VarKind) -> Segment {
    match kind {
        VarKind::Static => Segment::Static,
        VarKind::Field => Segment::This,
        VarKind::Argument => Segment::Argument,
        VarKind::Local => Segment::Local,
    }
}

pub struct CompilationEngine<R, W: Write> {
    tokenizer: Tokenizer<R>,
    writer: VmWriter<W>,
    class_name: String,
    subroutine_kind: SubroutineKind,
    subroutine_name: String,
    class_table: SymbolTable,
    subroutine_table: SymbolTable,
    if_counter: u32,
    while_counter: u32,
}

impl<R: BufRead, W: Write> CompilationEngine<R, W> {
    /// Creates an engine and primes the first token.
    pub fn new(mut tokenizer: Tokenizer<R>, writer: VmWriter<W>) -> Result<Self, CompileError> {
        if tokenizer.has_more_tokens()? {
            tokenizer.advance();
        }
        Ok(Self {
            tokenizer,
            writer,
            class_name: String::new(),
            subroutine_kind: SubroutineKind::Function,
            subroutine_name: String::new(),
            class_table: SymbolTable::new(),
            subroutine_table: SymbolTable::new(),
            if_counter: 0,
            while_counter: 0,
        })
    }

    /// Compiles one class and returns the underlying output sink.
    pub fn compile(mut self) -> Result<W, CompileError> {
        self.compile_class()?;
        self.writer.finish()
    }

    // ---- token cursor -------------------------------------------------

    fn current(&self) -> Result<&Token, CompileError> {
        self.tokenizer.current().ok_or(CompileError::UnexpectedEof)
    }

    fn current_lexeme(&self) -> Result<&str, CompileError> {
        Ok(self.current()?.lexeme.as_str())
    }

    /// Moves to the next token if one exists; at EOF the cursor stays put.
    fn bump(&mut self) -> Result<(), CompileError> {
        if self.tokenizer.has_more_tokens()? {
            self.tokenizer.advance();
        }
        Ok(())
    }

    /// Consumes the current token, which must equal `expected`.
    fn process(&mut self, expected: &str) -> Result<(), CompileError> {
        let token = self.current()?;
        if token.lexeme != expected {
            return Err(CompileError::ExpectedToken {
                expected: expected.to_string(),
                found: token.lexeme.clone(),
            });
        }
        self.bump()
    }

    /// Consumes the current token, which must be an identifier, and returns
    /// its lexeme.
    fn consume_identifier(&mut self) -> Result<String, CompileError> {
        let token = self.current()?;
        if token.kind != TokenKind::Identifier {
            return Err(CompileError::ExpectedIdentifier {
                found: token.lexeme.clone(),
            });
        }
        let lexeme = token.lexeme.clone();
        self.bump()?;
        Ok(lexeme)
    }

    /// Consumes a type: `int`, `char`, `boolean` or a class name.
    fn consume_type(&mut self) -> Result<String, CompileError> {
        let token = self.current()?;
        if token.kind == TokenKind::Keyword
            && matches!(token.lexeme.as_str(), "int" | "char" | "boolean")
        {
            let ty = token.lexeme.clone();
            self.bump()?;
            Ok(ty)
        } else {
            self.consume_identifier()
        }
    }

    // ---- identifier resolution ----------------------------------------

    /// Subroutine scope first, then class scope. Names in neither are class
    /// or subroutine identifiers and carry no storage.
    fn lookup(&self, name: &str) -> Option<VarEntry> {
        self.subroutine_table
            .get(name)
            .or_else(|| self.class_table.get(name))
            .cloned()
    }

    fn push_var(&mut self, entry: &VarEntry) -> Result<(), CompileError> {
        self.writer.push(segment_of(entry.kind), entry.index)
    }

    fn pop_var(&mut self, entry: &VarEntry) -> Result<(), CompileError> {
        self.writer.pop(segment_of(entry.kind), entry.index)
    }

    // ---- grammar ------------------------------------------------------

    fn compile_class(&mut self) -> Result<(), CompileError> {
        self.process("class")?;
        self.class_name = self.consume_identifier()?;
        self.process("{")?;
        while matches!(self.current_lexeme()?, "static" | "field") {
            self.compile_class_var_dec()?;
        }
        while matches!(self.current_lexeme()?, "constructor" | "function" | "method") {
            self.compile_subroutine_dec()?;
        }
        self.process("}")
    }

    fn compile_class_var_dec(&mut self) -> Result<(), CompileError> {
        let kind = if self.current_lexeme()? == "static" {
            VarKind::Static
        } else {
            VarKind::Field
        };
        self.bump()?;
        let ty = self.consume_type()?;
        loop {
            let name = self.consume_identifier()?;
            self.class_table.define(&name, kind, &ty)?;
            if self.current_lexeme()? == "," {
                self.process(",")?;
            } else {
                break;
            }
        }
        self.process(";")
    }

    fn compile_subroutine_dec(&mut self) -> Result<(), CompileError> {
        self.subroutine_table.reset();
        self.subroutine_kind = match self.current_lexeme()? {
            "constructor" => SubroutineKind::Constructor,
            "method" => SubroutineKind::Method,
            _ => SubroutineKind::Function,
        };
        self.bump()?;

        if self.subroutine_kind == SubroutineKind::Method {
            // Argument 0 is the implicit receiver.
            let class_name = self.class_name.clone();
            self.subroutine_table
                .define("this", VarKind::Argument, &class_name)?;
        }

        if self.current_lexeme()? == "void" {
            self.process("void")?;
        } else {
            self.consume_type()?;
        }
        self.subroutine_name = self.consume_identifier()?;
        self.process("(")?;
        self.compile_parameter_list()?;
        self.process(")")?;
        self.process("{")?;
        self.compile_subroutine_body()?;
        self.process("}")
    }

    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        while self.current_lexeme()? != ")" {
            let ty = self.consume_type()?;
            let name = self.consume_identifier()?;
            self.subroutine_table.define(&name, VarKind::Argument, &ty)?;
            if self.current_lexeme()? == "," {
                self.process(",")?;
            }
        }
        Ok(())
    }

    fn compile_subroutine_body(&mut self) -> Result<(), CompileError> {
        while self.current_lexeme()? == "var" {
            self.compile_var_dec()?;
        }

        let function_name = format!("{}.{}", self.class_name, self.subroutine_name);
        self.writer
            .function(&function_name, self.subroutine_table.var_count(VarKind::Local))?;
        match self.subroutine_kind {
            SubroutineKind::Constructor => {
                // Allocate one word per field and bind THIS to the result.
                self.writer
                    .push(Segment::Constant, self.class_table.var_count(VarKind::Field))?;
                self.writer.call("Memory.alloc", 1)?;
                self.writer.pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Method => {
                self.writer.push(Segment::Argument, 0)?;
                self.writer.pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements()
    }

    fn compile_var_dec(&mut self) -> Result<(), CompileError> {
        self.process("var")?;
        let ty = self.consume_type()?;
        loop {
            let name = self.consume_identifier()?;
            self.subroutine_table.define(&name, VarKind::Local, &ty)?;
            if self.current_lexeme()? == "," {
                self.process(",")?;
            } else {
                break;
            }
        }
        self.process(";")
    }

    fn compile_statements(&mut self) -> Result<(), CompileError> {
        loop {
            match self.current_lexeme()? {
                "let" => self.compile_let()?,
                "if" => self.compile_if()?,
                "while" => self.compile_while()?,
                "do" => self.compile_do()?,
                "return" => self.compile_return()?,
                _ => return Ok(()),
            }
        }
    }

    fn compile_let(&mut self) -> Result<(), CompileError> {
        self.process("let")?;
        let name = self.consume_identifier()?;
        let entry = self
            .lookup(&name)
            .ok_or(CompileError::UndefinedVariable { name })?;

        let is_array = self.current_lexeme()? == "[";
        if is_array {
            self.push_var(&entry)?;
            self.process("[")?;
            self.compile_expression()?;
            self.process("]")?;
            self.writer.arithmetic(VmOp::Add)?;
        }

        self.process("=")?;
        self.compile_expression()?;
        self.process(";")?;

        if is_array {
            // THAT may only be set after both the address and the value are
            // on the stack; the value detours through temp 0.
            self.writer.pop(Segment::Temp, 0)?;
            self.writer.pop(Segment::Pointer, 1)?;
            self.writer.push(Segment::Temp, 0)?;
            self.writer.pop(Segment::That, 0)?;
        } else {
            self.pop_var(&entry)?;
        }
        Ok(())
    }

    fn compile_if(&mut self) -> Result<(), CompileError> {
        let else_label = format!("IF_L1_{}", self.if_counter);
        let end_label = format!("IF_L2_{}", self.if_counter + 1);
        self.if_counter += 2;

        self.process("if")?;
        self.process("(")?;
        self.compile_expression()?;
        self.process(")")?;
        self.writer.arithmetic(VmOp::Not)?;
        self.writer.if_goto(&else_label)?;
        self.process("{")?;
        self.compile_statements()?;
        self.process("}")?;

        if self.current_lexeme()? == "else" {
            self.writer.goto(&end_label)?;
            self.writer.label(&else_label)?;
            self.process("else")?;
            self.process("{")?;
            self.compile_statements()?;
            self.process("}")?;
            self.writer.label(&end_label)?;
        } else {
            // No else branch: a single label suffices.
            self.writer.label(&else_label)?;
        }
        Ok(())
    }

    fn compile_while(&mut self) -> Result<(), CompileError> {
        let top_label = format!("WHILE_L1_{}", self.while_counter);
        let exit_label = format!("WHILE_L2_{}", self.while_counter + 1);
        self.while_counter += 2;

        self.process("while")?;
        self.writer.label(&top_label)?;
        self.process("(")?;
        self.compile_expression()?;
        self.process(")")?;
        self.writer.arithmetic(VmOp::Not)?;
        self.writer.if_goto(&exit_label)?;
        self.process("{")?;
        self.compile_statements()?;
        self.process("}")?;
        self.writer.goto(&top_label)?;
        self.writer.label(&exit_label)
    }

    fn compile_do(&mut self) -> Result<(), CompileError> {
        self.process("do")?;
        self.compile_expression()?;
        self.process(";")?;
        // Discard the call's return value.
        self.writer.pop(Segment::Temp, 0)
    }

    fn compile_return(&mut self) -> Result<(), CompileError> {
        self.process("return")?;
        if self.current_lexeme()? == ";" {
            self.writer.push(Segment::Constant, 0)?;
        } else {
            self.compile_expression()?;
        }
        self.process(";")?;
        self.writer.ret()
    }

    /// Left-to-right, no operator precedence: term, then (op term)*, with
    /// each operator emitted after its right operand.
    fn compile_expression(&mut self) -> Result<(), CompileError> {
        self.compile_term()?;
        loop {
            let op = match self.tokenizer.current() {
                Some(token)
                    if matches!(
                        token.lexeme.as_str(),
                        "+" | "-" | "*" | "/" | "&" | "|" | "<" | ">" | "="
                    ) =>
                {
                    token.lexeme.clone()
                }
                _ => return Ok(()),
            };
            self.bump()?;
            self.compile_term()?;
            match op.as_str() {
                "+" => self.writer.arithmetic(VmOp::Add)?,
                "-" => self.writer.arithmetic(VmOp::Sub)?,
                "*" => self.writer.call("Math.multiply", 2)?,
                "/" => self.writer.call("Math.divide", 2)?,
                "&" => self.writer.arithmetic(VmOp::And)?,
                "|" => self.writer.arithmetic(VmOp::Or)?,
                "<" => self.writer.arithmetic(VmOp::Lt)?,
                ">" => self.writer.arithmetic(VmOp::Gt)?,
                _ => self.writer.arithmetic(VmOp::Eq)?,
            }
        }
    }

    fn compile_term(&mut self) -> Result<(), CompileError> {
        let token = self.current()?.clone();
        match token.kind {
            TokenKind::IntConst => {
                self.bump()?;
                let value: u16 = token
                    .lexeme
                    .parse()
                    .map_err(|_| CompileError::InvalidToken(token.lexeme.clone()))?;
                self.writer.push(Segment::Constant, value)
            }
            TokenKind::StringConst => {
                self.bump()?;
                self.compile_string_constant(&token.lexeme)
            }
            TokenKind::Keyword
                if matches!(token.lexeme.as_str(), "true" | "false" | "null" | "this") =>
            {
                self.bump()?;
                match token.lexeme.as_str() {
                    "true" => {
                        self.writer.push(Segment::Constant, 1)?;
                        self.writer.arithmetic(VmOp::Neg)
                    }
                    "false" | "null" => self.writer.push(Segment::Constant, 0),
                    _ => self.writer.push(Segment::Pointer, 0),
                }
            }
            TokenKind::Symbol if token.lexeme == "(" => {
                self.process("(")?;
                self.compile_expression()?;
                self.process(")")
            }
            TokenKind::Symbol if matches!(token.lexeme.as_str(), "-" | "~") => {
                self.bump()?;
                self.compile_term()?;
                if token.lexeme == "-" {
                    self.writer.arithmetic(VmOp::Neg)
                } else {
                    self.writer.arithmetic(VmOp::Not)
                }
            }
            _ => self.compile_term_identifier(),
        }
    }

    /// Identifier-led terms: a variable, an array read, or one of the three
    /// subroutine-call forms, distinguished by the following token.
    fn compile_term_identifier(&mut self) -> Result<(), CompileError> {
        let next_lexeme = self.tokenizer.peek()?.map(|token| token.lexeme.clone());

        match next_lexeme.as_deref() {
            Some(".") => {
                let object_name = self.consume_identifier()?;
                let receiver = self.lookup(&object_name);
                if let Some(entry) = &receiver {
                    // Method call on a known variable: the receiver becomes
                    // the hidden first argument.
                    self.push_var(entry)?;
                }
                self.process(".")?;
                let subroutine = self.consume_identifier()?;
                self.process("(")?;
                let args = self.compile_expression_list()?;
                self.process(")")?;
                match receiver {
                    Some(entry) => self
                        .writer
                        .call(&format!("{}.{subroutine}", entry.ty), args + 1),
                    None => self
                        .writer
                        .call(&format!("{object_name}.{subroutine}"), args),
                }
            }
            Some("(") => {
                // Bare call: a method on the current object.
                let subroutine = self.consume_identifier()?;
                self.writer.push(Segment::Pointer, 0)?;
                self.process("(")?;
                let args = self.compile_expression_list()?;
                self.process(")")?;
                let class_name = self.class_name.clone();
                self.writer
                    .call(&format!("{class_name}.{subroutine}"), args + 1)
            }
            _ => {
                let name = self.consume_identifier()?;
                let entry = self
                    .lookup(&name)
                    .ok_or(CompileError::UndefinedVariable { name })?;
                self.push_var(&entry)?;
                if self
                    .tokenizer
                    .current()
                    .is_some_and(|token| token.lexeme == "[")
                {
                    self.process("[")?;
                    self.compile_expression()?;
                    self.process("]")?;
                    self.writer.arithmetic(VmOp::Add)?;
                    self.writer.pop(Segment::Pointer, 1)?;
                    self.writer.push(Segment::That, 0)?;
                }
                Ok(())
            }
        }
    }

    /// `s` becomes a `String.new` call followed by one `appendChar` per
    /// character; a zero-length literal still calls `String.new(0)`.
    fn compile_string_constant(&mut self, value: &str) -> Result<(), CompileError> {
        let length = u16::try_from(value.len())
            .map_err(|_| CompileError::InvalidToken(value.to_string()))?;
        self.writer.push(Segment::Constant, length)?;
        self.writer.call("String.new", 1)?;
        for ch in value.chars() {
            self.writer.push(Segment::Constant, ch as u16)?;
            self.writer.call("String.appendChar", 2)?;
        }
        Ok(())
    }

    /// Returns the number of expressions compiled; an empty list is 0.
    fn compile_expression_list(&mut self) -> Result<u16, CompileError> {
        let mut args = 0;
        if self.current_lexeme()? != ")" {
            self.compile_expression()?;
            args += 1;
            while self.current_lexeme()? == "," {
                self.process(",")?;
                self.compile_expression()?;
                args += 1;
            }
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_source(source: &str) -> String {
        let tokenizer = Tokenizer::new(source.as_bytes());
        let writer = VmWriter::new(Vec::new());
        let engine = CompilationEngine::new(tokenizer, writer).unwrap();
        let out = engine.compile().unwrap();
        String::from_utf8(out).unwrap()
    }

    fn compile_err(source: &str) -> CompileError {
        let tokenizer = Tokenizer::new(source.as_bytes());
        let writer = VmWriter::new(Vec::new());
        let engine = CompilationEngine::new(tokenizer, writer).unwrap();
        engine.compile().unwrap_err()
    }

    #[test]
    fn test_constructor_allocates_and_returns_this() {
        let vm = compile_source(
            "class P { field int x; constructor P new(int v) { let x = v; return this; } }",
        );
        assert_eq!(
            vm,
            "function P.new 0\n\
             push constant 1\n\
             call Memory.alloc 1\n\
             pop pointer 0\n\
             push argument 0\n\
             pop this 0\n\
             push pointer 0\n\
             return\n"
        );
    }

    #[test]
    fn test_method_binds_receiver() {
        let vm = compile_source(
            "class A { method int get() { return 1; } }",
        );
        assert_eq!(
            vm,
            "function A.get 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push constant 1\n\
             return\n"
        );
    }

    #[test]
    fn test_method_call_on_variable() {
        let vm = compile_source(
            "class A { function void run() { var B b; do b.m(3); return; } }",
        );
        assert_eq!(
            vm,
            "function A.run 1\n\
             push local 0\n\
             push constant 3\n\
             call B.m 2\n\
             pop temp 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_static_call_on_unknown_name() {
        let vm = compile_source(
            "class A { function void run() { do Output.printInt(2); return; } }",
        );
        assert!(vm.contains("push constant 2\ncall Output.printInt 1\npop temp 0\n"));
    }

    #[test]
    fn test_bare_call_is_method_on_self() {
        let vm = compile_source(
            "class A { method void run() { do helper(); return; } }",
        );
        assert!(vm.contains("push pointer 0\ncall A.helper 1\npop temp 0\n"));
    }

    #[test]
    fn test_if_else_label_shape() {
        let vm = compile_source(
            "class A { function int f(int c) { if (c) { return 1; } else { return 2; } } }",
        );
        assert_eq!(
            vm,
            "function A.f 0\n\
             push argument 0\n\
             not\n\
             if-goto IF_L1_0\n\
             push constant 1\n\
             return\n\
             goto IF_L2_1\n\
             label IF_L1_0\n\
             push constant 2\n\
             return\n\
             label IF_L2_1\n"
        );
    }

    #[test]
    fn test_if_without_else_emits_one_label() {
        let vm = compile_source(
            "class A { function void f(int c) { if (c) { do A.g(); } return; } }",
        );
        assert!(vm.contains("label IF_L1_0\n"));
        assert!(!vm.contains("IF_L2_1"));
    }

    #[test]
    fn test_while_label_shape() {
        let vm = compile_source(
            "class A { function void f(int c) { while (c) { do A.g(); } return; } }",
        );
        assert_eq!(
            vm,
            "function A.f 0\n\
             label WHILE_L1_0\n\
             push argument 0\n\
             not\n\
             if-goto WHILE_L2_1\n\
             call A.g 0\n\
             pop temp 0\n\
             goto WHILE_L1_0\n\
             label WHILE_L2_1\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_let_array_uses_temp_dance() {
        let vm = compile_source(
            "class A { function void f(Array a, int i) { let a[i] = 5; return; } }",
        );
        assert!(vm.contains(
            "push argument 0\n\
             push argument 1\n\
             add\n\
             push constant 5\n\
             pop temp 0\n\
             pop pointer 1\n\
             push temp 0\n\
             pop that 0\n"
        ));
    }

    #[test]
    fn test_array_read() {
        let vm = compile_source(
            "class A { function int f(Array a, int i) { return a[i]; } }",
        );
        assert!(vm.contains(
            "push argument 0\n\
             push argument 1\n\
             add\n\
             pop pointer 1\n\
             push that 0\n\
             return\n"
        ));
    }

    #[test]
    fn test_expression_is_left_to_right() {
        let vm = compile_source(
            "class A { function int f() { return 1 + 2 * 3; } }",
        );
        assert!(vm.contains(
            "push constant 1\n\
             push constant 2\n\
             add\n\
             push constant 3\n\
             call Math.multiply 2\n"
        ));
    }

    #[test]
    fn test_keyword_constants() {
        let vm = compile_source(
            "class A { function int f() { var boolean b; let b = true; let b = false; return null; } }",
        );
        assert!(vm.contains("push constant 1\nneg\npop local 0\n"));
        assert!(vm.contains("push constant 0\npop local 0\n"));
        assert!(vm.contains("push constant 0\nreturn\n"));
    }

    #[test]
    fn test_unary_operators() {
        let vm = compile_source(
            "class A { function int f(int x) { return -x + ~x; } }",
        );
        assert!(vm.contains("push argument 0\nneg\npush argument 0\nnot\nadd\n"));
    }

    #[test]
    fn test_string_constant_lowering() {
        let vm = compile_source(
            "class A { function String f() { return \"Hi\"; } }",
        );
        assert!(vm.contains(
            "push constant 2\n\
             call String.new 1\n\
             push constant 72\n\
             call String.appendChar 2\n\
             push constant 105\n\
             call String.appendChar 2\n"
        ));
    }

    #[test]
    fn test_empty_string_constant_still_allocates() {
        let vm = compile_source(
            "class A { function String f() { return \"\"; } }",
        );
        assert!(vm.contains("push constant 0\ncall String.new 1\n"));
    }

    #[test]
    fn test_empty_expression_list_passes_zero_args() {
        let vm = compile_source(
            "class A { function void f() { do Sys.halt(); return; } }",
        );
        assert!(vm.contains("call Sys.halt 0\n"));
    }

    #[test]
    fn test_void_return_pushes_zero() {
        let vm = compile_source("class A { function void f() { return; } }");
        assert!(vm.ends_with("push constant 0\nreturn\n"));
    }

    #[test]
    fn test_undefined_variable_in_let_is_fatal() {
        let err = compile_err("class A { function void f() { let x = 1; return; } }");
        assert!(matches!(err, CompileError::UndefinedVariable { name } if name == "x"));
    }

    #[test]
    fn test_duplicate_local_is_fatal() {
        let err =
            compile_err("class A { function void f() { var int x; var int x; return; } }");
        assert!(matches!(err, CompileError::DuplicateSymbol { .. }));
    }

    #[test]
    fn test_token_mismatch_reports_expected_and_found() {
        let err = compile_err("class A ( }");
        match err {
            CompileError::ExpectedToken { expected, found } => {
                assert_eq!(expected, "{");
                assert_eq!(found, "(");
            }
            other => panic!("expected ExpectedToken, got {other:?}"),
        }
    }

    #[test]
    fn test_local_shadows_field() {
        let vm = compile_source(
            "class A { field int x; method void f() { var int x; let x = 1; return; } }",
        );
        // The subroutine scope wins: local 0, not this 0.
        assert!(vm.contains("push constant 1\npop local 0\n"));
    }

    #[test]
    fn test_field_access_in_method() {
        let vm = compile_source(
            "class A { field int x; method int get() { return x; } }",
        );
        assert!(vm.contains("push this 0\nreturn\n"));
    }
}
