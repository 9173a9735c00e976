//! VM code emitter.
//!
//! A stateless writer of VM command lines; the compilation engine decides
//! what to emit, this module only knows the textual command forms.

use std::fmt;
use std::io::Write;

use crate::error::CompileError;

/// A VM memory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Local,
    Argument,
    This,
    That,
    Pointer,
    Temp,
    Static,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::Local => "local",
            Self::Argument => "argument",
            Self::This => "this",
            Self::That => "that",
            Self::Pointer => "pointer",
            Self::Temp => "temp",
            Self::Static => "static",
        };
        f.write_str(name)
    }
}

/// A VM arithmetic or logical command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmOp {
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

impl fmt::Display for VmOp {
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

/// Writes VM command lines to an output sink.
pub struct VmWriter<W: Write> {
    out: W,
}

impl<W: Write> VmWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn push(&mut self, segment: Segment, index: u16) -> Result<(), CompileError> {
        writeln!(self.out, "push {segment} {index}")?;
        Ok(())
    }

    /// `pop constant` has no meaning and is rejected.
    pub fn pop(&mut self, segment: Segment, index: u16) -> Result<(), CompileError> {
        if segment == Segment::Constant {
            return Err(CompileError::PopToConstant);
        }
        writeln!(self.out, "pop {segment} {index}")?;
        Ok(())
    }

    pub fn arithmetic(&mut self, op: VmOp) -> Result<(), CompileError> {
        writeln!(self.out, "{op}")?;
        Ok(())
    }

    pub fn label(&mut self, label: &str) -> Result<(), CompileError> {
        writeln!(self.out, "label {label}")?;
        Ok(())
    }

    pub fn goto(&mut self, label: &str) -> Result<(), CompileError> {
        writeln!(self.out, "goto {label}")?;
        Ok(())
    }

    pub fn if_goto(&mut self, label: &str) -> Result<(), CompileError> {
        writeln!(self.out, "if-goto {label}")?;
        Ok(())
    }

    pub fn call(&mut self, name: &str, args: u16) -> Result<(), CompileError> {
        writeln!(self.out, "call {name} {args}")?;
        Ok(())
    }

    pub fn function(&mut self, name: &str, locals: u16) -> Result<(), CompileError> {
        writeln!(self.out, "function {name} {locals}")?;
        Ok(())
    }

    pub fn ret(&mut self) -> Result<(), CompileError> {
        writeln!(self.out, "return")?;
        Ok(())
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W, CompileError> {
        self.out.flush()?;
        Ok(self.out)
    }
}
