//! Lowering of VM commands to Hack assembly.
//!
//! All translator state lives on the writer instance: the compilation unit
//! used to qualify `static` symbols, the enclosing function used to scope
//! labels, and the per-function counters behind the minted comparison and
//! return labels. Nothing is shared between writer instances.

use std::collections::HashMap;
use std::io::Write;

use crate::error::TranslateError;
use crate::parser::{ArithmeticOp, Command, Segment};

// Writes a fixed block of assembly lines in one call.
macro_rules! write_asm {
    ($writer:expr, $($line:literal)*) => {
        $writer.write_all(concat!($($line, "\n"),*).as_bytes())
    };
}

/// Emits the assembly translation of a command stream.
pub struct CodeWriter<W: Write> {
    out: W,
    /// Stem of the `.vm` file being translated; qualifies `static` slots.
    unit: String,
    /// Enclosing function name, empty at top level.
    current_function: String,
    /// Per-function counter behind `<f>$ret.<k>` return labels.
    return_counters: HashMap<String, u32>,
    /// Per-function counter behind comparison label pairs.
    compare_counters: HashMap<String, u32>,
}

impl<W: Write> CodeWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            unit: String::new(),
            current_function: String::new(),
            return_counters: HashMap::new(),
            compare_counters: HashMap::new(),
        }
    }

    /// Sets the compilation unit for subsequent `static` accesses.
    pub fn set_unit(&mut self, unit: &str) {
        self.unit.clear();
        self.unit.push_str(unit);
    }

    /// Emits the bootstrap prologue: `SP = 256`, then a synthetic
    /// `call Sys.init 0` minted as if inside `Sys.init` itself.
    pub fn write_bootstrap(&mut self) -> Result<(), TranslateError> {
        write_asm!(self.out,
            "// Bootstrap code"
            "@256"
            "D=A"
            "@SP"
            "M=D"
        )?;
        self.current_function = "Sys.init".to_string();
        self.write_call("Sys.init", 0)?;
        Ok(())
    }

    /// Translates one command, preceded by a `// <command>` echo line.
    pub fn write_command(&mut self, command: &Command) -> Result<(), TranslateError> {
        writeln!(self.out, "// {command}")?;
        match command {
            Command::Arithmetic(op) => self.write_arithmetic(*op)?,
            Command::Push { segment, index } => self.write_push(*segment, *index)?,
            Command::Pop { segment, index } => self.write_pop(*segment, *index)?,
            Command::Label(label) => {
                writeln!(self.out, "({})", self.scoped_label(label))?;
            }
            Command::Goto(label) => {
                writeln!(self.out, "@{}", self.scoped_label(label))?;
                write_asm!(self.out, "0;JMP")?;
            }
            Command::IfGoto(label) => {
                self.pop_to_d()?;
                writeln!(self.out, "@{}", self.scoped_label(label))?;
                write_asm!(self.out, "D;JNE")?;
            }
            Command::Function { name, locals } => self.write_function(name, *locals)?,
            Command::Call { name, args } => self.write_call(name, *args)?,
            Command::Return => self.write_return()?,
        }
        Ok(())
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W, TranslateError> {
        self.out.flush()?;
        Ok(self.out)
    }

    /// Prefixes a branch label with the enclosing function.
    fn scoped_label(&self, label: &str) -> String {
        if self.current_function.is_empty() {
            label.to_string()
        } else {
            format!("{}${label}", self.current_function)
        }
    }

    /// Mints the next unique comparison label base for the enclosing
    /// function. The counter is monotonic per function, so label pairs never
    /// collide across call sites.
    fn mint_compare_base(&mut self) -> String {
        let counter = self
            .compare_counters
            .entry(self.current_function.clone())
            .or_insert(0);
        let k = *counter;
        *counter += 1;
        if self.current_function.is_empty() {
            format!("LBL.{k}")
        } else {
            format!("{}$LBL.{k}", self.current_function)
        }
    }

    fn write_arithmetic(&mut self, op: ArithmeticOp) -> Result<(), TranslateError> {
        match op {
            ArithmeticOp::Add => self.write_binary_op("M=D+M")?,
            ArithmeticOp::Sub => self.write_binary_op("M=M-D")?,
            ArithmeticOp::And => self.write_binary_op("M=D&M")?,
            ArithmeticOp::Or => self.write_binary_op("M=D|M")?,
            ArithmeticOp::Neg => self.write_unary_op("M=-M")?,
            ArithmeticOp::Not => self.write_unary_op("M=!M")?,
            ArithmeticOp::Eq => self.write_comparison("JEQ")?,
            ArithmeticOp::Gt => self.write_comparison("JGT")?,
            ArithmeticOp::Lt => self.write_comparison("JLT")?,
        }
        Ok(())
    }

    /// Binary ops address both operands: D holds the top, M the one below,
    /// and the result lands in the slot below (the new top).
    fn write_binary_op(&mut self, operation: &str) -> Result<(), TranslateError> {
        write_asm!(self.out,
            "@SP"
            "M=M-1"
            "A=M"
            "D=M"
            "A=A-1"
        )?;
        writeln!(self.out, "{operation}")?;
        Ok(())
    }

    fn write_unary_op(&mut self, operation: &str) -> Result<(), TranslateError> {
        write_asm!(self.out,
            "@SP"
            "A=M-1"
        )?;
        writeln!(self.out, "{operation}")?;
        Ok(())
    }

    /// Comparisons compute `second - top`, write `0` (false) optimistically,
    /// and branch on the signed predicate to overwrite with `-1` (true).
    fn write_comparison(&mut self, jump: &str) -> Result<(), TranslateError> {
        let base = self.mint_compare_base();
        write_asm!(self.out,
            "@SP"
            "M=M-1"
            "A=M"
            "D=M"
            "A=A-1"
            "D=M-D"
            "M=0"
        )?;
        writeln!(self.out, "@{base}_IF_TRUE")?;
        writeln!(self.out, "D;{jump}")?;
        writeln!(self.out, "@{base}_END")?;
        write_asm!(self.out, "0;JMP")?;
        writeln!(self.out, "({base}_IF_TRUE)")?;
        write_asm!(self.out,
            "@SP"
            "A=M-1"
            "M=-1"
        )?;
        writeln!(self.out, "({base}_END)")?;
        Ok(())
    }

    fn write_push(&mut self, segment: Segment, index: u16) -> Result<(), TranslateError> {
        match segment {
            Segment::Constant => {
                writeln!(self.out, "@{index}")?;
                write_asm!(self.out, "D=A")?;
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                let pointer = segment.pointer_symbol().expect("indirect segment");
                writeln!(self.out, "@{index}")?;
                write_asm!(self.out, "D=A")?;
                writeln!(self.out, "@{pointer}")?;
                write_asm!(self.out,
                    "A=M+D"
                    "D=M"
                )?;
            }
            Segment::Temp => {
                writeln!(self.out, "@{index}")?;
                write_asm!(self.out,
                    "D=A"
                    "@5"
                    "A=A+D"
                    "D=M"
                )?;
            }
            Segment::Pointer => {
                writeln!(self.out, "@{}", pointer_target(index))?;
                write_asm!(self.out, "D=M")?;
            }
            Segment::Static => {
                writeln!(self.out, "@{}.{index}", self.unit)?;
                write_asm!(self.out, "D=M")?;
            }
        }
        self.push_d()?;
        Ok(())
    }

    fn write_pop(&mut self, segment: Segment, index: u16) -> Result<(), TranslateError> {
        match segment {
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                let pointer = segment.pointer_symbol().expect("indirect segment");
                writeln!(self.out, "@{index}")?;
                write_asm!(self.out, "D=A")?;
                writeln!(self.out, "@{pointer}")?;
                write_asm!(self.out,
                    "D=M+D"
                    "@R13"
                    "M=D"
                )?;
                self.pop_to_d()?;
                write_asm!(self.out,
                    "@R13"
                    "A=M"
                    "M=D"
                )?;
            }
            Segment::Temp => {
                writeln!(self.out, "@{index}")?;
                write_asm!(self.out,
                    "D=A"
                    "@5"
                    "D=A+D"
                    "@R13"
                    "M=D"
                )?;
                self.pop_to_d()?;
                write_asm!(self.out,
                    "@R13"
                    "A=M"
                    "M=D"
                )?;
            }
            Segment::Pointer => {
                self.pop_to_d()?;
                writeln!(self.out, "@{}", pointer_target(index))?;
                write_asm!(self.out, "M=D")?;
            }
            Segment::Static => {
                self.pop_to_d()?;
                writeln!(self.out, "@{}.{index}", self.unit)?;
                write_asm!(self.out, "M=D")?;
            }
            Segment::Constant => return Err(TranslateError::PopToConstant),
        }
        Ok(())
    }

    /// `(f)` followed by `locals` zeroed stack slots.
    ///
    /// The function's return-label counter is NOT reset here: the bootstrap
    /// mints a `Sys.init$ret.*` label before `function Sys.init` is ever
    /// seen, and label uniqueness must survive that.
    fn write_function(&mut self, name: &str, locals: u16) -> Result<(), TranslateError> {
        self.current_function = name.to_string();
        writeln!(self.out, "({name})")?;
        for _ in 0..locals {
            write_asm!(self.out,
                "@SP"
                "A=M"
                "M=0"
                "@SP"
                "M=M+1"
            )?;
        }
        Ok(())
    }

    /// The caller half of the protocol: push the return address and the four
    /// saved pointers, reposition ARG and LCL, jump, and land the return
    /// label.
    fn write_call(&mut self, name: &str, args: u16) -> Result<(), TranslateError> {
        let return_label = self.mint_return_label();

        writeln!(self.out, "@{return_label}")?;
        write_asm!(self.out, "D=A")?;
        self.push_d()?;
        for pointer in ["LCL", "ARG", "THIS", "THAT"] {
            writeln!(self.out, "@{pointer}")?;
            write_asm!(self.out, "D=M")?;
            self.push_d()?;
        }
        write_asm!(self.out,
            "@SP"
            "D=M"
        )?;
        writeln!(self.out, "@{}", u32::from(args) + 5)?;
        write_asm!(self.out,
            "D=D-A"
            "@ARG"
            "M=D"
            "@SP"
            "D=M"
            "@LCL"
            "M=D"
        )?;
        writeln!(self.out, "@{name}")?;
        write_asm!(self.out, "0;JMP")?;
        writeln!(self.out, "({return_label})")?;
        Ok(())
    }

    /// Mints `<enclosing>$ret.<k>`; `k` is monotonic per enclosing function.
    fn mint_return_label(&mut self) -> String {
        let counter = self
            .return_counters
            .entry(self.current_function.clone())
            .or_insert(0);
        let k = *counter;
        *counter += 1;
        format!("{}$ret.{k}", self.current_function)
    }

    /// The callee half of the protocol. The return address is snapshotted
    /// into R14 before the return value overwrites `*ARG`: with zero
    /// arguments the two cells alias.
    fn write_return(&mut self) -> Result<(), TranslateError> {
        write_asm!(self.out,
            "@LCL"
            "D=M"
            "@R13"
            "M=D"
            "@5"
            "A=D-A"
            "D=M"
            "@R14"
            "M=D"
        )?;
        self.pop_to_d()?;
        write_asm!(self.out,
            "@ARG"
            "A=M"
            "M=D"
            "@ARG"
            "D=M+1"
            "@SP"
            "M=D"
        )?;
        for pointer in ["THAT", "THIS", "ARG", "LCL"] {
            write_asm!(self.out,
                "@R13"
                "M=M-1"
                "A=M"
                "D=M"
            )?;
            writeln!(self.out, "@{pointer}")?;
            write_asm!(self.out, "M=D")?;
        }
        write_asm!(self.out,
            "@R14"
            "A=M"
            "0;JMP"
        )?;
        Ok(())
    }

    /// Pushes D and increments SP.
    fn push_d(&mut self) -> Result<(), TranslateError> {
        write_asm!(self.out,
            "@SP"
            "A=M"
            "M=D"
            "@SP"
            "M=M+1"
        )?;
        Ok(())
    }

    /// Decrements SP and pops the top into D.
    fn pop_to_d(&mut self) -> Result<(), TranslateError> {
        write_asm!(self.out,
            "@SP"
            "M=M-1"
            "A=M"
            "D=M"
        )?;
        Ok(())
    }
}

/// `pointer 0` aliases THIS, `pointer 1` aliases THAT.
fn pointer_target(index: u16) -> &'static str {
    if index == 0 {
        "THIS"
    } else {
        "THAT"
    }
}
