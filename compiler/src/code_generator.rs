use std::io::{self, Write};

use derive_more::Display;

use crate::sym_table::Kind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Segment {
    #[display(fmt = "constant")]
    Const,
    #[display(fmt = "argument")]
    Arg,
    #[display(fmt = "local")]
    Local,
    #[display(fmt = "static")]
    Static,
    #[display(fmt = "this")]
    This,
    #[display(fmt = "that")]
    That,
    #[display(fmt = "pointer")]
    Pointer,
    #[display(fmt = "temp")]
    Temp,
}

impl From<Kind> for Segment {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Static => Segment::Static,
            Kind::Field => Segment::This,
            Kind::Argument => Segment::Arg,
            Kind::Local => Segment::Local,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Command {
    #[display(fmt = "add")]
    Add,
    #[display(fmt = "sub")]
    Sub,
    #[display(fmt = "neg")]
    Neg,
    #[display(fmt = "eq")]
    Eq,
    #[display(fmt = "gt")]
    Gt,
    #[display(fmt = "lt")]
    Lt,
    #[display(fmt = "and")]
    And,
    #[display(fmt = "or")]
    Or,
    #[display(fmt = "not")]
    Not,
}

/// Writes VM instructions, one line per call, into an owned sink.
pub struct CodeGenerator<W: Write> {
    out: W,
    label_count: u32,
}

impl<W: Write> CodeGenerator<W> {
    pub fn new(out: W) -> Self {
        CodeGenerator {
            out,
            label_count: 0,
        }
    }

    pub fn write_push(&mut self, seg: Segment, idx: u16) -> io::Result<()> {
        writeln!(self.out, "push {seg} {idx}")
    }

    pub fn write_pop(&mut self, seg: Segment, idx: u16) -> io::Result<()> {
        writeln!(self.out, "pop {seg} {idx}")
    }

    pub fn write_arithmetic(&mut self, cmd: Command) -> io::Result<()> {
        writeln!(self.out, "{cmd}")
    }

    pub fn write_label(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "label {label}")
    }

    pub fn write_goto(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "goto {label}")
    }

    pub fn write_if(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "if-goto {label}")
    }

    pub fn write_call(&mut self, name: &str, n_args: u16) -> io::Result<()> {
        writeln!(self.out, "call {name} {n_args}")
    }

    pub fn write_function(&mut self, name: &str, n_locals: u16) -> io::Result<()> {
        writeln!(self.out, "function {name} {n_locals}")
    }

    pub fn write_return(&mut self) -> io::Result<()> {
        writeln!(self.out, "return")
    }

    /// `<prefix>$<n>`, where `n` never repeats for this generator.
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}${}", self.label_count);
        self.label_count += 1;
        label
    }

    /// Flushes and hands the sink back. Consuming `self` makes a second close impossible.
    pub fn close(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
