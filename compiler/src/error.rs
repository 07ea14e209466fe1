use std::{error::Error, io};

use derive_more::Display;

use crate::{sym_table::Kind, tokens::Token};

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Display)]
pub enum CompileError {
    #[display(fmt = "line {}: {}", line, reason)]
    Lex { line: u32, reason: String },
    #[display(fmt = "line {}: expected {}, found {}", line, expected, found)]
    Syntax {
        line: u32,
        expected: String,
        found: String,
    },
    #[display(fmt = "line {}: unresolved symbol `{}`", line, name)]
    UnresolvedSymbol { line: u32, name: String },
    #[display(fmt = "line {}: too many {} variables", line, kind)]
    TooManyVariables { line: u32, kind: Kind },
    #[display(fmt = "io error: {}", _0)]
    Io(io::Error),
    #[display(fmt = "xml output error: {}", _0)]
    Emit(xml::writer::Error),
}

impl CompileError {
    pub fn syntax(line: u32, expected: &str, found: Option<&Token>) -> Self {
        let found = match found {
            Some(t) => format!("{} `{}`", t.category(), t),
            None => "end of input".to_string(),
        };
        CompileError::Syntax {
            line,
            expected: expected.to_owned(),
            found,
        }
    }

    pub fn lex(line: u32, reason: &str) -> Self {
        CompileError::Lex {
            line,
            reason: reason.to_owned(),
        }
    }
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CompileError::Io(e) => Some(e),
            CompileError::Emit(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CompileError {
    fn from(e: io::Error) -> Self {
        CompileError::Io(e)
    }
}

impl From<xml::writer::Error> for CompileError {
    fn from(e: xml::writer::Error) -> Self {
        CompileError::Emit(e)
    }
}
