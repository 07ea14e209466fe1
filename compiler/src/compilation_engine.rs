use std::io::Write;

use crate::{error::Result, tokens::TokenStream};

/// One output flavour for a single source unit.
pub trait CompilationEngine<W: Write> {
    fn output_extension() -> &'static str;

    /// Appended to the unit's file stem before the extension.
    fn output_suffix() -> &'static str {
        ""
    }

    /// Consumes the whole unit and returns the flushed sink.
    fn compile(tokens: TokenStream, out: W) -> Result<W>;
}
