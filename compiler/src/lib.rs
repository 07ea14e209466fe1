pub mod code_generator;
pub mod compilation_engine;
pub mod driver;
pub mod error;
pub mod sym_table;
pub mod token_xml_engine;
pub mod tokenizer;
pub mod tokens;
pub mod vm_compilation_engine;
mod tests;

use compilation_engine::CompilationEngine;
use error::Result;
use tokenizer::Tokenizer;
use vm_compilation_engine::VmCompilationEngine;

/// Compiles the source text of one class to VM code.
pub fn compile_source(source: &str) -> Result<String> {
    let tokens = Tokenizer::new().tokenize_str(source)?;
    let out = VmCompilationEngine::compile(tokens, Vec::<u8>::new())?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
