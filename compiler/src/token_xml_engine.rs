use std::io::Write;

use xml::{writer::XmlEvent, EmitterConfig, EventWriter};

use crate::{compilation_engine::CompilationEngine, error::Result, tokens::TokenStream};

/// Lists every token of a unit as `<category>text</category>` under `<tokens>`.
pub struct TokenXmlEngine<W: Write> {
    writer: EventWriter<W>,
    tokens: TokenStream,
}

impl<W: Write> TokenXmlEngine<W> {
    pub fn new(tokens: TokenStream, out: W) -> Self {
        let writer = EmitterConfig::new()
            .perform_indent(true)
            .write_document_declaration(false)
            .normalize_empty_elements(false)
            .create_writer(out);
        TokenXmlEngine { writer, tokens }
    }

    fn write_tokens(&mut self) -> Result<()> {
        self.writer.write(XmlEvent::start_element("tokens"))?;
        while let Some(t) = self.tokens.advance() {
            let tag = t.category().to_string();
            self.writer.write(XmlEvent::start_element(tag.as_str()))?;
            self.writer.write(XmlEvent::characters(&t.to_string()))?;
            self.writer.write(XmlEvent::end_element())?;
        }
        self.writer.write(XmlEvent::end_element())?;
        Ok(())
    }
}

impl<W: Write> CompilationEngine<W> for TokenXmlEngine<W> {
    fn output_extension() -> &'static str {
        "xml"
    }

    fn output_suffix() -> &'static str {
        "T"
    }

    fn compile(tokens: TokenStream, out: W) -> Result<W> {
        let mut e = TokenXmlEngine::new(tokens, out);
        e.write_tokens()?;
        let mut out = e.writer.into_inner();
        out.flush()?;
        Ok(out)
    }
}
