use regex::Regex;
use std::fs;
use std::path::Path;

use crate::error::{CompileError, Result};
use crate::tokens::{SourceToken, Token, TokenStream};

const KEYWORDS: [&str; 21] = [
    "class",
    "constructor",
    "function",
    "method",
    "field",
    "static",
    "var",
    "int",
    "char",
    "boolean",
    "void",
    "true",
    "false",
    "null",
    "this",
    "let",
    "do",
    "if",
    "else",
    "while",
    "return",
];

/// Largest value a `push constant` can carry.
pub(crate) const MAX_INT: u16 = 32767;

pub struct Tokenizer {
    re: Regex,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        let comment = r"//[^\n]*";
        let comments = r"/\*[\s\S]*?\*/";
        let symbols = r"[{}()\[\].,;+\-*/&|<>=~]";
        let str_pattern = r#""[^"\n]*""#;
        let word = r"[_a-zA-Z][_a-zA-Z0-9]*";
        let pattern = format!(
            r"(?P<comment>{comment}|{comments})|(?P<open>/\*)|(?P<symbol>{symbols})|(?P<string>{str_pattern})|(?P<word>{word})|(?P<int>\d+)|(?P<other>\S)"
        );
        return Tokenizer {
            re: Regex::new(&pattern).expect("regex syntax error."),
        };
    }

    pub fn tokenize(&self, input: &Path) -> Result<TokenStream> {
        let text = fs::read_to_string(input)?;
        self.tokenize_str(&text)
    }

    pub fn tokenize_str(&self, text: &str) -> Result<TokenStream> {
        let mut tokens = Vec::new();
        let mut line = 1;
        let mut pos = 0;
        for cap in self.re.captures_iter(text) {
            let Some(whole) = cap.get(0) else {
                continue;
            };
            line += text[pos..whole.start()].matches('\n').count() as u32;
            pos = whole.start();

            let token = if cap.name("comment").is_some() {
                continue;
            } else if cap.name("open").is_some() {
                return Err(CompileError::lex(line, "unterminated comment"));
            } else if let Some(sm) = cap.name("symbol") {
                Token::Symbol(sm.as_str().chars().next().unwrap_or_default())
            } else if let Some(s) = cap.name("string") {
                let r = s.as_str();
                Token::StringConstant(r[1..r.len() - 1].to_string())
            } else if let Some(w) = cap.name("word") {
                let w = w.as_str();
                if KEYWORDS.contains(&w) {
                    Token::Keyword(w.to_string())
                } else {
                    Token::Identifier(w.to_string())
                }
            } else if let Some(digits) = cap.name("int") {
                match digits.as_str().parse::<u16>() {
                    Ok(i) if i <= MAX_INT => Token::IntegerConstant(i),
                    _ => {
                        return Err(CompileError::lex(
                            line,
                            &format!("integer constant {} out of range", digits.as_str()),
                        ));
                    }
                }
            } else {
                let c = whole.as_str();
                let reason = if c == "\"" {
                    "unterminated string constant".to_string()
                } else {
                    format!("unexpected character `{c}`")
                };
                return Err(CompileError::lex(line, &reason));
            };
            tokens.push(SourceToken { token, line });
        }
        log::trace!("scanned {} tokens", tokens.len());
        return Ok(TokenStream::new(tokens));
    }
}
