use std::{iter::Peekable, vec::IntoIter};

use derive_more::Display;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Token {
    #[display(fmt = "{}", _0)]
    Keyword(String),
    #[display(fmt = "{}", _0)]
    Symbol(char),
    #[display(fmt = "{}", _0)]
    IntegerConstant(u16),
    #[display(fmt = "{}", _0)]
    StringConstant(String),
    #[display(fmt = "{}", _0)]
    Identifier(String),
}

/// Doubles as the element name in token listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenCategory {
    #[display(fmt = "keyword")]
    Keyword,
    #[display(fmt = "symbol")]
    Symbol,
    #[display(fmt = "integerConstant")]
    IntegerConstant,
    #[display(fmt = "stringConstant")]
    StringConstant,
    #[display(fmt = "identifier")]
    Identifier,
}

impl Token {
    pub fn category(&self) -> TokenCategory {
        match self {
            Token::Keyword(_) => TokenCategory::Keyword,
            Token::Symbol(_) => TokenCategory::Symbol,
            Token::IntegerConstant(_) => TokenCategory::IntegerConstant,
            Token::StringConstant(_) => TokenCategory::StringConstant,
            Token::Identifier(_) => TokenCategory::Identifier,
        }
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Token::Keyword(t) if t == kw)
    }

    pub fn is_symbol(&self, s: char) -> bool {
        matches!(self, Token::Symbol(t) if *t == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceToken {
    pub token: Token,
    pub line: u32,
}

/// Forward-only cursor over a scanned unit.
pub struct TokenStream {
    tokens: Peekable<IntoIter<SourceToken>>,
    line: u32,
}

impl TokenStream {
    pub fn new(tokens: Vec<SourceToken>) -> Self {
        TokenStream {
            tokens: tokens.into_iter().peekable(),
            line: 1,
        }
    }

    pub fn has_more_tokens(&mut self) -> bool {
        return self.tokens.peek().is_some();
    }

    pub fn advance(&mut self) -> Option<Token> {
        let next = self.tokens.next()?;
        self.line = next.line;
        Some(next.token)
    }

    pub fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek().map(|t| &t.token)
    }

    /// Line of the last consumed token.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Line of the lookahead token, falling back to the last consumed one at end of input.
    pub fn peek_line(&mut self) -> u32 {
        match self.tokens.peek() {
            Some(t) => t.line,
            None => self.line,
        }
    }
}
