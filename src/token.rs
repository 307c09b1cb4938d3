use log::debug;
use serde::Serialize;
use std::fmt;
use std::mem;

use crate::number::Number;

/// The token classes produced by the tokenizer.
///
/// Operators and punctuation are all `SYMBOL`; the parser dispatches on the
/// lexeme.  Literal classes carry their decoded payload.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Serialize)]
pub enum TokenType {
    /// A numeric literal, already typed by its suffix and magnitude
    NUMBER(Number),

    /// A plain, verbatim or raw string literal (decoded contents)
    STRING(String),

    /// `$"..."` and its verbatim/raw variants; the lexeme keeps the raw text
    INTERPOLATED,

    /// A character literal
    CHAR(char),

    /// A user-defined name
    IDENTIFIER,

    /// A reserved word (`if`, `new`, `int`, `is`, ...)
    KEYWORD,

    /// An operator or punctuation mark
    SYMBOL,

    /// Line or block comment; skipped unless whitespace skipping is off
    COMMENT,

    /// A run of whitespace, only produced when skipping is off
    WHITESPACE,

    /// End-of-input marker
    EOF,
}

impl PartialEq for TokenType {
    /// Variants compare equal regardless of payload.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

/// A token with its source slice and byte span.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token<'a> {
    pub token_type: TokenType,

    /// The exact substring of the source that produced this token.
    pub lexeme: &'a str,

    /// Byte offset of the first character in the full source text.
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn new(token_type: TokenType, lexeme: &'a str, start: usize) -> Self {
        debug!(
            "Creating new token: type={:?}, lexeme={}, start={}",
            token_type, lexeme, start
        );

        Self {
            token_type,
            lexeme,
            start,
        }
    }

    pub fn len(&self) -> usize {
        self.lexeme.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexeme.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.token_type == TokenType::EOF
    }

    /// Operator, punctuation or keyword with exactly this spelling.
    pub fn is(&self, text: &str) -> bool {
        matches!(self.token_type, TokenType::SYMBOL | TokenType::KEYWORD) && self.lexeme == text
    }

    /// Identifier or keyword, i.e. anything that may start a name.
    pub fn is_word(&self) -> bool {
        matches!(self.token_type, TokenType::IDENTIFIER | TokenType::KEYWORD)
    }
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ── variant name and literal payload ───────────────────────────────
        let (variant, literal): (&'static str, String) = match &self.token_type {
            TokenType::NUMBER(n) => ("NUMBER", format!("{}:{}", n, n.kind())),
            TokenType::STRING(s) => ("STRING", s.clone()),
            TokenType::INTERPOLATED => ("INTERPOLATED", "null".to_string()),
            TokenType::CHAR(c) => ("CHAR", c.to_string()),
            TokenType::IDENTIFIER => ("IDENTIFIER", "null".to_string()),
            TokenType::KEYWORD => ("KEYWORD", "null".to_string()),
            TokenType::SYMBOL => ("SYMBOL", "null".to_string()),
            TokenType::COMMENT => ("COMMENT", "null".to_string()),
            TokenType::WHITESPACE => ("WHITESPACE", "null".to_string()),
            TokenType::EOF => ("EOF", "null".to_string()),
        };

        write!(f, "{} {} {}", variant, self.lexeme, literal)
    }
}
