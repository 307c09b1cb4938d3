//! Module `tokenizer` turns expression text into tokens on demand.
//!
//! Tokens are never materialised up front: the parser pulls them one at a time
//! and backtracks through a stack of saved positions
//! ([`Tokenizer::push_position`] / [`Tokenizer::pop_position`] /
//! [`Tokenizer::discard_position`]).
//!
//! # Recognition order
//!
//! 1. Whitespace is skipped (unless the caller asks for it).
//! 2. Each registered [`TokenReader`] is tried in priority order: comments,
//!    numbers, strings (quoted, verbatim, raw and their `$` forms), char
//!    literals, names.  The first reader that matches decides the length.
//! 3. Otherwise the longest operator in the [`SymbolTrie`] wins.
//! 4. Otherwise the tokenizer fails with `UnknownSymbol`.
//!
//! Plain string tokens are decoded by the first [`StringTransformer`] that
//! recognises their delimiter style.  Interpolated strings keep their raw
//! lexeme; the parser splits them with [`crate::interpolation`].

use crate::error::{CompileError, Result};
use crate::number::Number;
use crate::token::{Token, TokenType};
use crate::trie::{default_symbols, SymbolTrie};
use log::{info, trace};
use memchr::{memchr, memmem};
use phf::phf_set;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Reserved words (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Set<&'static str> = phf_set! {
    "as", "bool", "break", "byte", "case", "catch", "char", "continue",
    "decimal", "default", "do", "double", "else", "false", "finally", "float",
    "for", "foreach", "goto", "if", "in", "int", "is", "long", "new", "null",
    "object", "return", "sbyte", "short", "sizeof", "string", "switch",
    "throw", "true", "try", "typeof", "uint", "ulong", "ushort", "var",
    "void", "while",
};

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

/// Saved tokenizer state: the current token spans `index..index + length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub length: usize,
}

/// A pluggable recogniser for one family of literal forms.
pub trait TokenReader: Sync {
    /// Try to read a token at byte `start` of `src`.  Returns the token's byte
    /// length and class, `None` when the input is not this reader's business.
    /// `base` is added to offsets in diagnostics.
    fn read(&self, src: &str, start: usize, base: usize) -> Result<Option<(usize, TokenType)>>;
}

/// Readers in priority order.
pub static DEFAULT_READERS: [&dyn TokenReader; 5] = [
    &CommentReader,
    &NumberReader,
    &StringReader,
    &CharReader,
    &NameReader,
];

pub struct Tokenizer<'a> {
    src: &'a str,
    base: usize,
    index: usize,
    length: usize,
    stack: Vec<Position>,
    readers: &'static [&'static dyn TokenReader],
    symbols: &'static SymbolTrie,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::with_offset(src, 0)
    }

    /// Tokenizer over a slice that starts at byte `base` of a larger text
    /// (interpolation holes), so reported offsets stay absolute.
    pub fn with_offset(src: &'a str, base: usize) -> Self {
        info!("Tokenizer created over {} bytes at offset {}", src.len(), base);

        Self {
            src,
            base,
            index: 0,
            length: 0,
            stack: Vec::new(),
            readers: &DEFAULT_READERS,
            symbols: default_symbols(),
            finished: false,
        }
    }

    pub fn with_readers(mut self, readers: &'static [&'static dyn TokenReader]) -> Self {
        self.readers = readers;
        self
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn base(&self) -> usize {
        self.base
    }

    // ───────────────────────────── positions ────────────────────────────────

    pub fn current_position(&self) -> Position {
        Position {
            index: self.index,
            length: self.length,
        }
    }

    pub fn set_position(&mut self, position: Position) {
        self.index = position.index;
        self.length = position.length;
    }

    pub fn push_position(&mut self) {
        self.stack.push(self.current_position());
    }

    /// Restore the most recently pushed position.
    pub fn pop_position(&mut self) {
        if let Some(position) = self.stack.pop() {
            self.set_position(position);
        }
    }

    /// Forget the most recently pushed position, keeping the current one.
    pub fn discard_position(&mut self) {
        self.stack.pop();
    }

    /// Absolute offset just past the current token.
    pub fn offset(&self) -> usize {
        self.base + self.index + self.length
    }

    /// Source text after the current token.
    pub fn remaining(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[(self.index + self.length).min(src.len())..]
    }

    // ───────────────────────────── reading ──────────────────────────────────

    pub fn read_token(&mut self) -> Result<Token<'a>> {
        self.read_token_with(true)
    }

    /// Advance past the current token and recognise the next one.
    pub fn read_token_with(&mut self, skip_whitespace: bool) -> Result<Token<'a>> {
        self.index += self.length;
        self.length = 0;

        loop {
            let src: &'a str = self.src;
            let rest: &'a str = &src[self.index..];
            let Some(c) = rest.chars().next() else {
                return Ok(Token::new(TokenType::EOF, "", self.base + self.src.len()));
            };

            if c.is_whitespace() {
                if skip_whitespace {
                    self.index += c.len_utf8();
                    continue;
                }
                self.length = rest
                    .char_indices()
                    .find(|(_, ch)| !ch.is_whitespace())
                    .map_or(rest.len(), |(i, _)| i);
                return Ok(self.current(TokenType::WHITESPACE));
            }

            if let Some((length, token_type)) = self.run_readers()? {
                if skip_whitespace && token_type == TokenType::COMMENT {
                    self.index += length;
                    continue;
                }
                self.length = length;
                return Ok(self.current(token_type));
            }

            if let Some(length) = self.symbols.longest_match(rest) {
                self.length = length;
                return Ok(self.current(TokenType::SYMBOL));
            }

            let near: String = rest.chars().take(16).collect();
            return Err(CompileError::unknown_symbol(self.base + self.index, near));
        }
    }

    fn run_readers(&self) -> Result<Option<(usize, TokenType)>> {
        for reader in self.readers {
            if let Some(found) = reader.read(self.src, self.index, self.base)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn current(&self, token_type: TokenType) -> Token<'a> {
        let src: &'a str = self.src;
        let lexeme: &'a str = &src[self.index..self.index + self.length];
        trace!("Read token {:?} '{}' at {}", token_type, lexeme, self.base + self.index);

        Token::new(token_type, lexeme, self.base + self.index)
    }

    /// Next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Token<'a>> {
        self.push_position();
        let token = self.read_token();
        self.pop_position();
        token
    }

    /// Consume the next token iff it is the symbol or keyword `expected`.
    pub fn read_symbol(&mut self, expected: &str, throw_on_mismatch: bool) -> Result<bool> {
        self.push_position();

        let token = match self.read_token() {
            Ok(token) => token,
            Err(e) => {
                self.pop_position();
                return Err(e);
            }
        };

        if token.is(expected) {
            self.discard_position();
            return Ok(true);
        }

        self.pop_position();

        if throw_on_mismatch {
            let found = if token.is_eof() {
                "end of input"
            } else {
                token.lexeme
            };
            return Err(CompileError::wrong_symbol(token.start, expected, found));
        }

        Ok(false)
    }

    /// Like [`read_symbol`](Self::read_symbol) but also accepts `expected` as
    /// the leading part of a longer operator, consuming only that part
    /// (`>` out of `>>` when closing nested generic argument lists).
    pub fn read_symbol_prefix(&mut self, expected: &str) -> Result<bool> {
        let token = self.peek_token()?;

        if token.token_type == TokenType::SYMBOL
            && token.lexeme.len() > expected.len()
            && token.lexeme.starts_with(expected)
        {
            self.index = token.start - self.base;
            self.length = expected.len();
            return Ok(true);
        }

        self.read_symbol(expected, false)
    }

    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.peek_token()?.is_eof())
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let token = self.read_token();
        match &token {
            Ok(t) if t.is_eof() => self.finished = true,
            Err(_) => self.finished = true,
            _ => {}
        }

        Some(token)
    }
}

impl<'a> FusedIterator for Tokenizer<'a> {}

// ─────────────────────────────────────────────────────────────────────────────
// Comments
// ─────────────────────────────────────────────────────────────────────────────

pub struct CommentReader;

impl TokenReader for CommentReader {
    fn read(&self, src: &str, start: usize, base: usize) -> Result<Option<(usize, TokenType)>> {
        let bytes = &src.as_bytes()[start..];

        if bytes.starts_with(b"//") {
            let length = memchr(b'\n', bytes).unwrap_or(bytes.len());
            return Ok(Some((length, TokenType::COMMENT)));
        }

        if bytes.starts_with(b"/*") {
            return match memmem::find(&bytes[2..], b"*/") {
                Some(pos) => Ok(Some((pos + 4, TokenType::COMMENT))),
                None => Err(CompileError::UnterminatedLiteral {
                    offset: base + start,
                }),
            };
        }

        Ok(None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Numbers
// ─────────────────────────────────────────────────────────────────────────────

pub struct NumberReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suffix {
    Long,
    Unsigned,
    UnsignedLong,
    Float,
    Double,
    Decimal,
}

fn read_suffix(bytes: &[u8], i: usize) -> (usize, Option<Suffix>) {
    let first = bytes.get(i).map(u8::to_ascii_lowercase);
    let second = bytes.get(i + 1).map(u8::to_ascii_lowercase);

    match (first, second) {
        (Some(b'u'), Some(b'l')) | (Some(b'l'), Some(b'u')) => (2, Some(Suffix::UnsignedLong)),
        (Some(b'u'), _) => (1, Some(Suffix::Unsigned)),
        (Some(b'l'), _) => (1, Some(Suffix::Long)),
        (Some(b'f'), _) => (1, Some(Suffix::Float)),
        (Some(b'd'), _) => (1, Some(Suffix::Double)),
        (Some(b'm'), _) => (1, Some(Suffix::Decimal)),
        _ => (0, None),
    }
}

/// Smallest of the suffix-permitted widths that holds `value`.
fn integral_literal(value: u128, suffix: Option<Suffix>) -> Option<Number> {
    let fits_i32 = value <= i32::MAX as u128;
    let fits_u32 = value <= u32::MAX as u128;
    let fits_i64 = value <= i64::MAX as u128;
    let fits_u64 = value <= u64::MAX as u128;

    match suffix {
        None if fits_i32 => Some(Number::Int(value as i32)),
        None | Some(Suffix::Unsigned) if fits_u32 => Some(Number::UInt(value as u32)),
        None | Some(Suffix::Long) if fits_i64 => Some(Number::Long(value as i64)),
        None | Some(Suffix::Unsigned) | Some(Suffix::Long) | Some(Suffix::UnsignedLong)
            if fits_u64 =>
        {
            Some(Number::ULong(value as u64))
        }
        Some(Suffix::Float) => Some(Number::Float(value as f32)),
        Some(Suffix::Double) => Some(Number::Double(value as f64)),
        Some(Suffix::Decimal) => Some(Number::Decimal(value as f64)),
        _ => None,
    }
}

fn strip_separators(digits: &str) -> String {
    digits.chars().filter(|c| *c != '_').collect()
}

impl TokenReader for NumberReader {
    fn read(&self, src: &str, start: usize, base: usize) -> Result<Option<(usize, TokenType)>> {
        let bytes = src.as_bytes();
        let first = bytes[start];
        let leading_dot = first == b'.' && bytes.get(start + 1).is_some_and(u8::is_ascii_digit);

        if !first.is_ascii_digit() && !leading_dot {
            return Ok(None);
        }

        let too_large = |end: usize| {
            CompileError::mismatch(
                base + start,
                format!("Integral constant '{}' is too large", &src[start..end]),
            )
        };

        // ── 0x / 0b / 0o ─────────────────────────────────────────────────
        let radix = match (first, bytes.get(start + 1).map(u8::to_ascii_lowercase)) {
            (b'0', Some(b'x')) => Some(16),
            (b'0', Some(b'b')) => Some(2),
            (b'0', Some(b'o')) => Some(8),
            _ => None,
        };

        if let Some(radix) = radix {
            let digits_start = start + 2;
            let mut i = digits_start;
            while i < bytes.len() && ((bytes[i] as char).is_digit(radix) || bytes[i] == b'_') {
                i += 1;
            }

            if i == digits_start {
                return Err(CompileError::unknown_symbol(base + start, &src[start..i]));
            }

            let value = u128::from_str_radix(&strip_separators(&src[digits_start..i]), radix)
                .map_err(|_| too_large(i))?;
            let (suffix_len, suffix) = read_suffix(bytes, i);
            let number = integral_literal(value, suffix).ok_or_else(|| too_large(i))?;

            return Ok(Some((i + suffix_len - start, TokenType::NUMBER(number))));
        }

        // ── decimal: digits [. digits] [e [+-] digits] ───────────────────
        let digit_run = |mut i: usize| {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                i += 1;
            }
            i
        };

        let mut i = digit_run(start);
        let mut real = false;

        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            real = true;
            i = digit_run(i + 1);
        }

        if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
            let sign = usize::from(matches!(bytes.get(i + 1), Some(b'+') | Some(b'-')));
            if bytes.get(i + 1 + sign).is_some_and(u8::is_ascii_digit) {
                real = true;
                i = digit_run(i + 1 + sign);
            }
        }

        let text = strip_separators(&src[start..i]);
        let (suffix_len, suffix) = read_suffix(bytes, i);

        let parse_real = |text: &str| -> Result<f64> {
            text.parse::<f64>()
                .map_err(|_| CompileError::unknown_symbol(base + start, text))
        };

        let number = match suffix {
            Some(Suffix::Float) => Number::Float(parse_real(&text)? as f32),
            Some(Suffix::Double) => Number::Double(parse_real(&text)?),
            Some(Suffix::Decimal) => Number::Decimal(parse_real(&text)?),
            None if real => Number::Double(parse_real(&text)?),
            _ if real => {
                return Err(CompileError::mismatch(
                    base + start,
                    "Integral suffix applied to a real literal",
                ));
            }
            _ => {
                let value: u128 = text.parse().map_err(|_| too_large(i))?;
                integral_literal(value, suffix).ok_or_else(|| too_large(i))?
            }
        };

        Ok(Some((i + suffix_len - start, TokenType::NUMBER(number))))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strings
// ─────────────────────────────────────────────────────────────────────────────

/// Delimiter family of a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringStyle {
    /// `"..."` with backslash escapes
    Quoted,
    /// `@"..."` with doubled quotes
    Verbatim,
    /// `"""..."""` taken literally
    Raw,
}

/// Delimiter layout of a string lexeme: style, interpolation flag, and the
/// byte lengths of the opening and closing delimiters.
pub fn string_layout(text: &str) -> Option<(StringStyle, bool, usize, usize)> {
    let layout = if text.starts_with("$\"\"\"") {
        (StringStyle::Raw, true, 4, 3)
    } else if text.starts_with("$@\"") || text.starts_with("@$\"") {
        (StringStyle::Verbatim, true, 3, 1)
    } else if text.starts_with("$\"") {
        (StringStyle::Quoted, true, 2, 1)
    } else if text.starts_with("\"\"\"") {
        (StringStyle::Raw, false, 3, 3)
    } else if text.starts_with("@\"") {
        (StringStyle::Verbatim, false, 2, 1)
    } else if text.starts_with('"') {
        (StringStyle::Quoted, false, 1, 1)
    } else {
        return None;
    };

    Some(layout)
}

pub struct StringReader;

impl TokenReader for StringReader {
    fn read(&self, src: &str, start: usize, base: usize) -> Result<Option<(usize, TokenType)>> {
        let Some((style, interpolated, open, _)) = string_layout(&src[start..]) else {
            return Ok(None);
        };

        let bytes = src.as_bytes();
        let body = start + open;
        let end = match style {
            StringStyle::Quoted => scan_quoted(bytes, body, interpolated, base, start)?,
            StringStyle::Verbatim => scan_verbatim(bytes, body, interpolated, base, start)?,
            StringStyle::Raw => match memmem::find(&bytes[body..], b"\"\"\"") {
                Some(pos) => body + pos + 3,
                None => {
                    return Err(CompileError::UnterminatedLiteral {
                        offset: base + start,
                    })
                }
            },
        };

        if interpolated {
            return Ok(Some((end - start, TokenType::INTERPOLATED)));
        }

        let decoded = decode_string(&src[start..end], base + start)?;
        Ok(Some((end - start, TokenType::STRING(decoded))))
    }
}

fn scan_quoted(
    bytes: &[u8],
    mut i: usize,
    interpolated: bool,
    base: usize,
    start: usize,
) -> Result<usize> {
    let mut depth = 0usize;

    while i < bytes.len() {
        if depth > 0 {
            i = scan_hole_byte(bytes, i, &mut depth, base)?;
            continue;
        }

        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' => return Ok(i + 1),
            b'\n' => break,
            b'{' if interpolated => {
                if bytes.get(i + 1) == Some(&b'{') {
                    i += 2;
                    continue;
                }
                depth = 1;
            }
            _ => {}
        }
        i += 1;
    }

    Err(CompileError::UnterminatedLiteral {
        offset: base + start,
    })
}

fn scan_verbatim(
    bytes: &[u8],
    mut i: usize,
    interpolated: bool,
    base: usize,
    start: usize,
) -> Result<usize> {
    let mut depth = 0usize;

    while i < bytes.len() {
        if depth > 0 {
            i = scan_hole_byte(bytes, i, &mut depth, base)?;
            continue;
        }

        match bytes[i] {
            b'"' => {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                    continue;
                }
                return Ok(i + 1);
            }
            b'{' if interpolated => {
                if bytes.get(i + 1) == Some(&b'{') {
                    i += 2;
                    continue;
                }
                depth = 1;
            }
            _ => {}
        }
        i += 1;
    }

    Err(CompileError::UnterminatedLiteral {
        offset: base + start,
    })
}

/// One step inside an interpolation hole; nested literals are skipped whole
/// so their quotes and braces do not end the enclosing string.
fn scan_hole_byte(bytes: &[u8], i: usize, depth: &mut usize, base: usize) -> Result<usize> {
    match bytes[i] {
        b'{' => {
            *depth += 1;
            Ok(i + 1)
        }
        b'}' => {
            *depth -= 1;
            Ok(i + 1)
        }
        b'"' => scan_quoted(bytes, i + 1, false, base, i),
        b'@' if bytes.get(i + 1) == Some(&b'"') => scan_verbatim(bytes, i + 2, false, base, i),
        b'\'' => {
            let mut j = i + 1;
            loop {
                match bytes.get(j) {
                    None | Some(b'\n') => {
                        return Err(CompileError::UnterminatedLiteral { offset: base + i })
                    }
                    Some(b'\\') => j += 2,
                    Some(b'\'') => return Ok(j + 1),
                    Some(_) => j += 1,
                }
            }
        }
        _ => Ok(i + 1),
    }
}

/// Decodes the delimiters and escapes of one string lexeme.
pub trait StringTransformer: Sync {
    /// `None` when the lexeme is not in this transformer's delimiter style.
    fn transform(&self, lexeme: &str, offset: usize) -> Option<Result<String>>;
}

pub static DEFAULT_TRANSFORMERS: [&dyn StringTransformer; 3] =
    [&RawTransformer, &VerbatimTransformer, &QuotedTransformer];

fn body_of(lexeme: &str, wanted: StringStyle) -> Option<(&str, usize)> {
    match string_layout(lexeme) {
        Some((style, false, open, close)) if style == wanted && lexeme.len() >= open + close => {
            Some((&lexeme[open..lexeme.len() - close], open))
        }
        _ => None,
    }
}

pub struct RawTransformer;

impl StringTransformer for RawTransformer {
    fn transform(&self, lexeme: &str, _offset: usize) -> Option<Result<String>> {
        body_of(lexeme, StringStyle::Raw).map(|(body, _)| Ok(decode_body(StringStyle::Raw, body)))
    }
}

pub struct VerbatimTransformer;

impl StringTransformer for VerbatimTransformer {
    fn transform(&self, lexeme: &str, _offset: usize) -> Option<Result<String>> {
        body_of(lexeme, StringStyle::Verbatim)
            .map(|(body, _)| Ok(decode_body(StringStyle::Verbatim, body)))
    }
}

pub struct QuotedTransformer;

impl StringTransformer for QuotedTransformer {
    fn transform(&self, lexeme: &str, offset: usize) -> Option<Result<String>> {
        body_of(lexeme, StringStyle::Quoted).map(|(body, open)| unescape(body, offset + open))
    }
}

/// Run the transformer chain over a plain string lexeme.
pub fn decode_string(lexeme: &str, offset: usize) -> Result<String> {
    DEFAULT_TRANSFORMERS
        .iter()
        .find_map(|t| t.transform(lexeme, offset))
        .unwrap_or_else(|| Err(CompileError::UnterminatedLiteral { offset }))
}

/// Literal text of a string body in the given style, escapes not included.
pub fn decode_body(style: StringStyle, body: &str) -> String {
    match style {
        StringStyle::Verbatim => body.replace("\"\"", "\""),
        StringStyle::Raw => {
            let body = body.strip_prefix('\n').unwrap_or(body);
            match body.rfind('\n') {
                Some(last) if body[last + 1..].trim().is_empty() => body[..last].to_string(),
                _ => body.to_string(),
            }
        }
        StringStyle::Quoted => body.to_string(),
    }
}

/// Decode backslash escapes; `offset` is the absolute position of `body`.
pub fn unescape(body: &str, offset: usize) -> Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let unknown = |sequence: String| CompileError::UnknownEscapeSequence {
            offset: offset + i,
            sequence,
        };

        let Some((_, e)) = chars.next() else {
            return Err(unknown("\\".to_string()));
        };

        let decoded = match e {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0C',
            'v' => '\x0B',
            'u' | 'x' => {
                let mut code = String::new();
                while code.len() < 4 {
                    match chars.peek() {
                        Some((_, h)) if h.is_ascii_hexdigit() => {
                            code.push(*h);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if (e == 'u' && code.len() != 4) || code.is_empty() {
                    return Err(unknown(format!("\\{}{}", e, code)));
                }
                u32::from_str_radix(&code, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| unknown(format!("\\{}{}", e, code)))?
            }
            other => return Err(unknown(format!("\\{}", other))),
        };

        out.push(decoded);
    }

    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Char literals
// ─────────────────────────────────────────────────────────────────────────────

pub struct CharReader;

impl TokenReader for CharReader {
    fn read(&self, src: &str, start: usize, base: usize) -> Result<Option<(usize, TokenType)>> {
        let bytes = src.as_bytes();
        if bytes[start] != b'\'' {
            return Ok(None);
        }

        let mut i = start + 1;
        loop {
            match bytes.get(i) {
                None | Some(b'\n') => {
                    return Err(CompileError::UnterminatedLiteral {
                        offset: base + start,
                    })
                }
                Some(b'\\') => i += 2,
                Some(b'\'') => break,
                Some(_) => i += 1,
            }
        }

        let body = src.get(start + 1..i).ok_or(CompileError::UnterminatedLiteral {
            offset: base + start,
        })?;
        let decoded = unescape(body, base + start + 1)?;

        let mut chars = decoded.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Some((i + 1 - start, TokenType::CHAR(c)))),
            _ => Err(CompileError::mismatch(
                base + start,
                "Character literal must contain exactly one character",
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Names
// ─────────────────────────────────────────────────────────────────────────────

pub struct NameReader;

impl TokenReader for NameReader {
    fn read(&self, src: &str, start: usize, _base: usize) -> Result<Option<(usize, TokenType)>> {
        let rest = &src[start..];
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        if !(first.is_alphabetic() || first == '_' || first == '$') {
            return Ok(None);
        }

        let length = rest
            .char_indices()
            .skip(1)
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map_or(rest.len(), |(i, _)| i);

        if first == '$' && length == 1 {
            return Ok(None);
        }

        let token_type = if is_keyword(&rest[..length]) {
            TokenType::KEYWORD
        } else {
            TokenType::IDENTIFIER
        };

        Ok(Some((length, token_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_decode() {
        assert_eq!(unescape(r"a\tb\nA", 0).unwrap(), "a\tb\nA");
        assert!(matches!(
            unescape(r"\q", 5),
            Err(CompileError::UnknownEscapeSequence { offset: 5, .. })
        ));
    }

    #[test]
    fn layout_prefers_longest_prefix() {
        assert_eq!(
            string_layout("$@\"x\"").map(|l| l.0),
            Some(StringStyle::Verbatim)
        );
        assert_eq!(string_layout("\"\"\"x\"\"\"").map(|l| l.0), Some(StringStyle::Raw));
        assert_eq!(string_layout("x"), None);
    }

    #[test]
    fn integral_literals_take_the_smallest_width() {
        assert!(matches!(integral_literal(5, None), Some(Number::Int(5))));
        assert!(matches!(
            integral_literal(3_000_000_000, None),
            Some(Number::UInt(_))
        ));
        assert!(matches!(
            integral_literal(5, Some(Suffix::Long)),
            Some(Number::Long(5))
        ));
    }
}
