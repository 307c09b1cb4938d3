//! Splitting of interpolated string bodies into literal runs and expression
//! holes.
//!
//! `{{` and `}}` stand for literal braces.  A hole is `{expr[,alignment][:format]}`;
//! nested brackets, strings and char literals inside `expr` are skipped whole.
//! The hole's expression text is handed back as a slice of the original
//! source together with its absolute offset, so the parser can tokenize it
//! in place.

use log::debug;

use crate::error::{CompileError, Result};
use crate::tokenizer::{decode_body, string_layout, unescape, StringStyle};

#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    /// Literal text, braces and escapes already decoded.
    Literal(String),
    Expression {
        text: &'a str,
        /// Absolute offset of `text` in the full source.
        offset: usize,
        alignment: Option<i32>,
        format: Option<&'a str>,
    },
}

/// Iterator over the segments of one interpolated body.
pub struct Segments<'a> {
    body: &'a str,
    offset: usize,
    style: StringStyle,
    pos: usize,
    failed: bool,
}

impl<'a> Segments<'a> {
    pub fn new(body: &'a str, offset: usize, style: StringStyle) -> Self {
        Segments {
            body,
            offset,
            style,
            pos: 0,
            failed: false,
        }
    }

    fn malformed(&self, at: usize, message: &str) -> CompileError {
        CompileError::MalformedInterpolation {
            offset: self.offset + at,
            message: message.to_string(),
        }
    }

    fn literal(&mut self) -> Result<Segment<'a>> {
        let bytes = self.body.as_bytes();
        let start = self.pos;
        let mut raw = String::new();
        let mut run = start;
        let mut i = start;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' if self.style == StringStyle::Quoted => i += 2,
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    raw.push_str(&self.body[run..=i]);
                    i += 2;
                    run = i;
                }
                b'}' if bytes.get(i + 1) == Some(&b'}') => {
                    raw.push_str(&self.body[run..=i]);
                    i += 2;
                    run = i;
                }
                b'{' => break,
                b'}' => return Err(self.malformed(i, "unescaped '}'")),
                _ => i += 1,
            }
        }

        let end = i.min(bytes.len());
        raw.push_str(&self.body[run..end]);
        self.pos = end;

        let text = match self.style {
            StringStyle::Quoted => unescape(&raw, self.offset + start)?,
            style => decode_body(style, &raw),
        };

        Ok(Segment::Literal(text))
    }

    fn hole(&mut self) -> Result<Segment<'a>> {
        let bytes = self.body.as_bytes();
        let open = self.pos;
        let mut depth = 0usize;
        let mut comma = None;
        let mut colon = None;
        let mut i = open + 1;

        let close = loop {
            let Some(&b) = bytes.get(i) else {
                return Err(self.malformed(open, "unclosed '{'"));
            };

            if colon.is_some() {
                if b == b'}' {
                    break i;
                }
                i += 1;
                continue;
            }

            match b {
                b'"' | b'\'' => {
                    i = skip_quoted(bytes, i).ok_or_else(|| self.malformed(i, "unterminated literal"))?;
                    continue;
                }
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'}' if depth == 0 => break i,
                b'}' => depth -= 1,
                b',' if depth == 0 && comma.is_none() => comma = Some(i),
                b':' if depth == 0 => colon = Some(i),
                _ => {}
            }
            i += 1;
        };

        let expr_end = comma.or(colon).unwrap_or(close);
        let raw = &self.body[open + 1..expr_end];
        let text = raw.trim();
        if text.is_empty() {
            return Err(self.malformed(open, "empty expression"));
        }
        let leading = raw.len() - raw.trim_start().len();

        let alignment = match comma {
            Some(c) => {
                let text = self.body[c + 1..colon.unwrap_or(close)].trim();
                Some(
                    text.parse::<i32>()
                        .map_err(|_| self.malformed(c, "alignment must be an integer"))?,
                )
            }
            None => None,
        };

        let format = colon.map(|c| &self.body[c + 1..close]);

        self.pos = close + 1;

        Ok(Segment::Expression {
            text,
            offset: self.offset + open + 1 + leading,
            alignment,
            format,
        })
    }
}

/// End of a quoted or char literal starting at `i` (exclusive).
fn skip_quoted(bytes: &[u8], i: usize) -> Option<usize> {
    let quote = bytes[i];
    let mut j = i + 1;
    loop {
        match bytes.get(j)? {
            b'\\' => j += 2,
            b if *b == quote => return Some(j + 1),
            _ => j += 1,
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Result<Segment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.body.len() {
            return None;
        }

        let bytes = self.body.as_bytes();
        let at_hole = bytes[self.pos] == b'{' && bytes.get(self.pos + 1) != Some(&b'{');

        let segment = if at_hole { self.hole() } else { self.literal() };
        if segment.is_err() {
            self.failed = true;
        }

        Some(segment)
    }
}

/// Split a complete `$"..."` lexeme starting at absolute offset `start`.
pub fn split_lexeme(lexeme: &str, start: usize) -> Result<Vec<Segment<'_>>> {
    let Some((style, true, open, close)) = string_layout(lexeme) else {
        return Err(CompileError::MalformedInterpolation {
            offset: start,
            message: "not an interpolated string".to_string(),
        });
    };

    let body = &lexeme[open..lexeme.len() - close];
    let segments = Segments::new(body, start + open, style).collect::<Result<Vec<_>>>()?;

    debug!("Interpolated string at {} has {} segments", start, segments.len());

    Ok(segments)
}
