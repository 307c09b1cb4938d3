//! Centralised error hierarchy for the **expression compiler**.
//!
//! Every stage (tokenizer, parser, type resolver, simplifier, evaluator, CLI)
//! converts its failure modes into one of the variants defined here.  Errors are
//! never recovered locally: the first one aborts the whole parse / simplify /
//! evaluate call and bubbles up with `?`.
//!
//! Source-level errors carry the byte offset where they were detected so the
//! caller can render "position 42 near: ..." style diagnostics.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::info;

/// Canonical error type used throughout the compiler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    // ── lexical ──────────────────────────────────────────────────────────
    /// No token reader and no registered symbol matches the input.
    #[error("[position {offset}] Unknown symbol near: {near}")]
    UnknownSymbol { offset: usize, near: String },

    /// String or char literal without its closing delimiter.
    #[error("[position {offset}] Unterminated literal")]
    UnterminatedLiteral { offset: usize },

    /// Backslash escape that is not recognised.
    #[error("[position {offset}] Unknown escape sequence '{sequence}'")]
    UnknownEscapeSequence { offset: usize, sequence: String },

    /// Lone `{` / `}` or unclosed hole inside an interpolated string.
    #[error("[position {offset}] Malformed interpolated string: {message}")]
    MalformedInterpolation { offset: usize, message: String },

    // ── syntactic ────────────────────────────────────────────────────────
    #[error("[position {offset}] Expected '{expected}', found '{found}'")]
    WrongSymbol {
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("[position {offset}] Missing closing '{expected}'")]
    MissingClosingMarker { offset: usize, expected: String },

    /// Same name declared twice in one scope frame.
    #[error("[position {offset}] Variable '{name}' is already declared in this scope")]
    DuplicateVariableDeclaration { offset: usize, name: String },

    /// `foreach` source that is neither a 1-D array nor enumerable.
    #[error("[position {offset}] Type '{ty}' has neither an array nor an enumerator shape")]
    UnknownEnumerableShape { offset: usize, ty: String },

    /// Structurally valid tokens used in a place where they make no sense
    /// (`break` outside a loop, invalid assignment target, ...).
    #[error("[position {offset}] {message}")]
    InvalidStatement { offset: usize, message: String },

    // ── semantic / resolution ────────────────────────────────────────────
    #[error("[position {offset}] Type '{name}' not found")]
    TypeNotFound { offset: usize, name: String },

    #[error("[position {offset}] Member '{member}' not found on type '{ty}'")]
    MemberNotFound {
        offset: usize,
        ty: String,
        member: String,
    },

    #[error("[position {offset}] No overload of '{name}' accepts arguments ({arguments})")]
    NoApplicableOverload {
        offset: usize,
        name: String,
        arguments: String,
    },

    #[error("[position {offset}] Cannot infer type parameter '{parameter}' of '{method}'")]
    GenericInferenceFailed {
        offset: usize,
        method: String,
        parameter: String,
    },

    /// Operator or conversion applied to incompatible types.
    #[error("[position {offset}] {message}")]
    TypeMismatch { offset: usize, message: String },

    // ── simplification ───────────────────────────────────────────────────
    /// Constant-folded division by a literal zero.
    #[error("Division by constant zero")]
    DivideByZero,

    // ── evaluation (host facility) ───────────────────────────────────────
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Value raised by a `throw` expression and not caught.
    #[error("Unhandled exception: {0}")]
    Thrown(String),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Configuration decoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    /// Helper constructor for the **tokenizer**.
    pub fn unknown_symbol<S: Into<String>>(offset: usize, near: S) -> Self {
        let near: String = near.into();

        info!("Creating UnknownSymbol error: offset={}, near={}", offset, near);

        CompileError::UnknownSymbol { offset, near }
    }

    /// Helper constructor for the **parser**.
    pub fn wrong_symbol<E: Into<String>, F: Into<String>>(
        offset: usize,
        expected: E,
        found: F,
    ) -> Self {
        let expected: String = expected.into();
        let found: String = found.into();

        info!(
            "Creating WrongSymbol error: offset={}, expected={}, found={}",
            offset, expected, found
        );

        CompileError::WrongSymbol {
            offset,
            expected,
            found,
        }
    }

    /// Helper constructor for statement-level misuse.
    pub fn invalid<S: Into<String>>(offset: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating InvalidStatement error: offset={}, msg={}", offset, message);

        CompileError::InvalidStatement { offset, message }
    }

    /// Helper constructor for operand/conversion type errors.
    pub fn mismatch<S: Into<String>>(offset: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating TypeMismatch error: offset={}, msg={}", offset, message);

        CompileError::TypeMismatch { offset, message }
    }

    /// Helper constructor for the **evaluator**.
    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: msg={}", message);

        CompileError::Runtime(message)
    }

    /// Source offset of the error, when it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            CompileError::UnknownSymbol { offset, .. }
            | CompileError::UnterminatedLiteral { offset }
            | CompileError::UnknownEscapeSequence { offset, .. }
            | CompileError::MalformedInterpolation { offset, .. }
            | CompileError::WrongSymbol { offset, .. }
            | CompileError::MissingClosingMarker { offset, .. }
            | CompileError::DuplicateVariableDeclaration { offset, .. }
            | CompileError::UnknownEnumerableShape { offset, .. }
            | CompileError::InvalidStatement { offset, .. }
            | CompileError::TypeNotFound { offset, .. }
            | CompileError::MemberNotFound { offset, .. }
            | CompileError::NoApplicableOverload { offset, .. }
            | CompileError::GenericInferenceFailed { offset, .. }
            | CompileError::TypeMismatch { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, CompileError>;
