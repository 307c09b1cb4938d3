/*!
Precedence-climbing parser producing typed expression trees.

The parser pulls tokens from the [`Tokenizer`] on demand, so speculative
parses (cast or group? generic arguments or less-than? lambda or group?) save
and restore the tokenizer position instead of buffering tokens.

Construction is table driven:

* `start` maps a leading token to a *start builder* that produces the first
  operand (unary operators, `(`, `new`, statements).  Literals and names are
  handled directly.
* `follow` maps an infix/postfix token to its precedence and a *follow-up
  builder* that folds it into the expression read so far.

Each builder returns a fully typed [`Expr`]; names, members and overloads are
resolved against the [`Resolver`] while parsing.

Precedence levels (higher binds tighter):

| Level            | Value | Operators                                         |
|------------------|------:|---------------------------------------------------|
| `ASSIGNMENT`     |    40 | `=` and compound assignments (right assoc)        |
| `CONDITIONAL`    |    45 | `?:` (right assoc)                                |
| `COALESCE`       |    47 | `??` (right assoc)                                |
| `LOGICAL_OR`     |    50 | `\|\|`                                            |
| `LOGICAL_AND`    |    51 | `&&`                                              |
| `BITWISE_OR`     |    60 | `\|`                                              |
| `XOR`            |    61 | `^`                                               |
| `BITWISE_AND`    |    62 | `&`                                               |
| `EQUALITY`       |    70 | `==` `!=`                                         |
| `RELATIONAL`     |    80 | `<` `>` `<=` `>=` `is` `as`                       |
| `SHIFT`          |    90 | `<<` `>>`                                         |
| `ADDITIVE`       |   100 | `+` `-`                                           |
| `MULTIPLICATIVE` |   110 | `*` `/` `%`                                       |
| `UNARY`          |   120 | prefix `+ - ! ~ ++ --`, casts                     |
| `POWER`          |   125 | `**` (right assoc)                                |
| `PRIMARY`        |   130 | `.` `[]` `()` postfix `++ --`                     |
*/

mod follow;
mod names;
mod start;
mod statements;

use std::sync::Arc;

use log::{debug, info};

use crate::context::{FrameKind, ParserContext};
use crate::error::{CompileError, Result};
use crate::expr::{Expr, Lambda, Variable};
use crate::options::ParserOptions;
use crate::resolver::{Argument, LambdaBinder, PendingLambda, Resolver};
use crate::token::{Token, TokenType};
use crate::tokenizer::Tokenizer;
use crate::types::Type;
use crate::value::Constant;

pub mod precedence {
    pub const LOWEST: u8 = 0;
    pub const ASSIGNMENT: u8 = 40;
    pub const CONDITIONAL: u8 = 45;
    pub const COALESCE: u8 = 47;
    pub const LOGICAL_OR: u8 = 50;
    pub const LOGICAL_AND: u8 = 51;
    pub const BITWISE_OR: u8 = 60;
    pub const XOR: u8 = 61;
    pub const BITWISE_AND: u8 = 62;
    pub const EQUALITY: u8 = 70;
    pub const RELATIONAL: u8 = 80;
    pub const SHIFT: u8 = 90;
    pub const ADDITIVE: u8 = 100;
    pub const MULTIPLICATIVE: u8 = 110;
    pub const UNARY: u8 = 120;
    pub const POWER: u8 = 125;
    pub const PRIMARY: u8 = 130;
}

use precedence::LOWEST;

/// Tokens that end an expression-bodied lambda argument.
const LAMBDA_CLOSERS: &[&str] = &[",", ")", "]", "}", ";"];

pub struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    resolver: Arc<Resolver>,
    context: ParserContext,
    options: ParserOptions,
    /// Receiver whose members are in scope unqualified.
    default_receiver: Option<Expr>,
    /// Type whose static members are in scope unqualified.
    static_type: Option<Type>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, resolver: Arc<Resolver>, options: &ParserOptions) -> Self {
        info!("Parser created over {} bytes", src.len());

        Parser {
            tokenizer: Tokenizer::new(src),
            resolver,
            context: ParserContext::new(),
            options: options.clone(),
            default_receiver: None,
            static_type: None,
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse the whole text as a lambda: either `params => body` or a body
    /// over the parameters named in the options.
    pub fn parse(mut self) -> Result<Lambda> {
        info!("Beginning parse phase");

        let lambda = self.top_level()?;

        info!(
            "Parsed lambda with {} parameters returning {}",
            lambda.params.len(),
            lambda.ret
        );

        Ok(lambda)
    }

    /// Precedence-climbing core.  Reads one operand and then every follow-up
    /// operator that binds tighter than `min`.  Stops before a token listed
    /// in `closing` and reports whether that is why it stopped.
    pub fn read_expression(&mut self, min: u8, closing: &[&str]) -> Result<(Expr, bool)> {
        let token = self.tokenizer.read_token()?;
        let mut left = self.start(token)?;

        loop {
            let next = self.tokenizer.peek_token()?;
            if next.is_eof() {
                return Ok((left, false));
            }
            if is_symbol(&next) && closing.contains(&next.lexeme) {
                return Ok((left, true));
            }

            let Some(entry) = follow::entry(&next) else {
                return Ok((left, false));
            };
            if entry.precedence <= min {
                return Ok((left, false));
            }

            let token = self.tokenizer.read_token()?;
            left = (entry.build)(self, left, token)?;
        }
    }

    /// A full expression.
    pub fn expression(&mut self) -> Result<Expr> {
        Ok(self.read_expression(LOWEST, &[])?.0)
    }

    fn start(&mut self, token: Token<'a>) -> Result<Expr> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Expr::number(*n)),
            TokenType::STRING(s) => Ok(Expr::string(s)),
            TokenType::CHAR(c) => Ok(Expr::constant(Constant::Char(*c))),
            TokenType::INTERPOLATED => self.interpolated(token),
            TokenType::IDENTIFIER => self.name(token),
            TokenType::SYMBOL | TokenType::KEYWORD => match start::entry(&token) {
                Some(entry) => (entry.build)(self, token),
                None if token.is_word() => self.name(token),
                None => Err(CompileError::unknown_symbol(token.start, token.lexeme)),
            },
            TokenType::EOF => Err(CompileError::wrong_symbol(token.start, "expression", "end of input")),
            _ => Err(CompileError::unknown_symbol(token.start, token.lexeme)),
        }
    }

    // ───────────────────────── token helpers ─────────────────────────

    fn expect(&mut self, symbol: &str) -> Result<()> {
        self.tokenizer.read_symbol(symbol, true).map(|_| ())
    }

    fn accept(&mut self, symbol: &str) -> Result<bool> {
        self.tokenizer.read_symbol(symbol, false)
    }

    fn peek_is(&mut self, symbol: &str) -> Result<bool> {
        Ok(self.tokenizer.peek_token()?.is(symbol))
    }

    /// Is the next token one that ends a statement without a value?
    fn at_statement_end(&mut self) -> Result<bool> {
        let next = self.tokenizer.peek_token()?;
        Ok(next.is_eof() || next.is(";") || next.is("}"))
    }

    fn missing(&mut self, expected: &str) -> CompileError {
        let offset = self.tokenizer.offset();

        debug!("Missing closing marker '{}' at {}", expected, offset);

        CompileError::MissingClosingMarker {
            offset,
            expected: expected.to_string(),
        }
    }

    fn identifier(&mut self) -> Result<Token<'a>> {
        let token = self.tokenizer.read_token()?;
        if token.token_type != TokenType::IDENTIFIER {
            return Err(CompileError::wrong_symbol(token.start, "identifier", found(&token)));
        }
        Ok(token)
    }

    /// Identifier or keyword (member names after `.`).
    fn word(&mut self) -> Result<Token<'a>> {
        let token = self.tokenizer.read_token()?;
        if !token.is_word() {
            return Err(CompileError::wrong_symbol(token.start, "member name", found(&token)));
        }
        Ok(token)
    }

    /// Expression that must be followed by `close`, which is consumed.
    fn enclosed(&mut self, close: &str) -> Result<Expr> {
        let (expr, closed) = self.read_expression(LOWEST, &[close])?;
        if !closed {
            return Err(self.missing(close));
        }
        self.tokenizer.read_token()?;
        Ok(expr)
    }

    /// Argument list after an opening bracket, through `close`.  Lambda
    /// arguments are captured for binding during overload selection.
    fn arguments(&mut self, close: &str) -> Result<Vec<Argument<'a>>> {
        let mut args = Vec::new();
        if self.accept(close)? {
            return Ok(args);
        }

        loop {
            match self.try_pending_lambda()? {
                Some(lambda) => args.push(Argument::Lambda(lambda)),
                None => {
                    let (expr, _) = self.read_expression(LOWEST, &[",", close])?;
                    args.push(Argument::Typed(expr));
                }
            }

            if self.accept(",")? {
                continue;
            }
            if self.accept(close)? {
                return Ok(args);
            }
            return Err(self.missing(close));
        }
    }

    /// Typed arguments only (indexers, array bounds, initializers).
    fn typed_arguments(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.accept(close)? {
            return Ok(args);
        }
        loop {
            let (expr, _) = self.read_expression(LOWEST, &[",", close])?;
            args.push(expr);
            if self.accept(",")? {
                // trailing comma before the closer
                if self.accept(close)? {
                    return Ok(args);
                }
                continue;
            }
            if self.accept(close)? {
                return Ok(args);
            }
            return Err(self.missing(close));
        }
    }

    // ───────────────────────── typing helpers ─────────────────────────

    /// Implicit conversion of `value` to `ty`, accepting integral constants
    /// that fit the target exactly.
    fn coerce_to(&self, value: Expr, ty: &Type, offset: usize) -> Result<Expr> {
        if let (Some(n), Type::Numeric(kind)) = (value.as_number(), ty.underlying()) {
            if n.kind().is_integral() {
                if let Some(converted) = n.try_lossless(*kind) {
                    return Ok(Expr::number(converted).coerce(ty));
                }
            }
        }

        if *ty == Type::Void || self.resolver.distance(&value.ty, ty).is_some() {
            return Ok(value.coerce(ty));
        }

        Err(CompileError::mismatch(
            offset,
            format!("Cannot implicitly convert type '{}' to '{}'", value.ty, ty),
        ))
    }

    fn condition(&mut self) -> Result<Expr> {
        self.expect("(")?;
        let offset = self.tokenizer.offset();
        let test = self.enclosed(")")?;
        if test.ty != Type::Bool {
            return Err(CompileError::mismatch(
                offset,
                format!("Cannot implicitly convert type '{}' to 'bool'", test.ty),
            ));
        }
        Ok(test)
    }

    /// Type for a name taken from the options or implied by a construct,
    /// reported at the current token when unknown.
    fn type_named(&self, name: &str) -> Result<Type> {
        self.resolver
            .resolve_type_name(name)
            .ok_or_else(|| CompileError::TypeNotFound {
                offset: self.tokenizer.offset(),
                name: name.to_string(),
            })
    }

    /// Call of a static method selected among the overloads on `ty`.
    fn static_call(&mut self, ty: &Type, name: &str, args: Vec<Argument<'a>>, offset: usize) -> Result<Expr> {
        let resolver = self.resolver.clone();
        let candidates = resolver.static_methods(ty, name);
        if candidates.is_empty() {
            return Err(CompileError::MemberNotFound {
                offset,
                ty: ty.to_string(),
                member: name.to_string(),
            });
        }

        let selection = resolver.select(name, &candidates, &[], &args, self, offset)?;
        Ok(Expr::call(
            selection.method,
            None,
            selection.args,
            selection.type_args,
            selection.ret,
        ))
    }

    // ───────────────────────── scopes ─────────────────────────

    /// Run `f` inside a frame opened by `enter`; the frame's variables are
    /// returned alongside the result.
    fn within<T>(
        &mut self,
        enter: impl FnOnce(&mut ParserContext),
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<(T, Vec<Variable>)> {
        enter(&mut self.context);
        let result = f(self);
        let frame = self.context.pop();
        let variables = frame
            .map(|frame| frame.variables.into_values().collect())
            .unwrap_or_default();
        Ok((result?, variables))
    }

    fn in_block<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<(T, Vec<Variable>)> {
        self.within(|c| c.push(FrameKind::Block), f)
    }

    /// Parse `f` over `src` (a slice starting at absolute `base`) and then
    /// switch back to the current token stream.
    fn with_source<T>(&mut self, src: &'a str, base: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outer = std::mem::replace(&mut self.tokenizer, Tokenizer::with_offset(src, base));
        let result = f(self);
        self.tokenizer = outer;
        result
    }
}

impl<'a> LambdaBinder<'a> for Parser<'a> {
    fn bind(&mut self, lambda: &PendingLambda<'a>, params: &[Type], ret: Option<&Type>) -> Result<Option<Expr>> {
        debug!(
            "Binding lambda at {} to ({})",
            lambda.offset,
            crate::types::join(params)
        );

        let names: Vec<String> = lambda.params.iter().map(|(_, n)| n.clone()).collect();
        let body = lambda.body;
        let offset = lambda.offset;
        let expr = self.with_source(lambda.source, lambda.base, |p| {
            p.tokenizer.set_position(body);
            p.lambda_body(&names, params, ret.cloned(), offset)
        })?;
        Ok(Some(expr))
    }
}

fn is_symbol(token: &Token<'_>) -> bool {
    matches!(token.token_type, TokenType::SYMBOL | TokenType::KEYWORD)
}

fn found<'t>(token: &Token<'t>) -> &'t str {
    if token.is_eof() {
        "end of input"
    } else {
        token.lexeme
    }
}
