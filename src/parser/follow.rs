//! Follow-up builders: infix and postfix operators folded into the operand
//! read so far.

use phf::phf_map;

use super::precedence::*;
use super::start::index_value;
use super::Parser;
use crate::error::{CompileError, Result};
use crate::expr::{binary, conditional, unary, BinaryOp, Expr, ExprKind, UnaryOp};
use crate::resolver::{Argument, LambdaBinder};
use crate::token::{Token, TokenType};
use crate::types::Type;

pub(super) type FollowBuilder = for<'a> fn(&mut Parser<'a>, Expr, Token<'a>) -> Result<Expr>;

pub(super) struct FollowEntry {
    pub precedence: u8,
    pub right_assoc: bool,
    pub build: FollowBuilder,
}

const fn left(precedence: u8, build: FollowBuilder) -> FollowEntry {
    FollowEntry {
        precedence,
        right_assoc: false,
        build,
    }
}

const fn right(precedence: u8, build: FollowBuilder) -> FollowEntry {
    FollowEntry {
        precedence,
        right_assoc: true,
        build,
    }
}

static FOLLOW: phf::Map<&'static str, FollowEntry> = phf_map! {
    "." => left(PRIMARY, member_access),
    "[" => left(PRIMARY, index),
    "(" => left(PRIMARY, invoke),
    "++" => left(PRIMARY, post_increment),
    "--" => left(PRIMARY, post_decrement),

    "**" => right(POWER, binary_operator),
    "*" => left(MULTIPLICATIVE, binary_operator),
    "/" => left(MULTIPLICATIVE, binary_operator),
    "%" => left(MULTIPLICATIVE, binary_operator),
    "+" => left(ADDITIVE, binary_operator),
    "-" => left(ADDITIVE, binary_operator),
    "<<" => left(SHIFT, binary_operator),
    ">>" => left(SHIFT, binary_operator),
    "<" => left(RELATIONAL, binary_operator),
    ">" => left(RELATIONAL, binary_operator),
    "<=" => left(RELATIONAL, binary_operator),
    ">=" => left(RELATIONAL, binary_operator),
    "is" => left(RELATIONAL, type_is),
    "as" => left(RELATIONAL, type_as),
    "==" => left(EQUALITY, binary_operator),
    "!=" => left(EQUALITY, binary_operator),
    "&" => left(BITWISE_AND, binary_operator),
    "^" => left(XOR, binary_operator),
    "|" => left(BITWISE_OR, binary_operator),
    "&&" => left(LOGICAL_AND, binary_operator),
    "||" => left(LOGICAL_OR, binary_operator),
    "??" => right(COALESCE, binary_operator),
    "?" => right(CONDITIONAL, ternary),

    "=" => right(ASSIGNMENT, assignment),
    "+=" => right(ASSIGNMENT, assignment),
    "-=" => right(ASSIGNMENT, assignment),
    "*=" => right(ASSIGNMENT, assignment),
    "/=" => right(ASSIGNMENT, assignment),
    "%=" => right(ASSIGNMENT, assignment),
    "&=" => right(ASSIGNMENT, assignment),
    "|=" => right(ASSIGNMENT, assignment),
    "^=" => right(ASSIGNMENT, assignment),
    "<<=" => right(ASSIGNMENT, assignment),
    ">>=" => right(ASSIGNMENT, assignment),
    "??=" => right(ASSIGNMENT, assignment),
};

pub(super) fn entry(token: &Token<'_>) -> Option<&'static FollowEntry> {
    if !matches!(token.token_type, TokenType::SYMBOL | TokenType::KEYWORD) {
        return None;
    }
    FOLLOW.get(token.lexeme)
}

/// Minimum precedence for the right operand of `token`.
fn right_operand_floor(token: &Token<'_>) -> u8 {
    match FOLLOW.get(token.lexeme) {
        Some(e) if e.right_assoc => e.precedence - 1,
        Some(e) => e.precedence,
        None => LOWEST,
    }
}

// ── binary ─────────────────────────────────────────────────────────────────

fn binary_operator<'a>(p: &mut Parser<'a>, left: Expr, token: Token<'a>) -> Result<Expr> {
    let (right, _) = p.read_expression(right_operand_floor(&token), &[])?;
    let op = BinaryOp::from_symbol(token.lexeme)
        .ok_or_else(|| CompileError::unknown_symbol(token.start, token.lexeme))?;
    binary(op, left, right, token.start)
}

fn ternary<'a>(p: &mut Parser<'a>, test: Expr, token: Token<'a>) -> Result<Expr> {
    let (if_true, closed) = p.read_expression(LOWEST, &[":"])?;
    if !closed {
        return Err(p.missing(":"));
    }
    p.expect(":")?;
    let (if_false, _) = p.read_expression(CONDITIONAL - 1, &[])?;
    conditional(test, if_true, if_false, token.start)
}

fn type_is<'a>(p: &mut Parser<'a>, operand: Expr, _token: Token<'a>) -> Result<Expr> {
    let target = p.require_type()?;
    Ok(Expr::new(
        ExprKind::TypeIs {
            operand: Box::new(operand),
            target,
        },
        Type::Bool,
    ))
}

fn type_as<'a>(p: &mut Parser<'a>, operand: Expr, token: Token<'a>) -> Result<Expr> {
    let target = p.require_type()?;
    if !target.accepts_null() {
        return Err(CompileError::mismatch(
            token.start,
            format!("The as operator must be used with a reference or nullable type ('{}' is a value type)", target),
        ));
    }
    Ok(Expr::new(ExprKind::TypeAs(Box::new(operand)), target))
}

// ── assignment ─────────────────────────────────────────────────────────────

fn assignment<'a>(p: &mut Parser<'a>, target: Expr, token: Token<'a>) -> Result<Expr> {
    let (value, _) = p.read_expression(ASSIGNMENT - 1, &[])?;
    let offset = token.start;

    // r[i] = v on an indexer becomes r.set_Item(i, v)
    if let ExprKind::Call {
        method,
        receiver: Some(receiver),
        args,
        ..
    } = &target.kind
    {
        if method.name == "get_Item" {
            let value = compound_value(target.clone(), token.lexeme, value, offset)?;
            let receiver = (**receiver).clone();
            let mut set_args: Vec<Argument<'a>> = args.iter().cloned().map(Argument::Typed).collect();
            set_args.push(Argument::Typed(value));

            let resolver = p.resolver.clone();
            let setters = resolver.instance_methods(&receiver.ty, "set_Item");
            if setters.is_empty() {
                return Err(CompileError::invalid(offset, "Property or indexer cannot be assigned to -- it is read only"));
            }
            let selection = resolver.select("this[]", &setters, &[], &set_args, p, offset)?;
            return Ok(Expr::call(
                selection.method,
                Some(receiver),
                selection.args,
                selection.type_args,
                selection.ret,
            ));
        }
    }

    if !target.is_assignable() {
        return Err(CompileError::invalid(
            offset,
            "The left-hand side of an assignment must be a variable, property or indexer",
        ));
    }

    let value = if token.lexeme == "=" {
        p.coerce_to(value, &target.ty, offset)?
    } else {
        compound_value(target.clone(), token.lexeme, value, offset)?
    };
    Ok(Expr::assign(target, value))
}

/// Right-hand side of a compound assignment: `t op= v` assigns `(T)(t op v)`.
fn compound_value(target: Expr, symbol: &str, value: Expr, offset: usize) -> Result<Expr> {
    if symbol == "=" {
        return Ok(value);
    }
    let op = BinaryOp::from_symbol(symbol).ok_or_else(|| CompileError::unknown_symbol(offset, symbol))?;
    let ty = target.ty.clone();
    Ok(binary(op, target, value, offset)?.convert(&ty))
}

// ── primary ────────────────────────────────────────────────────────────────

fn member_access<'a>(p: &mut Parser<'a>, target: Expr, _token: Token<'a>) -> Result<Expr> {
    let name = p.word()?;
    let ty = target.ty.clone();
    p.member(Some(target), &ty, name)
}

fn index<'a>(p: &mut Parser<'a>, target: Expr, token: Token<'a>) -> Result<Expr> {
    let indices = p.typed_arguments("]")?;

    if let Type::Array { element, rank } = &target.ty {
        if indices.len() != *rank {
            return Err(CompileError::mismatch(
                token.start,
                format!("Wrong number of indices inside []; expected {}", rank),
            ));
        }
        let element = (**element).clone();
        let indices = indices
            .into_iter()
            .map(|i| index_value(i, token.start))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Expr::new(
            ExprKind::ArrayIndex {
                array: Box::new(target),
                indices,
            },
            element,
        ));
    }

    let resolver = p.resolver.clone();
    let mut getters = resolver.instance_methods(&target.ty, "get_Item");
    if getters.is_empty() {
        getters = resolver.instance_methods(&target.ty, "get_Chars");
    }
    if getters.is_empty() {
        return Err(CompileError::mismatch(
            token.start,
            format!("Cannot apply indexing with [] to an expression of type '{}'", target.ty),
        ));
    }

    let args: Vec<Argument<'a>> = indices.into_iter().map(Argument::Typed).collect();
    let selection = resolver.select("this[]", &getters, &[], &args, p, token.start)?;
    Ok(Expr::call(
        selection.method,
        Some(target),
        selection.args,
        selection.type_args,
        selection.ret,
    ))
}

/// Delegate invocation `f(args)`.
fn invoke<'a>(p: &mut Parser<'a>, target: Expr, token: Token<'a>) -> Result<Expr> {
    let Type::Function { params, ret } = target.ty.clone() else {
        return Err(CompileError::mismatch(
            token.start,
            format!("Expression of type '{}' cannot be invoked", target.ty),
        ));
    };

    let args = p.arguments(")")?;
    let no_overload = |args: &[Argument<'a>]| CompileError::NoApplicableOverload {
        offset: token.start,
        name: "Invoke".to_string(),
        arguments: format!("{} arguments", args.len()),
    };
    if args.len() != params.len() {
        return Err(no_overload(&args));
    }

    let mut bound = Vec::with_capacity(args.len());
    for (arg, param) in args.iter().zip(&params) {
        let expr = match arg {
            Argument::Typed(e) => p.coerce_to(e.clone(), param, token.start)?,
            Argument::Lambda(lambda) => {
                let Type::Function {
                    params: lambda_params,
                    ret: lambda_ret,
                } = param
                else {
                    return Err(no_overload(&args));
                };
                match p.bind(lambda, lambda_params, Some(&**lambda_ret))? {
                    Some(e) => e,
                    None => return Err(no_overload(&args)),
                }
            }
        };
        bound.push(expr);
    }

    Ok(Expr::new(
        ExprKind::Invoke {
            target: Box::new(target),
            args: bound,
        },
        *ret,
    ))
}

fn post_increment<'a>(_p: &mut Parser<'a>, operand: Expr, token: Token<'a>) -> Result<Expr> {
    unary(UnaryOp::PostIncrement, operand, token.start)
}

fn post_decrement<'a>(_p: &mut Parser<'a>, operand: Expr, token: Token<'a>) -> Result<Expr> {
    unary(UnaryOp::PostDecrement, operand, token.start)
}
