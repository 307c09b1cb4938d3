//! Constant folding and the divide-by-zero check.
//!
//! Sums and differences of integer constants fold to the narrowest of
//! byte/short/int/long/double holding the result (`2 + 3` is a `byte`).
//! Every other fold keeps the static type of the node it replaces, so
//! `7 / 2` over ints folds to `3`.

use std::cmp::Ordering;

use super::{binary_parts, Rule, Shape, Simplifier, Slot};
use crate::catalog::CanonicalFn;
use crate::error::{CompileError, Result};
use crate::expr::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::number::{ArithOp, Number};
use crate::types::Type;
use crate::value::Constant;

const ZERO: &[f64] = &[0.0];

const FOLDABLE: [BinaryOp; 19] = [
    BinaryOp::Add,
    BinaryOp::Subtract,
    BinaryOp::Multiply,
    BinaryOp::Divide,
    BinaryOp::Modulo,
    BinaryOp::Power,
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::ExclusiveOr,
    BinaryOp::LeftShift,
    BinaryOp::RightShift,
    BinaryOp::AndAlso,
    BinaryOp::OrElse,
    BinaryOp::Equal,
    BinaryOp::NotEqual,
    BinaryOp::LessThan,
    BinaryOp::LessThanOrEqual,
    BinaryOp::GreaterThan,
    BinaryOp::GreaterThanOrEqual,
];

pub(super) fn register(rules: &mut Vec<Rule>) {
    for op in [BinaryOp::Divide, BinaryOp::Modulo] {
        rules.push(Rule::new(
            "divide-by-zero",
            Shape::Binary(op),
            &[Slot::Any, Slot::OneOf(ZERO)],
            divide_by_zero,
        ));
    }
    for op in FOLDABLE {
        rules.push(Rule::new(
            "fold-binary",
            Shape::Binary(op),
            &[Slot::Constant, Slot::Constant],
            fold_binary,
        ));
    }
    for op in [BinaryOp::AndAlso, BinaryOp::OrElse] {
        rules.push(Rule::new("fold-short-circuit", Shape::Binary(op), &[Slot::Constant], fold_short_circuit));
    }
    rules.push(Rule::new(
        "fold-coalesce",
        Shape::Binary(BinaryOp::Coalesce),
        &[Slot::Constant],
        fold_coalesce,
    ));
    for op in [UnaryOp::Negate, UnaryOp::UnaryPlus, UnaryOp::Not, UnaryOp::OnesComplement] {
        rules.push(Rule::new("fold-unary", Shape::Unary(op), &[Slot::Constant], fold_unary));
    }
    rules.push(Rule::new("fold-convert", Shape::Convert, &[Slot::Constant], fold_convert));
    rules.push(Rule::new("fold-canonical-call", Shape::Call, &[], fold_canonical_call));
    rules.push(Rule::new(
        "fold-conditional",
        Shape::Conditional,
        &[Slot::Constant],
        fold_conditional,
    ));
}

fn divide_by_zero(_: &Simplifier, _: &Expr) -> Result<Option<Expr>> {
    Err(CompileError::DivideByZero)
}

fn arith(op: BinaryOp) -> Option<ArithOp> {
    Some(match op {
        BinaryOp::Add => ArithOp::Add,
        BinaryOp::Subtract => ArithOp::Subtract,
        BinaryOp::Multiply => ArithOp::Multiply,
        BinaryOp::Divide => ArithOp::Divide,
        BinaryOp::Modulo => ArithOp::Modulo,
        BinaryOp::Power => ArithOp::Power,
        BinaryOp::And => ArithOp::And,
        BinaryOp::Or => ArithOp::Or,
        BinaryOp::ExclusiveOr => ArithOp::ExclusiveOr,
        BinaryOp::LeftShift => ArithOp::LeftShift,
        BinaryOp::RightShift => ArithOp::RightShift,
        _ => return None,
    })
}

fn fold_binary(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((op, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let (Some(l), Some(r)) = (left.as_constant(), right.as_constant()) else {
        return Ok(None);
    };

    let folded = match (l, r) {
        (Constant::Number(a), Constant::Number(b)) => fold_numbers(op, *a, *b, &node.ty)?,
        (Constant::Bool(a), Constant::Bool(b)) => fold_bools(op, *a, *b),
        (Constant::Str(a), Constant::Str(b)) => match op {
            BinaryOp::Add => Some(Expr::string(&format!("{}{}", a, b))),
            BinaryOp::Equal => Some(Expr::boolean(a == b)),
            BinaryOp::NotEqual => Some(Expr::boolean(a != b)),
            _ => None,
        },
        (Constant::Null, Constant::Null) => match op {
            BinaryOp::Equal => Some(Expr::boolean(true)),
            BinaryOp::NotEqual => Some(Expr::boolean(false)),
            _ => None,
        },
        _ => None,
    };
    Ok(folded)
}

fn fold_numbers(op: BinaryOp, a: Number, b: Number, ty: &Type) -> Result<Option<Expr>> {
    let order = Number::compare(&a, &b);
    let truth = match op {
        BinaryOp::Equal => Some(order == Some(Ordering::Equal)),
        BinaryOp::NotEqual => Some(order != Some(Ordering::Equal)),
        BinaryOp::LessThan => Some(order == Some(Ordering::Less)),
        BinaryOp::LessThanOrEqual => Some(matches!(order, Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::GreaterThan => Some(order == Some(Ordering::Greater)),
        BinaryOp::GreaterThanOrEqual => Some(matches!(order, Some(Ordering::Greater | Ordering::Equal))),
        _ => None,
    };
    if let Some(truth) = truth {
        return Ok(Some(Expr::boolean(truth)));
    }

    // Integer sums and differences take the narrowest width holding the result.
    if matches!(op, BinaryOp::Add | BinaryOp::Subtract) && a.kind().is_integral() && b.kind().is_integral() {
        let value = match op {
            BinaryOp::Add => a.to_f64() + b.to_f64(),
            _ => a.to_f64() - b.to_f64(),
        };
        return Ok(Some(Expr::number(Number::narrowest(value))));
    }

    let (Some(arith), Some(kind)) = (arith(op), ty.numeric_kind()) else {
        return Ok(None);
    };
    let value = Number::binary(arith, a, b)?;
    Ok(Some(Expr::number(value.convert(kind))))
}

fn fold_bools(op: BinaryOp, a: bool, b: bool) -> Option<Expr> {
    let value = match op {
        BinaryOp::And | BinaryOp::AndAlso => a && b,
        BinaryOp::Or | BinaryOp::OrElse => a || b,
        BinaryOp::ExclusiveOr | BinaryOp::NotEqual => a != b,
        BinaryOp::Equal => a == b,
        _ => return None,
    };
    Some(Expr::boolean(value))
}

/// `true && x → x`, `false && x → false` and the `||` duals.
fn fold_short_circuit(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((op, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let Some(Constant::Bool(value)) = left.as_constant() else {
        return Ok(None);
    };
    let decides = match op {
        BinaryOp::AndAlso => !value,
        BinaryOp::OrElse => *value,
        _ => return Ok(None),
    };
    Ok(Some(if decides {
        Expr::boolean(*value)
    } else {
        right.clone()
    }))
}

fn fold_coalesce(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    match left.as_constant() {
        Some(Constant::Null) => Ok(Some(right.clone())),
        Some(_) if left.ty == node.ty => Ok(Some(left.clone())),
        _ => Ok(None),
    }
}

fn fold_unary(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let ExprKind::Unary { op, operand } = &node.kind else {
        return Ok(None);
    };
    let folded = match (op, operand.as_constant(), node.ty.numeric_kind()) {
        (UnaryOp::Not, Some(Constant::Bool(b)), _) => Some(Expr::boolean(!b)),
        (UnaryOp::Negate, Some(Constant::Number(n)), Some(kind)) => Some(Expr::number(n.negate().convert(kind))),
        (UnaryOp::UnaryPlus, Some(Constant::Number(n)), Some(kind)) => Some(Expr::number(n.convert(kind))),
        (UnaryOp::OnesComplement, Some(Constant::Number(n)), Some(kind)) => {
            n.complement().map(|c| Expr::number(c.convert(kind)))
        }
        _ => None,
    };
    Ok(folded)
}

fn fold_convert(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let ExprKind::Convert(operand) = &node.kind else {
        return Ok(None);
    };
    let Some(kind) = node.ty.numeric_kind() else {
        return Ok(None);
    };
    let folded = match operand.as_constant() {
        Some(Constant::Number(n)) => Some(Expr::number(n.convert(kind))),
        Some(Constant::Char(c)) => Some(Expr::number(Number::UShort(*c as u32 as u16).convert(kind))),
        _ => None,
    };
    Ok(folded)
}

/// `Math.Sin(0) → 0` and friends: canonical calls over numeric constants.
fn fold_canonical_call(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let ExprKind::Call {
        method,
        receiver: None,
        args,
        ..
    } = &node.kind
    else {
        return Ok(None);
    };
    let (Some(f), Some(kind)) = (method.canonical, node.ty.numeric_kind()) else {
        return Ok(None);
    };
    let arity = if f == CanonicalFn::Pow { 2 } else { 1 };
    if args.len() != arity {
        return Ok(None);
    }

    let values: Option<Vec<f64>> = args.iter().map(|a| a.as_number().map(|n| n.to_f64())).collect();
    let folded = values
        .and_then(|values| f.apply(&values))
        .map(|v| Expr::number(Number::Double(v).convert(kind)));
    Ok(folded)
}

fn fold_conditional(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let ExprKind::Conditional {
        test,
        if_true,
        if_false,
    } = &node.kind
    else {
        return Ok(None);
    };
    match test.as_constant() {
        Some(Constant::Bool(true)) => Ok(Some((**if_true).clone())),
        Some(Constant::Bool(false)) => Ok(Some((**if_false).clone())),
        _ => Ok(None),
    }
}

/// Numeric constant of the node's own kind (`0`, `1` in identities).
pub(super) fn typed_number(ty: &Type, value: f64) -> Option<Expr> {
    ty.numeric_kind().map(|kind| Expr::number_of(kind, value))
}
