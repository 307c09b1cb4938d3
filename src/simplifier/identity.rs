//! Identity elimination: neutral and absorbing operands, double negation.

use super::folding::typed_number;
use super::{binary_parts, unary_operand, Rule, Shape, Simplifier, Slot};
use crate::error::Result;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::number::NumericKind;
use crate::types::Type;

const ZERO: &[f64] = &[0.0];
const ONE: &[f64] = &[1.0];

pub(super) fn register(rules: &mut Vec<Rule>) {
    use BinaryOp::*;

    let any = Slot::Any;
    let zero = Slot::OneOf(ZERO);
    let one = Slot::OneOf(ONE);
    // x may be zero at run time: 0 / 0 and 0 ** 0 do not yield 0
    let non_zero = Slot::NonZero;
    let positive = Slot::Positive;

    let table: [(&'static str, BinaryOp, [Slot; 2], super::Rewrite); 14] = [
        ("add-zero", Add, [any, zero], keep_left),
        ("zero-add", Add, [zero, any], keep_right),
        ("subtract-zero", Subtract, [any, zero], keep_left),
        ("zero-subtract", Subtract, [zero, any], negate_right),
        ("multiply-one", Multiply, [any, one], keep_left),
        ("one-multiply", Multiply, [one, any], keep_right),
        ("multiply-zero", Multiply, [any, zero], zero_result),
        ("zero-multiply", Multiply, [zero, any], zero_result),
        ("divide-one", Divide, [any, one], keep_left),
        ("zero-divide", Divide, [zero, non_zero], zero_result),
        ("power-zero", Power, [any, zero], one_result),
        ("power-one", Power, [any, one], keep_left),
        ("zero-power", Power, [zero, positive], zero_result),
        ("one-power", Power, [one, any], one_result),
    ];
    for (name, op, slots, rewrite) in table {
        rules.push(Rule::new(name, Shape::Binary(op), &slots, rewrite));
    }

    rules.push(Rule::new(
        "double-negation",
        Shape::Unary(UnaryOp::Negate),
        &[Slot::Unary(UnaryOp::Negate)],
        double_negation,
    ));
    rules.push(Rule::new(
        "double-not",
        Shape::Unary(UnaryOp::Not),
        &[Slot::Unary(UnaryOp::Not)],
        double_not,
    ));
}

fn keep_left(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    Ok(binary_parts(node)
        .filter(|(_, left, _)| node.ty.is_numeric() && left.ty == node.ty)
        .map(|(_, left, _)| left.clone()))
}

fn keep_right(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    Ok(binary_parts(node)
        .filter(|(_, _, right)| node.ty.is_numeric() && right.ty == node.ty)
        .map(|(_, _, right)| right.clone()))
}

fn zero_result(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    Ok(typed_number(&node.ty, 0.0))
}

fn one_result(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    Ok(typed_number(&node.ty, 1.0))
}

/// Widths whose negation stays in the same width.
pub(super) fn negatable(ty: &Type) -> bool {
    matches!(
        ty.numeric_kind(),
        Some(NumericKind::Int | NumericKind::Long | NumericKind::Float | NumericKind::Double | NumericKind::Decimal)
    )
}

/// `0 - x → -x`
fn negate_right(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, _, right)) = binary_parts(node) else {
        return Ok(None);
    };
    if !negatable(&node.ty) {
        return Ok(None);
    }
    s.node(Expr::unary_node(UnaryOp::Negate, right.clone(), node.ty.clone()))
        .map(Some)
}

fn double_negation(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    Ok(unary_operand(node, UnaryOp::Negate)
        .and_then(|inner| unary_operand(inner, UnaryOp::Negate))
        .filter(|x| x.ty == node.ty)
        .cloned())
}

fn double_not(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    Ok(unary_operand(node, UnaryOp::Not)
        .and_then(|inner| unary_operand(inner, UnaryOp::Not))
        .cloned())
}
