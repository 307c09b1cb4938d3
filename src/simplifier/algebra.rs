//! Sign normalisation, common-factor extraction, exponent merging and
//! nested-division flattening.

use super::identity::negatable;
use super::{binary_parts, is_pure, unary_operand, Rule, Shape, Simplifier, Slot};
use crate::equality::structurally_equal;
use crate::error::Result;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::number::{ArithOp, Number};
use crate::types::Type;

pub(super) fn register(rules: &mut Vec<Rule>) {
    let negated = Slot::Unary(UnaryOp::Negate);
    let quotient = Slot::Binary(BinaryOp::Divide);

    // ── sign ──
    rules.push(Rule::new("add-negated", Shape::Binary(BinaryOp::Add), &[Slot::Any, negated], add_negated));
    rules.push(Rule::new("negated-add", Shape::Binary(BinaryOp::Add), &[negated, Slot::Any], negated_add));
    rules.push(Rule::new(
        "subtract-negated",
        Shape::Binary(BinaryOp::Subtract),
        &[Slot::Any, negated],
        subtract_negated,
    ));
    rules.push(Rule::new(
        "negate-difference",
        Shape::Unary(UnaryOp::Negate),
        &[Slot::Binary(BinaryOp::Subtract)],
        negate_difference,
    ));
    rules.push(Rule::new(
        "multiply-negated",
        Shape::Binary(BinaryOp::Multiply),
        &[Slot::Any, negated],
        multiply_negated,
    ));
    rules.push(Rule::new(
        "negated-multiply",
        Shape::Binary(BinaryOp::Multiply),
        &[negated, Slot::Any],
        multiply_negated,
    ));

    // ── factoring ──
    for op in [BinaryOp::Add, BinaryOp::Subtract] {
        rules.push(Rule::new("common-factor", Shape::Binary(op), &[], common_factor));
    }
    rules.push(Rule::new(
        "merge-exponents",
        Shape::Binary(BinaryOp::Multiply),
        &[],
        merge_exponents,
    ));

    // ── division ──
    rules.push(Rule::new(
        "flatten-quotients",
        Shape::Binary(BinaryOp::Divide),
        &[quotient, quotient],
        flatten_quotients,
    ));
    rules.push(Rule::new(
        "flatten-dividend",
        Shape::Binary(BinaryOp::Divide),
        &[quotient, Slot::Any],
        flatten_dividend,
    ));
    rules.push(Rule::new(
        "flatten-divisor",
        Shape::Binary(BinaryOp::Divide),
        &[Slot::Any, quotient],
        flatten_divisor,
    ));
}

/// New binary node of the same type as `node`, itself simplified.
fn rebuild(s: &Simplifier, op: BinaryOp, left: Expr, right: Expr, ty: &Type) -> Result<Expr> {
    s.node(Expr::binary_node(op, left, right, ty.clone()))
}

fn negate(s: &Simplifier, operand: Expr, ty: &Type) -> Result<Expr> {
    s.node(Expr::unary_node(UnaryOp::Negate, operand, ty.clone()))
}

/// Operand of a `-x` child that has the node's own type.
fn negated_operand<'e>(child: &'e Expr, ty: &Type) -> Option<&'e Expr> {
    unary_operand(child, UnaryOp::Negate).filter(|inner| &inner.ty == ty)
}

// ── sign ────────────────────────────────────────────────────────────────────

/// `a + (-b) → a - b`
fn add_negated(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, a, right)) = binary_parts(node) else {
        return Ok(None);
    };
    match negated_operand(right, &node.ty) {
        Some(b) => rebuild(s, BinaryOp::Subtract, a.clone(), b.clone(), &node.ty).map(Some),
        None => Ok(None),
    }
}

/// `(-a) + b → b - a`
fn negated_add(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, b)) = binary_parts(node) else {
        return Ok(None);
    };
    match negated_operand(left, &node.ty) {
        Some(a) => rebuild(s, BinaryOp::Subtract, b.clone(), a.clone(), &node.ty).map(Some),
        None => Ok(None),
    }
}

/// `a - (-b) → a + b`
fn subtract_negated(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, a, right)) = binary_parts(node) else {
        return Ok(None);
    };
    match negated_operand(right, &node.ty) {
        Some(b) => rebuild(s, BinaryOp::Add, a.clone(), b.clone(), &node.ty).map(Some),
        None => Ok(None),
    }
}

/// `-(a - b) → b - a`
fn negate_difference(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some(difference) = unary_operand(node, UnaryOp::Negate) else {
        return Ok(None);
    };
    let Some((_, a, b)) = binary_parts(difference) else {
        return Ok(None);
    };
    if difference.ty != node.ty {
        return Ok(None);
    }
    rebuild(s, BinaryOp::Subtract, b.clone(), a.clone(), &node.ty).map(Some)
}

/// `a * (-b) → -(a * b)` and `(-a) * b → -(a * b)`
fn multiply_negated(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    if !negatable(&node.ty) {
        return Ok(None);
    }
    let (a, b) = match (negated_operand(left, &node.ty), negated_operand(right, &node.ty)) {
        (_, Some(b)) => (left, b),
        (Some(a), None) => (a, right),
        (None, None) => return Ok(None),
    };
    let product = rebuild(s, BinaryOp::Multiply, a.clone(), b.clone(), &node.ty)?;
    negate(s, product, &node.ty).map(Some)
}

// ── factoring ───────────────────────────────────────────────────────────────

/// `c * x`, `x * c` or bare `x` (coefficient 1).
fn term(expr: &Expr) -> (Option<Number>, &Expr) {
    if let Some((BinaryOp::Multiply, left, right)) = binary_parts(expr) {
        if let Some(c) = left.as_number() {
            return (Some(c), right);
        }
        if let Some(c) = right.as_number() {
            return (Some(c), left);
        }
    }
    (None, expr)
}

/// `c1*x ± c2*x → (c1 ± c2)*x`
fn common_factor(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((op, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let Some(kind) = node.ty.numeric_kind() else {
        return Ok(None);
    };
    let (c1, x1) = term(left);
    let (c2, x2) = term(right);

    if x1.as_constant().is_some() || x1.ty != node.ty || !is_pure(x1) || !structurally_equal(x1, x2) {
        return Ok(None);
    }

    let one = Number::Int(1).convert(kind);
    let arith = if op == BinaryOp::Add {
        ArithOp::Add
    } else {
        ArithOp::Subtract
    };
    let coefficient = Number::binary(
        arith,
        c1.unwrap_or(one).convert(kind),
        c2.unwrap_or(one).convert(kind),
    )?
    .convert(kind);

    rebuild(s, BinaryOp::Multiply, Expr::number(coefficient), x1.clone(), &node.ty).map(Some)
}

/// `b ** p` or bare `b` (exponent 1).
fn power(expr: &Expr) -> (&Expr, Expr) {
    match binary_parts(expr) {
        Some((BinaryOp::Power, base, exponent)) => (base, exponent.clone()),
        _ => (expr, Expr::number(Number::Double(1.0))),
    }
}

/// `x**a * x**b → x**(a + b)` over doubles.
fn merge_exponents(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    if node.ty != Type::DOUBLE {
        return Ok(None);
    }
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let (base, a) = power(left);
    let (other, b) = power(right);

    if base.as_constant().is_some() || base.ty != Type::DOUBLE || !is_pure(base) || !structurally_equal(base, other) {
        return Ok(None);
    }

    let exponent = rebuild(s, BinaryOp::Add, a, b, &Type::DOUBLE)?;
    rebuild(s, BinaryOp::Power, base.clone(), exponent, &Type::DOUBLE).map(Some)
}

// ── division ────────────────────────────────────────────────────────────────

/// Dividend and divisor of a floating quotient child of the node's type.
fn quotient<'e>(child: &'e Expr, ty: &Type) -> Option<(&'e Expr, &'e Expr)> {
    match binary_parts(child) {
        Some((BinaryOp::Divide, a, b)) if &child.ty == ty => Some((a, b)),
        _ => None,
    }
}

/// `(a/b)/(c/d) → (a*d)/(b*c)`
fn flatten_quotients(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    if !node.ty.is_floating() {
        return Ok(None);
    }
    let (Some((a, b)), Some((c, d))) = (quotient(left, &node.ty), quotient(right, &node.ty)) else {
        return Ok(None);
    };
    let ty = &node.ty;
    let numerator = rebuild(s, BinaryOp::Multiply, a.clone(), d.clone(), ty)?;
    let denominator = rebuild(s, BinaryOp::Multiply, b.clone(), c.clone(), ty)?;
    rebuild(s, BinaryOp::Divide, numerator, denominator, ty).map(Some)
}

/// `(a/b)/c → a/(b*c)`
fn flatten_dividend(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, c)) = binary_parts(node) else {
        return Ok(None);
    };
    if !node.ty.is_floating() {
        return Ok(None);
    }
    let Some((a, b)) = quotient(left, &node.ty) else {
        return Ok(None);
    };
    let ty = &node.ty;
    let denominator = rebuild(s, BinaryOp::Multiply, b.clone(), c.clone(), ty)?;
    rebuild(s, BinaryOp::Divide, a.clone(), denominator, ty).map(Some)
}

/// `a/(b/c) → (a*c)/b`
fn flatten_divisor(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, a, right)) = binary_parts(node) else {
        return Ok(None);
    };
    if !node.ty.is_floating() {
        return Ok(None);
    }
    let Some((b, c)) = quotient(right, &node.ty) else {
        return Ok(None);
    };
    let ty = &node.ty;
    let numerator = rebuild(s, BinaryOp::Multiply, a.clone(), c.clone(), ty)?;
    rebuild(s, BinaryOp::Divide, numerator, b.clone(), ty).map(Some)
}
