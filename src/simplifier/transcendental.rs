//! Rewrites driven by the canonical-operation tags on library methods:
//! `Pow` calls become `**`, plus the trigonometric and logarithmic
//! identities.

use super::{binary_parts, canonical_arg, is_pure, Rule, Shape, Simplifier, Slot};
use crate::catalog::CanonicalFn;
use crate::equality::structurally_equal;
use crate::error::Result;
use crate::expr::{BinaryOp, Expr, ExprKind};
use crate::number::Number;
use crate::types::Type;

use crate::catalog::CanonicalFn::{Cos, Log, Log10, Sin, Tan};

pub(super) fn register(rules: &mut Vec<Rule>) {
    rules.push(Rule::new("pow-operator", Shape::Call, &[], pow_operator));

    let squared = Slot::Binary(BinaryOp::Power);
    rules.push(Rule::new(
        "pythagorean",
        Shape::Binary(BinaryOp::Add),
        &[squared, squared],
        pythagorean,
    ));
    rules.push(Rule::new(
        "sin-over-cos",
        Shape::Binary(BinaryOp::Divide),
        &[Slot::Canonical(Sin), Slot::Canonical(Cos)],
        sin_over_cos,
    ));
    rules.push(Rule::new(
        "cos-over-sin",
        Shape::Binary(BinaryOp::Divide),
        &[Slot::Canonical(Cos), Slot::Canonical(Sin)],
        cos_over_sin,
    ));
    rules.push(Rule::new(
        "cos-times-tan",
        Shape::Binary(BinaryOp::Multiply),
        &[Slot::Canonical(Cos), Slot::Canonical(Tan)],
        cos_times_tan,
    ));
    rules.push(Rule::new(
        "tan-times-cos",
        Shape::Binary(BinaryOp::Multiply),
        &[Slot::Canonical(Tan), Slot::Canonical(Cos)],
        cos_times_tan,
    ));

    for f in [Log, Log10] {
        rules.push(Rule::new(
            "log-sum",
            Shape::Binary(BinaryOp::Add),
            &[Slot::Canonical(f), Slot::Canonical(f)],
            log_sum,
        ));
        rules.push(Rule::new(
            "log-difference",
            Shape::Binary(BinaryOp::Subtract),
            &[Slot::Canonical(f), Slot::Canonical(f)],
            log_difference,
        ));
    }
}

fn double(value: f64) -> Expr {
    Expr::number(Number::Double(value))
}

/// Shared argument of two single-argument canonical calls.
fn shared_arg<'e>(a: &'e Expr, f: CanonicalFn, b: &'e Expr, g: CanonicalFn) -> Option<&'e Expr> {
    let x = canonical_arg(a, f)?;
    let y = canonical_arg(b, g)?;
    (is_pure(x) && structurally_equal(x, y)).then_some(x)
}

/// `Math.Pow(a, b) → a ** b`
fn pow_operator(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let ExprKind::Call {
        method,
        receiver: None,
        args,
        ..
    } = &node.kind
    else {
        return Ok(None);
    };
    let [a, b] = args.as_slice() else {
        return Ok(None);
    };
    if method.canonical != Some(CanonicalFn::Pow) {
        return Ok(None);
    }
    s.node(Expr::binary_node(BinaryOp::Power, a.clone(), b.clone(), Type::DOUBLE))
        .map(Some)
}

/// Argument of `f(x) ** 2`.
fn squared_arg(expr: &Expr, f: CanonicalFn) -> Option<&Expr> {
    match binary_parts(expr) {
        Some((BinaryOp::Power, base, exponent)) if exponent.is_number(2.0) => canonical_arg(base, f),
        _ => None,
    }
}

/// `sin(x)**2 + cos(x)**2 → 1`, either order.
fn pythagorean(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let pairs = [(Sin, Cos), (Cos, Sin)];
    let matched = pairs.iter().any(|(f, g)| match (squared_arg(left, *f), squared_arg(right, *g)) {
        (Some(x), Some(y)) => is_pure(x) && structurally_equal(x, y),
        _ => false,
    });
    Ok(matched.then(|| double(1.0)))
}

/// `sin(x) / cos(x) → tan(x)`
fn sin_over_cos(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    Ok(shared_arg(left, Sin, right, Cos).and_then(|x| s.canonical_call(Tan, vec![x.clone()])))
}

/// `cos(x) / sin(x) → 1 / tan(x)`
fn cos_over_sin(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let tangent = shared_arg(left, Cos, right, Sin).and_then(|x| s.canonical_call(Tan, vec![x.clone()]));
    Ok(tangent.map(|tan| Expr::binary_node(BinaryOp::Divide, double(1.0), tan, Type::DOUBLE)))
}

/// `cos(x) * tan(x) → sin(x)`, either order.
fn cos_times_tan(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let x = shared_arg(left, Cos, right, Tan).or_else(|| shared_arg(left, Tan, right, Cos));
    Ok(x.and_then(|x| s.canonical_call(Sin, vec![x.clone()])))
}

/// `log(a) ± log(b) → log(a * b)` / `log(a / b)` for the log family of the
/// two calls.
fn log_combine(s: &Simplifier, node: &Expr, inner: BinaryOp) -> Result<Option<Expr>> {
    let Some((_, left, right)) = binary_parts(node) else {
        return Ok(None);
    };
    let Some(f) = super::canonical_of(left) else {
        return Ok(None);
    };
    let (Some(a), Some(b)) = (canonical_arg(left, f), canonical_arg(right, f)) else {
        return Ok(None);
    };
    let combined = s.node(Expr::binary_node(inner, a.clone(), b.clone(), Type::DOUBLE))?;
    match s.canonical_call(f, vec![combined]) {
        Some(call) => s.node(call).map(Some),
        None => Ok(None),
    }
}

fn log_sum(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    log_combine(s, node, BinaryOp::Multiply)
}

fn log_difference(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    log_combine(s, node, BinaryOp::Divide)
}
