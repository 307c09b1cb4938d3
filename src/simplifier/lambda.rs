//! Inlining of immediately invoked lambda literals.

use std::collections::HashMap;

use super::{is_pure, Rule, Shape, Simplifier, Slot};
use crate::error::Result;
use crate::expr::{Expr, ExprKind};

pub(super) fn register(rules: &mut Vec<Rule>) {
    rules.push(Rule::new("beta-reduction", Shape::Invoke, &[Slot::Lambda], beta_reduce));
}

/// `((x, y) => body)(a, b) → body[x := a, y := b]`, simplified again.
fn beta_reduce(s: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
    let ExprKind::Invoke { target, args } = &node.kind else {
        return Ok(None);
    };
    let ExprKind::Lambda(lambda) = &target.kind else {
        return Ok(None);
    };
    if lambda.params.len() != args.len() {
        return Ok(None);
    }

    let ids: Vec<usize> = lambda.params.iter().map(|p| p.id).collect();
    if writes_any(&lambda.body, &ids) {
        return Ok(None);
    }
    // An argument with side effects must be evaluated exactly once, and
    // two of them would lose their left-to-right order.
    let impure: Vec<usize> = ids
        .iter()
        .zip(args.iter())
        .filter(|(_, arg)| !is_pure(arg))
        .map(|(id, _)| *id)
        .collect();
    if impure.len() > 1 || impure.iter().any(|id| uses(&lambda.body, *id) != 1) {
        return Ok(None);
    }

    let bindings: HashMap<usize, Expr> = ids
        .into_iter()
        .zip(args.iter())
        .zip(&lambda.params)
        .map(|((id, arg), param)| (id, arg.clone().coerce(&param.ty)))
        .collect();
    let body = lambda.body.substitute(&bindings).coerce(&node.ty);
    s.simplify(&body).map(Some)
}

/// Does `expr` assign to (or increment) one of the variables `ids`?
fn writes_any(expr: &Expr, ids: &[usize]) -> bool {
    let is_bound = |target: &Expr| matches!(&target.kind, ExprKind::Parameter(v) if ids.contains(&v.id));
    let writes = match &expr.kind {
        ExprKind::Assign { target, .. } => is_bound(target),
        ExprKind::Unary { op, operand } => op.is_mutation() && is_bound(operand),
        _ => false,
    };
    writes || expr.children().into_iter().any(|c| writes_any(c, ids))
}

/// Number of occurrences of variable `id` in `expr`.
fn uses(expr: &Expr, id: usize) -> usize {
    let own = matches!(&expr.kind, ExprKind::Parameter(v) if v.id == id) as usize;
    own + expr.children().into_iter().map(|c| uses(c, id)).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Lambda, UnaryOp, Variable};
    use crate::number::Number;
    use crate::types::Type;

    fn beta_only() -> Simplifier {
        Simplifier::empty().with_rule(Rule::new("beta-reduction", Shape::Invoke, &[Slot::Lambda], beta_reduce))
    }

    /// `(x => body(x))(arg)` over ints.
    fn invoke(body: impl FnOnce(&Variable) -> Expr, arg: Expr) -> Expr {
        let x = Variable::new("x", Type::INT);
        let lambda = Lambda {
            body: body(&x),
            params: vec![x],
            ret: Type::INT,
        };
        Expr::new(
            ExprKind::Invoke {
                target: Box::new(Expr::lambda(lambda)),
                args: vec![arg],
            },
            Type::INT,
        )
    }

    fn square(x: &Variable) -> Expr {
        Expr::binary_node(BinaryOp::Multiply, Expr::parameter(x), Expr::parameter(x), Type::INT)
    }

    fn increment(z: &Variable) -> Expr {
        Expr::unary_node(UnaryOp::PreIncrement, Expr::parameter(z), Type::INT)
    }

    #[test]
    fn pure_arguments_are_substituted() {
        let z = Variable::new("z", Type::INT);
        let result = beta_only().simplify(&invoke(square, Expr::parameter(&z))).unwrap();
        let ExprKind::Binary { op: BinaryOp::Multiply, left, right } = &result.kind else {
            panic!("not reduced: {:?}", result.kind);
        };
        for side in [left, right] {
            assert!(matches!(&side.kind, ExprKind::Parameter(v) if v.id == z.id));
        }
    }

    #[test]
    fn impure_argument_used_twice_is_kept() {
        let z = Variable::new("z", Type::INT);
        let result = beta_only().simplify(&invoke(square, increment(&z))).unwrap();
        assert!(matches!(result.kind, ExprKind::Invoke { .. }));
    }

    #[test]
    fn impure_argument_used_once_is_inlined() {
        let z = Variable::new("z", Type::INT);
        let add_one =
            |x: &Variable| Expr::binary_node(BinaryOp::Add, Expr::parameter(x), Expr::number(Number::Int(1)), Type::INT);
        let result = beta_only().simplify(&invoke(add_one, increment(&z))).unwrap();
        let ExprKind::Binary { op: BinaryOp::Add, left, .. } = &result.kind else {
            panic!("not reduced: {:?}", result.kind);
        };
        assert!(matches!(left.kind, ExprKind::Unary { op: UnaryOp::PreIncrement, .. }));
    }

    #[test]
    fn unused_impure_argument_is_kept() {
        let z = Variable::new("z", Type::INT);
        let result = beta_only().simplify(&invoke(|_| Expr::number(Number::Int(7)), increment(&z))).unwrap();
        assert!(matches!(result.kind, ExprKind::Invoke { .. }));
    }
}
