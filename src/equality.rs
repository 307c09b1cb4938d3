//! Expression equality and hashing.
//!
//! [`equals`] simplifies both sides and then compares structurally: lambda
//! parameters match by position (so `(a, b) => a + b` equals
//! `(x, y) => x + y`), numeric constants match across widths when some width
//! holds both losslessly, and every other node must agree on kind, type,
//! operator and method/member identity.  [`hash`] hashes the canonical
//! rendering of the simplified tree, which prints exactly what the structural
//! comparison looks at.

use std::hash::{Hash, Hasher};

use log::debug;
use rustc_hash::FxHasher;

use crate::catalog::MethodDef;
use crate::error::Result;
use crate::expr::{Expr, ExprKind, Variable};
use crate::printer::to_canonical;
use crate::simplifier::Simplifier;
use crate::value::Constant;

/// Equality after simplification.
pub fn equals(simplifier: &Simplifier, a: &Expr, b: &Expr) -> Result<bool> {
    let a = simplifier.simplify(a)?;
    let b = simplifier.simplify(b)?;
    let equal = structurally_equal(&a, &b);

    debug!("Compared expressions: {}", equal);

    Ok(equal)
}

/// Hash consistent with [`equals`].
pub fn hash(simplifier: &Simplifier, expr: &Expr) -> Result<u64> {
    let simplified = simplifier.simplify(expr)?;
    let mut hasher = FxHasher::default();
    to_canonical(&simplified).hash(&mut hasher);
    Ok(hasher.finish())
}

/// Structural comparison without simplification.
pub fn structurally_equal(a: &Expr, b: &Expr) -> bool {
    Matcher::default().same(a, b)
}

/// Parameter-id frames of the lambdas entered on each side.
#[derive(Default)]
struct Matcher {
    left: Vec<Vec<usize>>,
    right: Vec<Vec<usize>>,
}

fn binder(frames: &[Vec<usize>], v: &Variable) -> Option<(usize, usize)> {
    frames
        .iter()
        .enumerate()
        .rev()
        .find_map(|(depth, frame)| frame.iter().position(|id| *id == v.id).map(|i| (depth, i)))
}

fn same_method(a: &MethodDef, b: &MethodDef) -> bool {
    std::ptr::eq(a, b) || a.signature() == b.signature()
}

fn same_constant(a: &Constant, b: &Constant) -> bool {
    match (a, b) {
        (Constant::Number(x), Constant::Number(y)) => x.equivalent(y),
        _ => a == b,
    }
}

impl Matcher {
    fn same(&mut self, a: &Expr, b: &Expr) -> bool {
        match (&a.kind, &b.kind) {
            (ExprKind::Constant(x), ExprKind::Constant(y)) => return same_constant(x, y),
            (ExprKind::Parameter(x), ExprKind::Parameter(y)) => return self.same_variable(x, y),
            (ExprKind::Lambda(x), ExprKind::Lambda(y)) => {
                let signature = x.params.len() == y.params.len()
                    && x.params.iter().zip(&y.params).all(|(p, q)| p.ty == q.ty)
                    && x.ret == y.ret;
                if !signature {
                    return false;
                }
                self.left.push(x.params.iter().map(|p| p.id).collect());
                self.right.push(y.params.iter().map(|p| p.id).collect());
                let body = self.same(&x.body, &y.body);
                self.left.pop();
                self.right.pop();
                return body;
            }
            _ => {}
        }

        if a.ty != b.ty || !self.same_payload(&a.kind, &b.kind) {
            return false;
        }
        let (ca, cb) = (a.children(), b.children());
        ca.len() == cb.len() && ca.into_iter().zip(cb).all(|(x, y)| self.same(x, y))
    }

    /// Bound parameters match by binder position; free ones (block locals,
    /// catch variables) by name and type.
    fn same_variable(&self, x: &Variable, y: &Variable) -> bool {
        match (binder(&self.left, x), binder(&self.right, y)) {
            (Some(p), Some(q)) => p == q,
            (None, None) => x.name == y.name && x.ty == y.ty,
            _ => false,
        }
    }

    fn same_variables(&self, xs: &[Variable], ys: &[Variable]) -> bool {
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.name == y.name && x.ty == y.ty)
    }

    /// Everything except the children.
    fn same_payload(&self, a: &ExprKind, b: &ExprKind) -> bool {
        use ExprKind as K;

        match (a, b) {
            (K::Default, K::Default) => true,
            (K::Unary { op: x, .. }, K::Unary { op: y, .. }) => x == y,
            (K::Binary { op: x, .. }, K::Binary { op: y, .. }) => x == y,
            (K::Convert(_), K::Convert(_)) | (K::TypeAs(_), K::TypeAs(_)) => true,
            (K::TypeIs { target: x, .. }, K::TypeIs { target: y, .. }) => x == y,
            (
                K::Call {
                    method: m,
                    receiver: r,
                    type_args: t,
                    ..
                },
                K::Call {
                    method: n,
                    receiver: s,
                    type_args: u,
                    ..
                },
            ) => same_method(m, n) && r.is_some() == s.is_some() && t == u,
            (K::Invoke { .. }, K::Invoke { .. }) => true,
            (K::New { ctor: x, .. }, K::New { ctor: y, .. }) => same_method(x, y),
            (K::MemberInit { bindings: x, .. }, K::MemberInit { bindings: y, .. }) => {
                x.len() == y.len() && x.iter().zip(y).all(|((m, _), (n, _))| m.name == n.name)
            }
            (K::ListInit { add: x, .. }, K::ListInit { add: y, .. }) => same_method(x, y),
            (K::NewArrayBounds { element: x, .. }, K::NewArrayBounds { element: y, .. }) => x == y,
            (K::NewArrayInit { element: x, .. }, K::NewArrayInit { element: y, .. }) => x == y,
            (
                K::Member {
                    target: t,
                    member: m,
                    owner: o,
                },
                K::Member {
                    target: u,
                    member: n,
                    owner: p,
                },
            ) => m.name == n.name && o == p && t.is_some() == u.is_some(),
            (K::ArrayIndex { .. }, K::ArrayIndex { .. }) => true,
            (K::Conditional { .. }, K::Conditional { .. }) => true,
            (K::Assign { .. }, K::Assign { .. }) => true,
            (K::Block { variables: x, .. }, K::Block { variables: y, .. }) => self.same_variables(x, y),
            (
                K::Loop {
                    break_label: b1,
                    continue_label: c1,
                    ..
                },
                K::Loop {
                    break_label: b2,
                    continue_label: c2,
                    ..
                },
            ) => b1.name == b2.name && c1.as_ref().map(|c| &c.name) == c2.as_ref().map(|c| &c.name),
            (
                K::Goto {
                    kind: k1,
                    target: t1,
                    value: v1,
                },
                K::Goto {
                    kind: k2,
                    target: t2,
                    value: v2,
                },
            ) => k1 == k2 && t1.name == t2.name && v1.is_some() == v2.is_some(),
            (K::Label { target: x, default: d1 }, K::Label { target: y, default: d2 }) => {
                x.name == y.name && d1.is_some() == d2.is_some()
            }
            (
                K::Switch {
                    cases: c1,
                    default: d1,
                    ..
                },
                K::Switch {
                    cases: c2,
                    default: d2,
                    ..
                },
            ) => {
                c1.len() == c2.len()
                    && c1.iter().zip(c2).all(|(x, y)| x.tests.len() == y.tests.len())
                    && d1.is_some() == d2.is_some()
            }
            (
                K::Try {
                    handlers: h1,
                    finally: f1,
                    ..
                },
                K::Try {
                    handlers: h2,
                    finally: f2,
                    ..
                },
            ) => {
                h1.len() == h2.len()
                    && h1.iter().zip(h2).all(|(x, y)| {
                        x.ty == y.ty
                            && match (&x.variable, &y.variable) {
                                (Some(v), Some(w)) => v.name == w.name && v.ty == w.ty,
                                (None, None) => true,
                                _ => false,
                            }
                    })
                    && f1.is_some() == f2.is_some()
            }
            (K::Throw(x), K::Throw(y)) => x.is_some() == y.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Lambda};
    use crate::number::Number;
    use crate::types::Type;

    fn sum_lambda(a: &str, b: &str) -> Expr {
        let (a, b) = (Variable::new(a, Type::INT), Variable::new(b, Type::INT));
        let body = Expr::binary_node(BinaryOp::Add, Expr::parameter(&a), Expr::parameter(&b), Type::INT);
        Expr::lambda(Lambda {
            params: vec![a, b],
            body,
            ret: Type::INT,
        })
    }

    #[test]
    fn lambdas_compare_by_parameter_position() {
        assert!(structurally_equal(&sum_lambda("a", "b"), &sum_lambda("x", "y")));

        let swapped = {
            let (a, b) = (Variable::new("a", Type::INT), Variable::new("b", Type::INT));
            let body = Expr::binary_node(BinaryOp::Add, Expr::parameter(&b), Expr::parameter(&a), Type::INT);
            Expr::lambda(Lambda {
                params: vec![a, b],
                body,
                ret: Type::INT,
            })
        };
        assert!(!structurally_equal(&sum_lambda("a", "b"), &swapped));
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(structurally_equal(
            &Expr::number(Number::Int(14)),
            &Expr::number(Number::Double(14.0))
        ));
        assert!(!structurally_equal(
            &Expr::number(Number::Int(14)),
            &Expr::number(Number::Double(14.5))
        ));
    }

    #[test]
    fn hash_ignores_parameter_names() {
        let simplifier = Simplifier::empty();
        let h1 = hash(&simplifier, &sum_lambda("a", "b")).unwrap();
        let h2 = hash(&simplifier, &sum_lambda("x", "y")).unwrap();
        assert_eq!(h1, h2);
    }
}
