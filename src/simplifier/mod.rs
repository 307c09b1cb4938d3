//! Term rewriter.
//!
//! The tree is rewritten bottom-up: every child is simplified first, the node
//! is rebuilt around the new children, and then the rules registered for the
//! node's shape (plus the shape-agnostic ones) are tried in registration
//! order.  A rule first checks its per-slot constraints against the node's
//! immediate operands; the first rule whose rewrite returns a replacement
//! wins.  Rules that build new composite nodes pass them back through
//! [`Simplifier::node`] so the result is itself in simplified form.

mod algebra;
mod folding;
mod identity;
mod lambda;
mod transcendental;

use std::sync::Arc;

use log::{debug, info, trace};
use rustc_hash::FxHashMap;

use crate::catalog::{CanonicalFn, MethodDef, TypeCatalog};
use crate::error::Result;
use crate::expr::{BinaryOp, Expr, ExprKind, Lambda, UnaryOp};

/// Root node shape a rule is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Tried for every node.
    Any,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Convert,
    Call,
    Invoke,
    Conditional,
    /// Nodes no rule is interested in.
    Other,
}

impl Shape {
    pub fn of(expr: &Expr) -> Shape {
        match &expr.kind {
            ExprKind::Unary { op, .. } => Shape::Unary(*op),
            ExprKind::Binary { op, .. } => Shape::Binary(*op),
            ExprKind::Convert(_) => Shape::Convert,
            ExprKind::Call { .. } => Shape::Call,
            ExprKind::Invoke { .. } => Shape::Invoke,
            ExprKind::Conditional { .. } => Shape::Conditional,
            _ => Shape::Other,
        }
    }
}

/// Constraint on one operand slot of the root node.
#[derive(Debug, Clone, Copy)]
pub enum Slot {
    Any,
    Constant,
    /// Numeric constant equal to one of the listed values.
    OneOf(&'static [f64]),
    /// Numeric constant other than zero (and not NaN).
    NonZero,
    /// Numeric constant greater than zero.
    Positive,
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Call of a method tagged with this canonical operation.
    Canonical(CanonicalFn),
    Lambda,
}

impl Slot {
    pub fn accepts(&self, operand: &Expr) -> bool {
        match self {
            Slot::Any => true,
            Slot::Constant => matches!(operand.kind, ExprKind::Constant(_)),
            Slot::OneOf(values) => values.iter().any(|v| operand.is_number(*v)),
            Slot::NonZero => operand.as_number().is_some_and(|n| {
                let v = n.to_f64();
                v != 0.0 && !v.is_nan()
            }),
            Slot::Positive => operand.as_number().is_some_and(|n| n.to_f64() > 0.0),
            Slot::Unary(op) => matches!(&operand.kind, ExprKind::Unary { op: o, .. } if o == op),
            Slot::Binary(op) => matches!(&operand.kind, ExprKind::Binary { op: o, .. } if o == op),
            Slot::Canonical(f) => canonical_of(operand) == Some(*f),
            Slot::Lambda => matches!(operand.kind, ExprKind::Lambda(_)),
        }
    }
}

/// Rewrite body: `Ok(None)` means "no replacement, try the next rule".
pub type Rewrite = fn(&Simplifier, &Expr) -> Result<Option<Expr>>;

pub struct Rule {
    pub name: &'static str,
    pub shape: Shape,
    pub slots: Vec<Slot>,
    pub rewrite: Rewrite,
}

impl Rule {
    pub fn new(name: &'static str, shape: Shape, slots: &[Slot], rewrite: Rewrite) -> Self {
        Rule {
            name,
            shape,
            slots: slots.to_vec(),
            rewrite,
        }
    }

    fn matches(&self, node: &Expr) -> bool {
        let operands = operands(node);
        self.slots.len() <= operands.len()
            && self.slots.iter().zip(&operands).all(|(slot, e)| slot.accepts(e))
    }
}

/// Operand slots of a node, the positions [`Slot`] constraints refer to.
/// Calls expose their arguments (not the receiver).
pub fn operands(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Unary { operand, .. } | ExprKind::Convert(operand) => vec![&**operand],
        ExprKind::Binary { left, right, .. } => vec![&**left, &**right],
        ExprKind::Call { args, .. } => args.iter().collect(),
        ExprKind::Invoke { target, args } => std::iter::once(&**target).chain(args.iter()).collect(),
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
        } => vec![&**test, &**if_true, &**if_false],
        _ => Vec::new(),
    }
}

/// Canonical operation of a call node, if its method carries one.
pub fn canonical_of(expr: &Expr) -> Option<CanonicalFn> {
    match &expr.kind {
        ExprKind::Call { method, .. } => method.canonical,
        _ => None,
    }
}

pub struct Simplifier {
    catalog: Option<Arc<dyn TypeCatalog>>,
    rules: Vec<Rule>,
    by_shape: FxHashMap<Shape, Vec<usize>>,
}

impl Simplifier {
    /// Simplifier with every built-in rule family.  The catalog supplies the
    /// methods that trigonometric and logarithmic rewrites call.
    pub fn new(catalog: Arc<dyn TypeCatalog>) -> Self {
        let mut simplifier = Simplifier::empty();
        simplifier.catalog = Some(catalog);

        let mut rules = Vec::new();
        folding::register(&mut rules);
        identity::register(&mut rules);
        algebra::register(&mut rules);
        transcendental::register(&mut rules);
        lambda::register(&mut rules);
        for rule in rules {
            simplifier.add_rule(rule);
        }

        info!("Initialized simplifier with {} rules", simplifier.rules.len());

        simplifier
    }

    /// Simplifier without rules; `simplify` then only rebuilds the tree.
    pub fn empty() -> Self {
        Simplifier {
            catalog: None,
            rules: Vec::new(),
            by_shape: FxHashMap::default(),
        }
    }

    /// Register a rule after the existing ones.
    pub fn add_rule(&mut self, rule: Rule) {
        self.by_shape.entry(rule.shape).or_default().push(self.rules.len());
        self.rules.push(rule);
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Simplify a whole tree.
    pub fn simplify(&self, expr: &Expr) -> Result<Expr> {
        let rebuilt = expr.map_children(|child| self.simplify(child))?;
        self.node(rebuilt)
    }

    pub fn simplify_lambda(&self, lambda: &Lambda) -> Result<Lambda> {
        info!("Simplifying lambda with {} parameters", lambda.params.len());

        Ok(Lambda {
            params: lambda.params.clone(),
            body: self.simplify(&lambda.body)?,
            ret: lambda.ret.clone(),
        })
    }

    /// Apply the rules to a node whose children are already simplified.
    pub fn node(&self, node: Expr) -> Result<Expr> {
        let shape = Shape::of(&node);
        if shape == Shape::Other && !self.by_shape.contains_key(&Shape::Any) {
            return Ok(node);
        }

        for index in self.candidates(shape) {
            let rule = &self.rules[index];
            if !rule.matches(&node) {
                continue;
            }
            trace!("Trying rule '{}' on {:?}", rule.name, shape);

            if let Some(replacement) = (rule.rewrite)(self, &node)? {
                debug!("Rule '{}' rewrote a {:?} node", rule.name, shape);

                return Ok(replacement);
            }
        }

        Ok(node)
    }

    /// Indices of the rules for `shape` merged with the shape-agnostic ones,
    /// in registration order.
    fn candidates(&self, shape: Shape) -> Vec<usize> {
        let specific = self.by_shape.get(&shape).map(Vec::as_slice).unwrap_or(&[]);
        let any = self.by_shape.get(&Shape::Any).map(Vec::as_slice).unwrap_or(&[]);
        let mut merged: Vec<usize> = specific.iter().chain(any).copied().collect();
        merged.sort_unstable();
        merged
    }

    /// The catalog method implementing `f`.
    pub fn canonical_method(&self, f: CanonicalFn) -> Option<Arc<MethodDef>> {
        self.catalog.as_ref().and_then(|c| c.canonical_method(f))
    }

    /// Call of the canonical method `f`, or `None` when the catalog lacks it.
    pub fn canonical_call(&self, f: CanonicalFn, args: Vec<Expr>) -> Option<Expr> {
        let method = self.canonical_method(f)?;
        let ret = method.ret.clone();
        Some(Expr::call(method, None, args, Vec::new(), ret))
    }
}

// ── shared node helpers for the rule families ───────────────────────────────

fn binary_parts(expr: &Expr) -> Option<(BinaryOp, &Expr, &Expr)> {
    match &expr.kind {
        ExprKind::Binary { op, left, right } => Some((*op, &**left, &**right)),
        _ => None,
    }
}

fn unary_operand(expr: &Expr, op: UnaryOp) -> Option<&Expr> {
    match &expr.kind {
        ExprKind::Unary { op: o, operand } if *o == op => Some(&**operand),
        _ => None,
    }
}

/// Free of side effects, so two structurally equal copies denote one value.
fn is_pure(expr: &Expr) -> bool {
    let shallow = match &expr.kind {
        ExprKind::Constant(_)
        | ExprKind::Default
        | ExprKind::Parameter(_)
        | ExprKind::Binary { .. }
        | ExprKind::Convert(_)
        | ExprKind::TypeIs { .. }
        | ExprKind::TypeAs(_)
        | ExprKind::Member { .. }
        | ExprKind::ArrayIndex { .. }
        | ExprKind::Conditional { .. } => true,
        ExprKind::Unary { op, .. } => !op.is_mutation(),
        ExprKind::Call { method, .. } => method.canonical.is_some(),
        _ => false,
    };
    shallow && expr.children().into_iter().all(is_pure)
}

/// Single argument of a call to canonical `f`.
fn canonical_arg(expr: &Expr, f: CanonicalFn) -> Option<&Expr> {
    match &expr.kind {
        ExprKind::Call { method, args, .. } if method.canonical == Some(f) && args.len() == 1 => args.first(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Variable;
    use crate::number::Number;
    use crate::types::Type;

    fn double_rule(_: &Simplifier, node: &Expr) -> Result<Option<Expr>> {
        Ok(Some(Expr::number(Number::Double(node.as_number().map_or(0.0, |n| n.to_f64()) * 2.0))))
    }

    fn never(_: &Simplifier, _: &Expr) -> Result<Option<Expr>> {
        Ok(None)
    }

    #[test]
    fn slot_constraints_gate_rules() {
        let x = Variable::new("x", Type::DOUBLE);
        let node = Expr::binary_node(
            BinaryOp::Add,
            Expr::parameter(&x),
            Expr::number(Number::Double(0.0)),
            Type::DOUBLE,
        );
        let zero_right = Rule::new("r", Shape::Binary(BinaryOp::Add), &[Slot::Any, Slot::OneOf(&[0.0])], never);
        let zero_left = Rule::new("l", Shape::Binary(BinaryOp::Add), &[Slot::OneOf(&[0.0]), Slot::Any], never);
        assert!(zero_right.matches(&node));
        assert!(!zero_left.matches(&node));
    }

    #[test]
    fn first_replacing_rule_wins() {
        let simplifier = Simplifier::empty()
            .with_rule(Rule::new("skip", Shape::Binary(BinaryOp::Add), &[], never))
            .with_rule(Rule::new("fold", Shape::Binary(BinaryOp::Add), &[Slot::Constant, Slot::Constant], double_rule))
            .with_rule(Rule::new("late", Shape::Any, &[], double_rule));

        let sum = Expr::binary_node(
            BinaryOp::Add,
            Expr::number(Number::Double(1.0)),
            Expr::number(Number::Double(2.0)),
            Type::DOUBLE,
        );
        let result = simplifier.simplify(&sum).unwrap();
        assert!(result.is_number(0.0));
    }
}
