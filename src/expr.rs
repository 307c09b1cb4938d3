//! The typed expression tree.
//!
//! Every node carries its result type.  Nodes are immutable: rewriting builds
//! new nodes through [`Expr::map_children`].  Statement forms (blocks, loops,
//! jumps, switch, try) are expression nodes too; a statement that yields no
//! value has type `void`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::catalog::{MemberDef, MethodDef};
use crate::error::{CompileError, Result};
use crate::number::{Number, NumericKind};
use crate::types::Type;
use crate::value::Constant;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_id() -> usize {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A lambda parameter, block local or catch variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: usize,
    pub name: String,
    pub ty: Type,
}

impl Variable {
    pub fn new(name: &str, ty: Type) -> Self {
        Variable {
            id: next_id(),
            name: name.to_string(),
            ty,
        }
    }
}

/// Jump destination.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTarget {
    pub id: usize,
    pub name: String,
}

impl LabelTarget {
    pub fn new(name: &str) -> Self {
        LabelTarget {
            id: next_id(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    UnaryPlus,
    Not,
    OnesComplement,
    ArrayLength,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::UnaryPlus => "+",
            UnaryOp::Not => "!",
            UnaryOp::OnesComplement => "~",
            UnaryOp::ArrayLength => ".Length",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrement | UnaryOp::PreDecrement | UnaryOp::PostIncrement | UnaryOp::PostDecrement
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Coalesce => "??",
        }
    }

    /// Operator for a binary or compound-assignment spelling.
    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        let op = match symbol.trim_end_matches('=') {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Modulo,
            "**" => BinaryOp::Power,
            "&" => BinaryOp::And,
            "|" => BinaryOp::Or,
            "^" => BinaryOp::ExclusiveOr,
            "<<" => BinaryOp::LeftShift,
            ">>" => BinaryOp::RightShift,
            "&&" => BinaryOp::AndAlso,
            "||" => BinaryOp::OrElse,
            "??" => BinaryOp::Coalesce,
            "" | "!" | "<" | ">" => match symbol {
                "==" => BinaryOp::Equal,
                "!=" => BinaryOp::NotEqual,
                "<" => BinaryOp::LessThan,
                "<=" => BinaryOp::LessThanOrEqual,
                ">" => BinaryOp::GreaterThan,
                ">=" => BinaryOp::GreaterThanOrEqual,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoKind {
    Goto,
    Break,
    Continue,
    Return,
}

#[derive(Debug, Clone)]
pub struct Lambda {
    pub params: Vec<Variable>,
    pub body: Expr,
    pub ret: Type,
}

impl Lambda {
    pub fn ty(&self) -> Type {
        Type::function(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.ret.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub tests: Vec<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub struct CatchBlock {
    pub ty: Type,
    pub variable: Option<Variable>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Constant(Constant),
    /// `default(T)`; the node type says which.
    Default,
    Parameter(Variable),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Conversion to the node type.
    Convert(Box<Expr>),
    TypeIs {
        operand: Box<Expr>,
        target: Type,
    },
    TypeAs(Box<Expr>),
    Call {
        method: Arc<MethodDef>,
        receiver: Option<Box<Expr>>,
        args: Vec<Expr>,
        /// Bound generic arguments of the method, in declaration order.
        type_args: Vec<Type>,
    },
    /// Delegate invocation.
    Invoke {
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        ctor: Arc<MethodDef>,
        args: Vec<Expr>,
    },
    MemberInit {
        new: Box<Expr>,
        bindings: Vec<(Arc<MemberDef>, Expr)>,
    },
    ListInit {
        new: Box<Expr>,
        add: Arc<MethodDef>,
        items: Vec<Expr>,
    },
    NewArrayBounds {
        element: Type,
        bounds: Vec<Expr>,
    },
    NewArrayInit {
        element: Type,
        items: Vec<Expr>,
    },
    Member {
        target: Option<Box<Expr>>,
        member: Arc<MemberDef>,
        /// The (instantiated) type declaring the member.
        owner: Type,
    },
    ArrayIndex {
        array: Box<Expr>,
        indices: Vec<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Block {
        variables: Vec<Variable>,
        body: Vec<Expr>,
    },
    Loop {
        body: Box<Expr>,
        break_label: LabelTarget,
        continue_label: Option<LabelTarget>,
    },
    Goto {
        kind: GotoKind,
        target: LabelTarget,
        value: Option<Box<Expr>>,
    },
    Label {
        target: LabelTarget,
        default: Option<Box<Expr>>,
    },
    Switch {
        value: Box<Expr>,
        cases: Vec<SwitchCase>,
        default: Option<Box<Expr>>,
    },
    Try {
        body: Box<Expr>,
        handlers: Vec<CatchBlock>,
        finally: Option<Box<Expr>>,
    },
    /// `throw e`; `None` rethrows the exception being handled.
    Throw(Option<Box<Expr>>),
    Lambda(Box<Lambda>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

fn boxed(expr: Expr) -> Box<Expr> {
    Box::new(expr)
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr { kind, ty }
    }

    // ── leaves ──────────────────────────────────────────────────────────

    pub fn constant(value: Constant) -> Self {
        let ty = value.ty();
        Expr::new(ExprKind::Constant(value), ty)
    }

    pub fn number(n: Number) -> Self {
        Expr::constant(Constant::Number(n))
    }

    pub fn boolean(b: bool) -> Self {
        Expr::constant(Constant::Bool(b))
    }

    pub fn string(s: &str) -> Self {
        Expr::constant(Constant::Str(s.to_string()))
    }

    pub fn null() -> Self {
        Expr::constant(Constant::Null)
    }

    pub fn default_of(ty: Type) -> Self {
        Expr::new(ExprKind::Default, ty)
    }

    /// The empty statement.
    pub fn empty() -> Self {
        Expr::default_of(Type::Void)
    }

    pub fn parameter(variable: &Variable) -> Self {
        Expr::new(ExprKind::Parameter(variable.clone()), variable.ty.clone())
    }

    /// Numeric constant of `kind` with value `value`.
    pub fn number_of(kind: NumericKind, value: f64) -> Self {
        Expr::number(Number::Double(value).convert(kind))
    }

    // ── composites ──────────────────────────────────────────────────────

    pub fn unary_node(op: UnaryOp, operand: Expr, ty: Type) -> Self {
        Expr::new(
            ExprKind::Unary {
                op,
                operand: boxed(operand),
            },
            ty,
        )
    }

    pub fn binary_node(op: BinaryOp, left: Expr, right: Expr, ty: Type) -> Self {
        Expr::new(
            ExprKind::Binary {
                op,
                left: boxed(left),
                right: boxed(right),
            },
            ty,
        )
    }

    /// Conversion node, omitted when the type already matches.
    pub fn convert(self, ty: &Type) -> Expr {
        if &self.ty == ty {
            return self;
        }
        Expr::new(ExprKind::Convert(boxed(self)), ty.clone())
    }

    /// Implicit conversion at an assignment or argument boundary.  Reference
    /// conversions need no node; value conversions get a `Convert`.
    pub fn coerce(self, ty: &Type) -> Expr {
        if &self.ty == ty || matches!(ty, Type::Void) {
            return self;
        }
        let value_involved = !self.ty.is_reference() || !ty.is_reference();
        if value_involved || self.ty == Type::Null {
            self.convert(ty)
        } else {
            self
        }
    }

    pub fn conditional_node(test: Expr, if_true: Expr, if_false: Expr, ty: Type) -> Self {
        Expr::new(
            ExprKind::Conditional {
                test: boxed(test),
                if_true: boxed(if_true),
                if_false: boxed(if_false),
            },
            ty,
        )
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        let ty = target.ty.clone();
        let value = value.coerce(&ty);
        Expr::new(
            ExprKind::Assign {
                target: boxed(target),
                value: boxed(value),
            },
            ty,
        )
    }

    /// Block whose value is its last expression.
    pub fn block(variables: Vec<Variable>, body: Vec<Expr>) -> Self {
        let ty = body.last().map_or(Type::Void, |e| e.ty.clone());
        Expr::new(ExprKind::Block { variables, body }, ty)
    }

    pub fn goto(kind: GotoKind, target: &LabelTarget, value: Option<Expr>) -> Self {
        Expr::new(
            ExprKind::Goto {
                kind,
                target: target.clone(),
                value: value.map(boxed),
            },
            Type::Void,
        )
    }

    pub fn label(target: &LabelTarget, default: Option<Expr>) -> Self {
        let ty = default.as_ref().map_or(Type::Void, |d| d.ty.clone());
        Expr::new(
            ExprKind::Label {
                target: target.clone(),
                default: default.map(boxed),
            },
            ty,
        )
    }

    pub fn call(method: Arc<MethodDef>, receiver: Option<Expr>, args: Vec<Expr>, type_args: Vec<Type>, ty: Type) -> Self {
        Expr::new(
            ExprKind::Call {
                method,
                receiver: receiver.map(boxed),
                args,
                type_args,
            },
            ty,
        )
    }

    pub fn lambda(lambda: Lambda) -> Self {
        let ty = lambda.ty();
        Expr::new(ExprKind::Lambda(Box::new(lambda)), ty)
    }

    // ── queries ─────────────────────────────────────────────────────────

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExprKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match &self.kind {
            ExprKind::Constant(Constant::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Numeric constant with exactly this value.
    pub fn is_number(&self, value: f64) -> bool {
        self.as_number().is_some_and(|n| n.equals_f64(value))
    }

    /// Can this node appear on the left of `=`?
    pub fn is_assignable(&self) -> bool {
        match &self.kind {
            ExprKind::Parameter(_) | ExprKind::ArrayIndex { .. } => true,
            ExprKind::Member { member, .. } => member.is_writable(),
            _ => false,
        }
    }

    /// Immediate children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Constant(_) | ExprKind::Default | ExprKind::Parameter(_) => Vec::new(),
            ExprKind::Unary { operand, .. } => vec![&**operand],
            ExprKind::Binary { left, right, .. } => vec![&**left, &**right],
            ExprKind::Convert(operand) | ExprKind::TypeAs(operand) => vec![&**operand],
            ExprKind::TypeIs { operand, .. } => vec![&**operand],
            ExprKind::Call { receiver, args, .. } => {
                receiver.iter().map(|r| &**r).chain(args.iter()).collect()
            }
            ExprKind::Invoke { target, args } => {
                std::iter::once(&**target).chain(args.iter()).collect()
            }
            ExprKind::New { args, .. } => args.iter().collect(),
            ExprKind::MemberInit { new, bindings } => std::iter::once(&**new)
                .chain(bindings.iter().map(|(_, e)| e))
                .collect(),
            ExprKind::ListInit { new, items, .. } => {
                std::iter::once(&**new).chain(items.iter()).collect()
            }
            ExprKind::NewArrayBounds { bounds, .. } => bounds.iter().collect(),
            ExprKind::NewArrayInit { items, .. } => items.iter().collect(),
            ExprKind::Member { target, .. } => target.iter().map(|t| &**t).collect(),
            ExprKind::ArrayIndex { array, indices } => {
                std::iter::once(&**array).chain(indices.iter()).collect()
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => vec![&**test, &**if_true, &**if_false],
            ExprKind::Assign { target, value } => vec![&**target, &**value],
            ExprKind::Block { body, .. } => body.iter().collect(),
            ExprKind::Loop { body, .. } => vec![&**body],
            ExprKind::Goto { value, .. } => value.iter().map(|v| &**v).collect(),
            ExprKind::Label { default, .. } => default.iter().map(|d| &**d).collect(),
            ExprKind::Switch {
                value,
                cases,
                default,
            } => {
                let mut children: Vec<&Expr> = vec![&**value];
                for case in cases {
                    children.extend(case.tests.iter());
                    children.push(&case.body);
                }
                children.extend(default.iter().map(|d| &**d));
                children
            }
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => {
                let mut children: Vec<&Expr> = vec![&**body];
                children.extend(handlers.iter().map(|h| &h.body));
                children.extend(finally.iter().map(|f| &**f));
                children
            }
            ExprKind::Throw(value) => value.iter().map(|v| &**v).collect(),
            ExprKind::Lambda(lambda) => vec![&lambda.body],
        }
    }

    /// Rebuild this node with every child passed through `f`.  The node type
    /// and all non-expression payload are kept.
    pub fn map_children<F>(&self, mut f: F) -> Result<Expr>
    where
        F: FnMut(&Expr) -> Result<Expr>,
    {
        let map_box = |e: &Expr, f: &mut F| -> Result<Box<Expr>> { Ok(boxed(f(e)?)) };

        let kind = match &self.kind {
            ExprKind::Constant(_) | ExprKind::Default | ExprKind::Parameter(_) => {
                return Ok(self.clone())
            }
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: map_box(operand, &mut f)?,
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                left: map_box(left, &mut f)?,
                right: map_box(right, &mut f)?,
            },
            ExprKind::Convert(operand) => ExprKind::Convert(map_box(operand, &mut f)?),
            ExprKind::TypeAs(operand) => ExprKind::TypeAs(map_box(operand, &mut f)?),
            ExprKind::TypeIs { operand, target } => ExprKind::TypeIs {
                operand: map_box(operand, &mut f)?,
                target: target.clone(),
            },
            ExprKind::Call {
                method,
                receiver,
                args,
                type_args,
            } => ExprKind::Call {
                method: method.clone(),
                receiver: match receiver {
                    Some(r) => Some(map_box(r, &mut f)?),
                    None => None,
                },
                args: args.iter().map(&mut f).collect::<Result<_>>()?,
                type_args: type_args.clone(),
            },
            ExprKind::Invoke { target, args } => ExprKind::Invoke {
                target: map_box(target, &mut f)?,
                args: args.iter().map(&mut f).collect::<Result<_>>()?,
            },
            ExprKind::New { ctor, args } => ExprKind::New {
                ctor: ctor.clone(),
                args: args.iter().map(&mut f).collect::<Result<_>>()?,
            },
            ExprKind::MemberInit { new, bindings } => ExprKind::MemberInit {
                new: map_box(new, &mut f)?,
                bindings: bindings
                    .iter()
                    .map(|(m, e)| Ok((m.clone(), f(e)?)))
                    .collect::<Result<_>>()?,
            },
            ExprKind::ListInit { new, add, items } => ExprKind::ListInit {
                new: map_box(new, &mut f)?,
                add: add.clone(),
                items: items.iter().map(&mut f).collect::<Result<_>>()?,
            },
            ExprKind::NewArrayBounds { element, bounds } => ExprKind::NewArrayBounds {
                element: element.clone(),
                bounds: bounds.iter().map(&mut f).collect::<Result<_>>()?,
            },
            ExprKind::NewArrayInit { element, items } => ExprKind::NewArrayInit {
                element: element.clone(),
                items: items.iter().map(&mut f).collect::<Result<_>>()?,
            },
            ExprKind::Member {
                target,
                member,
                owner,
            } => ExprKind::Member {
                target: match target {
                    Some(t) => Some(map_box(t, &mut f)?),
                    None => None,
                },
                member: member.clone(),
                owner: owner.clone(),
            },
            ExprKind::ArrayIndex { array, indices } => ExprKind::ArrayIndex {
                array: map_box(array, &mut f)?,
                indices: indices.iter().map(&mut f).collect::<Result<_>>()?,
            },
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => ExprKind::Conditional {
                test: map_box(test, &mut f)?,
                if_true: map_box(if_true, &mut f)?,
                if_false: map_box(if_false, &mut f)?,
            },
            ExprKind::Assign { target, value } => ExprKind::Assign {
                target: map_box(target, &mut f)?,
                value: map_box(value, &mut f)?,
            },
            ExprKind::Block { variables, body } => ExprKind::Block {
                variables: variables.clone(),
                body: body.iter().map(&mut f).collect::<Result<_>>()?,
            },
            ExprKind::Loop {
                body,
                break_label,
                continue_label,
            } => ExprKind::Loop {
                body: map_box(body, &mut f)?,
                break_label: break_label.clone(),
                continue_label: continue_label.clone(),
            },
            ExprKind::Goto {
                kind,
                target,
                value,
            } => ExprKind::Goto {
                kind: *kind,
                target: target.clone(),
                value: match value {
                    Some(v) => Some(map_box(v, &mut f)?),
                    None => None,
                },
            },
            ExprKind::Label { target, default } => ExprKind::Label {
                target: target.clone(),
                default: match default {
                    Some(d) => Some(map_box(d, &mut f)?),
                    None => None,
                },
            },
            ExprKind::Switch {
                value,
                cases,
                default,
            } => ExprKind::Switch {
                value: map_box(value, &mut f)?,
                cases: cases
                    .iter()
                    .map(|case| {
                        Ok(SwitchCase {
                            tests: case.tests.iter().map(&mut f).collect::<Result<_>>()?,
                            body: f(&case.body)?,
                        })
                    })
                    .collect::<Result<_>>()?,
                default: match default {
                    Some(d) => Some(map_box(d, &mut f)?),
                    None => None,
                },
            },
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => ExprKind::Try {
                body: map_box(body, &mut f)?,
                handlers: handlers
                    .iter()
                    .map(|h| {
                        Ok(CatchBlock {
                            ty: h.ty.clone(),
                            variable: h.variable.clone(),
                            body: f(&h.body)?,
                        })
                    })
                    .collect::<Result<_>>()?,
                finally: match finally {
                    Some(fin) => Some(map_box(fin, &mut f)?),
                    None => None,
                },
            },
            ExprKind::Throw(value) => ExprKind::Throw(match value {
                Some(v) => Some(map_box(v, &mut f)?),
                None => None,
            }),
            ExprKind::Lambda(lambda) => ExprKind::Lambda(Box::new(Lambda {
                params: lambda.params.clone(),
                body: f(&lambda.body)?,
                ret: lambda.ret.clone(),
            })),
        };

        Ok(Expr::new(kind, self.ty.clone()))
    }

    /// Replace references to the variables in `map` (by id).
    pub fn substitute(&self, map: &HashMap<usize, Expr>) -> Expr {
        if let ExprKind::Parameter(v) = &self.kind {
            return map.get(&v.id).cloned().unwrap_or_else(|| self.clone());
        }

        match self.map_children(|child| Ok(child.substitute(map))) {
            Ok(expr) => expr,
            Err(_) => self.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed construction of operators
// ─────────────────────────────────────────────────────────────────────────────

/// Numeric kind an operand contributes to promotion (`char` acts as `ushort`).
fn operand_kind(ty: &Type) -> Option<NumericKind> {
    match ty.underlying() {
        Type::Numeric(kind) => Some(*kind),
        Type::Char => Some(NumericKind::UShort),
        _ => None,
    }
}

fn lifted(kind: NumericKind, nullable: bool) -> Type {
    if nullable {
        Type::Nullable(Box::new(Type::Numeric(kind)))
    } else {
        Type::Numeric(kind)
    }
}

fn operand_mismatch(op: &str, left: &Type, right: &Type, offset: usize) -> CompileError {
    CompileError::mismatch(
        offset,
        format!("Operator '{}' cannot be applied to operands of type '{}' and '{}'", op, left, right),
    )
}

/// Binary operator node with operand promotion and result typing.
pub fn binary(op: BinaryOp, left: Expr, right: Expr, offset: usize) -> Result<Expr> {
    let nullable = matches!(left.ty, Type::Nullable(_)) || matches!(right.ty, Type::Nullable(_));
    let kinds = (operand_kind(&left.ty), operand_kind(&right.ty));
    let mismatch = || operand_mismatch(op.symbol(), &left.ty, &right.ty, offset);

    match op {
        BinaryOp::Add if left.ty == Type::String || right.ty == Type::String => {
            Ok(Expr::binary_node(op, left, right, Type::String))
        }
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
            let (Some(l), Some(r)) = kinds else {
                return Err(mismatch());
            };
            let ty = lifted(NumericKind::promote(l, r), nullable);
            Ok(Expr::binary_node(op, left.convert(&ty), right.convert(&ty), ty))
        }
        BinaryOp::Power => {
            if kinds.0.is_none() || kinds.1.is_none() {
                return Err(mismatch());
            }
            let ty = Type::DOUBLE;
            Ok(Expr::binary_node(op, left.convert(&ty), right.convert(&ty), ty))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::ExclusiveOr => {
            if left.ty.underlying() == &Type::Bool && right.ty.underlying() == &Type::Bool {
                let ty = if nullable {
                    Type::nullable(Type::Bool)
                } else {
                    Type::Bool
                };
                return Ok(Expr::binary_node(op, left.convert(&ty), right.convert(&ty), ty));
            }
            match kinds {
                (Some(l), Some(r)) if l.is_integral() && r.is_integral() => {
                    let ty = lifted(NumericKind::promote(l, r), nullable);
                    Ok(Expr::binary_node(op, left.convert(&ty), right.convert(&ty), ty))
                }
                _ => Err(mismatch()),
            }
        }
        BinaryOp::LeftShift | BinaryOp::RightShift => match kinds {
            (Some(l), Some(r)) if l.is_integral() && r.is_integral() => {
                let ty = lifted(l.promote_unary(), nullable);
                Ok(Expr::binary_node(op, left.convert(&ty), right.convert(&Type::INT), ty))
            }
            _ => Err(mismatch()),
        },
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            if left.ty == Type::Bool && right.ty == Type::Bool {
                Ok(Expr::binary_node(op, left, right, Type::Bool))
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            if let (Some(l), Some(r)) = kinds {
                let operand = lifted(NumericKind::promote(l, r), nullable);
                return Ok(Expr::binary_node(
                    op,
                    left.convert(&operand),
                    right.convert(&operand),
                    Type::Bool,
                ));
            }
            let comparable = left.ty == right.ty
                || (left.ty == Type::Null && right.ty.accepts_null())
                || (right.ty == Type::Null && left.ty.accepts_null())
                || (left.ty.is_reference() && right.ty.is_reference())
                || left.ty.underlying() == right.ty.underlying();
            if comparable {
                Ok(Expr::binary_node(op, left, right, Type::Bool))
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let (Some(l), Some(r)) = kinds else {
                return Err(mismatch());
            };
            let operand = lifted(NumericKind::promote(l, r), nullable);
            Ok(Expr::binary_node(
                op,
                left.convert(&operand),
                right.convert(&operand),
                Type::Bool,
            ))
        }
        BinaryOp::Coalesce => {
            if !left.ty.accepts_null() {
                return Err(mismatch());
            }
            let ty = match &left.ty {
                Type::Nullable(inner) if right.ty.underlying() == &**inner => right.ty.clone(),
                Type::Nullable(inner) if operand_kind(&right.ty).is_some() => (**inner).clone(),
                other => other.clone(),
            };
            let right = right.coerce(&ty);
            Ok(Expr::binary_node(op, left, right, ty))
        }
    }
}

/// Unary operator node with operand promotion.
pub fn unary(op: UnaryOp, operand: Expr, offset: usize) -> Result<Expr> {
    let mismatch = |ty: &Type| {
        CompileError::mismatch(
            offset,
            format!("Operator '{}' cannot be applied to operand of type '{}'", op.symbol(), ty),
        )
    };
    let nullable = matches!(operand.ty, Type::Nullable(_));

    match op {
        UnaryOp::Negate | UnaryOp::UnaryPlus => {
            let kind = operand_kind(&operand.ty).ok_or_else(|| mismatch(&operand.ty))?;
            let mut promoted = kind.promote_unary();
            if op == UnaryOp::Negate && promoted == NumericKind::UInt {
                promoted = NumericKind::Long;
            }
            let ty = lifted(promoted, nullable);
            Ok(Expr::unary_node(op, operand.convert(&ty), ty))
        }
        UnaryOp::Not => {
            if operand.ty.underlying() == &Type::Bool {
                let ty = operand.ty.clone();
                Ok(Expr::unary_node(op, operand, ty))
            } else {
                Err(mismatch(&operand.ty))
            }
        }
        UnaryOp::OnesComplement => match operand_kind(&operand.ty) {
            Some(kind) if kind.is_integral() => {
                let ty = lifted(kind.promote_unary(), nullable);
                Ok(Expr::unary_node(op, operand.convert(&ty), ty))
            }
            _ => Err(mismatch(&operand.ty)),
        },
        UnaryOp::ArrayLength => match operand.ty {
            Type::Array { rank: 1, .. } => Ok(Expr::unary_node(op, operand, Type::INT)),
            _ => Err(mismatch(&operand.ty)),
        },
        UnaryOp::PreIncrement
        | UnaryOp::PreDecrement
        | UnaryOp::PostIncrement
        | UnaryOp::PostDecrement => {
            if operand_kind(&operand.ty).is_none() {
                return Err(mismatch(&operand.ty));
            }
            if !operand.is_assignable() {
                return Err(CompileError::invalid(
                    offset,
                    "The operand of an increment or decrement operator must be a variable, field or indexer",
                ));
            }
            let ty = operand.ty.clone();
            Ok(Expr::unary_node(op, operand, ty))
        }
    }
}

/// Explicit cast `(T)e`.
pub fn cast(operand: Expr, target: &Type, offset: usize) -> Result<Expr> {
    let from = operand.ty.clone();
    let numeric_like = |t: &Type| operand_kind(t).is_some();

    let allowed = from == *target
        || (numeric_like(&from) && numeric_like(target))
        || (from == Type::Null && target.accepts_null())
        || from.underlying() == target.underlying()
        || matches!(from, Type::Object)
        || matches!(target, Type::Object)
        || (from.is_reference() && target.is_reference());

    if !allowed {
        return Err(CompileError::mismatch(
            offset,
            format!("Cannot convert type '{}' to '{}'", from, target),
        ));
    }

    Ok(operand.convert(target))
}

/// Common type of the two arms of `?:`.
pub fn conditional(test: Expr, if_true: Expr, if_false: Expr, offset: usize) -> Result<Expr> {
    if test.ty != Type::Bool {
        return Err(CompileError::mismatch(
            offset,
            format!("Cannot implicitly convert type '{}' to 'bool'", test.ty),
        ));
    }

    let (a, b) = (&if_true.ty, &if_false.ty);
    let ty = if a == b {
        a.clone()
    } else if let (Some(l), Some(r)) = (operand_kind(a), operand_kind(b)) {
        let nullable = matches!(a, Type::Nullable(_)) || matches!(b, Type::Nullable(_));
        lifted(NumericKind::promote(l, r), nullable)
    } else if *a == Type::Null && b.accepts_null() {
        b.clone()
    } else if *b == Type::Null && a.accepts_null() {
        a.clone()
    } else if *a == Type::Null {
        Type::nullable(b.clone())
    } else if *b == Type::Null {
        Type::nullable(a.clone())
    } else if a.is_reference() && b.is_reference() {
        Type::Object
    } else {
        return Err(CompileError::mismatch(
            offset,
            format!("No implicit conversion between '{}' and '{}'", a, b),
        ));
    };

    let if_true = if_true.coerce(&ty);
    let if_false = if_false.coerce(&ty);
    Ok(Expr::conditional_node(test, if_true, if_false, ty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_inserts_conversions() {
        let x = Variable::new("x", Type::INT);
        let sum = binary(
            BinaryOp::Add,
            Expr::parameter(&x),
            Expr::number(Number::Double(1.5)),
            0,
        )
        .unwrap();

        assert_eq!(sum.ty, Type::DOUBLE);
        match &sum.kind {
            ExprKind::Binary { left, .. } => assert!(matches!(left.kind, ExprKind::Convert(_))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn conditional_with_null_arm_lifts_value_types() {
        let e = conditional(
            Expr::boolean(true),
            Expr::number(Number::Int(1)),
            Expr::null(),
            0,
        )
        .unwrap();
        assert_eq!(e.ty, Type::nullable(Type::INT));
    }

    #[test]
    fn substitution_replaces_by_identity() {
        let x = Variable::new("x", Type::DOUBLE);
        let body = binary(BinaryOp::Multiply, Expr::parameter(&x), Expr::parameter(&x), 0).unwrap();
        let mut map = HashMap::new();
        map.insert(x.id, Expr::number(Number::Double(3.0)));
        let replaced = body.substitute(&map);
        assert!(replaced.children().iter().all(|c| c.is_number(3.0)));
    }
}
