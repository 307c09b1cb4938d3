//! Text rendering of expression trees.
//!
//! *Source* mode prints fully parenthesised expression text that parses back
//! to an equivalent tree (statement forms use a readable pseudo-syntax).
//! *Canonical* mode replaces bound variables by their binder position
//! (`$depth.index`) and numbers by their value, so alpha-equivalent trees print
//! identically; it feeds [`crate::equality::hash`].

use std::fmt::Write;

use crate::expr::{Expr, ExprKind, GotoKind, Lambda, UnaryOp, Variable};
use crate::number::Number;
use crate::types::Type;
use crate::value::Constant;

pub struct Printer {
    canonical: bool,
    binders: Vec<Vec<usize>>,
    out: String,
}

/// Expression text that re-parses to the same tree.
pub fn to_source(expr: &Expr) -> String {
    let mut printer = Printer::new(false);
    printer.expr(expr);
    printer.out
}

/// Binder-position form used for hashing.
pub fn to_canonical(expr: &Expr) -> String {
    let mut printer = Printer::new(true);
    printer.expr(expr);
    printer.out
}

impl Printer {
    fn new(canonical: bool) -> Self {
        Printer {
            canonical,
            binders: Vec::new(),
            out: String::new(),
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn variable(&mut self, v: &Variable) {
        if self.canonical {
            for (depth, frame) in self.binders.iter().enumerate().rev() {
                if let Some(index) = frame.iter().position(|id| *id == v.id) {
                    let _ = write!(self.out, "${}.{}", depth, index);
                    return;
                }
            }
        }
        self.push(&v.name);
    }

    fn list(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(item);
        }
    }

    fn ty(&mut self, ty: &Type) {
        let _ = write!(self.out, "{}", ty);
    }

    fn constant(&mut self, c: &Constant) {
        match c {
            Constant::Null => self.push("null"),
            Constant::Bool(b) => self.push(if *b { "true" } else { "false" }),
            Constant::Char(ch) => {
                let _ = write!(self.out, "'{}'", escape(&ch.to_string(), '\''));
            }
            Constant::Str(s) => {
                let _ = write!(self.out, "\"{}\"", escape(s, '"'));
            }
            Constant::Number(n) if self.canonical => {
                let value = n.to_f64();
                // -0.0 and 0.0 are equivalent constants
                let value = if value == 0.0 { 0.0 } else { value };
                let _ = write!(self.out, "{}", value);
            }
            Constant::Number(n) => self.number(n),
        }
    }

    fn number(&mut self, n: &Number) {
        let text = match *n {
            Number::Byte(v) => format!("((byte){})", v),
            Number::Short(v) => format!("((short){})", v),
            Number::UShort(v) => format!("((ushort){})", v),
            Number::Int(v) => v.to_string(),
            Number::UInt(v) => format!("{}u", v),
            Number::Long(v) => format!("{}L", v),
            Number::ULong(v) => format!("{}UL", v),
            Number::Float(v) => special(v as f64, "float").unwrap_or_else(|| format!("{:?}f", v)),
            Number::Double(v) => special(v, "double").unwrap_or_else(|| format!("{:?}", v)),
            Number::Decimal(v) => format!("{:?}m", v),
        };
        // A negative literal is an operand of unary minus when parsed back.
        if text.starts_with('-') {
            let _ = write!(self.out, "({})", text);
        } else {
            self.push(&text);
        }
    }

    fn lambda(&mut self, lambda: &Lambda) {
        self.push("(");
        for (i, p) in lambda.params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ty(&p.ty);
            self.push(" ");
            if self.canonical {
                let _ = write!(self.out, "${}.{}", self.binders.len(), i);
            } else {
                self.push(&p.name);
            }
        }
        self.push(") => ");

        self.binders.push(lambda.params.iter().map(|p| p.id).collect());
        self.expr(&lambda.body);
        self.binders.pop();
    }

    pub fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Constant(c) => self.constant(c),
            ExprKind::Default => {
                self.push("default(");
                self.ty(&expr.ty);
                self.push(")");
            }
            ExprKind::Parameter(v) => self.variable(v),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::ArrayLength => {
                    self.expr(operand);
                    self.push(".Length");
                }
                UnaryOp::PostIncrement | UnaryOp::PostDecrement => {
                    self.push("(");
                    self.expr(operand);
                    self.push(op.symbol());
                    self.push(")");
                }
                _ => {
                    self.push("(");
                    self.push(op.symbol());
                    self.expr(operand);
                    self.push(")");
                }
            },
            ExprKind::Binary { op, left, right } => {
                self.push("(");
                self.expr(left);
                let _ = write!(self.out, " {} ", op.symbol());
                self.expr(right);
                self.push(")");
            }
            ExprKind::Convert(operand) => {
                self.push("((");
                self.ty(&expr.ty);
                self.push(")");
                self.expr(operand);
                self.push(")");
            }
            ExprKind::TypeIs { operand, target } => {
                self.push("(");
                self.expr(operand);
                self.push(" is ");
                self.ty(target);
                self.push(")");
            }
            ExprKind::TypeAs(operand) => {
                self.push("(");
                self.expr(operand);
                self.push(" as ");
                self.ty(&expr.ty);
                self.push(")");
            }
            ExprKind::Call {
                method,
                receiver,
                args,
                type_args,
            } => {
                if let Some(receiver) = receiver {
                    match method.name.as_str() {
                        "get_Item" => {
                            self.expr(receiver);
                            self.push("[");
                            self.list(args);
                            self.push("]");
                            return;
                        }
                        "set_Item" if !args.is_empty() => {
                            self.push("(");
                            self.expr(receiver);
                            self.push("[");
                            self.list(&args[..args.len() - 1]);
                            self.push("] = ");
                            self.expr(&args[args.len() - 1]);
                            self.push(")");
                            return;
                        }
                        _ => {
                            self.expr(receiver);
                            self.push(".");
                        }
                    }
                } else {
                    self.ty(&method.declaring);
                    self.push(".");
                }
                self.push(&method.name);
                if !type_args.is_empty() {
                    let _ = write!(self.out, "<{}>", crate::types::join(type_args));
                }
                self.push("(");
                self.list(args);
                self.push(")");
            }
            ExprKind::Invoke { target, args } => {
                self.expr(target);
                self.push("(");
                self.list(args);
                self.push(")");
            }
            ExprKind::New { args, .. } => {
                self.push("new ");
                self.ty(&expr.ty);
                self.push("(");
                self.list(args);
                self.push(")");
            }
            ExprKind::MemberInit { new, bindings } => {
                self.expr(new);
                self.push(" { ");
                for (i, (member, value)) in bindings.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push(&member.name);
                    self.push(" = ");
                    self.expr(value);
                }
                self.push(" }");
            }
            ExprKind::ListInit { new, items, .. } => {
                self.expr(new);
                self.push(" { ");
                self.list(items);
                self.push(" }");
            }
            ExprKind::NewArrayBounds { element, bounds } => {
                self.push("new ");
                self.ty(element);
                self.push("[");
                self.list(bounds);
                self.push("]");
            }
            ExprKind::NewArrayInit { element, items } => {
                self.push("new ");
                self.ty(element);
                self.push("[] { ");
                self.list(items);
                self.push(" }");
            }
            ExprKind::Member {
                target,
                member,
                owner,
            } => {
                match target {
                    Some(t) => self.expr(t),
                    None => self.ty(owner),
                }
                self.push(".");
                self.push(&member.name);
            }
            ExprKind::ArrayIndex { array, indices } => {
                self.expr(array);
                self.push("[");
                self.list(indices);
                self.push("]");
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                if expr.ty == Type::Void {
                    self.push("if (");
                    self.expr(test);
                    self.push(") ");
                    self.expr(if_true);
                    self.push(" else ");
                    self.expr(if_false);
                    return;
                }
                self.push("(");
                self.expr(test);
                self.push(" ? ");
                self.expr(if_true);
                self.push(" : ");
                self.expr(if_false);
                self.push(")");
            }
            ExprKind::Assign { target, value } => {
                self.push("(");
                self.expr(target);
                self.push(" = ");
                self.expr(value);
                self.push(")");
            }
            ExprKind::Block { variables, body } => {
                self.push("{ ");
                self.binders.push(variables.iter().map(|v| v.id).collect());
                for (i, v) in variables.iter().enumerate() {
                    self.ty(&v.ty);
                    self.push(" ");
                    if self.canonical {
                        let _ = write!(self.out, "${}.{}", self.binders.len() - 1, i);
                    } else {
                        self.push(&v.name);
                    }
                    self.push("; ");
                }
                for statement in body {
                    self.expr(statement);
                    self.push("; ");
                }
                self.binders.pop();
                self.push("}");
            }
            ExprKind::Loop {
                body,
                break_label,
                continue_label,
            } => {
                self.push("loop ");
                self.expr(body);
                let _ = write!(self.out, " {}:", break_label.name);
                if let Some(c) = continue_label {
                    let _ = write!(self.out, " /{}", c.name);
                }
            }
            ExprKind::Goto {
                kind,
                target,
                value,
            } => {
                let word = match kind {
                    GotoKind::Goto => "goto",
                    GotoKind::Break => "break",
                    GotoKind::Continue => "continue",
                    GotoKind::Return => "return",
                };
                self.push(word);
                if *kind == GotoKind::Goto {
                    let _ = write!(self.out, " {}", target.name);
                }
                if let Some(v) = value {
                    self.push(" ");
                    self.expr(v);
                }
            }
            ExprKind::Label { target, default } => {
                let _ = write!(self.out, "{}:", target.name);
                if let Some(d) = default {
                    self.push(" ");
                    self.expr(d);
                }
            }
            ExprKind::Switch {
                value,
                cases,
                default,
            } => {
                self.push("switch (");
                self.expr(value);
                self.push(") { ");
                for case in cases {
                    for test in &case.tests {
                        self.push("case ");
                        self.expr(test);
                        self.push(": ");
                    }
                    self.expr(&case.body);
                    self.push(" ");
                }
                if let Some(d) = default {
                    self.push("default: ");
                    self.expr(d);
                    self.push(" ");
                }
                self.push("}");
            }
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => {
                self.push("try ");
                self.expr(body);
                for handler in handlers {
                    self.push(" catch (");
                    self.ty(&handler.ty);
                    match &handler.variable {
                        Some(v) => {
                            self.push(" ");
                            if self.canonical {
                                let _ = write!(self.out, "${}.0", self.binders.len());
                            } else {
                                self.push(&v.name);
                            }
                            self.push(") ");
                            self.binders.push(vec![v.id]);
                            self.expr(&handler.body);
                            self.binders.pop();
                        }
                        None => {
                            self.push(") ");
                            self.expr(&handler.body);
                        }
                    }
                }
                if let Some(f) = finally {
                    self.push(" finally ");
                    self.expr(f);
                }
            }
            ExprKind::Throw(value) => {
                self.push("throw");
                if let Some(v) = value {
                    self.push(" ");
                    self.expr(v);
                }
            }
            ExprKind::Lambda(lambda) => self.lambda(lambda),
        }
    }
}

fn special(v: f64, prefix: &str) -> Option<String> {
    if v.is_nan() {
        Some(format!("{}.NaN", prefix))
    } else if v.is_infinite() && v > 0.0 {
        Some(format!("{}.PositiveInfinity", prefix))
    } else if v.is_infinite() {
        Some(format!("{}.NegativeInfinity", prefix))
    } else {
        None
    }
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{binary, BinaryOp};

    #[test]
    fn numbers_keep_their_width() {
        assert_eq!(to_source(&Expr::number(Number::Double(8.0))), "8.0");
        assert_eq!(to_source(&Expr::number(Number::Long(3))), "3L");
        assert_eq!(to_source(&Expr::number(Number::Int(-2))), "(-2)");
    }

    #[test]
    fn canonical_form_ignores_parameter_names() {
        let make = |name: &str| {
            let v = Variable::new(name, Type::DOUBLE);
            let body = binary(BinaryOp::Add, Expr::parameter(&v), Expr::number(Number::Double(1.0)), 0).unwrap();
            Expr::lambda(Lambda {
                params: vec![v],
                body,
                ret: Type::DOUBLE,
            })
        };
        assert_eq!(to_canonical(&make("x")), to_canonical(&make("y")));
        assert_ne!(to_source(&make("x")), to_source(&make("y")));
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(to_source(&Expr::string("a\"b\n")), "\"a\\\"b\\n\"");
    }
}
