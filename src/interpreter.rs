//! Tree-walking evaluator: the host "compile into a callable" facility.
//!
//! [`CompiledLambda`] wraps a typed lambda and evaluates its body against an
//! [`Environment`] on every call.  Control flow (jumps to labels, `throw`) is
//! carried through the `Err` side of [`Flow`] and caught by the block, loop or
//! `try` that owns the destination.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, info, trace};
use thiserror::Error;

use crate::builtins::record_fields;
use crate::catalog::{MemberDef, MemberKind, MethodDef, Native};
use crate::environment::Environment;
use crate::error::{CompileError, Result};
use crate::expr::{BinaryOp, CatchBlock, Expr, ExprKind, Lambda, UnaryOp};
use crate::number::{ArithOp, Number, NumericKind};
use crate::resolver::Resolver;
use crate::types::Type;
use crate::value::{ArrayValue, Value};

#[derive(Error, Debug)]
enum Signal {
    #[error(transparent)]
    Fault(#[from] CompileError),

    #[error("Jump to label {label}")]
    Jump { label: usize, value: Option<Value> },

    #[error("Thrown: {0}")]
    Throw(Value),
}

/// Evaluation result inside the interpreter.
type Flow<T> = std::result::Result<T, Signal>;

/// A lambda ready to be invoked.
pub struct CompiledLambda {
    lambda: Rc<Lambda>,
    resolver: Arc<Resolver>,
}

impl CompiledLambda {
    pub fn new(lambda: Lambda, resolver: Arc<Resolver>) -> Self {
        info!("Compiled lambda with {} parameters", lambda.params.len());

        CompiledLambda {
            lambda: Rc::new(lambda),
            resolver,
        }
    }

    pub fn arity(&self) -> usize {
        self.lambda.params.len()
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        let closure = Rc::new(RefCell::new(Environment::new()));
        call(&self.resolver, &self.lambda, closure, args)
    }
}

/// Run `lambda` with `args` in a fresh scope chained to `closure`.
fn call(resolver: &Arc<Resolver>, lambda: &Rc<Lambda>, closure: Rc<RefCell<Environment>>, args: &[Value]) -> Result<Value> {
    if args.len() != lambda.params.len() {
        return Err(CompileError::runtime(format!(
            "Lambda expects {} arguments, got {}",
            lambda.params.len(),
            args.len()
        )));
    }

    let mut scope = Environment::with_enclosing(closure);
    for (param, arg) in lambda.params.iter().zip(args) {
        scope.define(param, arg.convert_to(&param.ty)?);
    }

    debug!("Invoking lambda with {} arguments", args.len());

    let mut interpreter = Interpreter {
        resolver: resolver.clone(),
        environment: Rc::new(RefCell::new(scope)),
        handling: Vec::new(),
    };

    match interpreter.evaluate(&lambda.body) {
        Ok(value) if lambda.ret == Type::Void => {
            trace!("Action returned {}", value);
            Ok(Value::Null)
        }
        Ok(value) => Ok(value.convert_to(&lambda.ret)?),
        Err(Signal::Fault(e)) => Err(e),
        Err(Signal::Throw(value)) => Err(CompileError::Thrown(value.to_string())),
        Err(Signal::Jump { label, .. }) => Err(CompileError::runtime(format!(
            "Jump to label {} escaped the lambda body",
            label
        ))),
    }
}

struct Interpreter {
    resolver: Arc<Resolver>,
    environment: Rc<RefCell<Environment>>,
    /// Exceptions being handled by enclosing catch clauses (for `throw;`).
    handling: Vec<Value>,
}

fn runtime<T>(message: &str) -> Flow<T> {
    Err(Signal::Fault(CompileError::runtime(message)))
}

/// Numeric kind the node computes in (lifted types use their underlying kind).
fn result_kind(ty: &Type) -> Option<NumericKind> {
    ty.underlying().numeric_kind()
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

/// Catalog type describing a runtime value, for `is`, `as` and `catch`.
fn runtime_type(value: &Value) -> Option<Type> {
    Some(match value {
        Value::Null | Value::Function(_) => return None,
        Value::Bool(_) => Type::Bool,
        Value::Char(_) => Type::Char,
        Value::Number(n) => Type::Numeric(n.kind()),
        Value::Str(_) => Type::String,
        Value::Array(a) => {
            let a = a.borrow();
            Type::Array {
                element: Box::new(a.element.clone()),
                rank: a.dims.len(),
            }
        }
        Value::List(_) => Type::named("List", vec![Type::Object]),
        Value::Object(o) => Type::named(o.borrow().type_name.clone(), Vec::new()),
        Value::Enumerator(_) => Type::named("IEnumerator", vec![Type::Object]),
    })
}

/// Exception object for a runtime failure so `catch` clauses can see it.
fn exception_for(error: &CompileError) -> Option<Value> {
    let (type_name, message) = match error {
        CompileError::Runtime(message) if message.contains("divide by zero") => {
            ("DivideByZeroException", message.clone())
        }
        CompileError::Runtime(message) | CompileError::Thrown(message) => ("Exception", message.clone()),
        _ => return None,
    };
    let mut fields = indexmap::IndexMap::new();
    fields.insert("Message".to_string(), Value::from(message));
    Some(Value::object(type_name, fields))
}

impl Interpreter {
    fn evaluate(&mut self, expr: &Expr) -> Flow<Value> {
        match &expr.kind {
            ExprKind::Constant(c) => Ok(c.to_value()),
            ExprKind::Default => Ok(Value::default_of(&expr.ty)),
            ExprKind::Parameter(v) => Ok(self.environment.borrow().get(v)?),
            ExprKind::Unary { op, operand } => self.unary(*op, operand, &expr.ty),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, &expr.ty),
            ExprKind::Convert(operand) => {
                let value = self.evaluate(operand)?;
                Ok(value.convert_to(&expr.ty)?)
            }
            ExprKind::TypeIs { operand, target } => {
                let value = self.evaluate(operand)?;
                Ok(Value::Bool(self.instance_of(&value, target)))
            }
            ExprKind::TypeAs(operand) => {
                let value = self.evaluate(operand)?;
                Ok(if self.instance_of(&value, &expr.ty) {
                    value
                } else {
                    Value::Null
                })
            }
            ExprKind::Call {
                method,
                receiver,
                args,
                ..
            } => {
                let mut values = Vec::with_capacity(args.len() + 1);
                if let Some(receiver) = receiver {
                    let target = self.evaluate(receiver)?;
                    if target.is_null() && !method.is_static {
                        return runtime("Object reference not set to an instance of an object.");
                    }
                    values.push(target);
                }
                values.extend(self.arguments(method, args)?);
                self.run_native(method, &values)
            }
            ExprKind::Invoke { target, args } => {
                let function = self.evaluate(target)?.as_function()?;
                let values = self.evaluate_all(args)?;
                Ok(function.invoke(&values)?)
            }
            ExprKind::New { ctor, args } => {
                let values = self.arguments(ctor, args)?;
                self.run_native(ctor, &values)
            }
            ExprKind::MemberInit { new, bindings } => {
                let object = self.evaluate(new)?;
                for (member, value) in bindings {
                    let value = self.evaluate(value)?;
                    self.store_member(&object, member, value)?;
                }
                Ok(object)
            }
            ExprKind::ListInit { new, add, items } => {
                let list = self.evaluate(new)?;
                for item in items {
                    let item = self.evaluate(item)?;
                    self.run_native(add, &[list.clone(), item])?;
                }
                Ok(list)
            }
            ExprKind::NewArrayBounds { element, bounds } => {
                let mut dims = Vec::with_capacity(bounds.len());
                for bound in bounds {
                    let size = self.evaluate(bound)?.as_index()?;
                    if size < 0 {
                        return runtime("Arithmetic operation resulted in an overflow.");
                    }
                    dims.push(size as usize);
                }
                let array = ArrayValue::new(element.clone(), dims);
                Ok(Value::Array(Rc::new(RefCell::new(array))))
            }
            ExprKind::NewArrayInit { element, items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item)?.convert_to(element)?);
                }
                Ok(Value::array(element.clone(), values))
            }
            ExprKind::Member { target, member, .. } => {
                let receiver = match target {
                    Some(t) => self.evaluate(t)?,
                    None => Value::Null,
                };
                self.load_member(&receiver, member)
            }
            ExprKind::ArrayIndex { array, indices } => {
                let array = self.evaluate(array)?;
                let indices = self.indices(indices)?;
                let Value::Array(array) = array else {
                    return runtime("Object reference not set to an instance of an object.");
                };
                let array = array.borrow();
                let slot = array.slot(&indices)?;
                Ok(array.items[slot].clone())
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                if self.evaluate(test)?.as_bool()? {
                    self.evaluate(if_true)
                } else {
                    self.evaluate(if_false)
                }
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.store(target, value.clone())?;
                Ok(value)
            }
            ExprKind::Block { variables, body } => {
                let mut scope = Environment::with_enclosing(self.environment.clone());
                for variable in variables {
                    scope.define(variable, Value::default_of(&variable.ty));
                }
                let scope = Rc::new(RefCell::new(scope));
                let previous = std::mem::replace(&mut self.environment, scope);
                let result = self.block(body);
                self.environment = previous;
                result.map(|value| if expr.ty == Type::Void { Value::Null } else { value })
            }
            ExprKind::Loop {
                body,
                break_label,
                continue_label,
            } => loop {
                match self.evaluate(body) {
                    Ok(_) => {}
                    Err(Signal::Jump { label, value }) if label == break_label.id => {
                        return Ok(value.unwrap_or(Value::Null));
                    }
                    Err(Signal::Jump { label, .. })
                        if continue_label.as_ref().is_some_and(|c| c.id == label) => {}
                    Err(other) => return Err(other),
                }
            },
            ExprKind::Goto { target, value, .. } => {
                let value = match value {
                    Some(v) => Some(self.evaluate(v)?),
                    None => None,
                };
                trace!("Jumping to label '{}'", target.name);
                Err(Signal::Jump {
                    label: target.id,
                    value,
                })
            }
            ExprKind::Label { default, .. } => match default {
                Some(d) => self.evaluate(d),
                None => Ok(Value::Null),
            },
            ExprKind::Switch {
                value,
                cases,
                default,
            } => {
                let selector = self.evaluate(value)?;
                for case in cases {
                    for test in &case.tests {
                        if self.evaluate(test)?.loose_eq(&selector) {
                            return self.evaluate(&case.body).map(|_| Value::Null);
                        }
                    }
                }
                match default {
                    Some(d) => self.evaluate(d).map(|_| Value::Null),
                    None => Ok(Value::Null),
                }
            }
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => {
                let outcome = match self.evaluate(body) {
                    Err(Signal::Throw(exception)) => self.handle(handlers, exception),
                    Err(Signal::Fault(error)) => match exception_for(&error) {
                        Some(exception) => self.handle(handlers, exception),
                        None => Err(Signal::Fault(error)),
                    },
                    other => other,
                };
                if let Some(finally) = finally {
                    self.evaluate(finally)?;
                }
                outcome.map(|_| Value::Null)
            }
            ExprKind::Throw(value) => {
                let exception = match value {
                    Some(v) => self.evaluate(v)?,
                    None => match self.handling.last() {
                        Some(current) => current.clone(),
                        None => return runtime("No exception to rethrow."),
                    },
                };
                if exception.is_null() {
                    return runtime("Value cannot be null.");
                }
                debug!("Throwing {}", exception);
                Err(Signal::Throw(exception))
            }
            ExprKind::Lambda(lambda) => {
                let lambda = Rc::new((**lambda).clone());
                let closure = self.environment.clone();
                let resolver = self.resolver.clone();
                let arity = lambda.params.len();
                Ok(Value::function("lambda", arity, move |args: &[Value]| {
                    call(&resolver, &lambda, closure.clone(), args)
                }))
            }
        }
    }

    fn evaluate_all(&mut self, exprs: &[Expr]) -> Flow<Vec<Value>> {
        exprs.iter().map(|e| self.evaluate(e)).collect()
    }

    /// Argument values, numeric ones brought to the width their parameter
    /// declares (folded constants may be narrower).
    fn arguments(&mut self, method: &MethodDef, args: &[Expr]) -> Flow<Vec<Value>> {
        let params = &method.params[method.params.len().saturating_sub(args.len())..];
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let value = self.evaluate(arg)?;
            let value = match params.get(i) {
                Some(param) if param.ty.is_numeric() && !value.is_null() => value.convert_to(&param.ty)?,
                _ => value,
            };
            values.push(value);
        }
        Ok(values)
    }

    fn indices(&mut self, exprs: &[Expr]) -> Flow<Vec<i64>> {
        let mut indices = Vec::with_capacity(exprs.len());
        for e in exprs {
            indices.push(self.evaluate(e)?.as_index()?);
        }
        Ok(indices)
    }

    /// Statements of a block; a jump to one of its own labels resumes right
    /// after that label.
    fn block(&mut self, body: &[Expr]) -> Flow<Value> {
        let mut last = Value::Null;
        let mut i = 0;
        while i < body.len() {
            match self.evaluate(&body[i]) {
                Ok(value) => {
                    last = value;
                    i += 1;
                }
                Err(Signal::Jump { label, value }) => {
                    let target = body
                        .iter()
                        .position(|e| matches!(&e.kind, ExprKind::Label { target, .. } if target.id == label));
                    match target {
                        Some(position) => {
                            last = value.unwrap_or(Value::Null);
                            i = position + 1;
                        }
                        None => return Err(Signal::Jump { label, value }),
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Ok(last)
    }

    fn handle(&mut self, handlers: &[CatchBlock], exception: Value) -> Flow<Value> {
        let Some(handler) = handlers.iter().find(|h| self.instance_of(&exception, &h.ty)) else {
            return Err(Signal::Throw(exception));
        };
        debug!("Caught {} as {}", exception, handler.ty);

        let mut scope = Environment::with_enclosing(self.environment.clone());
        if let Some(variable) = &handler.variable {
            scope.define(variable, exception.clone());
        }
        let previous = std::mem::replace(&mut self.environment, Rc::new(RefCell::new(scope)));
        self.handling.push(exception);
        let result = self.evaluate(&handler.body);
        self.handling.pop();
        self.environment = previous;
        result
    }

    // ── operators ────────────────────────────────────────────────────────

    fn unary(&mut self, op: UnaryOp, operand: &Expr, ty: &Type) -> Flow<Value> {
        if op.is_mutation() {
            return self.step(op, operand, ty);
        }

        let value = self.evaluate(operand)?;
        if value.is_null() {
            return Ok(Value::Null);
        }

        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.as_bool()?)),
            UnaryOp::ArrayLength => match value {
                Value::Array(a) => Ok(Value::from(a.borrow().items.len() as i32)),
                _ => runtime("Length of a non-array value"),
            },
            UnaryOp::Negate | UnaryOp::UnaryPlus | UnaryOp::OnesComplement => {
                let n = value.as_number()?;
                let kind = result_kind(ty).unwrap_or(n.kind());
                let result = match op {
                    UnaryOp::Negate => n.convert(kind).negate(),
                    UnaryOp::OnesComplement => match n.convert(kind).complement() {
                        Some(c) => c,
                        None => return runtime("Operator '~' requires an integral operand"),
                    },
                    _ => n,
                };
                Ok(Value::Number(result.convert(kind)))
            }
            _ => runtime("Unsupported unary operator"),
        }
    }

    /// `++`/`--` in prefix and postfix form.
    fn step(&mut self, op: UnaryOp, target: &Expr, ty: &Type) -> Flow<Value> {
        let old = self.evaluate(target)?;
        let n = old.as_number()?;
        let kind = result_kind(ty).unwrap_or(n.kind());
        let delta = if matches!(op, UnaryOp::PreIncrement | UnaryOp::PostIncrement) {
            ArithOp::Add
        } else {
            ArithOp::Subtract
        };
        let new = Value::Number(Number::binary(delta, n.convert(kind), Number::Int(1).convert(kind))?.convert(kind));
        let new = match old {
            Value::Char(_) => new.convert_to(&Type::Char)?,
            _ => new,
        };
        self.store(target, new.clone())?;
        Ok(match op {
            UnaryOp::PostIncrement | UnaryOp::PostDecrement => old,
            _ => new,
        })
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, ty: &Type) -> Flow<Value> {
        match op {
            BinaryOp::AndAlso => {
                return if self.evaluate(left)?.as_bool()? {
                    self.evaluate(right)
                } else {
                    Ok(Value::Bool(false))
                };
            }
            BinaryOp::OrElse => {
                return if self.evaluate(left)?.as_bool()? {
                    Ok(Value::Bool(true))
                } else {
                    self.evaluate(right)
                };
            }
            BinaryOp::Coalesce => {
                let value = self.evaluate(left)?;
                return if value.is_null() {
                    Ok(self.evaluate(right)?.convert_to(ty)?)
                } else {
                    Ok(value.convert_to(ty)?)
                };
            }
            _ => {}
        }

        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;

        match op {
            BinaryOp::Equal => return Ok(Value::Bool(l.loose_eq(&r))),
            BinaryOp::NotEqual => return Ok(Value::Bool(!l.loose_eq(&r))),
            BinaryOp::Add if *ty == Type::String => {
                return Ok(Value::from(format!("{}{}", l, r)));
            }
            _ => {}
        }

        if l.is_null() || r.is_null() {
            return Ok(if op.is_comparison() {
                Value::Bool(false)
            } else {
                Value::Null
            });
        }

        if op.is_comparison() {
            let order = Number::compare(&l.as_number()?, &r.as_number()?);
            let truth = match op {
                BinaryOp::LessThan => order == Some(Ordering::Less),
                BinaryOp::LessThanOrEqual => matches!(order, Some(Ordering::Less | Ordering::Equal)),
                BinaryOp::GreaterThan => order == Some(Ordering::Greater),
                _ => matches!(order, Some(Ordering::Greater | Ordering::Equal)),
            };
            return Ok(Value::Bool(truth));
        }

        if let (Value::Bool(a), Value::Bool(b)) = (&l, &r) {
            return match op {
                BinaryOp::And => Ok(Value::Bool(*a && *b)),
                BinaryOp::Or => Ok(Value::Bool(*a || *b)),
                BinaryOp::ExclusiveOr => Ok(Value::Bool(a != b)),
                _ => runtime("Operator cannot be applied to bool operands"),
            };
        }

        let Some(arith) = arith(op) else {
            return runtime("Unsupported binary operator");
        };
        let result = Number::binary(arith, l.as_number()?, r.as_number()?)?;
        Ok(Value::Number(match result_kind(ty) {
            Some(kind) => result.convert(kind),
            None => result,
        }))
    }

    // ── members and storage ──────────────────────────────────────────────

    fn run_native(&mut self, method: &MethodDef, args: &[Value]) -> Flow<Value> {
        trace!("Calling {}", method.signature());

        match &method.native {
            Native::Function(f) => Ok(f(args)?),
            Native::Record { type_name, fields } => {
                let mut values = record_fields(fields);
                for (param, arg) in method.params.iter().zip(args) {
                    if let Some((name, ty)) = fields.iter().find(|(name, _)| name.eq_ignore_ascii_case(&param.name)) {
                        values.insert(name.clone(), arg.convert_to(ty)?);
                    }
                }
                Ok(Value::object(type_name, values))
            }
        }
    }

    fn load_member(&self, receiver: &Value, member: &MemberDef) -> Flow<Value> {
        match &member.kind {
            MemberKind::Constant(c) => Ok(c.to_value()),
            MemberKind::Property(getter) => {
                if receiver.is_null() && !member.is_static {
                    return runtime("Object reference not set to an instance of an object.");
                }
                Ok(getter(receiver)?)
            }
            MemberKind::Field => match receiver {
                Value::Object(o) => Ok(o.borrow().fields.get(&member.name).cloned().unwrap_or(Value::Null)),
                _ => runtime("Object reference not set to an instance of an object."),
            },
        }
    }

    fn store_member(&self, receiver: &Value, member: &MemberDef, value: Value) -> Flow<()> {
        match (receiver, &member.kind) {
            (Value::Object(o), MemberKind::Field) => {
                let value = value.convert_to(&member.ty)?;
                o.borrow_mut().fields.insert(member.name.clone(), value);
                Ok(())
            }
            (Value::Null, _) => runtime("Object reference not set to an instance of an object."),
            _ => runtime(&format!("Member '{}' cannot be assigned to", member.name)),
        }
    }

    /// Write `value` into an assignable node.
    fn store(&mut self, target: &Expr, value: Value) -> Flow<()> {
        match &target.kind {
            ExprKind::Parameter(v) => {
                let value = value.convert_to(&v.ty)?;
                Ok(self.environment.borrow_mut().assign(v, value)?)
            }
            ExprKind::ArrayIndex { array, indices } => {
                let array = self.evaluate(array)?;
                let indices = self.indices(indices)?;
                let Value::Array(array) = array else {
                    return runtime("Object reference not set to an instance of an object.");
                };
                let mut array = array.borrow_mut();
                let slot = array.slot(&indices)?;
                let value = value.convert_to(&array.element)?;
                array.items[slot] = value;
                Ok(())
            }
            ExprKind::Member {
                target: Some(receiver),
                member,
                ..
            } => {
                let receiver = self.evaluate(receiver)?;
                self.store_member(&receiver, member, value)
            }
            _ => runtime("Invalid assignment target"),
        }
    }

    /// Runtime `is` test.
    fn instance_of(&self, value: &Value, target: &Type) -> bool {
        match (value, target) {
            (Value::Null, _) => false,
            (_, Type::Object) => true,
            (_, Type::Nullable(inner)) => self.instance_of(value, inner),
            (Value::Function(_), Type::Function { .. }) => true,
            _ => match (runtime_type(value), target.definition_name()) {
                (Some(actual), _) if &actual == target => true,
                (Some(actual), Some(name)) if !actual.is_numeric() => self.resolver.derives_from(&actual, name),
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Registry;
    use crate::expr::{binary, Variable};

    fn resolver() -> Arc<Resolver> {
        Arc::new(Resolver::new(Arc::new(Registry::with_builtins())))
    }

    #[test]
    fn integer_arithmetic_wraps() {
        let x = Variable::new("x", Type::INT);
        let body = binary(BinaryOp::Add, Expr::parameter(&x), Expr::number(Number::Int(1)), 0).unwrap();
        let compiled = CompiledLambda::new(
            Lambda {
                params: vec![x],
                body,
                ret: Type::INT,
            },
            resolver(),
        );
        let result = compiled.invoke(&[Value::from(i32::MAX)]).unwrap();
        assert_eq!(result, Value::from(i32::MIN));
    }

    #[test]
    fn integer_division_by_zero_is_a_runtime_error() {
        let x = Variable::new("x", Type::INT);
        let body = binary(BinaryOp::Divide, Expr::number(Number::Int(1)), Expr::parameter(&x), 0).unwrap();
        let compiled = CompiledLambda::new(
            Lambda {
                params: vec![x],
                body,
                ret: Type::INT,
            },
            resolver(),
        );
        assert!(matches!(compiled.invoke(&[Value::from(0)]), Err(CompileError::Runtime(_))));
    }

    #[test]
    fn arity_is_checked() {
        let compiled = CompiledLambda::new(
            Lambda {
                params: Vec::new(),
                body: Expr::number(Number::Int(1)),
                ret: Type::INT,
            },
            resolver(),
        );
        assert!(compiled.invoke(&[Value::from(1)]).is_err());
    }
}
