//! Runtime values produced by the evaluator and by constant folding.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{CompileError, Result};
use crate::number::{Number, NumericKind};
use crate::types::Type;

/// A value flowing through an evaluated expression.
///
/// Scalars are held inline; collections, objects and closures are shared
/// handles so that mutation through one alias is visible through all of them.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Number(Number),
    Str(Rc<str>),
    Array(Rc<RefCell<ArrayValue>>),
    List(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectValue>>),
    Enumerator(Rc<RefCell<EnumeratorState>>),
    Function(Rc<FunctionValue>),
}

/// Rectangular array: `dims` holds every dimension, `items` is row-major.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    pub element: Type,
    pub dims: Vec<usize>,
    pub items: Vec<Value>,
}

impl ArrayValue {
    pub fn new(element: Type, dims: Vec<usize>) -> Self {
        let count = dims.iter().product();
        let fill = Value::default_of(&element);
        ArrayValue {
            element,
            dims,
            items: vec![fill; count],
        }
    }

    pub fn from_items(element: Type, items: Vec<Value>) -> Self {
        ArrayValue {
            element,
            dims: vec![items.len()],
            items,
        }
    }

    /// Row-major slot for a full index tuple.
    pub fn slot(&self, indices: &[i64]) -> Result<usize> {
        if indices.len() != self.dims.len() {
            return Err(CompileError::runtime(format!(
                "Array of rank {} indexed with {} indices",
                self.dims.len(),
                indices.len()
            )));
        }

        let mut slot = 0usize;
        for (index, dim) in indices.iter().zip(&self.dims) {
            if *index < 0 || *index as usize >= *dim {
                return Err(CompileError::runtime("Index was outside the bounds of the array."));
            }
            slot = slot * dim + *index as usize;
        }

        Ok(slot)
    }
}

/// Instance of a catalog-defined record type.
#[derive(Debug, Clone)]
pub struct ObjectValue {
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

/// Cursor over a snapshot of a sequence.
#[derive(Debug, Clone)]
pub struct EnumeratorState {
    pub items: Vec<Value>,
    pub position: Option<usize>,
}

impl EnumeratorState {
    pub fn new(items: Vec<Value>) -> Self {
        EnumeratorState {
            items,
            position: None,
        }
    }

    pub fn move_next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.items.len()));
        next < self.items.len()
    }

    pub fn current(&self) -> Result<Value> {
        self.position
            .and_then(|p| self.items.get(p))
            .cloned()
            .ok_or_else(|| CompileError::runtime("Enumeration has not started or already finished."))
    }
}

/// Callable closure value (compiled lambda or native delegate).
pub struct FunctionValue {
    pub name: String,
    pub arity: usize,
    pub call: Box<dyn Fn(&[Value]) -> Result<Value>>,
}

impl FunctionValue {
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        if args.len() != self.arity {
            return Err(CompileError::runtime(format!(
                "Delegate '{}' expects {} arguments, got {}",
                self.name,
                self.arity,
                args.len()
            )));
        }
        (self.call)(args)
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}/{}>", self.name, self.arity)
    }
}

/// Thread-safe scalar used for catalog constants (`Math.PI`, `int.MaxValue`).
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Char(char),
    Number(Number),
    Str(String),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Char(c) => Value::Char(*c),
            Constant::Number(n) => Value::Number(*n),
            Constant::Str(s) => Value::from(s.as_str()),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Constant::Null => Type::Null,
            Constant::Bool(_) => Type::Bool,
            Constant::Char(_) => Type::Char,
            Constant::Number(n) => Type::Numeric(n.kind()),
            Constant::Str(_) => Type::String,
        }
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn array(element: Type, items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(ArrayValue::from_items(element, items))))
    }

    pub fn object(type_name: &str, fields: IndexMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(ObjectValue {
            type_name: type_name.to_string(),
            fields,
        })))
    }

    pub fn function<F>(name: &str, arity: usize, call: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Value::Function(Rc::new(FunctionValue {
            name: name.to_string(),
            arity,
            call: Box::new(call),
        }))
    }

    /// Zero value of a type (`default(T)`).
    pub fn default_of(ty: &Type) -> Value {
        match ty {
            Type::Numeric(kind) => Value::Number(Number::Int(0).convert(*kind)),
            Type::Bool => Value::Bool(false),
            Type::Char => Value::Char('\0'),
            _ => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short description used in runtime diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Number(n) => n.kind().to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Array(a) => format!("{}[]", a.borrow().element),
            Value::List(_) => "List".to_string(),
            Value::Object(o) => o.borrow().type_name.clone(),
            Value::Enumerator(_) => "IEnumerator".to_string(),
            Value::Function(f) => format!("Func<{}>", f.arity),
        }
    }

    /// Catalog definition name of the runtime type, for `is`/`as`/`catch`.
    pub fn definition_name(&self) -> Option<String> {
        let name = match self {
            Value::Null => return None,
            Value::Bool(_) => "Boolean".to_string(),
            Value::Char(_) => "Char".to_string(),
            Value::Number(n) => n.kind().system_name().to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Object(o) => o.borrow().type_name.clone(),
            Value::Enumerator(_) => "IEnumerator".to_string(),
            Value::Function(_) => return None,
        };
        Some(name)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(CompileError::runtime(format!(
                "Expected bool, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_number(&self) -> Result<Number> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Char(c) => Ok(Number::UShort(*c as u32 as u16)),
            other => Err(CompileError::runtime(format!(
                "Expected a number, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.as_number().map(|n| n.to_f64())
    }

    pub fn as_index(&self) -> Result<i64> {
        let n = self.as_number()?;
        n.to_i128()
            .map(|i| i as i64)
            .ok_or_else(|| CompileError::runtime("Index must be an integral value"))
    }

    pub fn as_str(&self) -> Result<Rc<str>> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => Err(CompileError::runtime(format!(
                "Expected string, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_function(&self) -> Result<Rc<FunctionValue>> {
        match self {
            Value::Function(f) => Ok(f.clone()),
            other => Err(CompileError::runtime(format!(
                "Expected a delegate, found {}",
                other.type_name()
            ))),
        }
    }

    /// Items of any enumerable value, snapshotted.
    pub fn items(&self) -> Result<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Array(array) => Ok(array.borrow().items.clone()),
            Value::Str(s) => Ok(s.chars().map(Value::Char).collect()),
            Value::Enumerator(e) => Ok(e.borrow().items.clone()),
            Value::Null => Err(CompileError::runtime("Value cannot be null.")),
            other => Err(CompileError::runtime(format!(
                "{} is not enumerable",
                other.type_name()
            ))),
        }
    }

    /// Conversion applied when a value is stored into a slot of type `ty`.
    pub fn convert_to(&self, ty: &Type) -> Result<Value> {
        match (ty, self) {
            (_, Value::Null) => Ok(Value::Null),
            (Type::Nullable(inner), value) => value.convert_to(inner),
            (Type::Numeric(kind), Value::Number(n)) => Ok(Value::Number(n.convert(*kind))),
            (Type::Numeric(kind), Value::Char(c)) => {
                Ok(Value::Number(Number::UInt(*c as u32).convert(*kind)))
            }
            (Type::Char, Value::Number(n)) => {
                let code = n.convert(NumericKind::UInt).to_i128().unwrap_or(0) as u32;
                char::from_u32(code)
                    .map(Value::Char)
                    .ok_or_else(|| CompileError::runtime(format!("Invalid char code {}", code)))
            }
            (_, value) => Ok(value.clone()),
        }
    }

    /// Language-level `==`: numbers compare across widths, reference values
    /// compare by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                Number::compare(a, b) == Some(std::cmp::Ordering::Equal)
            }
            (Value::Char(_), Value::Number(_)) | (Value::Number(_), Value::Char(_)) => {
                match (self.as_number(), other.as_number()) {
                    (Ok(a), Ok(b)) => Number::compare(&a, &b) == Some(std::cmp::Ordering::Equal),
                    _ => false,
                }
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Enumerator(a), Value::Enumerator(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Rendering with a composite-format specifier (`D2`, `F3`, `X`, `N0`, `E2`).
    pub fn format(&self, spec: &str) -> String {
        let Value::Number(n) = self else {
            return self.to_string();
        };

        let mut chars = spec.chars();
        let Some(letter) = chars.next() else {
            return self.to_string();
        };
        let precision: Option<usize> = chars.as_str().parse().ok();

        match letter.to_ascii_uppercase() {
            'D' => match n.to_i128() {
                Some(i) => {
                    let width = precision.unwrap_or(0);
                    if i < 0 {
                        format!("-{:0width$}", -i, width = width)
                    } else {
                        format!("{:0width$}", i, width = width)
                    }
                }
                None => self.to_string(),
            },
            'F' => format!("{:.*}", precision.unwrap_or(2), n.to_f64()),
            'N' => group_thousands(&format!("{:.*}", precision.unwrap_or(2), n.to_f64())),
            'E' => format!("{:.*e}", precision.unwrap_or(6), n.to_f64()),
            'X' => match n.to_i128() {
                Some(i) => {
                    let hex = if letter == 'x' {
                        format!("{:x}", i)
                    } else {
                        format!("{:X}", i)
                    };
                    format!("{:0>width$}", hex, width = precision.unwrap_or(0))
                }
                None => self.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

fn group_thousands(fixed: &str) -> String {
    let (sign, rest) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (whole, fraction) = match rest.find('.') {
        Some(dot) => rest.split_at(dot),
        None => (rest, ""),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}{}", sign, grouped, fraction)
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::Double(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Number::Int(v))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.loose_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Number(n) => write!(f, "{}:{}", n, n.kind()),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(a) => write!(f, "{:?}", a.borrow().items),
            Value::List(items) => write!(f, "List{:?}", items.borrow()),
            Value::Object(o) => {
                let o = o.borrow();
                write!(f, "{} {:?}", o.type_name, o.fields)
            }
            Value::Enumerator(e) => write!(f, "IEnumerator@{:?}", e.borrow().position),
            Value::Function(func) => write!(f, "{:?}", func),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),

            Value::Bool(true) => write!(f, "True"),

            Value::Bool(false) => write!(f, "False"),

            Value::Char(c) => write!(f, "{}", c),

            Value::Number(n) => write!(f, "{}", n),

            Value::Str(s) => write!(f, "{}", s),

            Value::Array(a) => write!(f, "{}[]", a.borrow().element),

            Value::List(_) => write!(f, "System.Collections.Generic.List"),

            Value::Object(o) => {
                let o = o.borrow();
                match o.fields.get("Message") {
                    Some(message) => write!(f, "{}: {}", o.type_name, message),
                    None => write!(f, "{}", o.type_name),
                }
            }

            Value::Enumerator(_) => write!(f, "System.Collections.IEnumerator"),

            Value::Function(func) => write!(f, "<fn {}>", func.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_specifiers() {
        assert_eq!(Value::from(7).format("D2"), "07");
        assert_eq!(Value::from(3.14159).format("F2"), "3.14");
        assert_eq!(Value::from(1234567.0).format("N0"), "1,234,567");
        assert_eq!(Value::from(255).format("X"), "FF");
    }

    #[test]
    fn enumerator_walks_snapshot() {
        let mut e = EnumeratorState::new(vec![Value::from(1), Value::from(2)]);
        assert!(e.current().is_err());
        assert!(e.move_next());
        assert_eq!(e.current().unwrap(), Value::from(1));
        assert!(e.move_next());
        assert!(!e.move_next());
        assert!(e.current().is_err());
    }

    #[test]
    fn assignment_conversion_changes_width() {
        let v = Value::from(3).convert_to(&Type::DOUBLE).unwrap();
        match v {
            Value::Number(Number::Double(d)) => assert_eq!(d, 3.0),
            other => panic!("unexpected {:?}", other),
        }
    }
}
