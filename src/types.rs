//! Type descriptors carried by every AST node and consumed by overload
//! resolution.

use std::collections::HashMap;
use std::fmt;

pub use crate::number::NumericKind;

/// A resolved type.
///
/// `Named` covers every catalog-defined class or interface, instantiated with
/// its generic arguments; `Generic` is an unbound type parameter and only ever
/// appears inside catalog signatures before substitution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Type of the `null` literal.
    Null,
    Object,
    Bool,
    Char,
    String,
    Numeric(NumericKind),
    Nullable(Box<Type>),
    Array { element: Box<Type>, rank: usize },
    Named { name: String, args: Vec<Type> },
    Generic(String),
    /// Delegate type; `ret == Void` is an action.
    Function { params: Vec<Type>, ret: Box<Type> },
}

impl Type {
    pub const BYTE: Type = Type::Numeric(NumericKind::Byte);
    pub const SHORT: Type = Type::Numeric(NumericKind::Short);
    pub const INT: Type = Type::Numeric(NumericKind::Int);
    pub const LONG: Type = Type::Numeric(NumericKind::Long);
    pub const FLOAT: Type = Type::Numeric(NumericKind::Float);
    pub const DOUBLE: Type = Type::Numeric(NumericKind::Double);
    pub const DECIMAL: Type = Type::Numeric(NumericKind::Decimal);

    pub fn named<S: Into<String>>(name: S, args: Vec<Type>) -> Type {
        Type::Named {
            name: name.into(),
            args,
        }
    }

    pub fn generic<S: Into<String>>(name: S) -> Type {
        Type::Generic(name.into())
    }

    pub fn array(element: Type) -> Type {
        Type::Array {
            element: Box::new(element),
            rank: 1,
        }
    }

    pub fn nullable(inner: Type) -> Type {
        if inner.is_reference() {
            inner
        } else {
            Type::Nullable(Box::new(inner))
        }
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            Type::Numeric(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Numeric(_))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Numeric(kind) if kind.is_floating())
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Numeric(kind) if kind.is_integral())
    }

    /// Types whose values may be `null`.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Object
                | Type::String
                | Type::Null
                | Type::Array { .. }
                | Type::Named { .. }
                | Type::Function { .. }
        )
    }

    pub fn accepts_null(&self) -> bool {
        self.is_reference() || matches!(self, Type::Nullable(_))
    }

    /// Strip one `Nullable` layer.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Does an unbound type parameter occur anywhere inside?
    pub fn contains_generic(&self) -> bool {
        match self {
            Type::Generic(_) => true,
            Type::Nullable(inner) => inner.contains_generic(),
            Type::Array { element, .. } => element.contains_generic(),
            Type::Named { args, .. } => args.iter().any(Type::contains_generic),
            Type::Function { params, ret } => {
                params.iter().any(Type::contains_generic) || ret.contains_generic()
            }
            _ => false,
        }
    }

    /// Replace bound type parameters.
    pub fn substitute(&self, bindings: &HashMap<String, Type>) -> Type {
        if bindings.is_empty() {
            return self.clone();
        }

        match self {
            Type::Generic(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Nullable(inner) => Type::Nullable(Box::new(inner.substitute(bindings))),
            Type::Array { element, rank } => Type::Array {
                element: Box::new(element.substitute(bindings)),
                rank: *rank,
            },
            Type::Named { name, args } => Type::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            Type::Function { params, ret } => Type::Function {
                params: params.iter().map(|p| p.substitute(bindings)).collect(),
                ret: Box::new(ret.substitute(bindings)),
            },
            other => other.clone(),
        }
    }

    /// Name under which the catalog stores this type's definition.
    pub fn definition_name(&self) -> Option<&str> {
        match self {
            Type::Object => Some("Object"),
            Type::String => Some("String"),
            Type::Bool => Some("Boolean"),
            Type::Char => Some("Char"),
            Type::Numeric(kind) => Some(kind.system_name()),
            Type::Nullable(_) => Some("Nullable"),
            Type::Array { .. } => Some("Array"),
            Type::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Generic arguments used to instantiate this type's definition.
    pub fn definition_args(&self) -> Vec<Type> {
        match self {
            Type::Named { args, .. } => args.clone(),
            Type::Nullable(inner) => vec![(**inner).clone()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Object => write!(f, "object"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::String => write!(f, "string"),
            Type::Numeric(kind) => write!(f, "{}", kind),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Array { element, rank } => {
                write!(f, "{}[{}]", element, ",".repeat(rank.saturating_sub(1)))
            }
            Type::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<{}>", join(args))?;
                }
                Ok(())
            }
            Type::Generic(name) => write!(f, "{}", name),
            Type::Function { params, ret } => {
                if **ret == Type::Void {
                    if params.is_empty() {
                        write!(f, "Action")
                    } else {
                        write!(f, "Action<{}>", join(params))
                    }
                } else if params.is_empty() {
                    write!(f, "Func<{}>", ret)
                } else {
                    write!(f, "Func<{}, {}>", join(params), ret)
                }
            }
        }
    }
}

/// Comma-separated rendering of a type list.
pub fn join(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
