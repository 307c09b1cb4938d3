//! The Type Catalog: the backing store of type definitions, members, extension
//! methods and named constants that the resolver queries.
//!
//! [`TypeCatalog`] is the seam; [`Registry`] is the static in-memory
//! implementation populated with the built-in library and open to host
//! registrations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::types::Type;
use crate::value::{Constant, Value};

/// Native body of a method or constructor.  Instance methods receive their
/// receiver as `args[0]`.
pub type NativeFn = fn(&[Value]) -> Result<Value>;

/// Property getter; receives the receiver (`Value::Null` for statics).
pub type Getter = fn(&Value) -> Result<Value>;

/// Operations the simplifier recognises by meaning rather than by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalFn {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Log,
    Log10,
    Exp,
    Pow,
    Sqrt,
    Abs,
    Floor,
    Ceiling,
    Round,
    Truncate,
}

impl CanonicalFn {
    pub fn apply(self, args: &[f64]) -> Option<f64> {
        let x = *args.first()?;
        let value = match self {
            CanonicalFn::Sin => x.sin(),
            CanonicalFn::Cos => x.cos(),
            CanonicalFn::Tan => x.tan(),
            CanonicalFn::Asin => x.asin(),
            CanonicalFn::Acos => x.acos(),
            CanonicalFn::Atan => x.atan(),
            CanonicalFn::Sinh => x.sinh(),
            CanonicalFn::Cosh => x.cosh(),
            CanonicalFn::Tanh => x.tanh(),
            CanonicalFn::Log => x.ln(),
            CanonicalFn::Log10 => x.log10(),
            CanonicalFn::Exp => x.exp(),
            CanonicalFn::Pow => x.powf(*args.get(1)?),
            CanonicalFn::Sqrt => x.sqrt(),
            CanonicalFn::Abs => x.abs(),
            CanonicalFn::Floor => x.floor(),
            CanonicalFn::Ceiling => x.ceil(),
            CanonicalFn::Round => round_half_even(x),
            CanonicalFn::Truncate => x.trunc(),
        };
        Some(value)
    }
}

/// Banker's rounding, the default midpoint rule of `Math.Round`.
pub fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub ty: Type,
    /// `params T[]`: absorbs any number of trailing arguments.
    pub variadic: bool,
}

impl ParamDef {
    pub fn new(name: &str, ty: Type) -> Self {
        ParamDef {
            name: name.to_string(),
            ty,
            variadic: false,
        }
    }

    /// Variadic parameter; `ty` is the array type.
    pub fn rest(name: &str, ty: Type) -> Self {
        ParamDef {
            name: name.to_string(),
            ty,
            variadic: true,
        }
    }
}

/// How a method body runs.
#[derive(Clone)]
pub enum Native {
    Function(NativeFn),
    /// Constructor of a record type: builds an object whose fields are
    /// initialised from the parameters of the same (case-insensitive) name.
    Record {
        type_name: String,
        fields: Vec<(String, Type)>,
    },
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Native::Function(_) => write!(f, "<native>"),
            Native::Record { type_name, .. } => write!(f, "<record {}>", type_name),
        }
    }
}

#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub declaring: Type,
    pub generic_params: Vec<String>,
    pub params: Vec<ParamDef>,
    pub ret: Type,
    pub is_static: bool,
    pub is_extension: bool,
    pub canonical: Option<CanonicalFn>,
    pub native: Native,
}

impl MethodDef {
    /// Instance method; the declaring type is filled in by [`TypeDef::method`].
    pub fn new(name: &str, params: Vec<ParamDef>, ret: Type, native: NativeFn) -> Self {
        MethodDef {
            name: name.to_string(),
            declaring: Type::Object,
            generic_params: Vec::new(),
            params,
            ret,
            is_static: false,
            is_extension: false,
            canonical: None,
            native: Native::Function(native),
        }
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Static method callable with instance syntax on its first argument.
    pub fn extension(mut self) -> Self {
        self.is_static = true;
        self.is_extension = true;
        self
    }

    pub fn generic(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn canonical(mut self, f: CanonicalFn) -> Self {
        self.canonical = Some(f);
        self
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    /// `Declaring.Name(T1, T2)` for diagnostics.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
        format!("{}.{}({})", self.declaring, self.name, params.join(", "))
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

#[derive(Clone)]
pub enum MemberKind {
    Constant(Constant),
    Property(Getter),
    /// Stored in the object's field map; readable and writable.
    Field,
}

impl fmt::Debug for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Constant(c) => write!(f, "const {:?}", c),
            MemberKind::Property(_) => write!(f, "property"),
            MemberKind::Field => write!(f, "field"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemberDef {
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
    pub kind: MemberKind,
}

impl MemberDef {
    pub fn is_writable(&self) -> bool {
        matches!(self.kind, MemberKind::Field)
    }
}

/// One class, struct or interface.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    /// The type this definition describes, generic parameters unbound.
    pub ty: Type,
    pub generic_params: Vec<String>,
    pub base: Option<Type>,
    pub interfaces: Vec<Type>,
    pub is_interface: bool,
    pub constructors: Vec<Arc<MethodDef>>,
    pub methods: Vec<Arc<MethodDef>>,
    pub members: Vec<Arc<MemberDef>>,
}

impl TypeDef {
    /// Definition for a non-generic builtin or named type.
    pub fn new(name: &str, ty: Type) -> Self {
        TypeDef {
            name: name.to_string(),
            ty,
            generic_params: Vec::new(),
            base: Some(Type::Object),
            interfaces: Vec::new(),
            is_interface: false,
            constructors: Vec::new(),
            methods: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Named class, optionally generic (`List<T>`).
    pub fn class(name: &str, generic_params: &[&str]) -> Self {
        let args = generic_params.iter().map(|p| Type::generic(*p)).collect();
        let mut def = TypeDef::new(name, Type::named(name, args));
        def.generic_params = generic_params.iter().map(|p| p.to_string()).collect();
        def
    }

    pub fn interface(name: &str, generic_params: &[&str]) -> Self {
        let mut def = TypeDef::class(name, generic_params);
        def.base = None;
        def.is_interface = true;
        def
    }

    /// Static-only holder (`Math`, `Enumerable`).
    pub fn static_class(name: &str) -> Self {
        TypeDef::class(name, &[])
    }

    pub fn with_base(mut self, base: Type) -> Self {
        self.base = Some(base);
        self
    }

    pub fn implements(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn constructor(mut self, params: Vec<ParamDef>, native: NativeFn) -> Self {
        let mut ctor = MethodDef::new(".ctor", params, self.ty.clone(), native);
        ctor.declaring = self.ty.clone();
        ctor.generic_params = self.generic_params.clone();
        self.constructors.push(Arc::new(ctor));
        self
    }

    /// Constructor taking one parameter per field declared so far.
    pub fn record_constructor(mut self) -> Self {
        let fields: Vec<(String, Type)> = self
            .members
            .iter()
            .filter(|m| matches!(m.kind, MemberKind::Field) && !m.is_static)
            .map(|m| (m.name.clone(), m.ty.clone()))
            .collect();

        let params = fields
            .iter()
            .map(|(name, ty)| ParamDef::new(&name.to_lowercase(), ty.clone()))
            .collect();

        self.constructors.push(Arc::new(MethodDef {
            name: ".ctor".to_string(),
            declaring: self.ty.clone(),
            generic_params: Vec::new(),
            params,
            ret: self.ty.clone(),
            is_static: true,
            is_extension: false,
            canonical: None,
            native: Native::Record {
                type_name: self.name.clone(),
                fields,
            },
        }));
        self
    }

    /// Parameterless constructor leaving every field at its default.
    pub fn default_constructor(mut self) -> Self {
        let fields: Vec<(String, Type)> = self
            .members
            .iter()
            .filter(|m| matches!(m.kind, MemberKind::Field) && !m.is_static)
            .map(|m| (m.name.clone(), m.ty.clone()))
            .collect();

        self.constructors.push(Arc::new(MethodDef {
            name: ".ctor".to_string(),
            declaring: self.ty.clone(),
            generic_params: Vec::new(),
            params: Vec::new(),
            ret: self.ty.clone(),
            is_static: true,
            is_extension: false,
            canonical: None,
            native: Native::Record {
                type_name: self.name.clone(),
                fields,
            },
        }));
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        let mut method = method;
        method.declaring = self.ty.clone();
        self.methods.push(Arc::new(method));
        self
    }

    pub fn property(mut self, name: &str, ty: Type, getter: Getter) -> Self {
        self.members.push(Arc::new(MemberDef {
            name: name.to_string(),
            ty,
            is_static: false,
            kind: MemberKind::Property(getter),
        }));
        self
    }

    pub fn static_property(mut self, name: &str, ty: Type, getter: Getter) -> Self {
        self.members.push(Arc::new(MemberDef {
            name: name.to_string(),
            ty,
            is_static: true,
            kind: MemberKind::Property(getter),
        }));
        self
    }

    pub fn constant(mut self, name: &str, value: Constant) -> Self {
        self.members.push(Arc::new(MemberDef {
            name: name.to_string(),
            ty: value.ty(),
            is_static: true,
            kind: MemberKind::Constant(value),
        }));
        self
    }

    pub fn field(mut self, name: &str, ty: Type) -> Self {
        self.members.push(Arc::new(MemberDef {
            name: name.to_string(),
            ty,
            is_static: false,
            kind: MemberKind::Field,
        }));
        self
    }

    /// Bindings from this definition's generic parameters to `args`.
    pub fn bindings(&self, args: &[Type]) -> HashMap<String, Type> {
        self.generic_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect()
    }
}

/// Read-only view of the type universe.
pub trait TypeCatalog: Send + Sync {
    /// Definition registered under `name` (alias or qualified spelling
    /// accepted) with `arity` generic parameters.
    fn find_type(&self, name: &str, arity: usize) -> Option<Arc<TypeDef>>;

    /// Every extension method called `name`, in registration order.
    fn find_extension_methods(&self, name: &str) -> Vec<Arc<MethodDef>>;

    /// Free-standing named value (`true`, `false`, `null`, host constants).
    fn named_constant(&self, name: &str) -> Option<Constant>;

    /// The method implementing a canonical operation.
    fn canonical_method(&self, f: CanonicalFn) -> Option<Arc<MethodDef>>;
}

/// Static registry of definitions.
#[derive(Debug, Default)]
pub struct Registry {
    types: FxHashMap<(String, usize), Arc<TypeDef>>,
    aliases: FxHashMap<String, String>,
    extensions: FxHashMap<String, Vec<Arc<MethodDef>>>,
    constants: FxHashMap<String, Constant>,
    canonical: FxHashMap<CanonicalFn, Arc<MethodDef>>,
    namespaces: Vec<String>,
}

impl Registry {
    /// Empty registry (not even `object`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in library.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        crate::builtins::install(&mut registry);

        info!(
            "Registry created with {} types and {} constants",
            registry.types.len(),
            registry.constants.len()
        );

        registry
    }

    pub fn register(&mut self, def: TypeDef) -> Arc<TypeDef> {
        let def = Arc::new(def);

        for method in &def.methods {
            if method.is_extension {
                self.extensions
                    .entry(method.name.clone())
                    .or_default()
                    .push(method.clone());
            }
            if let Some(f) = method.canonical {
                self.canonical.entry(f).or_insert_with(|| method.clone());
            }
        }

        debug!("Registered type {} ({} methods)", def.name, def.methods.len());

        self.types
            .insert((def.name.clone(), def.generic_params.len()), def.clone());
        def
    }

    /// Alternate spelling (`int` for `Int32`).
    pub fn alias(&mut self, alias: &str, name: &str) {
        self.aliases.insert(alias.to_string(), name.to_string());
    }

    pub fn add_constant(&mut self, name: &str, value: Constant) {
        self.constants.insert(name.to_string(), value);
    }

    /// Namespace prefix stripped from qualified names (`System`).
    pub fn add_namespace(&mut self, namespace: &str) {
        if !self.namespaces.iter().any(|n| n == namespace) {
            self.namespaces.push(namespace.to_string());
        }
    }

    fn lookup(&self, name: &str, arity: usize) -> Option<Arc<TypeDef>> {
        let name = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.types.get(&(name.to_string(), arity)).cloned()
    }
}

impl TypeCatalog for Registry {
    fn find_type(&self, name: &str, arity: usize) -> Option<Arc<TypeDef>> {
        if let Some(def) = self.lookup(name, arity) {
            return Some(def);
        }

        self.namespaces.iter().find_map(|ns| {
            name.strip_prefix(ns.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|rest| self.lookup(rest, arity))
        })
    }

    fn find_extension_methods(&self, name: &str) -> Vec<Arc<MethodDef>> {
        self.extensions.get(name).cloned().unwrap_or_default()
    }

    fn named_constant(&self, name: &str) -> Option<Constant> {
        self.constants.get(name).cloned()
    }

    fn canonical_method(&self, f: CanonicalFn) -> Option<Arc<MethodDef>> {
        self.canonical.get(&f).cloned()
    }
}
