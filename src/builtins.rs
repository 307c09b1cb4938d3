//! Built-in library installed into [`Registry::with_builtins`]: primitive
//! types, `String`, `Math`, `List<T>`, the enumerable interfaces and their
//! LINQ-style extension methods, `Convert`, and a small exception hierarchy.

use std::cell::RefCell;
use std::hash::Hasher;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHasher;

use crate::catalog::{round_half_even, CanonicalFn, MethodDef, ParamDef, Registry, TypeDef};
use crate::error::{CompileError, Result};
use crate::number::{ArithOp, Number, NumericKind};
use crate::types::Type;
use crate::value::{Constant, EnumeratorState, Value};

fn t(name: &str) -> Type {
    Type::generic(name)
}

fn enumerable(element: Type) -> Type {
    Type::named("IEnumerable", vec![element])
}

fn enumerator(element: Type) -> Type {
    Type::named("IEnumerator", vec![element])
}

fn list_of(element: Type) -> Type {
    Type::named("List", vec![element])
}

fn p(name: &str, ty: Type) -> ParamDef {
    ParamDef::new(name, ty)
}

fn arg(args: &[Value], i: usize) -> Result<&Value> {
    args.get(i)
        .ok_or_else(|| CompileError::runtime(format!("Missing argument {}", i)))
}

fn real(args: &[Value], i: usize) -> Result<f64> {
    arg(args, i)?.as_f64()
}

fn string(args: &[Value], i: usize) -> Result<Rc<str>> {
    arg(args, i)?.as_str()
}

fn int(args: &[Value], i: usize) -> Result<i64> {
    arg(args, i)?.as_index()
}

fn double(value: f64) -> Result<Value> {
    Ok(Value::Number(Number::Double(value)))
}

fn int_value(value: usize) -> Value {
    Value::Number(Number::Int(value as i32))
}

pub fn install(registry: &mut Registry) {
    for ns in ["System", "System.Collections.Generic", "System.Linq"] {
        registry.add_namespace(ns);
    }

    registry.add_constant("true", Constant::Bool(true));
    registry.add_constant("false", Constant::Bool(false));
    registry.add_constant("null", Constant::Null);

    install_primitives(registry);
    install_string(registry);
    install_collections(registry);
    install_math(registry);
    install_enumerable(registry);
    install_convert(registry);
    install_exceptions(registry);
}

// ── primitives ───────────────────────────────────────────────────────────────

fn install_primitives(registry: &mut Registry) {
    let mut object = TypeDef::new("Object", Type::Object)
        .method(MethodDef::new("ToString", vec![], Type::String, object_to_string))
        .method(MethodDef::new(
            "Equals",
            vec![p("other", Type::Object)],
            Type::Bool,
            object_equals,
        ))
        .method(MethodDef::new("GetHashCode", vec![], Type::INT, object_hash));
    object.base = None;
    registry.register(object);
    registry.alias("object", "Object");

    let mut void = TypeDef::new("Void", Type::Void);
    void.base = None;
    registry.register(void);
    registry.alias("void", "Void");

    registry.register(
        TypeDef::new("Boolean", Type::Bool)
            .method(
                MethodDef::new("Parse", vec![p("s", Type::String)], Type::Bool, parse_bool)
                    .static_(),
            )
            .constant("TrueString", Constant::Str("True".to_string()))
            .constant("FalseString", Constant::Str("False".to_string())),
    );
    registry.alias("bool", "Boolean");

    registry.register(
        TypeDef::new("Char", Type::Char)
            .method(
                MethodDef::new("IsDigit", vec![p("c", Type::Char)], Type::Bool, char_is_digit)
                    .static_(),
            )
            .method(
                MethodDef::new("IsLetter", vec![p("c", Type::Char)], Type::Bool, char_is_letter)
                    .static_(),
            )
            .method(
                MethodDef::new("ToUpper", vec![p("c", Type::Char)], Type::Char, char_to_upper)
                    .static_(),
            )
            .constant("MaxValue", Constant::Char('\u{FFFF}'))
            .constant("MinValue", Constant::Char('\0')),
    );
    registry.alias("char", "Char");

    for kind in NumericKind::ALL {
        let ty = Type::Numeric(kind);
        let (min, max) = numeric_bounds(kind);

        let mut def = TypeDef::new(kind.system_name(), ty.clone())
            .constant("MinValue", Constant::Number(min))
            .constant("MaxValue", Constant::Number(max))
            .method(MethodDef::new(
                "ToString",
                vec![p("format", Type::String)],
                Type::String,
                number_to_string_format,
            ))
            .method(MethodDef::new(
                "CompareTo",
                vec![p("value", ty.clone())],
                Type::INT,
                number_compare_to,
            ))
            .method(
                MethodDef::new("Parse", vec![p("s", Type::String)], ty.clone(), parser_for(kind))
                    .static_(),
            );

        if kind.is_floating() {
            def = def
                .constant("NaN", Constant::Number(Number::Double(f64::NAN).convert(kind)))
                .constant(
                    "PositiveInfinity",
                    Constant::Number(Number::Double(f64::INFINITY).convert(kind)),
                )
                .constant(
                    "NegativeInfinity",
                    Constant::Number(Number::Double(f64::NEG_INFINITY).convert(kind)),
                )
                .method(
                    MethodDef::new("IsNaN", vec![p("d", ty.clone())], Type::Bool, is_nan)
                        .static_(),
                );
        }

        registry.register(def);
        registry.alias(kind.name(), kind.system_name());
    }
}

fn numeric_bounds(kind: NumericKind) -> (Number, Number) {
    match kind {
        NumericKind::Byte => (Number::Byte(u8::MIN), Number::Byte(u8::MAX)),
        NumericKind::Short => (Number::Short(i16::MIN), Number::Short(i16::MAX)),
        NumericKind::UShort => (Number::UShort(u16::MIN), Number::UShort(u16::MAX)),
        NumericKind::Int => (Number::Int(i32::MIN), Number::Int(i32::MAX)),
        NumericKind::UInt => (Number::UInt(u32::MIN), Number::UInt(u32::MAX)),
        NumericKind::Long => (Number::Long(i64::MIN), Number::Long(i64::MAX)),
        NumericKind::ULong => (Number::ULong(u64::MIN), Number::ULong(u64::MAX)),
        NumericKind::Float => (Number::Float(f32::MIN), Number::Float(f32::MAX)),
        NumericKind::Double => (Number::Double(f64::MIN), Number::Double(f64::MAX)),
        NumericKind::Decimal => (
            Number::Decimal(-79_228_162_514_264_337_593_543_950_335.0),
            Number::Decimal(79_228_162_514_264_337_593_543_950_335.0),
        ),
    }
}

fn object_to_string(args: &[Value]) -> Result<Value> {
    Ok(Value::from(arg(args, 0)?.to_string()))
}

fn object_equals(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(arg(args, 0)?.loose_eq(arg(args, 1)?)))
}

fn object_hash(args: &[Value]) -> Result<Value> {
    let mut hasher = FxHasher::default();
    hasher.write(arg(args, 0)?.to_string().as_bytes());
    Ok(Value::Number(Number::Int(hasher.finish() as i32)))
}

fn parse_bool(args: &[Value]) -> Result<Value> {
    let s = string(args, 0)?;
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => Err(CompileError::runtime(format!(
            "String '{}' was not recognized as a valid Boolean.",
            s
        ))),
    }
}

fn char_of(args: &[Value]) -> Result<char> {
    match arg(args, 0)? {
        Value::Char(c) => Ok(*c),
        other => Err(CompileError::runtime(format!(
            "Expected char, found {}",
            other.type_name()
        ))),
    }
}

fn char_is_digit(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(char_of(args)?.is_ascii_digit()))
}

fn char_is_letter(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(char_of(args)?.is_alphabetic()))
}

fn char_to_upper(args: &[Value]) -> Result<Value> {
    let c = char_of(args)?;
    Ok(Value::Char(c.to_uppercase().next().unwrap_or(c)))
}

fn number_to_string_format(args: &[Value]) -> Result<Value> {
    let spec = string(args, 1)?;
    Ok(Value::from(arg(args, 0)?.format(&spec)))
}

fn number_compare_to(args: &[Value]) -> Result<Value> {
    let a = arg(args, 0)?.as_number()?;
    let b = arg(args, 1)?.as_number()?;
    let ordering = match Number::compare(&a, &b) {
        Some(std::cmp::Ordering::Less) => -1,
        Some(std::cmp::Ordering::Greater) => 1,
        _ => 0,
    };
    Ok(Value::from(ordering))
}

fn is_nan(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(real(args, 0)?.is_nan()))
}

fn parse_number(args: &[Value], kind: NumericKind) -> Result<Value> {
    let s = string(args, 0)?;
    let text = s.trim();
    let failed = || CompileError::runtime(format!("Input string '{}' was not in a correct format.", s));

    let number = if kind.is_integral() {
        let value: i128 = text.parse().map_err(|_| failed())?;
        let n = Number::Long(value as i64).convert(kind);
        if n.to_i128() != Some(value) {
            return Err(CompileError::runtime(format!(
                "Value was either too large or too small for {}.",
                kind.system_name()
            )));
        }
        n
    } else {
        let value: f64 = text.parse().map_err(|_| failed())?;
        Number::Double(value).convert(kind)
    };

    Ok(Value::Number(number))
}

macro_rules! numeric_parsers {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            fn $name(args: &[Value]) -> Result<Value> {
                parse_number(args, NumericKind::$kind)
            }
        )*

        fn parser_for(kind: NumericKind) -> crate::catalog::NativeFn {
            match kind {
                $(NumericKind::$kind => $name,)*
            }
        }
    };
}

numeric_parsers! {
    parse_byte => Byte,
    parse_short => Short,
    parse_ushort => UShort,
    parse_int => Int,
    parse_uint => UInt,
    parse_long => Long,
    parse_ulong => ULong,
    parse_float => Float,
    parse_double => Double,
    parse_decimal => Decimal,
}

// ── String ───────────────────────────────────────────────────────────────────

fn install_string(registry: &mut Registry) {
    let objects = Type::array(Type::Object);

    registry.register(
        TypeDef::new("String", Type::String)
            .implements(enumerable(Type::Char))
            .constant("Empty", Constant::Str(String::new()))
            .property("Length", Type::INT, string_length)
            .method(MethodDef::new(
                "get_Chars",
                vec![p("index", Type::INT)],
                Type::Char,
                string_char_at,
            ))
            .method(MethodDef::new(
                "Substring",
                vec![p("startIndex", Type::INT)],
                Type::String,
                string_substring,
            ))
            .method(MethodDef::new(
                "Substring",
                vec![p("startIndex", Type::INT), p("length", Type::INT)],
                Type::String,
                string_substring,
            ))
            .method(MethodDef::new("ToUpper", vec![], Type::String, string_to_upper))
            .method(MethodDef::new("ToLower", vec![], Type::String, string_to_lower))
            .method(MethodDef::new("Trim", vec![], Type::String, string_trim))
            .method(MethodDef::new(
                "Contains",
                vec![p("value", Type::String)],
                Type::Bool,
                string_contains,
            ))
            .method(MethodDef::new(
                "StartsWith",
                vec![p("value", Type::String)],
                Type::Bool,
                string_starts_with,
            ))
            .method(MethodDef::new(
                "EndsWith",
                vec![p("value", Type::String)],
                Type::Bool,
                string_ends_with,
            ))
            .method(MethodDef::new(
                "IndexOf",
                vec![p("value", Type::String)],
                Type::INT,
                string_index_of,
            ))
            .method(MethodDef::new(
                "IndexOf",
                vec![p("value", Type::Char)],
                Type::INT,
                string_index_of,
            ))
            .method(MethodDef::new(
                "Replace",
                vec![p("oldValue", Type::String), p("newValue", Type::String)],
                Type::String,
                string_replace,
            ))
            .method(
                MethodDef::new(
                    "IsNullOrEmpty",
                    vec![p("value", Type::String)],
                    Type::Bool,
                    string_is_null_or_empty,
                )
                .static_(),
            )
            .method(
                MethodDef::new(
                    "Concat",
                    vec![ParamDef::rest("args", objects.clone())],
                    Type::String,
                    string_concat,
                )
                .static_(),
            )
            .method(
                MethodDef::new(
                    "Format",
                    vec![p("format", Type::String), ParamDef::rest("args", objects)],
                    Type::String,
                    string_format,
                )
                .static_(),
            )
            .method(
                MethodDef::new(
                    "Join",
                    vec![p("separator", Type::String), p("values", enumerable(t("T")))],
                    Type::String,
                    string_join,
                )
                .generic(&["T"])
                .static_(),
            ),
    );
    registry.alias("string", "String");
}

fn string_length(receiver: &Value) -> Result<Value> {
    Ok(int_value(receiver.as_str()?.chars().count()))
}

fn string_char_at(args: &[Value]) -> Result<Value> {
    let s = string(args, 0)?;
    let index = int(args, 1)?;
    usize::try_from(index)
        .ok()
        .and_then(|i| s.chars().nth(i))
        .map(Value::Char)
        .ok_or_else(|| CompileError::runtime("Index was outside the bounds of the array."))
}

fn string_substring(args: &[Value]) -> Result<Value> {
    let chars: Vec<char> = string(args, 0)?.chars().collect();
    let start = int(args, 1)?;
    let length = match args.get(2) {
        Some(v) => v.as_index()?,
        None => chars.len() as i64 - start,
    };

    if start < 0 || length < 0 || (start + length) as usize > chars.len() {
        return Err(CompileError::runtime(
            "Index and length must refer to a location within the string.",
        ));
    }

    let slice: String = chars[start as usize..(start + length) as usize].iter().collect();
    Ok(Value::from(slice))
}

fn string_to_upper(args: &[Value]) -> Result<Value> {
    Ok(Value::from(string(args, 0)?.to_uppercase()))
}

fn string_to_lower(args: &[Value]) -> Result<Value> {
    Ok(Value::from(string(args, 0)?.to_lowercase()))
}

fn string_trim(args: &[Value]) -> Result<Value> {
    Ok(Value::from(string(args, 0)?.trim()))
}

fn string_contains(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(string(args, 0)?.contains(&*string(args, 1)?)))
}

fn string_starts_with(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(string(args, 0)?.starts_with(&*string(args, 1)?)))
}

fn string_ends_with(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(string(args, 0)?.ends_with(&*string(args, 1)?)))
}

fn string_index_of(args: &[Value]) -> Result<Value> {
    let s = string(args, 0)?;
    let needle = arg(args, 1)?.to_string();
    let index = match s.find(&needle) {
        Some(byte) => s[..byte].chars().count() as i32,
        None => -1,
    };
    Ok(Value::from(index))
}

fn string_replace(args: &[Value]) -> Result<Value> {
    let s = string(args, 0)?;
    Ok(Value::from(s.replace(&*string(args, 1)?, &string(args, 2)?)))
}

fn string_is_null_or_empty(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(match arg(args, 0)? {
        Value::Null => true,
        Value::Str(s) => s.is_empty(),
        _ => false,
    }))
}

fn string_concat(args: &[Value]) -> Result<Value> {
    let mut out = String::new();
    for item in arg(args, 0)?.items()? {
        out.push_str(&item.to_string());
    }
    Ok(Value::from(out))
}

fn string_join(args: &[Value]) -> Result<Value> {
    let separator = string(args, 0)?;
    let parts: Vec<String> = arg(args, 1)?.items()?.iter().map(Value::to_string).collect();
    Ok(Value::from(parts.join(&separator)))
}

/// Composite formatting: `{index[,alignment][:format]}` with `{{`/`}}` escapes.
fn string_format(args: &[Value]) -> Result<Value> {
    let format = string(args, 0)?;
    let values = arg(args, 1)?.items()?;
    let invalid = || CompileError::runtime("Input string was not in a correct format.");

    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut item = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => item.push(ch),
                        None => return Err(invalid()),
                    }
                }

                let (head, spec) = match item.split_once(':') {
                    Some((head, spec)) => (head, Some(spec)),
                    None => (item.as_str(), None),
                };
                let (index, alignment) = match head.split_once(',') {
                    Some((index, alignment)) => {
                        (index, Some(alignment.trim().parse::<i32>().map_err(|_| invalid())?))
                    }
                    None => (head, None),
                };
                let index: usize = index.trim().parse().map_err(|_| invalid())?;
                let value = values.get(index).ok_or_else(invalid)?;

                let text = match spec {
                    Some(spec) => value.format(spec),
                    None => value.to_string(),
                };

                match alignment {
                    Some(width) if width < 0 => {
                        out.push_str(&format!("{:<w$}", text, w = width.unsigned_abs() as usize))
                    }
                    Some(width) => out.push_str(&format!("{:>w$}", text, w = width as usize)),
                    None => out.push_str(&text),
                }
            }
            '}' => return Err(invalid()),
            other => out.push(other),
        }
    }

    Ok(Value::from(out))
}

// ── collections ──────────────────────────────────────────────────────────────

fn install_collections(registry: &mut Registry) {
    registry.register(
        TypeDef::interface("IEnumerable", &["T"]).method(MethodDef::new(
            "GetEnumerator",
            vec![],
            enumerator(t("T")),
            get_enumerator,
        )),
    );

    registry.register(
        TypeDef::interface("IEnumerator", &["T"])
            .method(MethodDef::new("MoveNext", vec![], Type::Bool, enumerator_move_next))
            .property("Current", t("T"), enumerator_current),
    );

    registry.register(
        TypeDef::class("Array", &[])
            .property("Length", Type::INT, array_length)
            .property("Rank", Type::INT, array_rank),
    );

    registry.register(
        TypeDef::class("List", &["T"])
            .implements(enumerable(t("T")))
            .constructor(vec![], list_new)
            .constructor(vec![p("collection", enumerable(t("T")))], list_from)
            .property("Count", Type::INT, list_count)
            .method(MethodDef::new("Add", vec![p("item", t("T"))], Type::Void, list_add))
            .method(MethodDef::new("Clear", vec![], Type::Void, list_clear))
            .method(MethodDef::new(
                "Contains",
                vec![p("item", t("T"))],
                Type::Bool,
                list_contains,
            ))
            .method(MethodDef::new(
                "IndexOf",
                vec![p("item", t("T"))],
                Type::INT,
                list_index_of,
            ))
            .method(MethodDef::new(
                "Insert",
                vec![p("index", Type::INT), p("item", t("T"))],
                Type::Void,
                list_insert,
            ))
            .method(MethodDef::new(
                "RemoveAt",
                vec![p("index", Type::INT)],
                Type::Void,
                list_remove_at,
            ))
            .method(MethodDef::new(
                "get_Item",
                vec![p("index", Type::INT)],
                t("T"),
                list_get,
            ))
            .method(MethodDef::new(
                "set_Item",
                vec![p("index", Type::INT), p("value", t("T"))],
                Type::Void,
                list_set,
            ))
            .method(MethodDef::new("ToArray", vec![], Type::array(t("T")), to_array))
            .method(MethodDef::new(
                "GetEnumerator",
                vec![],
                enumerator(t("T")),
                get_enumerator,
            )),
    );

    let mut nullable = TypeDef::class("Nullable", &["T"])
        .property("HasValue", Type::Bool, nullable_has_value)
        .property("Value", t("T"), nullable_value);
    nullable.base = Some(Type::Object);
    registry.register(nullable);
}

fn list(value: &Value) -> Result<Rc<RefCell<Vec<Value>>>> {
    match value {
        Value::List(items) => Ok(items.clone()),
        other => Err(CompileError::runtime(format!(
            "Expected List, found {}",
            other.type_name()
        ))),
    }
}

fn list_index(items: &[Value], index: i64) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < items.len())
        .ok_or_else(|| CompileError::runtime("Index was out of range."))
}

fn get_enumerator(args: &[Value]) -> Result<Value> {
    let items = arg(args, 0)?.items()?;
    Ok(Value::Enumerator(Rc::new(RefCell::new(EnumeratorState::new(items)))))
}

fn enumerator_move_next(args: &[Value]) -> Result<Value> {
    match arg(args, 0)? {
        Value::Enumerator(e) => Ok(Value::Bool(e.borrow_mut().move_next())),
        other => Err(CompileError::runtime(format!(
            "Expected IEnumerator, found {}",
            other.type_name()
        ))),
    }
}

fn enumerator_current(receiver: &Value) -> Result<Value> {
    match receiver {
        Value::Enumerator(e) => e.borrow().current(),
        other => Err(CompileError::runtime(format!(
            "Expected IEnumerator, found {}",
            other.type_name()
        ))),
    }
}

fn array_length(receiver: &Value) -> Result<Value> {
    match receiver {
        Value::Array(a) => Ok(int_value(a.borrow().items.len())),
        other => Err(CompileError::runtime(format!(
            "Expected array, found {}",
            other.type_name()
        ))),
    }
}

fn array_rank(receiver: &Value) -> Result<Value> {
    match receiver {
        Value::Array(a) => Ok(int_value(a.borrow().dims.len())),
        other => Err(CompileError::runtime(format!(
            "Expected array, found {}",
            other.type_name()
        ))),
    }
}

fn list_new(_args: &[Value]) -> Result<Value> {
    Ok(Value::list(Vec::new()))
}

fn list_from(args: &[Value]) -> Result<Value> {
    Ok(Value::list(arg(args, 0)?.items()?))
}

fn list_count(receiver: &Value) -> Result<Value> {
    Ok(int_value(list(receiver)?.borrow().len()))
}

fn list_add(args: &[Value]) -> Result<Value> {
    list(arg(args, 0)?)?.borrow_mut().push(arg(args, 1)?.clone());
    Ok(Value::Null)
}

fn list_clear(args: &[Value]) -> Result<Value> {
    list(arg(args, 0)?)?.borrow_mut().clear();
    Ok(Value::Null)
}

fn list_contains(args: &[Value]) -> Result<Value> {
    let needle = arg(args, 1)?;
    let found = list(arg(args, 0)?)?.borrow().iter().any(|v| v.loose_eq(needle));
    Ok(Value::Bool(found))
}

fn list_index_of(args: &[Value]) -> Result<Value> {
    let needle = arg(args, 1)?;
    let index = list(arg(args, 0)?)?
        .borrow()
        .iter()
        .position(|v| v.loose_eq(needle))
        .map_or(-1, |i| i as i32);
    Ok(Value::from(index))
}

fn list_insert(args: &[Value]) -> Result<Value> {
    let items = list(arg(args, 0)?)?;
    let index = int(args, 1)?;
    let mut items = items.borrow_mut();
    let slot = usize::try_from(index)
        .ok()
        .filter(|i| *i <= items.len())
        .ok_or_else(|| CompileError::runtime("Index must be within the bounds of the List."))?;
    items.insert(slot, arg(args, 2)?.clone());
    Ok(Value::Null)
}

fn list_remove_at(args: &[Value]) -> Result<Value> {
    let items = list(arg(args, 0)?)?;
    let mut items = items.borrow_mut();
    let slot = list_index(&items, int(args, 1)?)?;
    items.remove(slot);
    Ok(Value::Null)
}

fn list_get(args: &[Value]) -> Result<Value> {
    let items = list(arg(args, 0)?)?;
    let items = items.borrow();
    let slot = list_index(&items, int(args, 1)?)?;
    Ok(items[slot].clone())
}

fn list_set(args: &[Value]) -> Result<Value> {
    let items = list(arg(args, 0)?)?;
    let mut items = items.borrow_mut();
    let slot = list_index(&items, int(args, 1)?)?;
    items[slot] = arg(args, 2)?.clone();
    Ok(Value::Null)
}

fn to_array(args: &[Value]) -> Result<Value> {
    Ok(Value::array(Type::Object, arg(args, 0)?.items()?))
}

fn nullable_has_value(receiver: &Value) -> Result<Value> {
    Ok(Value::Bool(!receiver.is_null()))
}

fn nullable_value(receiver: &Value) -> Result<Value> {
    if receiver.is_null() {
        return Err(CompileError::runtime("Nullable object must have a value."));
    }
    Ok(receiver.clone())
}

// ── Math ─────────────────────────────────────────────────────────────────────

fn install_math(registry: &mut Registry) {
    let d = || Type::DOUBLE;
    let unary = |name: &str, native: crate::catalog::NativeFn, f: Option<CanonicalFn>| {
        let method = MethodDef::new(name, vec![p("d", Type::DOUBLE)], Type::DOUBLE, native).static_();
        match f {
            Some(f) => method.canonical(f),
            None => method,
        }
    };

    let mut math = TypeDef::static_class("Math")
        .constant("PI", Constant::Number(Number::Double(std::f64::consts::PI)))
        .constant("E", Constant::Number(Number::Double(std::f64::consts::E)));

    let canonical_unary: [(&str, crate::catalog::NativeFn, CanonicalFn); 16] = [
        ("Sin", math_sin, CanonicalFn::Sin),
        ("Cos", math_cos, CanonicalFn::Cos),
        ("Tan", math_tan, CanonicalFn::Tan),
        ("Asin", math_asin, CanonicalFn::Asin),
        ("Acos", math_acos, CanonicalFn::Acos),
        ("Atan", math_atan, CanonicalFn::Atan),
        ("Sinh", math_sinh, CanonicalFn::Sinh),
        ("Cosh", math_cosh, CanonicalFn::Cosh),
        ("Tanh", math_tanh, CanonicalFn::Tanh),
        ("Log", math_log, CanonicalFn::Log),
        ("Log10", math_log10, CanonicalFn::Log10),
        ("Exp", math_exp, CanonicalFn::Exp),
        ("Sqrt", math_sqrt, CanonicalFn::Sqrt),
        ("Floor", math_floor, CanonicalFn::Floor),
        ("Ceiling", math_ceiling, CanonicalFn::Ceiling),
        ("Truncate", math_truncate, CanonicalFn::Truncate),
    ];
    for (name, native, f) in canonical_unary {
        math = math.method(unary(name, native, Some(f)));
    }

    math = math
        .method(
            MethodDef::new("Log", vec![p("a", d()), p("newBase", d())], d(), math_log_base)
                .static_(),
        )
        .method(
            MethodDef::new("Pow", vec![p("x", d()), p("y", d())], d(), math_pow)
                .static_()
                .canonical(CanonicalFn::Pow),
        )
        .method(MethodDef::new("Atan2", vec![p("y", d()), p("x", d())], d(), math_atan2).static_())
        .method(unary("Round", math_round, Some(CanonicalFn::Round)))
        .method(
            MethodDef::new("Round", vec![p("value", d()), p("digits", Type::INT)], d(), math_round_digits)
                .static_(),
        );

    // Overload families: integral widths first so ties resolve to them.
    for ty in [Type::INT, Type::LONG, Type::FLOAT, Type::DOUBLE, Type::DECIMAL] {
        let abs = MethodDef::new("Abs", vec![p("value", ty.clone())], ty.clone(), math_abs).static_();
        let abs = if ty == Type::DOUBLE {
            abs.canonical(CanonicalFn::Abs)
        } else {
            abs
        };

        math = math
            .method(abs)
            .method(
                MethodDef::new("Max", vec![p("val1", ty.clone()), p("val2", ty.clone())], ty.clone(), math_max)
                    .static_(),
            )
            .method(
                MethodDef::new("Min", vec![p("val1", ty.clone()), p("val2", ty.clone())], ty.clone(), math_min)
                    .static_(),
            )
            .method(
                MethodDef::new("Sign", vec![p("value", ty.clone())], Type::INT, math_sign).static_(),
            );
    }

    registry.register(math);
}

macro_rules! math_unary {
    ($($name:ident => $f:expr),* $(,)?) => {
        $(
            fn $name(args: &[Value]) -> Result<Value> {
                let f: fn(f64) -> f64 = $f;
                double(f(real(args, 0)?))
            }
        )*
    };
}

math_unary! {
    math_sin => f64::sin,
    math_cos => f64::cos,
    math_tan => f64::tan,
    math_asin => f64::asin,
    math_acos => f64::acos,
    math_atan => f64::atan,
    math_sinh => f64::sinh,
    math_cosh => f64::cosh,
    math_tanh => f64::tanh,
    math_log => f64::ln,
    math_log10 => f64::log10,
    math_exp => f64::exp,
    math_sqrt => f64::sqrt,
    math_floor => f64::floor,
    math_ceiling => f64::ceil,
    math_truncate => f64::trunc,
    math_round => round_half_even,
}

fn math_log_base(args: &[Value]) -> Result<Value> {
    double(real(args, 0)?.ln() / real(args, 1)?.ln())
}

fn math_pow(args: &[Value]) -> Result<Value> {
    double(real(args, 0)?.powf(real(args, 1)?))
}

fn math_atan2(args: &[Value]) -> Result<Value> {
    double(real(args, 0)?.atan2(real(args, 1)?))
}

fn math_round_digits(args: &[Value]) -> Result<Value> {
    let scale = 10f64.powi(int(args, 1)? as i32);
    double(round_half_even(real(args, 0)? * scale) / scale)
}

fn math_abs(args: &[Value]) -> Result<Value> {
    let n = arg(args, 0)?.as_number()?;
    if n.to_f64() < 0.0 {
        Ok(Value::Number(n.negate().convert(n.kind())))
    } else {
        Ok(Value::Number(n))
    }
}

fn pick(args: &[Value], want: std::cmp::Ordering) -> Result<Value> {
    let a = arg(args, 0)?.as_number()?;
    let b = arg(args, 1)?.as_number()?;
    match Number::compare(&a, &b) {
        Some(ordering) if ordering == want => Ok(Value::Number(a)),
        Some(_) => Ok(Value::Number(b)),
        None => Ok(Value::Number(Number::Double(f64::NAN).convert(a.kind()))),
    }
}

fn math_max(args: &[Value]) -> Result<Value> {
    pick(args, std::cmp::Ordering::Greater)
}

fn math_min(args: &[Value]) -> Result<Value> {
    pick(args, std::cmp::Ordering::Less)
}

fn math_sign(args: &[Value]) -> Result<Value> {
    let x = real(args, 0)?;
    if x.is_nan() {
        return Err(CompileError::runtime("Function does not accept floating point NaN values."));
    }
    Ok(Value::from(if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }))
}

// ── Enumerable ───────────────────────────────────────────────────────────────

fn install_enumerable(registry: &mut Registry) {
    let source = || p("source", enumerable(t("TSource")));
    let predicate = || p("predicate", Type::function(vec![t("TSource")], Type::Bool));

    let mut linq = TypeDef::static_class("Enumerable")
        .method(
            MethodDef::new(
                "Select",
                vec![
                    source(),
                    p("selector", Type::function(vec![t("TSource")], t("TResult"))),
                ],
                enumerable(t("TResult")),
                linq_select,
            )
            .generic(&["TSource", "TResult"])
            .extension(),
        )
        .method(
            MethodDef::new("Where", vec![source(), predicate()], enumerable(t("TSource")), linq_where)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("Count", vec![source()], Type::INT, linq_count)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("Count", vec![source(), predicate()], Type::INT, linq_count)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("Any", vec![source()], Type::Bool, linq_any)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("Any", vec![source(), predicate()], Type::Bool, linq_any)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("All", vec![source(), predicate()], Type::Bool, linq_all)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("First", vec![source()], t("TSource"), linq_first)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("First", vec![source(), predicate()], t("TSource"), linq_first)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("ToList", vec![source()], list_of(t("TSource")), linq_to_list)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new("ToArray", vec![source()], Type::array(t("TSource")), to_array)
                .generic(&["TSource"])
                .extension(),
        )
        .method(
            MethodDef::new(
                "Range",
                vec![p("start", Type::INT), p("count", Type::INT)],
                enumerable(Type::INT),
                linq_range,
            )
            .static_(),
        );

    for ty in [Type::INT, Type::LONG, Type::DOUBLE, Type::DECIMAL] {
        let average = if ty == Type::DECIMAL {
            Type::DECIMAL
        } else {
            Type::DOUBLE
        };
        linq = linq
            .method(
                MethodDef::new("Sum", vec![p("source", enumerable(ty.clone()))], ty.clone(), linq_sum)
                    .extension(),
            )
            .method(
                MethodDef::new("Max", vec![p("source", enumerable(ty.clone()))], ty.clone(), linq_max)
                    .extension(),
            )
            .method(
                MethodDef::new("Min", vec![p("source", enumerable(ty.clone()))], ty.clone(), linq_min)
                    .extension(),
            )
            .method(
                MethodDef::new("Average", vec![p("source", enumerable(ty.clone()))], average, linq_average)
                    .extension(),
            );
    }

    linq = linq.method(
        MethodDef::new(
            "Sum",
            vec![
                source(),
                p("selector", Type::function(vec![t("TSource")], Type::DOUBLE)),
            ],
            Type::DOUBLE,
            linq_sum_selector,
        )
        .generic(&["TSource"])
        .extension(),
    );

    registry.register(linq);
}

fn predicate_filter(args: &[Value]) -> Result<Vec<Value>> {
    let items = arg(args, 0)?.items()?;
    let Some(predicate) = args.get(1) else {
        return Ok(items);
    };
    let predicate = predicate.as_function()?;

    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if predicate.invoke(std::slice::from_ref(&item))?.as_bool()? {
            kept.push(item);
        }
    }
    Ok(kept)
}

fn linq_select(args: &[Value]) -> Result<Value> {
    let selector = arg(args, 1)?.as_function()?;
    let mapped = arg(args, 0)?
        .items()?
        .iter()
        .map(|item| selector.invoke(std::slice::from_ref(item)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::list(mapped))
}

fn linq_where(args: &[Value]) -> Result<Value> {
    Ok(Value::list(predicate_filter(args)?))
}

fn linq_count(args: &[Value]) -> Result<Value> {
    Ok(int_value(predicate_filter(args)?.len()))
}

fn linq_any(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(!predicate_filter(args)?.is_empty()))
}

fn linq_all(args: &[Value]) -> Result<Value> {
    let total = arg(args, 0)?.items()?.len();
    Ok(Value::Bool(predicate_filter(args)?.len() == total))
}

fn linq_first(args: &[Value]) -> Result<Value> {
    predicate_filter(args)?
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::runtime("Sequence contains no matching element"))
}

fn linq_to_list(args: &[Value]) -> Result<Value> {
    Ok(Value::list(arg(args, 0)?.items()?))
}

fn linq_range(args: &[Value]) -> Result<Value> {
    let start = int(args, 0)?;
    let count = int(args, 1)?;
    if count < 0 {
        return Err(CompileError::runtime("Count must be non-negative."));
    }
    Ok(Value::list(
        (start..start + count).map(|i| Value::from(i as i32)).collect(),
    ))
}

fn numbers(args: &[Value]) -> Result<Vec<Number>> {
    arg(args, 0)?.items()?.iter().map(Value::as_number).collect()
}

fn linq_sum(args: &[Value]) -> Result<Value> {
    let items = numbers(args)?;
    let mut total = Number::Int(0);
    for n in items {
        total = Number::binary(ArithOp::Add, total, n)?;
    }
    Ok(Value::Number(total))
}

fn linq_sum_selector(args: &[Value]) -> Result<Value> {
    let selector = arg(args, 1)?.as_function()?;
    let mut total = 0.0;
    for item in arg(args, 0)?.items()? {
        total += selector.invoke(std::slice::from_ref(&item))?.as_f64()?;
    }
    double(total)
}

fn extreme(args: &[Value], want: std::cmp::Ordering) -> Result<Value> {
    let items = numbers(args)?;
    let mut best: Option<Number> = None;
    for n in items {
        best = match best {
            Some(b) if Number::compare(&n, &b) != Some(want) => Some(b),
            _ => Some(n),
        };
    }
    best.map(Value::Number)
        .ok_or_else(|| CompileError::runtime("Sequence contains no elements"))
}

fn linq_max(args: &[Value]) -> Result<Value> {
    extreme(args, std::cmp::Ordering::Greater)
}

fn linq_min(args: &[Value]) -> Result<Value> {
    extreme(args, std::cmp::Ordering::Less)
}

fn linq_average(args: &[Value]) -> Result<Value> {
    let items = numbers(args)?;
    if items.is_empty() {
        return Err(CompileError::runtime("Sequence contains no elements"));
    }
    let decimal = items.iter().any(|n| n.kind() == NumericKind::Decimal);
    let mean = items.iter().map(Number::to_f64).sum::<f64>() / items.len() as f64;
    Ok(Value::Number(if decimal {
        Number::Decimal(mean)
    } else {
        Number::Double(mean)
    }))
}

// ── Convert ──────────────────────────────────────────────────────────────────

fn install_convert(registry: &mut Registry) {
    registry.register(
        TypeDef::static_class("Convert")
            .method(
                MethodDef::new("ToInt32", vec![p("value", Type::Object)], Type::INT, convert_to_int32)
                    .static_(),
            )
            .method(
                MethodDef::new("ToDouble", vec![p("value", Type::Object)], Type::DOUBLE, convert_to_double)
                    .static_(),
            )
            .method(
                MethodDef::new("ToString", vec![p("value", Type::Object)], Type::String, object_to_string)
                    .static_(),
            ),
    );
}

fn convert_to_int32(args: &[Value]) -> Result<Value> {
    let value = match arg(args, 0)? {
        Value::Str(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| CompileError::runtime("Input string was not in a correct format."))?,
        Value::Bool(b) => i32::from(*b),
        other => {
            let n = other.as_number()?;
            match n.to_i128() {
                Some(i) => i as i32,
                None => round_half_even(n.to_f64()) as i32,
            }
        }
    };
    Ok(Value::from(value))
}

fn convert_to_double(args: &[Value]) -> Result<Value> {
    let value = match arg(args, 0)? {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CompileError::runtime("Input string was not in a correct format."))?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        other => other.as_f64()?,
    };
    double(value)
}

// ── exceptions ───────────────────────────────────────────────────────────────

fn install_exceptions(registry: &mut Registry) {
    let exception = Type::named("Exception", vec![]);

    registry.register(
        TypeDef::class("Exception", &[])
            .field("Message", Type::String)
            .record_constructor()
            .default_constructor(),
    );

    for name in ["ArgumentException", "InvalidOperationException", "DivideByZeroException"] {
        registry.register(
            TypeDef::class(name, &[])
                .with_base(exception.clone())
                .field("Message", Type::String)
                .record_constructor(),
        );
    }
}

/// Fields of a fresh record object, defaulted.
pub fn record_fields(fields: &[(String, Type)]) -> IndexMap<String, Value> {
    fields
        .iter()
        .map(|(name, ty)| (name.clone(), Value::default_of(ty)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_format_handles_alignment_and_specifiers() {
        let args = [
            Value::from("[{0,4}|{1:F2}|{{x}}]"),
            Value::array(Type::Object, vec![Value::from(7), Value::from(2.25)]),
        ];
        let formatted = string_format(&args).unwrap();
        assert_eq!(formatted.to_string(), "[   7|2.25|{x}]");
    }

    #[test]
    fn sum_keeps_integral_width() {
        let args = [Value::list(vec![Value::from(1), Value::from(2), Value::from(3)])];
        match linq_sum(&args).unwrap() {
            Value::Number(Number::Int(6)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
