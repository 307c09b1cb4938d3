//! Closed numeric tagged union with one variant per supported width.
//!
//! Replaces dynamic boxing of numeric values: constant folding, evaluation and
//! equality all go through [`Number`] and the widening table in
//! [`NumericKind`].  `Decimal` is carried as an `f64` but keeps its own type
//! identity (it never widens implicitly to or from the binary floats).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Numeric widths, declared in widening order (low → high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Decimal,
}

impl NumericKind {
    /// All widths in widening order.
    pub const ALL: [NumericKind; 10] = [
        NumericKind::Byte,
        NumericKind::Short,
        NumericKind::UShort,
        NumericKind::Int,
        NumericKind::UInt,
        NumericKind::Long,
        NumericKind::ULong,
        NumericKind::Float,
        NumericKind::Double,
        NumericKind::Decimal,
    ];

    /// Keyword spelling.
    pub const fn name(self) -> &'static str {
        match self {
            NumericKind::Byte => "byte",
            NumericKind::Short => "short",
            NumericKind::UShort => "ushort",
            NumericKind::Int => "int",
            NumericKind::UInt => "uint",
            NumericKind::Long => "long",
            NumericKind::ULong => "ulong",
            NumericKind::Float => "float",
            NumericKind::Double => "double",
            NumericKind::Decimal => "decimal",
        }
    }

    /// Framework spelling (`Int32`, `Double`, ...).
    pub const fn system_name(self) -> &'static str {
        match self {
            NumericKind::Byte => "Byte",
            NumericKind::Short => "Int16",
            NumericKind::UShort => "UInt16",
            NumericKind::Int => "Int32",
            NumericKind::UInt => "UInt32",
            NumericKind::Long => "Int64",
            NumericKind::ULong => "UInt64",
            NumericKind::Float => "Single",
            NumericKind::Double => "Double",
            NumericKind::Decimal => "Decimal",
        }
    }

    pub const fn is_integral(self) -> bool {
        !self.is_floating()
    }

    pub const fn is_floating(self) -> bool {
        matches!(
            self,
            NumericKind::Float | NumericKind::Double | NumericKind::Decimal
        )
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            NumericKind::Byte | NumericKind::UShort | NumericKind::UInt | NumericKind::ULong
        )
    }

    /// Implicit (lossless-by-language-rules) conversion from `self` to `to`.
    pub fn widens_to(self, to: NumericKind) -> bool {
        use NumericKind::*;

        if self == to {
            return true;
        }

        match self {
            Byte => !matches!(to, Byte),
            Short => matches!(to, Int | Long | Float | Double | Decimal),
            UShort => matches!(to, Int | UInt | Long | ULong | Float | Double | Decimal),
            Int => matches!(to, Long | Float | Double | Decimal),
            UInt => matches!(to, Long | ULong | Float | Double | Decimal),
            Long | ULong => matches!(to, Float | Double | Decimal),
            Float => matches!(to, Double),
            Double | Decimal => false,
        }
    }

    /// Binary numeric promotion: the width both operands are lifted to
    /// before an arithmetic, comparison or bitwise operator is applied.
    pub fn promote(a: NumericKind, b: NumericKind) -> NumericKind {
        use NumericKind::*;

        if a == Decimal || b == Decimal {
            Decimal
        } else if a == Double || b == Double {
            Double
        } else if a == Float || b == Float {
            Float
        } else if a == ULong || b == ULong {
            ULong
        } else if a == Long || b == Long {
            Long
        } else if a == UInt || b == UInt {
            let other = if a == UInt { b } else { a };
            if matches!(other, Short | Int) {
                Long
            } else {
                UInt
            }
        } else {
            Int
        }
    }

    /// Unary promotion (`-x`, `~x`, `+x`): small integers become `int`.
    pub fn promote_unary(self) -> NumericKind {
        match self {
            NumericKind::Byte | NumericKind::Short | NumericKind::UShort => NumericKind::Int,
            other => other,
        }
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arithmetic / bitwise operators that [`Number::binary`] knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
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
}

/// A numeric value of one concrete width.
#[derive(Debug, Clone, Copy, Serialize)]
pub enum Number {
    Byte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    Decimal(f64),
}

/// Apply `$body` to the payload of any integral variant, rebuilding the same variant.
macro_rules! with_integral {
    ($value:expr, $v:ident => $body:expr, $fallback:expr) => {
        match $value {
            Number::Byte($v) => Number::Byte($body),
            Number::Short($v) => Number::Short($body),
            Number::UShort($v) => Number::UShort($body),
            Number::Int($v) => Number::Int($body),
            Number::UInt($v) => Number::UInt($body),
            Number::Long($v) => Number::Long($body),
            Number::ULong($v) => Number::ULong($body),
            _ => $fallback,
        }
    };
}

impl Number {
    pub fn kind(&self) -> NumericKind {
        match self {
            Number::Byte(_) => NumericKind::Byte,
            Number::Short(_) => NumericKind::Short,
            Number::UShort(_) => NumericKind::UShort,
            Number::Int(_) => NumericKind::Int,
            Number::UInt(_) => NumericKind::UInt,
            Number::Long(_) => NumericKind::Long,
            Number::ULong(_) => NumericKind::ULong,
            Number::Float(_) => NumericKind::Float,
            Number::Double(_) => NumericKind::Double,
            Number::Decimal(_) => NumericKind::Decimal,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match *self {
            Number::Byte(v) => v as f64,
            Number::Short(v) => v as f64,
            Number::UShort(v) => v as f64,
            Number::Int(v) => v as f64,
            Number::UInt(v) => v as f64,
            Number::Long(v) => v as f64,
            Number::ULong(v) => v as f64,
            Number::Float(v) => v as f64,
            Number::Double(v) | Number::Decimal(v) => v,
        }
    }

    /// Exact integral payload, `None` for floating variants.
    pub fn to_i128(&self) -> Option<i128> {
        match *self {
            Number::Byte(v) => Some(v as i128),
            Number::Short(v) => Some(v as i128),
            Number::UShort(v) => Some(v as i128),
            Number::Int(v) => Some(v as i128),
            Number::UInt(v) => Some(v as i128),
            Number::Long(v) => Some(v as i128),
            Number::ULong(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.to_f64() == 0.0
    }

    /// Numeric value equal to `target` (used by rule slot predicates).
    pub fn equals_f64(&self, target: f64) -> bool {
        self.to_f64() == target
    }

    /// Explicit conversion (cast) semantics: integral truncation/wrapping,
    /// float → integral truncates toward zero.
    pub fn convert(&self, kind: NumericKind) -> Number {
        if let Some(i) = self.to_i128() {
            return match kind {
                NumericKind::Byte => Number::Byte(i as u8),
                NumericKind::Short => Number::Short(i as i16),
                NumericKind::UShort => Number::UShort(i as u16),
                NumericKind::Int => Number::Int(i as i32),
                NumericKind::UInt => Number::UInt(i as u32),
                NumericKind::Long => Number::Long(i as i64),
                NumericKind::ULong => Number::ULong(i as u64),
                NumericKind::Float => Number::Float(i as f32),
                NumericKind::Double => Number::Double(i as f64),
                NumericKind::Decimal => Number::Decimal(i as f64),
            };
        }

        let f = self.to_f64();
        match kind {
            NumericKind::Byte => Number::Byte(f as u8),
            NumericKind::Short => Number::Short(f as i16),
            NumericKind::UShort => Number::UShort(f as u16),
            NumericKind::Int => Number::Int(f as i32),
            NumericKind::UInt => Number::UInt(f as u32),
            NumericKind::Long => Number::Long(f as i64),
            NumericKind::ULong => Number::ULong(f as u64),
            NumericKind::Float => Number::Float(f as f32),
            NumericKind::Double => Number::Double(f),
            NumericKind::Decimal => Number::Decimal(f),
        }
    }

    /// Conversion that only succeeds when the value survives the round trip.
    pub fn try_lossless(&self, kind: NumericKind) -> Option<Number> {
        let converted = self.convert(kind);

        let same = match (self.to_i128(), converted.to_i128()) {
            (Some(a), Some(b)) => a == b,
            (Some(a), None) => {
                let f = converted.to_f64();
                f.fract() == 0.0 && f.is_finite() && f as i128 == a
            }
            (None, _) => {
                let original = self.to_f64();
                let back = converted.to_f64();
                if original.is_nan() {
                    back.is_nan()
                } else {
                    original == back
                }
            }
        };

        same.then_some(converted)
    }

    /// Narrowest of byte/short/int/long/double that exactly holds `value`.
    pub fn narrowest(value: f64) -> Number {
        if value.fract() == 0.0 && value.is_finite() {
            if (0.0..=u8::MAX as f64).contains(&value) {
                return Number::Byte(value as u8);
            }
            if (i16::MIN as f64..=i16::MAX as f64).contains(&value) {
                return Number::Short(value as i16);
            }
            if (i32::MIN as f64..=i32::MAX as f64).contains(&value) {
                return Number::Int(value as i32);
            }
            if (i64::MIN as f64..i64::MAX as f64).contains(&value) {
                return Number::Long(value as i64);
            }
        }

        Number::Double(value)
    }

    /// Wrapping integral / IEEE floating arithmetic after binary promotion.
    pub fn binary(op: ArithOp, left: Number, right: Number) -> Result<Number> {
        if op == ArithOp::Power {
            return Ok(Number::Double(left.to_f64().powf(right.to_f64())));
        }

        if matches!(op, ArithOp::LeftShift | ArithOp::RightShift) {
            let count = right.to_i128().ok_or_else(|| {
                CompileError::runtime("Shift count must be an integral value")
            })? as u32;
            let kind = left.kind().promote_unary();
            let value = left.convert(kind);
            if !kind.is_integral() {
                return Err(CompileError::runtime("Shift requires integral operands"));
            }
            let shifted = with_integral!(value, v => if op == ArithOp::LeftShift {
                v.wrapping_shl(count)
            } else {
                v.wrapping_shr(count)
            }, value);
            return Ok(shifted);
        }

        let kind = NumericKind::promote(left.kind(), right.kind());
        let a = left.convert(kind);
        let b = right.convert(kind);

        macro_rules! integral {
            ($x:expr, $y:expr, $variant:ident) => {{
                let (x, y) = ($x, $y);
                let value = match op {
                    ArithOp::Add => x.wrapping_add(y),
                    ArithOp::Subtract => x.wrapping_sub(y),
                    ArithOp::Multiply => x.wrapping_mul(y),
                    ArithOp::Divide | ArithOp::Modulo if y == 0 => {
                        return Err(CompileError::runtime("Attempted to divide by zero."));
                    }
                    ArithOp::Divide => x.wrapping_div(y),
                    ArithOp::Modulo => x.wrapping_rem(y),
                    ArithOp::And => x & y,
                    ArithOp::Or => x | y,
                    ArithOp::ExclusiveOr => x ^ y,
                    ArithOp::Power | ArithOp::LeftShift | ArithOp::RightShift => unreachable!(),
                };
                Number::$variant(value)
            }};
        }

        macro_rules! floating {
            ($x:expr, $y:expr, $variant:ident) => {{
                let (x, y) = ($x, $y);
                let value = match op {
                    ArithOp::Add => x + y,
                    ArithOp::Subtract => x - y,
                    ArithOp::Multiply => x * y,
                    ArithOp::Divide => x / y,
                    ArithOp::Modulo => x % y,
                    _ => {
                        return Err(CompileError::runtime(
                            "Bitwise operators require integral operands",
                        ));
                    }
                };
                Number::$variant(value)
            }};
        }

        let result = match (a, b) {
            (Number::Int(x), Number::Int(y)) => integral!(x, y, Int),
            (Number::UInt(x), Number::UInt(y)) => integral!(x, y, UInt),
            (Number::Long(x), Number::Long(y)) => integral!(x, y, Long),
            (Number::ULong(x), Number::ULong(y)) => integral!(x, y, ULong),
            (Number::Float(x), Number::Float(y)) => floating!(x, y, Float),
            (Number::Double(x), Number::Double(y)) => floating!(x, y, Double),
            (Number::Decimal(x), Number::Decimal(y)) => {
                if y == 0.0 && matches!(op, ArithOp::Divide | ArithOp::Modulo) {
                    return Err(CompileError::runtime("Attempted to divide by zero."));
                }
                floating!(x, y, Decimal)
            }
            (x, y) => {
                return Err(CompileError::runtime(format!(
                    "Cannot apply {:?} to {} and {}",
                    op,
                    x.kind(),
                    y.kind()
                )))
            }
        };

        Ok(result)
    }

    /// Arithmetic negation after unary promotion.
    pub fn negate(&self) -> Number {
        let value = self.convert(self.kind().promote_unary());
        match value {
            Number::Int(v) => Number::Int(v.wrapping_neg()),
            Number::UInt(v) => Number::Long(-(v as i64)),
            Number::Long(v) => Number::Long(v.wrapping_neg()),
            Number::ULong(v) => Number::ULong(v.wrapping_neg()),
            Number::Float(v) => Number::Float(-v),
            Number::Double(v) => Number::Double(-v),
            Number::Decimal(v) => Number::Decimal(-v),
            other => other,
        }
    }

    /// Bitwise complement; `None` for floating values.
    pub fn complement(&self) -> Option<Number> {
        let value = self.convert(self.kind().promote_unary());
        match value {
            Number::Int(v) => Some(Number::Int(!v)),
            Number::UInt(v) => Some(Number::UInt(!v)),
            Number::Long(v) => Some(Number::Long(!v)),
            Number::ULong(v) => Some(Number::ULong(!v)),
            _ => None,
        }
    }

    /// Ordering after binary promotion (`None` when a NaN is involved).
    pub fn compare(left: &Number, right: &Number) -> Option<Ordering> {
        let kind = NumericKind::promote(left.kind(), right.kind());
        let (a, b) = (left.convert(kind), right.convert(kind));

        match (a.to_i128(), b.to_i128()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }

    /// Same-width, same-value comparison.
    pub fn identical(&self, other: &Number) -> bool {
        self.kind() == other.kind() && Number::compare(self, other) == Some(Ordering::Equal)
    }

    /// Equality across widths: both values are lifted to each width in
    /// increasing size; the first width that holds both losslessly decides.
    pub fn equivalent(&self, other: &Number) -> bool {
        for kind in NumericKind::ALL {
            if let (Some(a), Some(b)) = (self.try_lossless(kind), other.try_lossless(kind)) {
                return a.identical(&b);
            }
        }

        self.identical(other)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.identical(other)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(i) = self.to_i128() {
            let mut buf = itoa::Buffer::new();
            return f.write_str(buf.format(i));
        }

        match *self {
            Number::Float(v) => write!(f, "{}", v),
            Number::Double(v) | Number::Decimal(v) => write!(f, "{}", v),
            _ => unreachable!("integral handled above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_follows_language_table() {
        assert!(NumericKind::Int.widens_to(NumericKind::Double));
        assert!(NumericKind::Byte.widens_to(NumericKind::ULong));
        assert!(!NumericKind::Int.widens_to(NumericKind::UInt));
        assert!(!NumericKind::Double.widens_to(NumericKind::Decimal));
        assert!(!NumericKind::Long.widens_to(NumericKind::Int));
    }

    #[test]
    fn promotion_lifts_small_integers_to_int() {
        assert_eq!(
            NumericKind::promote(NumericKind::Byte, NumericKind::Short),
            NumericKind::Int
        );
        assert_eq!(
            NumericKind::promote(NumericKind::UInt, NumericKind::Int),
            NumericKind::Long
        );
        assert_eq!(
            NumericKind::promote(NumericKind::Int, NumericKind::Double),
            NumericKind::Double
        );
    }

    #[test]
    fn integral_division_by_zero_is_an_error() {
        assert!(Number::binary(ArithOp::Divide, Number::Int(1), Number::Int(0)).is_err());
        let inf = Number::binary(ArithOp::Divide, Number::Double(1.0), Number::Double(0.0));
        assert!(inf.unwrap().to_f64().is_infinite());
    }

    #[test]
    fn equivalence_across_widths() {
        assert!(Number::Byte(14).equivalent(&Number::Double(14.0)));
        assert!(Number::Int(-3).equivalent(&Number::Long(-3)));
        assert!(!Number::Int(3).equivalent(&Number::Double(3.5)));
    }

    #[test]
    fn narrowest_picks_smallest_width() {
        assert_eq!(Number::narrowest(14.0).kind(), NumericKind::Byte);
        assert_eq!(Number::narrowest(-5.0).kind(), NumericKind::Short);
        assert_eq!(Number::narrowest(70000.0).kind(), NumericKind::Int);
        assert_eq!(Number::narrowest(0.5).kind(), NumericKind::Double);
    }

    #[test]
    fn shifts_wrap_like_the_host() {
        let n = Number::binary(ArithOp::LeftShift, Number::Int(1), Number::Int(4)).unwrap();
        assert_eq!(n.to_i128(), Some(16));
    }
}
