//! Cast matrix: which element kinds convert to which, and how.

use crate::dtype::DType;

/// How one element is transformed when casting between two kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CastRule {
    /// Same kind; bytes are copied.
    Identity,
    /// Integer to a wider integer, sign-extended.
    Widen,
    /// Integer to a narrower integer, high bits dropped.
    Truncate,
    /// Date to integer or integer to date: the day count is reused as-is,
    /// then widened or truncated like an `i32` would be.
    Reinterpret,
    IntToFloat,
    /// Round toward zero, wrap modulo 2^64 and narrow. Never saturates.
    FloatToInt,
    /// Float32 to Float64 or back, rounding to nearest.
    FloatResize,
    /// `false` → 0, `true` → 1.
    BoolToNumber,
    /// Non-zero → `true`.
    NumberToBool,
}

/// Look up the rule for casting `from` into `to`.
/// Returns `None` when the pair is not part of the matrix.
pub fn cast_rule(from: DType, to: DType) -> Option<CastRule> {
    use DType::*;

    if from == to {
        return Some(CastRule::Identity);
    }
    match (from, to) {
        (String, _) | (_, String) => None,
        (Date32, t) | (t, Date32) if t.is_integer() => Some(CastRule::Reinterpret),
        (f, t) if f.is_integer() && t.is_integer() => {
            if t.size_in_bytes() > f.size_in_bytes() {
                Some(CastRule::Widen)
            } else {
                Some(CastRule::Truncate)
            }
        }
        (f, t) if (f.is_integer() || f.is_temporal()) && t.is_floating() => {
            Some(CastRule::IntToFloat)
        }
        (f, t) if f.is_floating() && (t.is_integer() || t.is_temporal()) => {
            Some(CastRule::FloatToInt)
        }
        (f, t) if f.is_floating() && t.is_floating() => Some(CastRule::FloatResize),
        (Bool8, _) => Some(CastRule::BoolToNumber),
        (_, Bool8) => Some(CastRule::NumberToBool),
        _ => None,
    }
}

const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Convert a float to an integer by truncating toward zero and wrapping
/// modulo 2^64. NaN and infinities map to 0.
///
/// The result is meant to be narrowed further with `as`, which keeps the
/// low bits, so `float_to_int_wrapping(300.7) as i8 == 44`.
pub fn float_to_int_wrapping(v: f64) -> i64 {
    if !v.is_finite() {
        return 0;
    }
    let t = v.trunc();
    if t >= i64::MIN as f64 && t < i64::MAX as f64 {
        return t as i64;
    }
    let m = t.rem_euclid(TWO_POW_64);
    (m as u64) as i64
}
