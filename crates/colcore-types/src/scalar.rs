use smol_str::SmolStr;

use crate::dtype::DType;

/// A single typed element read out of a column, or `Null`.
#[derive(Clone, Debug)]
pub enum Scalar {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool8(bool),
    Date32(i32),
    String(SmolStr),
}

// Manual PartialEq: compare floats bitwise so NaN == NaN.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool8(a), Self::Bool8(b)) => a == b,
            (Self::Date32(a), Self::Date32(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Scalar {
    /// Element kind of this value. `None` for `Null`.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::Null => None,
            Self::Int8(_) => Some(DType::Int8),
            Self::Int16(_) => Some(DType::Int16),
            Self::Int32(_) => Some(DType::Int32),
            Self::Int64(_) => Some(DType::Int64),
            Self::Float32(_) => Some(DType::Float32),
            Self::Float64(_) => Some(DType::Float64),
            Self::Bool8(_) => Some(DType::Bool8),
            Self::Date32(_) => Some(DType::Date32),
            Self::String(_) => Some(DType::String),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view of an integral, boolean or date value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(v) => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::Int32(v) | Self::Date32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::Bool8(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Floating-point view of any numeric, boolean or date value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float32(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool8(v) => write!(f, "{v}"),
            Self::Date32(v) => write!(f, "date({v})"),
            Self::String(v) => write!(f, "{v}"),
        }
    }
}
