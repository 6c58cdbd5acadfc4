//! Element-wise casts between column kinds.

use colcore_common::{ColumnError, ColumnResult};
use colcore_storage::HostBuffer;
use colcore_types::{CastRule, DType, NativeType, cast_rule, float_to_int_wrapping};

use crate::column_vector::{ColumnData, ColumnVector, HostColumn};

/// A numeric element widened to one of two working representations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn to_i64(self) -> i64 {
        match self {
            Num::Int(v) => v,
            Num::Float(f) => float_to_int_wrapping(f),
        }
    }

    pub(crate) fn to_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(f) => f,
        }
    }
}

/// Decode one fixed-width element. Callers pass only numeric, date or bool kinds.
pub(crate) fn read_num(dtype: DType, bytes: &[u8]) -> Num {
    match dtype {
        DType::Int8 => Num::Int(i8::from_bytes(bytes) as i64),
        DType::Int16 => Num::Int(i16::from_bytes(bytes) as i64),
        DType::Int32 | DType::Date32 => Num::Int(i32::from_bytes(bytes) as i64),
        DType::Int64 => Num::Int(i64::from_bytes(bytes)),
        DType::Float32 => Num::Float(f32::from_bytes(bytes) as f64),
        DType::Float64 => Num::Float(f64::from_bytes(bytes)),
        DType::Bool8 => Num::Int(bool::from_bytes(bytes) as i64),
        DType::String => Num::Int(0),
    }
}

/// Encode `value` as `dtype` into `dst`, narrowing with wrap-around.
pub(crate) fn write_num(dtype: DType, value: Num, dst: &mut [u8]) {
    match dtype {
        DType::Int8 => (value.to_i64() as i8).write_bytes(dst),
        DType::Int16 => (value.to_i64() as i16).write_bytes(dst),
        DType::Int32 | DType::Date32 => (value.to_i64() as i32).write_bytes(dst),
        DType::Int64 => value.to_i64().write_bytes(dst),
        DType::Float32 => match value {
            Num::Int(v) => (v as f32).write_bytes(dst),
            Num::Float(f) => (f as f32).write_bytes(dst),
        },
        DType::Float64 => value.to_f64().write_bytes(dst),
        DType::Bool8 => match value {
            Num::Int(v) => (v != 0).write_bytes(dst),
            Num::Float(f) => (f != 0.0).write_bytes(dst),
        },
        DType::String => {}
    }
}

impl ColumnVector {
    /// Cast every element to `target`, producing a new host-resident vector.
    ///
    /// The validity bit-vector is carried over unchanged, including whether
    /// one exists at all. Values at null rows are converted like any other.
    pub fn cast_to(&self, target: DType) -> ColumnResult<ColumnVector> {
        let source_type = self.dtype();
        let rule = cast_rule(source_type, target).ok_or_else(|| ColumnError::UnsupportedCast {
            from: source_type.to_string(),
            to: target.to_string(),
        })?;
        let rows = self.row_count();
        let source = self.host()?;
        tracing::trace!(from = %source_type, to = %target, ?rule, rows, "casting column");

        let data = match (rule, &source.data) {
            (CastRule::Identity, data) => data.clone(),
            (_, ColumnData::Fixed(src)) => {
                let (Some(src_width), Some(dst_width)) =
                    (source_type.size_in_bytes(), target.size_in_bytes())
                else {
                    return Err(ColumnError::UnsupportedCast {
                        from: source_type.to_string(),
                        to: target.to_string(),
                    });
                };
                let mut out = HostBuffer::with_capacity(rows * dst_width);
                let dst = out.extend_zeroed(rows * dst_width);
                for (src, dst) in src
                    .as_slice()
                    .chunks_exact(src_width)
                    .zip(dst.chunks_exact_mut(dst_width))
                {
                    write_num(target, read_num(source_type, src), dst);
                }
                ColumnData::Fixed(out)
            }
            (_, ColumnData::Strings { .. }) => {
                return Err(ColumnError::UnsupportedCast {
                    from: source_type.to_string(),
                    to: target.to_string(),
                });
            }
        };

        let column = HostColumn {
            data,
            validity: source.validity.clone(),
        };
        Ok(ColumnVector::from_host(target, rows, column, Some(self.null_count())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_to_int8_keeps_low_byte() {
        let dates = ColumnVector::dates_from_days(&[17897]).unwrap();
        let bytes = dates.cast_to(DType::Int8).unwrap();
        assert_eq!(bytes.get::<i8>(0).unwrap(), -23);
        let wide = dates.cast_to(DType::Int64).unwrap();
        assert_eq!(wide.get::<i64>(0).unwrap(), 17897);
        dates.close();
        bytes.close();
        wide.close();
    }

    #[test]
    fn float_to_int_truncates() {
        let v = ColumnVector::from_slice(&[4.3f64, 3.8, -2.9, 300.7]).unwrap();
        let out = v.cast_to(DType::Int8).unwrap();
        assert_eq!(out.get::<i8>(0).unwrap(), 4);
        assert_eq!(out.get::<i8>(1).unwrap(), 3);
        assert_eq!(out.get::<i8>(2).unwrap(), -2);
        assert_eq!(out.get::<i8>(3).unwrap(), 44);
        v.close();
        out.close();
    }

    #[test]
    fn int_to_date_and_float() {
        let v = ColumnVector::from_slice(&[17897i64, -1]).unwrap();
        let dates = v.cast_to(DType::Date32).unwrap();
        assert_eq!(dates.dtype(), DType::Date32);
        assert_eq!(dates.get::<i32>(0).unwrap(), 17897);
        let floats = v.cast_to(DType::Float32).unwrap();
        assert_eq!(floats.get::<f32>(1).unwrap(), -1.0);
        v.close();
        dates.close();
        floats.close();
    }

    #[test]
    fn bool_casts() {
        let v = ColumnVector::from_slice(&[0i32, 7, -1]).unwrap();
        let b = v.cast_to(DType::Bool8).unwrap();
        assert!(!b.get::<bool>(0).unwrap());
        assert!(b.get::<bool>(1).unwrap());
        assert!(b.get::<bool>(2).unwrap());
        let back = b.cast_to(DType::Int16).unwrap();
        assert_eq!(back.get::<i16>(1).unwrap(), 1);
        v.close();
        b.close();
        back.close();
    }

    #[test]
    fn validity_carried_over() {
        let v = ColumnVector::from_options(&[Some(1i16), None, Some(3)]).unwrap();
        let out = v.cast_to(DType::Float64).unwrap();
        assert!(out.has_validity_vector());
        assert_eq!(out.null_count(), 1);
        assert!(out.is_null(1).unwrap());
        assert_eq!(out.get::<f64>(2).unwrap(), 3.0);

        let plain = ColumnVector::from_slice(&[1i16]).unwrap();
        let cast = plain.cast_to(DType::Int32).unwrap();
        assert!(!cast.has_validity_vector());
        v.close();
        out.close();
        plain.close();
        cast.close();
    }

    #[test]
    fn identity_copies_strings() {
        let v = ColumnVector::from_option_strs(&[Some("a"), None]).unwrap();
        let out = v.cast_to(DType::String).unwrap();
        assert_eq!(out.get_str(0).unwrap(), "a");
        assert!(out.is_null(1).unwrap());
        v.close();
        out.close();
    }

    #[test]
    fn unsupported_casts() {
        let v = ColumnVector::from_strs(&["1"]).unwrap();
        assert_eq!(
            v.cast_to(DType::Int32).unwrap_err(),
            ColumnError::UnsupportedCast {
                from: "STRING".into(),
                to: "INT32".into()
            }
        );
        let n = ColumnVector::from_slice(&[1i32]).unwrap();
        assert!(matches!(
            n.cast_to(DType::String).unwrap_err(),
            ColumnError::UnsupportedCast { .. }
        ));
        v.close();
        n.close();
    }
}
