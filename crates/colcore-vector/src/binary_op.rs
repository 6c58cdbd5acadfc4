//! Element-wise arithmetic and comparison between two columns or a column
//! and a scalar.
//!
//! `Add`, `Sub`, `Mul`, `Div` and `Mod` first convert both operands to the
//! output kind and then compute in that kind: integer arithmetic wraps and
//! float `Mod` is `fmod`. `TrueDiv`, `FloorDiv` and `Pow` always compute in
//! `f64` and convert the result with the regular cast rules. Integer
//! division or remainder by zero yields a null row.
//!
//! The `R*` variants swap their operands, so `binary_op_scalar(col, s, RSub, ..)`
//! computes `s - col`. Comparisons compare the operands' native values and
//! always produce a `Bool8` column.

use std::cmp::Ordering;

use colcore_common::{ColumnError, ColumnResult};
use colcore_storage::{HostBuffer, ValidityBuffer};
use colcore_types::{DType, Scalar};

use crate::cast::{Num, read_num, write_num};
use crate::column_vector::{ColumnData, ColumnVector, HostColumn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    RSub,
    Mul,
    Div,
    RDiv,
    TrueDiv,
    RTrueDiv,
    FloorDiv,
    RFloorDiv,
    Mod,
    RMod,
    Pow,
    RPow,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::Greater
                | Self::LessEqual
                | Self::GreaterEqual
        )
    }

    /// The operator with swapped operands that this one stands for, if any.
    fn unreversed(self) -> Option<Self> {
        match self {
            Self::RSub => Some(Self::Sub),
            Self::RDiv => Some(Self::Div),
            Self::RTrueDiv => Some(Self::TrueDiv),
            Self::RFloorDiv => Some(Self::FloorDiv),
            Self::RMod => Some(Self::Mod),
            Self::RPow => Some(Self::Pow),
            _ => None,
        }
    }

    fn apply(self, a: Num, b: Num, out: DType) -> Option<Num> {
        if let Some(op) = self.unreversed() {
            return op.apply(b, a, out);
        }
        if self.is_comparison() {
            return Some(Num::Int(self.compare(a, b) as i64));
        }
        match self {
            Self::TrueDiv => return Some(Num::Float(a.to_f64() / b.to_f64())),
            Self::FloorDiv => return Some(Num::Float((a.to_f64() / b.to_f64()).floor())),
            Self::Pow => return Some(Num::Float(a.to_f64().powf(b.to_f64()))),
            _ => {}
        }
        match (coerce(a, out), coerce(b, out)) {
            (Num::Int(x), Num::Int(y)) => match self {
                Self::Add => Some(Num::Int(x.wrapping_add(y))),
                Self::Sub => Some(Num::Int(x.wrapping_sub(y))),
                Self::Mul => Some(Num::Int(x.wrapping_mul(y))),
                Self::Div => (y != 0).then(|| Num::Int(x.wrapping_div(y))),
                Self::Mod => (y != 0).then(|| Num::Int(x.wrapping_rem(y))),
                _ => None,
            },
            (x, y) => {
                let (x, y) = (x.to_f64(), y.to_f64());
                Some(Num::Float(match self {
                    Self::Add => x + y,
                    Self::Sub => x - y,
                    Self::Mul => x * y,
                    Self::Div => x / y,
                    _ => x % y,
                }))
            }
        }
    }

    // Integers compare exactly; anything involving a float compares as f64,
    // where NaN is unordered and only `NotEqual` holds.
    fn compare(self, a: Num, b: Num) -> bool {
        let ord = match (a, b) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
        };
        match self {
            Self::Equal => ord == Some(Ordering::Equal),
            Self::NotEqual => ord != Some(Ordering::Equal),
            Self::Less => ord == Some(Ordering::Less),
            Self::Greater => ord == Some(Ordering::Greater),
            Self::LessEqual => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            Self::GreaterEqual => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            _ => false,
        }
    }
}

/// Round-trip `value` through the storage of `dtype`.
fn coerce(value: Num, dtype: DType) -> Num {
    let mut slot = [0u8; 8];
    write_num(dtype, value, &mut slot);
    read_num(dtype, &slot)
}

fn check_arithmetic(dtype: DType) -> ColumnResult<()> {
    if dtype.is_numeric() || dtype.is_temporal() {
        Ok(())
    } else {
        Err(ColumnError::type_mismatch("numeric or date", dtype))
    }
}

fn check_output(op: BinaryOp, out: DType) -> ColumnResult<()> {
    if op.is_comparison() {
        if out != DType::Bool8 {
            return Err(ColumnError::type_mismatch(DType::Bool8, out));
        }
        return Ok(());
    }
    check_arithmetic(out)
}

fn scalar_num(value: &Scalar) -> Option<Num> {
    match value {
        Scalar::Float32(_) | Scalar::Float64(_) => value.as_f64().map(Num::Float),
        other => other.as_i64().map(Num::Int),
    }
}

/// `lhs <op> rhs` row by row, producing a host-resident vector of `out`.
pub fn binary_op(
    lhs: &ColumnVector,
    rhs: &ColumnVector,
    op: BinaryOp,
    out: DType,
) -> ColumnResult<ColumnVector> {
    check_arithmetic(lhs.dtype())?;
    check_arithmetic(rhs.dtype())?;
    check_output(op, out)?;
    if lhs.row_count() != rhs.row_count() {
        return Err(ColumnError::RowCountMismatch {
            left: lhs.row_count(),
            right: rhs.row_count(),
        });
    }
    let right = rhs.host()?;
    let (rhs_type, rhs_width) = (rhs.dtype(), rhs.dtype().size_in_bytes().unwrap_or(0));
    let ColumnData::Fixed(right_data) = &right.data else {
        return Err(ColumnError::type_mismatch("numeric or date", rhs_type));
    };
    let right_values = right_data.as_slice();
    let right_validity = right.validity.as_ref();
    evaluate(lhs, op, out, right_validity.is_some(), |row| {
        if right_validity.is_some_and(|v| !v.is_valid(row)) {
            return None;
        }
        let offset = row * rhs_width;
        Some(read_num(rhs_type, &right_values[offset..offset + rhs_width]))
    })
}

/// `lhs <op> rhs` with a scalar right operand. A null scalar makes every row null.
/// Use the `R*` operators for `rhs <op> lhs`.
pub fn binary_op_scalar(
    lhs: &ColumnVector,
    rhs: &Scalar,
    op: BinaryOp,
    out: DType,
) -> ColumnResult<ColumnVector> {
    check_arithmetic(lhs.dtype())?;
    check_output(op, out)?;
    if let Some(dtype) = rhs.dtype() {
        check_arithmetic(dtype)?;
    }
    let value = scalar_num(rhs);
    evaluate(lhs, op, out, value.is_none(), |_| value)
}

fn evaluate<R>(
    lhs: &ColumnVector,
    op: BinaryOp,
    out: DType,
    rhs_nullable: bool,
    mut rhs_at: R,
) -> ColumnResult<ColumnVector>
where
    R: FnMut(usize) -> Option<Num>,
{
    let rows = lhs.row_count();
    let left = lhs.host()?;
    let (lhs_type, lhs_width) = (lhs.dtype(), lhs.dtype().size_in_bytes().unwrap_or(0));
    let ColumnData::Fixed(left_data) = &left.data else {
        return Err(ColumnError::type_mismatch("numeric or date", lhs_type));
    };
    let left_values = left_data.as_slice();
    let left_validity = left.validity.as_ref();
    let out_width = out.size_in_bytes().unwrap_or(0);
    tracing::trace!(?op, lhs = %lhs_type, %out, rows, "evaluating binary op");

    let mut data = HostBuffer::with_capacity(rows * out_width);
    let dst = data.extend_zeroed(rows * out_width);
    let mut validity = (left_validity.is_some() || rhs_nullable).then(|| ValidityBuffer::new_all_valid(rows));
    let mut null_count = 0;

    for row in 0..rows {
        let left_valid = left_validity.is_none_or(|v| v.is_valid(row));
        let offset = row * lhs_width;
        let result = match rhs_at(row) {
            Some(b) if left_valid => {
                op.apply(read_num(lhs_type, &left_values[offset..offset + lhs_width]), b, out)
            }
            _ => None,
        };
        match result {
            Some(value) => write_num(out, value, &mut dst[row * out_width..(row + 1) * out_width]),
            None => {
                validity
                    .get_or_insert_with(|| ValidityBuffer::new_all_valid(rows))
                    .set_null(row);
                null_count += 1;
            }
        }
    }

    Ok(ColumnVector::from_host(
        out,
        rows,
        HostColumn {
            data: ColumnData::Fixed(data),
            validity,
        },
        Some(null_count),
    ))
}
