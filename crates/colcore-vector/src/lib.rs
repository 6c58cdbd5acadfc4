//! colcore-vector: immutable nullable column vectors, their builder, casts,
//! concatenation and element-wise arithmetic.

pub mod binary_op;
pub mod builder;
pub mod cast;
pub mod column_vector;
pub mod concat;

pub use binary_op::{BinaryOp, binary_op, binary_op_scalar};
pub use builder::ColumnBuilder;
pub use column_vector::{ColumnVector, HostView};

pub use colcore_common::{ColumnError, ColumnResult, CoreConfig};
pub use colcore_storage::Residency;
pub use colcore_types::{DType, NativeType, Scalar};
