//! colcore-types: element kinds, native type mapping, cast matrix, scalars.

pub mod cast;
pub mod dtype;
pub mod native;
pub mod scalar;

pub use cast::{CastRule, cast_rule, float_to_int_wrapping};
pub use dtype::DType;
pub use native::NativeType;
pub use scalar::Scalar;
