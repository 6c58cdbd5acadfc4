//! Mapping between Rust primitives and fixed-width element kinds.

use crate::dtype::DType;
use crate::scalar::Scalar;

/// A fixed-width Rust type that can be stored in a column's data buffer.
/// Uses safe `from_ne_bytes`/`to_ne_bytes` conversions.
pub trait NativeType: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Storage kind backing this type.
    const DTYPE: DType;
    const SIZE: usize = std::mem::size_of::<Self>();

    /// Write this value into `dst[..Self::SIZE]`.
    fn write_bytes(self, dst: &mut [u8]);
    /// Read a value from `bytes[..Self::SIZE]`.
    fn from_bytes(bytes: &[u8]) -> Self;
    fn to_scalar(self) -> Scalar;
}

macro_rules! impl_native_type {
    ($ty:ty, $dtype:ident) => {
        impl NativeType for $ty {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn write_bytes(self, dst: &mut [u8]) {
                dst[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn from_bytes(bytes: &[u8]) -> Self {
                let mut arr = [0u8; std::mem::size_of::<$ty>()];
                arr.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                <$ty>::from_ne_bytes(arr)
            }

            fn to_scalar(self) -> Scalar {
                Scalar::$dtype(self)
            }
        }
    };
}

impl_native_type!(i8, Int8);
impl_native_type!(i16, Int16);
impl_native_type!(i32, Int32);
impl_native_type!(i64, Int64);
impl_native_type!(f32, Float32);
impl_native_type!(f64, Float64);

impl NativeType for bool {
    const DTYPE: DType = DType::Bool8;

    #[inline]
    fn write_bytes(self, dst: &mut [u8]) {
        dst[0] = self as u8;
    }

    #[inline]
    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Bool8(self)
    }
}
