/// Element kind of a column.
///
/// The set is closed: every kind has exactly one storage width and every
/// cast between two kinds is decided by [`crate::cast::cast_rule`].
/// Discriminants follow the type ids used by the device runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum DType {
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,
    Float32 = 5,
    Float64 = 6,
    Bool8 = 7,
    /// Days since the Unix epoch, stored as a 4-byte signed integer.
    Date32 = 8,
    /// UTF-8 strings: `u32` offsets plus a contiguous byte buffer.
    String = 12,
}

impl DType {
    pub const ALL: [DType; 9] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Float32,
        Self::Float64,
        Self::Bool8,
        Self::Date32,
        Self::String,
    ];

    /// Size in bytes of one element.
    /// Returns `None` for variable-width kinds.
    pub const fn size_in_bytes(&self) -> Option<usize> {
        match self {
            Self::Int8 | Self::Bool8 => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float32 | Self::Date32 => Some(4),
            Self::Int64 | Self::Float64 => Some(8),
            Self::String => None,
        }
    }

    pub const fn is_fixed_width(&self) -> bool {
        self.size_in_bytes().is_some()
    }

    /// The kind whose native Rust type backs this kind's storage.
    /// `Date32` is stored as `Int32`; every other kind is its own storage.
    pub const fn storage_type(&self) -> DType {
        match self {
            Self::Date32 => Self::Int32,
            other => *other,
        }
    }

    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_floating(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::Date32)
    }

    pub const fn type_id(&self) -> u8 {
        *self as u8
    }

    pub fn from_type_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_id() == id)
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::Bool8 => "BOOL8",
            Self::Date32 => "DATE32",
            Self::String => "STRING",
        };
        write!(f, "{name}")
    }
}
