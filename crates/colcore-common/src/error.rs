use thiserror::Error;

/// Error type shared by every layer of the column vector core.
///
/// Every variant is a contract violation reported to the immediate caller.
/// Nothing here is transient and nothing is retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    #[error("index {index} out of range for column with {rows} rows")]
    IndexOutOfRange { index: usize, rows: usize },

    #[error("capacity exceeded: {requested} rows requested, capacity is {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unsupported cast from {from} to {to}")]
    UnsupportedCast { from: String, to: String },

    #[error("row count mismatch: {left} vs {right}")]
    RowCountMismatch { left: usize, right: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("device error: {0}")]
    Device(String),
}

impl ColumnError {
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type ColumnResult<T> = Result<T, ColumnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formatting() {
        let err = ColumnError::IndexOutOfRange { index: 3, rows: 3 };
        assert_eq!(err.to_string(), "index 3 out of range for column with 3 rows");

        let err = ColumnError::CapacityExceeded {
            requested: 4,
            capacity: 3,
        };
        assert_eq!(
            err.to_string(),
            "capacity exceeded: 4 rows requested, capacity is 3"
        );

        let err = ColumnError::InvalidState("builder already finalized".into());
        assert_eq!(err.to_string(), "invalid state: builder already finalized");
    }

    #[test]
    fn type_mismatch_helper() {
        let err = ColumnError::type_mismatch("INT32", "FLOAT32");
        assert!(matches!(err, ColumnError::TypeMismatch { .. }));
        assert_eq!(err.to_string(), "type mismatch: expected INT32, found FLOAT32");
    }

    #[test]
    fn result_alias_works() {
        fn returns_ok() -> ColumnResult<i32> {
            Ok(42)
        }
        fn returns_err() -> ColumnResult<i32> {
            Err(ColumnError::Device("transfer failed".into()))
        }
        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
