use colcore_common::{ColumnError, ColumnResult};
use colcore_storage::ValidityBuffer;

use crate::column_vector::{ColumnData, ColumnVector, HostColumn};

impl ColumnVector {
    /// Concatenate `parts` in order into one host-resident vector.
    ///
    /// Every part must have the same type; this is checked before anything is
    /// allocated. The result carries a validity vector only when at least one
    /// part does.
    pub fn concatenate(parts: &[&ColumnVector]) -> ColumnResult<ColumnVector> {
        let Some(first) = parts.first() else {
            return Err(ColumnError::InvalidArgument(
                "concatenate needs at least one vector".into(),
            ));
        };
        let dtype = first.dtype();
        if let Some(other) = parts.iter().find(|p| p.dtype() != dtype) {
            return Err(ColumnError::type_mismatch(dtype, other.dtype()));
        }

        let rows: usize = parts.iter().map(|p| p.row_count()).sum();
        let null_count: usize = parts.iter().map(|p| p.null_count()).sum();
        let any_validity = parts.iter().any(|p| p.has_validity_vector());
        let width = dtype.size_in_bytes().unwrap_or(0);

        let mut data = ColumnData::with_capacity(dtype, rows);
        let mut validity = any_validity.then(|| ValidityBuffer::new_all_valid(rows));
        let mut offset = 0;
        for part in parts {
            let host = part.host()?;
            let count = part.row_count();
            data.extend_from(&host.data, count, width)?;
            if let (Some(dst), Some(src)) = (validity.as_mut(), host.validity.as_ref()) {
                dst.append_from(offset, src, count);
            }
            offset += count;
        }

        tracing::debug!(
            %dtype,
            parts = parts.len(),
            rows,
            nulls = null_count,
            "concatenated column vectors"
        );
        Ok(ColumnVector::from_host(
            dtype,
            rows,
            HostColumn { data, validity },
            Some(null_count),
        ))
    }
}
