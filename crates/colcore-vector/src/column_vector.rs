//! ColumnVector: immutable, reference-counted, nullable typed column.
//!
//! A vector owns a data buffer, an optional validity bit-vector, a fixed row
//! count and a cached null count. Its data lives on the device, on the host,
//! or both; element access materializes a host copy on first use. The host
//! copy and the null count are each computed at most once, so a finalized
//! vector can be read from many threads without locking.

use std::sync::{Arc, OnceLock};

use colcore_common::{ColumnError, ColumnResult};
use colcore_storage::{
    DeviceBuffer, DeviceRuntime, HostBuffer, Residency, TrackedResource, ValidityBuffer,
    allocation_size_bytes,
};
use colcore_types::{DType, NativeType, Scalar};
use smol_str::SmolStr;

use crate::builder::ColumnBuilder;

/// Host-side element storage.
#[derive(Clone, Debug)]
pub(crate) enum ColumnData {
    /// `rows * width` bytes.
    Fixed(HostBuffer),
    /// `rows + 1` offsets into `chars`.
    Strings { offsets: Vec<u32>, chars: HostBuffer },
}

impl ColumnData {
    /// Empty storage sized for `rows` elements of `dtype`.
    pub(crate) fn with_capacity(dtype: DType, rows: usize) -> Self {
        match dtype.size_in_bytes() {
            Some(width) => Self::Fixed(HostBuffer::with_capacity(rows * width)),
            None => {
                let mut offsets = Vec::with_capacity(rows + 1);
                offsets.push(0);
                Self::Strings {
                    offsets,
                    chars: HostBuffer::with_capacity(0),
                }
            }
        }
    }

    /// Append rows `[0, rows)` of `other`, which must be the same variant.
    /// Nothing is written if the string buffer would outgrow `u32` offsets.
    pub(crate) fn extend_from(&mut self, other: &ColumnData, rows: usize, width: usize) -> ColumnResult<()> {
        match (self, other) {
            (Self::Fixed(dst), Self::Fixed(src)) => {
                dst.extend_from_slice(&src.as_slice()[..rows * width]);
            }
            (
                Self::Strings { offsets, chars },
                Self::Strings {
                    offsets: src_offsets,
                    chars: src_chars,
                },
            ) => {
                let end = src_offsets[rows] as usize;
                string_end(chars.len(), end)?;
                let base = chars.len() as u32;
                chars.extend_from_slice(&src_chars.as_slice()[..end]);
                offsets.extend(src_offsets[1..=rows].iter().map(|o| base + o));
            }
            _ => debug_assert!(false, "mismatched column data variants"),
        }
        Ok(())
    }
}

/// End offset of a string buffer holding `current` bytes after `extra` more.
pub(crate) fn string_end(current: usize, extra: usize) -> ColumnResult<u32> {
    current
        .checked_add(extra)
        .and_then(|end| u32::try_from(end).ok())
        .ok_or_else(|| {
            ColumnError::InvalidArgument(format!(
                "string data would grow past {} bytes",
                u32::MAX
            ))
        })
}

/// Host copy of a vector's buffers.
#[derive(Clone, Debug)]
pub(crate) struct HostColumn {
    pub(crate) data: ColumnData,
    pub(crate) validity: Option<ValidityBuffer>,
}

/// Device copy of a vector's buffers.
#[derive(Debug)]
pub(crate) struct DeviceColumn {
    data: DeviceBuffer,
    offsets: Option<DeviceBuffer>,
    validity: Option<DeviceBuffer>,
}

impl DeviceColumn {
    pub(crate) fn upload(runtime: &Arc<dyn DeviceRuntime>, host: &HostColumn) -> ColumnResult<Self> {
        let (data, offsets) = match &host.data {
            ColumnData::Fixed(buf) => (DeviceBuffer::upload(runtime, buf.as_slice())?, None),
            ColumnData::Strings { offsets, chars } => {
                let raw: Vec<u8> = offsets.iter().flat_map(|o| o.to_ne_bytes()).collect();
                (
                    DeviceBuffer::upload(runtime, chars.as_slice())?,
                    Some(DeviceBuffer::upload(runtime, &raw)?),
                )
            }
        };
        let validity = host
            .validity
            .as_ref()
            .map(|v| DeviceBuffer::upload(runtime, v.as_bytes()))
            .transpose()?;
        Ok(Self {
            data,
            offsets,
            validity,
        })
    }

    fn download(&self) -> ColumnResult<HostColumn> {
        let bytes = HostBuffer::from_vec(self.data.download()?);
        let data = match &self.offsets {
            None => ColumnData::Fixed(bytes),
            Some(dev_offsets) => {
                let raw = dev_offsets.download()?;
                let offsets = raw
                    .chunks_exact(4)
                    .map(|c| {
                        let mut arr = [0u8; 4];
                        arr.copy_from_slice(c);
                        u32::from_ne_bytes(arr)
                    })
                    .collect();
                ColumnData::Strings {
                    offsets,
                    chars: bytes,
                }
            }
        };
        let validity = self
            .validity
            .as_ref()
            .map(|v| v.download().map(ValidityBuffer::from_bytes))
            .transpose()?;
        Ok(HostColumn { data, validity })
    }
}

#[derive(Debug)]
struct VectorStorage {
    dtype: DType,
    rows: usize,
    has_validity: bool,
    null_count: OnceLock<usize>,
    host: OnceLock<HostColumn>,
    device: Option<DeviceColumn>,
    resource: TrackedResource,
}

/// Immutable typed column with an optional validity bit-vector.
///
/// Cloning the handle shares the underlying storage and increments its
/// reference count. Call [`ColumnVector::close`] to release a reference
/// explicitly; storage dropped without any explicit release is counted as a
/// leak by the memory tracker.
#[derive(Clone, Debug)]
pub struct ColumnVector {
    inner: Arc<VectorStorage>,
}

/// Borrowed view of a vector's host-resident buffers.
#[derive(Clone, Copy, Debug)]
pub struct HostView<'a> {
    dtype: DType,
    rows: usize,
    column: &'a HostColumn,
}

impl<'a> HostView<'a> {
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Element bytes; string characters for `String` columns.
    pub fn data(&self) -> &'a [u8] {
        match &self.column.data {
            ColumnData::Fixed(buf) => buf.as_slice(),
            ColumnData::Strings { chars, .. } => chars.as_slice(),
        }
    }

    /// String offsets (`rows + 1` entries), `None` for fixed-width columns.
    pub fn offsets(&self) -> Option<&'a [u32]> {
        match &self.column.data {
            ColumnData::Fixed(_) => None,
            ColumnData::Strings { offsets, .. } => Some(offsets),
        }
    }

    /// Raw validity bytes including the padding region.
    pub fn validity(&self) -> Option<&'a [u8]> {
        self.column.validity.as_ref().map(ValidityBuffer::as_bytes)
    }
}

impl ColumnVector {
    pub(crate) fn from_host(
        dtype: DType,
        rows: usize,
        column: HostColumn,
        null_count: Option<usize>,
    ) -> Self {
        let has_validity = column.validity.is_some();
        let host = OnceLock::new();
        let _ = host.set(column);
        Self::from_storage(VectorStorage {
            dtype,
            rows,
            has_validity,
            null_count: null_count.map(OnceLock::from).unwrap_or_default(),
            host,
            device: None,
            resource: TrackedResource::register("column_vector"),
        })
    }

    pub(crate) fn from_device(
        dtype: DType,
        rows: usize,
        device: DeviceColumn,
        has_validity: bool,
        null_count: usize,
    ) -> Self {
        Self::from_storage(VectorStorage {
            dtype,
            rows,
            has_validity,
            null_count: OnceLock::from(null_count),
            host: OnceLock::new(),
            device: Some(device),
            resource: TrackedResource::register("column_vector"),
        })
    }

    fn from_storage(storage: VectorStorage) -> Self {
        Self {
            inner: Arc::new(storage),
        }
    }

    /// Assemble a fixed-width vector from raw host bytes.
    ///
    /// `data` must hold exactly `rows * width` bytes. `validity`, when given,
    /// must cover at least `rows` bits; it is padded to the aligned
    /// allocation size with valid bits.
    pub fn from_host_parts(
        dtype: DType,
        rows: usize,
        data: Vec<u8>,
        validity: Option<Vec<u8>>,
    ) -> ColumnResult<Self> {
        let width = dtype
            .size_in_bytes()
            .ok_or_else(|| ColumnError::InvalidArgument(format!("{dtype} is not fixed width")))?;
        if data.len() != rows * width {
            return Err(ColumnError::InvalidArgument(format!(
                "data buffer has {} bytes, expected {}",
                data.len(),
                rows * width
            )));
        }
        let validity = match validity {
            Some(mut bytes) => {
                if bytes.len() * 8 < rows {
                    return Err(ColumnError::InvalidArgument(format!(
                        "validity buffer covers {} rows, expected {rows}",
                        bytes.len() * 8
                    )));
                }
                let padded = allocation_size_bytes(rows).max(bytes.len());
                bytes.resize(padded, 0xFF);
                let mut v = ValidityBuffer::from_bytes(bytes);
                v.set_range(rows, v.capacity_bits() - rows, true);
                Some(v)
            }
            None => None,
        };
        let column = HostColumn {
            data: ColumnData::Fixed(HostBuffer::from_vec(data)),
            validity,
        };
        Ok(Self::from_host(dtype, rows, column, None))
    }

    /// Build a vector of `dtype` with room for `rows` values.
    /// The builder is closed if `f` or the final build fails.
    pub fn build<F>(dtype: DType, rows: usize, f: F) -> ColumnResult<Self>
    where
        F: FnOnce(&mut ColumnBuilder) -> ColumnResult<()>,
    {
        let mut builder = ColumnBuilder::new(dtype, rows);
        let result = f(&mut builder).and_then(|()| builder.build());
        if result.is_err() {
            builder.close();
        }
        result
    }

    pub fn from_slice<T: NativeType>(values: &[T]) -> ColumnResult<Self> {
        Self::build(T::DTYPE, values.len(), |b| b.append_slice(values).map(|_| ()))
    }

    /// `None` entries become null rows.
    pub fn from_options<T: NativeType>(values: &[Option<T>]) -> ColumnResult<Self> {
        Self::build(T::DTYPE, values.len(), |b| b.append_options(values).map(|_| ()))
    }

    /// Date column from day counts since the Unix epoch.
    pub fn dates_from_days(days: &[i32]) -> ColumnResult<Self> {
        Self::build(DType::Date32, days.len(), |b| b.append_slice(days).map(|_| ()))
    }

    pub fn dates_from_options(days: &[Option<i32>]) -> ColumnResult<Self> {
        Self::build(DType::Date32, days.len(), |b| b.append_options(days).map(|_| ()))
    }

    pub fn from_strs(values: &[&str]) -> ColumnResult<Self> {
        Self::build(DType::String, values.len(), |b| {
            for v in values {
                b.append_str(v)?;
            }
            Ok(())
        })
    }

    pub fn from_option_strs(values: &[Option<&str>]) -> ColumnResult<Self> {
        Self::build(DType::String, values.len(), |b| {
            for v in values {
                match v {
                    Some(s) => b.append_str(s)?,
                    None => b.append_null()?,
                };
            }
            Ok(())
        })
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn row_count(&self) -> usize {
        self.inner.rows
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rows == 0
    }

    pub fn has_validity_vector(&self) -> bool {
        self.inner.has_validity
    }

    pub fn has_nulls(&self) -> bool {
        self.null_count() > 0
    }

    /// Number of null rows, computed at most once.
    pub fn null_count(&self) -> usize {
        let inner = &self.inner;
        *inner.null_count.get_or_init(|| {
            inner
                .host
                .get()
                .and_then(|h| h.validity.as_ref())
                .map_or(0, |v| v.null_count(inner.rows))
        })
    }

    pub fn residency(&self) -> Residency {
        match (&self.inner.device, self.inner.host.get()) {
            (Some(_), Some(_)) => Residency::Both,
            (Some(_), None) => Residency::Device,
            (None, _) => Residency::Host,
        }
    }

    /// Number of live handles sharing this vector's storage.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Release this handle. The storage is reclaimed when the last handle
    /// is closed.
    pub fn close(self) {
        if let Some(storage) = Arc::into_inner(self.inner) {
            storage.resource.release();
        }
    }

    /// Make the data accessible on the host, downloading it from the device
    /// the first time. Later calls return the same host copy.
    pub fn ensure_on_host(&self) -> ColumnResult<HostView<'_>> {
        let column = self.host()?;
        Ok(HostView {
            dtype: self.inner.dtype,
            rows: self.inner.rows,
            column,
        })
    }

    pub(crate) fn host(&self) -> ColumnResult<&HostColumn> {
        let inner = &self.inner;
        if let Some(column) = inner.host.get() {
            return Ok(column);
        }
        let device = inner.device.as_ref().ok_or_else(|| {
            ColumnError::InvalidState("vector has neither host nor device storage".into())
        })?;
        tracing::trace!(id = inner.resource.id(), rows = inner.rows, "materializing on host");
        let column = device.download()?;
        Ok(inner.host.get_or_init(|| column))
    }

    #[inline]
    fn check_index(&self, index: usize) -> ColumnResult<()> {
        if index >= self.inner.rows {
            return Err(ColumnError::IndexOutOfRange {
                index,
                rows: self.inner.rows,
            });
        }
        Ok(())
    }

    fn check_native<T: NativeType>(&self) -> ColumnResult<()> {
        if T::DTYPE != self.inner.dtype.storage_type() {
            return Err(ColumnError::type_mismatch(self.inner.dtype, T::DTYPE));
        }
        Ok(())
    }

    /// Whether row `index` is null. Always `false` without a validity vector.
    pub fn is_null(&self, index: usize) -> ColumnResult<bool> {
        self.check_index(index)?;
        if !self.inner.has_validity {
            return Ok(false);
        }
        Ok(self
            .host()?
            .validity
            .as_ref()
            .is_some_and(|v| !v.is_valid(index)))
    }

    /// Read the validity bit for any index below the allocated bit capacity,
    /// including the padding past the last row.
    pub fn is_null_extended_range(&self, index: usize) -> ColumnResult<bool> {
        if !self.inner.has_validity {
            return Ok(false);
        }
        match self.host()?.validity.as_ref() {
            Some(v) if index < v.capacity_bits() => Ok(!v.is_valid(index)),
            Some(v) => Err(ColumnError::IndexOutOfRange {
                index,
                rows: v.capacity_bits(),
            }),
            None => Ok(false),
        }
    }

    /// Allocated validity capacity in bits, `None` without a validity vector.
    pub fn validity_capacity_bits(&self) -> ColumnResult<Option<usize>> {
        if !self.inner.has_validity {
            return Ok(None);
        }
        Ok(self.host()?.validity.as_ref().map(ValidityBuffer::capacity_bits))
    }

    /// Typed element at `index`. Bounds are checked before the type; the
    /// value at a null row is unspecified.
    pub fn get<T: NativeType>(&self, index: usize) -> ColumnResult<T> {
        self.check_index(index)?;
        self.check_native::<T>()?;
        match &self.host()?.data {
            ColumnData::Fixed(buf) => {
                let offset = index * T::SIZE;
                Ok(T::from_bytes(&buf.as_slice()[offset..offset + T::SIZE]))
            }
            ColumnData::Strings { .. } => Err(ColumnError::type_mismatch(DType::String, T::DTYPE)),
        }
    }

    /// String element at `index`. Null rows read as the empty string.
    pub fn get_str(&self, index: usize) -> ColumnResult<&str> {
        self.check_index(index)?;
        match &self.host()?.data {
            ColumnData::Strings { offsets, chars } => {
                let start = offsets[index] as usize;
                let end = offsets[index + 1] as usize;
                std::str::from_utf8(&chars.as_slice()[start..end])
                    .map_err(|e| ColumnError::InvalidState(format!("corrupt string data: {e}")))
            }
            ColumnData::Fixed(_) => Err(ColumnError::type_mismatch(DType::String, self.dtype())),
        }
    }

    /// Element at `index` as a [`Scalar`], `Scalar::Null` for null rows.
    pub fn get_scalar(&self, index: usize) -> ColumnResult<Scalar> {
        if self.is_null(index)? {
            return Ok(Scalar::Null);
        }
        Ok(match self.inner.dtype {
            DType::Int8 => Scalar::Int8(self.get(index)?),
            DType::Int16 => Scalar::Int16(self.get(index)?),
            DType::Int32 => Scalar::Int32(self.get(index)?),
            DType::Int64 => Scalar::Int64(self.get(index)?),
            DType::Float32 => Scalar::Float32(self.get(index)?),
            DType::Float64 => Scalar::Float64(self.get(index)?),
            DType::Bool8 => Scalar::Bool8(self.get(index)?),
            DType::Date32 => Scalar::Date32(self.get(index)?),
            DType::String => Scalar::String(SmolStr::new(self.get_str(index)?)),
        })
    }

    /// Read `count` rows starting at `start`, `None` for nulls.
    pub fn scan_range<T: NativeType>(&self, start: usize, count: usize) -> ColumnResult<Vec<Option<T>>> {
        let rows = self.inner.rows;
        match start.checked_add(count) {
            Some(end) if end <= rows => {}
            _ => {
                return Err(ColumnError::IndexOutOfRange {
                    index: start.max(rows),
                    rows,
                });
            }
        }
        let mut out = Vec::with_capacity(count);
        for i in start..start + count {
            if self.is_null(i)? {
                out.push(None);
            } else {
                out.push(Some(self.get::<T>(i)?));
            }
        }
        Ok(out)
    }
}
