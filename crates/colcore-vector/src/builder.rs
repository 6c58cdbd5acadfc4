//! ColumnBuilder: single-owner, append-only construction of a ColumnVector.
//!
//! A builder is created with a fixed row capacity. Appends fill rows in order
//! and fail with `CapacityExceeded` before touching any buffer when they would
//! overrun it. The validity bit-vector is allocated on the first null, sized
//! for the full capacity with every bit valid, so rows appended earlier need
//! no backfill.

use std::sync::Arc;

use colcore_common::{ColumnError, ColumnResult};
use colcore_storage::{DeviceRuntime, TrackedResource, ValidityBuffer, config, default_runtime};
use colcore_types::{DType, NativeType};

use crate::column_vector::{ColumnData, ColumnVector, DeviceColumn, HostColumn, string_end};

/// Sum of string lengths, saturating so an overflow fails the size check.
fn total_len(lens: impl Iterator<Item = usize>) -> usize {
    lens.fold(0usize, usize::saturating_add)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BuilderState {
    Open,
    Finalized,
    Closed,
}

/// Append-only builder for a [`ColumnVector`].
#[derive(Debug)]
pub struct ColumnBuilder {
    dtype: DType,
    capacity: usize,
    rows: usize,
    null_count: usize,
    data: ColumnData,
    validity: Option<ValidityBuffer>,
    state: BuilderState,
    resource: TrackedResource,
}

impl ColumnBuilder {
    /// A builder for up to `capacity` rows of `dtype`.
    pub fn new(dtype: DType, capacity: usize) -> Self {
        Self {
            dtype,
            capacity,
            rows: 0,
            null_count: 0,
            data: ColumnData::with_capacity(dtype, capacity),
            validity: None,
            state: BuilderState::Open,
            resource: TrackedResource::register("column_builder"),
        }
    }

    /// Like [`ColumnBuilder::new`], with the validity bit-vector allocated
    /// up front. The built vector always reports a validity vector.
    pub fn with_validity(dtype: DType, capacity: usize) -> Self {
        let mut builder = Self::new(dtype, capacity);
        builder.validity = Some(ValidityBuffer::new_all_valid(capacity));
        builder
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows appended so far.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.rows
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    pub fn is_closed(&self) -> bool {
        self.state == BuilderState::Closed
    }

    fn check_open(&self) -> ColumnResult<()> {
        match self.state {
            BuilderState::Open => Ok(()),
            BuilderState::Finalized => Err(ColumnError::InvalidState(
                "builder has already been built".into(),
            )),
            BuilderState::Closed => Err(ColumnError::InvalidState("builder is closed".into())),
        }
    }

    fn check_room(&self, additional: usize) -> ColumnResult<()> {
        match self.rows.checked_add(additional) {
            Some(requested) if requested <= self.capacity => Ok(()),
            requested => Err(ColumnError::CapacityExceeded {
                requested: requested.unwrap_or(usize::MAX),
                capacity: self.capacity,
            }),
        }
    }

    fn check_native<T: NativeType>(&self) -> ColumnResult<()> {
        if T::DTYPE != self.dtype.storage_type() {
            return Err(ColumnError::type_mismatch(self.dtype, T::DTYPE));
        }
        Ok(())
    }

    /// Open, matching type, room for `additional` rows. Checked in that order.
    fn prepare<T: NativeType>(&self, additional: usize) -> ColumnResult<()> {
        self.check_open()?;
        self.check_native::<T>()?;
        self.check_room(additional)
    }

    /// Like `prepare`, plus room for `bytes` more characters in the string buffer.
    fn prepare_str(&self, additional: usize, bytes: usize) -> ColumnResult<()> {
        self.check_open()?;
        if self.dtype != DType::String {
            return Err(ColumnError::type_mismatch(self.dtype, DType::String));
        }
        self.check_room(additional)?;
        if let ColumnData::Strings { chars, .. } = &self.data {
            string_end(chars.len(), bytes)?;
        }
        Ok(())
    }

    fn validity_mut(&mut self) -> &mut ValidityBuffer {
        let capacity = self.capacity;
        self.validity
            .get_or_insert_with(|| ValidityBuffer::new_all_valid(capacity))
    }

    fn push_value<T: NativeType>(&mut self, value: T) {
        if let ColumnData::Fixed(buf) = &mut self.data {
            value.write_bytes(buf.extend_zeroed(T::SIZE));
        }
        self.rows += 1;
    }

    fn push_null(&mut self) {
        let row = self.rows;
        self.validity_mut().set_null(row);
        match &mut self.data {
            ColumnData::Fixed(buf) => {
                let width = self.dtype.size_in_bytes().unwrap_or(0);
                buf.extend_zeroed(width);
            }
            ColumnData::Strings { offsets, chars } => offsets.push(chars.len() as u32),
        }
        self.null_count += 1;
        self.rows += 1;
    }

    // Callers have checked the total size with `prepare_str`.
    fn push_str(&mut self, value: &str) {
        if let ColumnData::Strings { offsets, chars } = &mut self.data {
            chars.extend_from_slice(value.as_bytes());
            offsets.push(chars.len() as u32);
        }
        self.rows += 1;
    }

    pub fn append<T: NativeType>(&mut self, value: T) -> ColumnResult<&mut Self> {
        self.prepare::<T>(1)?;
        self.push_value(value);
        Ok(self)
    }

    /// Append a null row. Valid for every column type.
    pub fn append_null(&mut self) -> ColumnResult<&mut Self> {
        self.check_open()?;
        self.check_room(1)?;
        self.push_null();
        Ok(self)
    }

    pub fn append_nulls(&mut self, count: usize) -> ColumnResult<&mut Self> {
        self.check_open()?;
        self.check_room(count)?;
        for _ in 0..count {
            self.push_null();
        }
        Ok(self)
    }

    /// Append `value` `count` times.
    pub fn append_repeated<T: NativeType>(&mut self, value: T, count: usize) -> ColumnResult<&mut Self> {
        self.prepare::<T>(count)?;
        if let ColumnData::Fixed(buf) = &mut self.data {
            let mut pattern = vec![0u8; T::SIZE];
            value.write_bytes(&mut pattern);
            buf.extend_repeated(&pattern, count);
        }
        self.rows += count;
        Ok(self)
    }

    pub fn append_slice<T: NativeType>(&mut self, values: &[T]) -> ColumnResult<&mut Self> {
        self.prepare::<T>(values.len())?;
        for &v in values {
            self.push_value(v);
        }
        Ok(self)
    }

    /// Append values where `None` marks a null row.
    pub fn append_options<T: NativeType>(&mut self, values: &[Option<T>]) -> ColumnResult<&mut Self> {
        self.prepare::<T>(values.len())?;
        for v in values {
            match *v {
                Some(v) => self.push_value(v),
                None => self.push_null(),
            }
        }
        Ok(self)
    }

    pub fn append_str(&mut self, value: &str) -> ColumnResult<&mut Self> {
        self.prepare_str(1, value.len())?;
        self.push_str(value);
        Ok(self)
    }

    /// Append every string or none of them.
    pub fn append_strs(&mut self, values: &[&str]) -> ColumnResult<&mut Self> {
        self.prepare_str(values.len(), total_len(values.iter().map(|s| s.len())))?;
        for v in values {
            self.push_str(v);
        }
        Ok(self)
    }

    pub fn append_option_strs(&mut self, values: &[Option<&str>]) -> ColumnResult<&mut Self> {
        let bytes = total_len(values.iter().map(|s| s.map_or(0, str::len)));
        self.prepare_str(values.len(), bytes)?;
        for v in values {
            match v {
                Some(s) => self.push_str(s),
                None => self.push_null(),
            }
        }
        Ok(self)
    }

    /// Append every row of `other`, which must have exactly this builder's
    /// type. Validity bits are copied bit-exactly at the current row offset.
    pub fn append_vector(&mut self, other: &ColumnVector) -> ColumnResult<&mut Self> {
        self.check_open()?;
        if other.dtype() != self.dtype {
            return Err(ColumnError::type_mismatch(self.dtype, other.dtype()));
        }
        let count = other.row_count();
        self.check_room(count)?;
        let source = other.host()?;

        let width = self.dtype.size_in_bytes().unwrap_or(0);
        self.data.extend_from(&source.data, count, width)?;
        if let Some(src_validity) = &source.validity {
            let offset = self.rows;
            self.validity_mut().append_from(offset, src_validity, count);
        }
        self.null_count += other.null_count();
        self.rows += count;
        Ok(self)
    }

    /// Finalize into a vector. Uploads to the default device runtime when
    /// `upload_on_build` is configured, otherwise keeps the data on the host.
    pub fn build(&mut self) -> ColumnResult<ColumnVector> {
        if config().upload_on_build {
            self.build_with_runtime(&default_runtime())
        } else {
            self.build_on_host()
        }
    }

    /// Finalize into a host-resident vector.
    pub fn build_on_host(&mut self) -> ColumnResult<ColumnVector> {
        self.check_open()?;
        let column = self.take_column();
        self.finalize();
        tracing::debug!(
            dtype = %self.dtype,
            rows = self.rows,
            nulls = self.null_count,
            "built host column vector"
        );
        Ok(ColumnVector::from_host(
            self.dtype,
            self.rows,
            column,
            Some(self.null_count),
        ))
    }

    /// Finalize into a vector resident on `runtime`. On upload failure the
    /// builder stays open with its contents intact.
    pub fn build_with_runtime(&mut self, runtime: &Arc<dyn DeviceRuntime>) -> ColumnResult<ColumnVector> {
        self.check_open()?;
        let column = self.take_column();
        let device = match DeviceColumn::upload(runtime, &column) {
            Ok(device) => device,
            Err(err) => {
                self.data = column.data;
                self.validity = column.validity;
                return Err(err);
            }
        };
        self.finalize();
        tracing::debug!(
            dtype = %self.dtype,
            rows = self.rows,
            nulls = self.null_count,
            "built device column vector"
        );
        Ok(ColumnVector::from_device(
            self.dtype,
            self.rows,
            device,
            column.validity.is_some(),
            self.null_count,
        ))
    }

    /// Release the builder's buffers. Safe to call more than once and after
    /// a build.
    pub fn close(&mut self) {
        if self.state == BuilderState::Closed {
            return;
        }
        self.state = BuilderState::Closed;
        self.data = ColumnData::with_capacity(self.dtype, 0);
        self.validity = None;
        self.resource.release();
    }

    fn take_column(&mut self) -> HostColumn {
        let data = std::mem::replace(&mut self.data, ColumnData::with_capacity(self.dtype, 0));
        HostColumn {
            data,
            validity: self.validity.take(),
        }
    }

    fn finalize(&mut self) {
        self.state = BuilderState::Finalized;
        self.resource.release();
    }
}
