//! Device residency: the accelerator runtime seam and device-owned buffers.
//!
//! The core never inspects device memory directly. It uploads host bytes
//! through a [`DeviceRuntime`] and copies them back when a vector is
//! materialized on the host. Transfers are synchronous and not cancelable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use colcore_common::{ColumnError, ColumnResult};
use dashmap::DashMap;

/// Where a vector's data currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Residency {
    #[default]
    Host,
    Device,
    /// Device-resident with a host copy already materialized.
    Both,
}

/// Allocation and transfer primitives provided by the accelerator runtime.
pub trait DeviceRuntime: Send + Sync + std::fmt::Debug {
    /// Allocate device memory and copy `host` into it. Returns an opaque handle.
    fn upload(&self, host: &[u8]) -> ColumnResult<u64>;

    /// Copy a whole allocation back into `dst`, which must match its length.
    fn download(&self, handle: u64, dst: &mut [u8]) -> ColumnResult<()>;

    fn free(&self, handle: u64);

    /// Bytes currently allocated on the device.
    fn bytes_in_use(&self) -> usize;
}

/// In-process stand-in for an accelerator: allocations are host memory
/// keyed by handle.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    allocations: DashMap<u64, Box<[u8]>>,
    next_handle: AtomicU64,
    uploads: AtomicU64,
    downloads: AtomicU64,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::Acquire)
    }

    pub fn download_count(&self) -> u64 {
        self.downloads.load(Ordering::Acquire)
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }
}

impl DeviceRuntime for SimulatedDevice {
    fn upload(&self, host: &[u8]) -> ColumnResult<u64> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.allocations.insert(handle, host.into());
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    fn download(&self, handle: u64, dst: &mut [u8]) -> ColumnResult<()> {
        let alloc = self
            .allocations
            .get(&handle)
            .ok_or_else(|| ColumnError::Device(format!("unknown device allocation {handle}")))?;
        if alloc.len() != dst.len() {
            return Err(ColumnError::Device(format!(
                "download size mismatch: allocation has {} bytes, destination {}",
                alloc.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(alloc.value());
        self.downloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn free(&self, handle: u64) {
        self.allocations.remove(&handle);
    }

    fn bytes_in_use(&self) -> usize {
        self.allocations.iter().map(|a| a.value().len()).sum()
    }
}

/// The process-wide runtime used when none is supplied explicitly.
pub fn default_runtime() -> Arc<dyn DeviceRuntime> {
    static RUNTIME: OnceLock<Arc<dyn DeviceRuntime>> = OnceLock::new();
    RUNTIME
        .get_or_init(|| Arc::new(SimulatedDevice::new()))
        .clone()
}

/// One device allocation, freed on drop.
#[derive(Debug)]
pub struct DeviceBuffer {
    runtime: Arc<dyn DeviceRuntime>,
    handle: u64,
    len: usize,
}

impl DeviceBuffer {
    pub fn upload(runtime: &Arc<dyn DeviceRuntime>, host: &[u8]) -> ColumnResult<Self> {
        let handle = runtime.upload(host)?;
        Ok(Self {
            runtime: Arc::clone(runtime),
            handle,
            len: host.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy the allocation back to a new host vector.
    pub fn download(&self) -> ColumnResult<Vec<u8>> {
        let mut out = vec![0u8; self.len];
        self.runtime.download(self.handle, &mut out)?;
        Ok(out)
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.runtime.free(self.handle);
    }
}
