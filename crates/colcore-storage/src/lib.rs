//! colcore-storage: validity bit-vectors, host buffers, device residency,
//! memory tracking.
//!
//! All modules are safe Rust.

pub mod device;
pub mod host_buffer;
pub mod tracker;
pub mod validity;

pub use device::{DeviceBuffer, DeviceRuntime, Residency, SimulatedDevice, default_runtime};
pub use host_buffer::HostBuffer;
pub use tracker::{MemoryTracker, TrackedResource, config, configure, tracker};
pub use validity::{ValidityBuffer, allocation_size_bytes};
