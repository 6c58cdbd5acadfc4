//! Memory ownership diagnostics.
//!
//! Every builder and column vector registers a [`TrackedResource`]. Dropping
//! the resource after an explicit [`TrackedResource::release`] is the normal
//! path. Dropping it without one is counted as a leak: the storage is still
//! reclaimed, but the counter lets tests and operators notice handles that
//! were never closed. The counter carries no correctness role.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use colcore_common::CoreConfig;

static CONFIG: OnceLock<CoreConfig> = OnceLock::new();
static TRACKER: MemoryTracker = MemoryTracker::new();

/// Install the process-wide configuration.
/// Returns `false` if a configuration was already installed or read.
pub fn configure(config: CoreConfig) -> bool {
    CONFIG.set(config).is_ok()
}

/// The process-wide configuration, defaulted on first read.
pub fn config() -> &'static CoreConfig {
    CONFIG.get_or_init(CoreConfig::default)
}

/// The process-wide tracker used by builders and vectors.
pub fn tracker() -> &'static MemoryTracker {
    &TRACKER
}

/// Registration and reclamation counters.
#[derive(Debug)]
pub struct MemoryTracker {
    next_id: AtomicU64,
    registered: AtomicU64,
    released: AtomicU64,
    leaked: AtomicU64,
}

impl MemoryTracker {
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            registered: AtomicU64::new(0),
            released: AtomicU64::new(0),
            leaked: AtomicU64::new(0),
        }
    }

    fn register(&self) -> u64 {
        self.registered.fetch_add(1, Ordering::Relaxed);
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn registered_count(&self) -> u64 {
        self.registered.load(Ordering::Acquire)
    }

    /// Resources reclaimed after an explicit release.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }

    /// Resources reclaimed without an explicit release.
    pub fn leak_count(&self) -> u64 {
        self.leaked.load(Ordering::Acquire)
    }

    /// Resources registered and not yet reclaimed.
    pub fn outstanding(&self) -> u64 {
        let reclaimed = self.released_count() + self.leak_count();
        self.registered_count().saturating_sub(reclaimed)
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration handle owned by a builder or a vector's storage.
#[derive(Debug)]
pub struct TrackedResource {
    id: u64,
    kind: &'static str,
    tracker: &'static MemoryTracker,
    released: AtomicBool,
}

impl TrackedResource {
    /// Register with the process-wide tracker.
    pub fn register(kind: &'static str) -> Self {
        Self::register_with(kind, tracker())
    }

    pub fn register_with(kind: &'static str, tracker: &'static MemoryTracker) -> Self {
        let id = tracker.register();
        Self {
            id,
            kind,
            tracker,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Mark the resource as explicitly released.
    /// Returns `true` only for the first call.
    pub fn release(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for TrackedResource {
    fn drop(&mut self) {
        if self.is_released() {
            self.tracker.released.fetch_add(1, Ordering::AcqRel);
            return;
        }
        self.tracker.leaked.fetch_add(1, Ordering::AcqRel);
        if config().warn_on_leak {
            tracing::warn!(id = self.id, kind = self.kind, "storage reclaimed without explicit close");
        }
    }
}
