/// Process-wide configuration for the column vector core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    /// Log a warning when storage is reclaimed without an explicit release. Default: true.
    pub warn_on_leak: bool,
    /// Place finalized builder output on the device. Default: true.
    /// When false, `build()` produces host-resident vectors.
    pub upload_on_build: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            warn_on_leak: true,
            upload_on_build: true,
        }
    }
}
