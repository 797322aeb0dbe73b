use core::time::Duration;

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ArchiveStoreConfig {
    pub storage_timeout: Duration,
}

impl Default for ArchiveStoreConfig {
    fn default() -> Self {
        Self {
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }
}
