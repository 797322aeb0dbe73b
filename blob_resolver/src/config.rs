use core::time::Duration;

/// Three epochs on networks with 32 slots per epoch.
pub const DEFAULT_RECENCY_WINDOW: u64 = 96;
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResolverConfig {
    /// Number of trailing slots whose archived canonicality is re-confirmed
    /// against the beacon node before being served.
    pub recency_window: u64,
    pub request_deadline: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            recency_window: DEFAULT_RECENCY_WINDOW,
            request_deadline: DEFAULT_REQUEST_DEADLINE,
        }
    }
}
