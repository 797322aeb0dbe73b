use core::time::Duration;

pub const DEFAULT_MAX_BACKFILL_SLOTS: u64 = 256;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SweeperConfig {
    pub sweep_interval: Duration,
    /// Maximum number of slots older than the recency window reconciled in one pass.
    pub max_backfill_slots: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_backfill_slots: DEFAULT_MAX_BACKFILL_SLOTS,
        }
    }
}
