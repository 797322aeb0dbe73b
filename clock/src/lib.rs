//! Wall-clock slot computation.
//!
//! The resolver only needs to know how far a slot is from the chain head to decide whether an
//! archived record must be re-confirmed. That distance is computed from the genesis time of the
//! network rather than from the beacon node, so it is still available when the node is not.
//!
//! Slot 0 starts at genesis. Times before genesis map to slot 0.

use core::{
    num::NonZeroU64,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use std::time::SystemTime;

use anyhow::Result;
use types::primitives::{Slot, UnixSeconds};

pub const GENESIS_SLOT: Slot = 0;

pub trait SlotClock: Send + Sync {
    fn current_slot(&self) -> Result<Slot>;
}

#[derive(Clone, Copy, Debug)]
pub struct SystemSlotClock {
    genesis_time: UnixSeconds,
    seconds_per_slot: NonZeroU64,
}

impl SystemSlotClock {
    #[must_use]
    pub const fn new(genesis_time: UnixSeconds, seconds_per_slot: NonZeroU64) -> Self {
        Self {
            genesis_time,
            seconds_per_slot,
        }
    }

    pub fn slot_at(&self, time: SystemTime) -> Result<Slot> {
        let unix_epoch_to_time = time.duration_since(SystemTime::UNIX_EPOCH)?;
        let unix_epoch_to_genesis = Duration::from_secs(self.genesis_time);

        let Some(genesis_to_time) = unix_epoch_to_time.checked_sub(unix_epoch_to_genesis) else {
            return Ok(GENESIS_SLOT);
        };

        let slots_since_genesis = genesis_to_time.as_secs() / self.seconds_per_slot;

        Ok(GENESIS_SLOT + slots_since_genesis)
    }
}

impl SlotClock for SystemSlotClock {
    fn current_slot(&self) -> Result<Slot> {
        self.slot_at(SystemTime::now())
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualSlotClock {
    slot: AtomicU64,
}

impl ManualSlotClock {
    #[must_use]
    pub const fn new(slot: Slot) -> Self {
        Self {
            slot: AtomicU64::new(slot),
        }
    }

    pub fn set_slot(&self, slot: Slot) {
        self.slot.store(slot, Ordering::Release);
    }
}

impl SlotClock for ManualSlotClock {
    fn current_slot(&self) -> Result<Slot> {
        Ok(self.slot.load(Ordering::Acquire))
    }
}
