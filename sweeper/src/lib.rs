pub use crate::{
    config::{SweeperConfig, DEFAULT_MAX_BACKFILL_SLOTS, DEFAULT_SWEEP_INTERVAL},
    sweeper::{SweepReport, Sweeper},
};

mod config;
mod sweeper;
