pub use crate::{
    coalescing::CoalescingRegistry,
    config::{ResolverConfig, DEFAULT_RECENCY_WINDOW, DEFAULT_REQUEST_DEADLINE},
    error::Error,
    health::HealthStatus,
    resolver::{Reconciliation, Resolver},
};

mod coalescing;
mod config;
mod error;
mod health;
mod resolver;
mod slot_locks;

#[cfg(test)]
mod fakes;
