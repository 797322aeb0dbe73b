use core::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use types::source::{SourceError, SourceKind};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct HealthStatus {
    pub beacon_node: bool,
    pub archive: bool,
}

impl HealthStatus {
    #[must_use]
    pub const fn is_ready(self) -> bool {
        self.beacon_node && self.archive
    }
}

/// Reachability of each source as of its most recent call.
///
/// Sources are assumed reachable until a call says otherwise.
pub struct Health {
    beacon_node: AtomicBool,
    archive: AtomicBool,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            beacon_node: AtomicBool::new(true),
            archive: AtomicBool::new(true),
        }
    }
}

impl Health {
    pub fn observe<T>(&self, kind: SourceKind, result: &Result<T, SourceError>) {
        let reachable = !matches!(result, Err(error) if error.is_unavailable());

        let flag = match kind {
            SourceKind::BeaconNode => &self.beacon_node,
            SourceKind::Archive => &self.archive,
        };

        flag.store(reachable, Ordering::Relaxed);
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            beacon_node: self.beacon_node.load(Ordering::Relaxed),
            archive: self.archive.load(Ordering::Relaxed),
        }
    }
}
