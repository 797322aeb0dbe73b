use core::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt as _, Shared};
use tracing::debug;
use types::{block_id::BlockId, nonstandard::BlobSidecarSet};

use crate::error::Error;

pub type Resolution = Result<Arc<BlobSidecarSet>, Error>;

type SharedResolution = Shared<BoxFuture<'static, Resolution>>;

struct InFlight {
    generation: u64,
    resolution: SharedResolution,
}

/// Resolutions currently in progress, keyed by block identifier.
///
/// The first caller for an identifier spawns the resolution as its own task. Callers that arrive
/// while it is running attach to it instead of starting another one. The task removes its entry
/// as soon as its result is ready, so results (including failures) are never reused by
/// callers that arrive later.
#[derive(Default)]
pub struct CoalescingRegistry {
    in_flight: DashMap<BlockId, InFlight>,
    next_generation: AtomicU64,
}

impl CoalescingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn join_or_start<F>(
        self: &Arc<Self>,
        block_id: BlockId,
        start: impl FnOnce() -> F,
    ) -> SharedResolution
    where
        F: Future<Output = Resolution> + Send + 'static,
    {
        match self.in_flight.entry(block_id) {
            Entry::Occupied(occupied) => {
                debug!("joining in-flight resolution of {block_id}");
                occupied.get().resolution.clone()
            }
            Entry::Vacant(vacant) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let registry = Arc::clone(self);
                let resolution = start();

                // The task holds the only handle that can drive the resolution to completion.
                // Callers that give up waiting do not cancel it.
                let handle = tokio::spawn(async move {
                    let result = resolution.await;

                    registry.in_flight.remove_if(&block_id, |_, in_flight| {
                        in_flight.generation == generation
                    });

                    result
                });

                let resolution = async move { handle.await.map_err(Error::unavailable)? }
                    .boxed()
                    .shared();

                vacant.insert(InFlight {
                    generation,
                    resolution: resolution.clone(),
                });

                resolution
            }
        }
    }
}
