use core::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use types::primitives::Slot;

/// Per-slot async locks.
///
/// Entries are created on demand and dropped once no task holds or waits for them.
#[derive(Default)]
pub struct SlotLocks {
    locks: DashMap<Slot, Arc<Mutex<()>>>,
}

impl SlotLocks {
    pub async fn with_lock<T>(&self, slot: Slot, future: impl Future<Output = T>) -> T {
        let mutex = Arc::clone(self.locks.entry(slot).or_default().value());

        let output = {
            let _guard = mutex.lock().await;
            future.await
        };

        drop(mutex);

        self.locks
            .remove_if(&slot, |_, mutex| Arc::strong_count(mutex) == 1);

        output
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use core::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures::future::join_all;

    use super::*;

    #[tokio::test]
    async fn same_slot_is_serialized() {
        let locks = SlotLocks::default();
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);

        join_all((0..8).map(|_| {
            locks.with_lock(1, async {
                let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now_active, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        }))
        .await;

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_slots_do_not_contend() {
        let locks = SlotLocks::default();

        locks
            .with_lock(1, async {
                // Would deadlock if slot 2 shared the lock of slot 1.
                locks.with_lock(2, async {}).await;
            })
            .await;

        assert_eq!(locks.len(), 0);
    }
}
