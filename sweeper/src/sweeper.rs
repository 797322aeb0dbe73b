use core::ops::{Range, RangeInclusive};

use anyhow::{Context as _, Result};
use archive_store::Archive;
use beacon_api::BeaconNode;
use blob_resolver::{Reconciliation, Resolver};
use futures::stream::StreamExt as _;
use parse_display::Display;
use tokio::sync::Mutex;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};
use types::primitives::Slot;

use crate::config::SweeperConfig;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Display)]
#[display(
    "{slots_checked} slots checked ({unchanged} unchanged, {backfilled} backfilled, \
     {reorged} reorged, {emptied} emptied, {pruned} pruned, {failed} failed)"
)]
pub struct SweepReport {
    pub slots_checked: u64,
    pub unchanged: u64,
    pub backfilled: u64,
    pub reorged: u64,
    pub emptied: u64,
    pub pruned: u64,
    pub failed: u64,
}

impl SweepReport {
    const fn count(&mut self, reconciliation: Reconciliation) {
        match reconciliation {
            Reconciliation::Unchanged => self.unchanged += 1,
            Reconciliation::Backfilled => self.backfilled += 1,
            Reconciliation::Reorged => self.reorged += 1,
            Reconciliation::Emptied => self.emptied += 1,
            Reconciliation::Pruned => self.pruned += 1,
            Reconciliation::Empty => {}
        }
    }
}

#[derive(Default)]
struct Cursor {
    loaded: bool,
    slot: Option<Slot>,
}

/// Periodically re-confirms the trailing slots of the chain against the beacon node.
///
/// Slots between the persisted cursor and the start of the trailing window are backfilled
/// a bounded number at a time, so a restarted archiver catches up on what it missed.
pub struct Sweeper<B, A> {
    resolver: Resolver<B, A>,
    config: SweeperConfig,
    cursor: Mutex<Cursor>,
}

impl<B: BeaconNode + 'static, A: Archive + 'static> Sweeper<B, A> {
    #[must_use]
    pub fn new(resolver: Resolver<B, A>, config: SweeperConfig) -> Self {
        Self {
            resolver,
            config,
            cursor: Mutex::default(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut interval = IntervalStream::new(tokio::time::interval(self.config.sweep_interval));

        while interval.next().await.is_some() {
            match self.sweep().await {
                Ok(report) => info!("sweep completed: {report}"),
                Err(error) => warn!("sweep failed: {error:#}"),
            }
        }

        Ok(())
    }

    /// Runs one pass.
    ///
    /// Failures of individual slots are counted in the report. The cursor only advances over
    /// slots that were all reconciled successfully.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let head = self
            .resolver
            .head_slot()
            .await
            .context("unable to resolve head of beacon node")?;

        let cursor = self.load_cursor().await?;

        let window = window_slots(head, self.resolver.config().recency_window);
        let backfill = backfill_slots(cursor, *window.start(), self.config.max_backfill_slots);

        debug!("sweeping slots {backfill:?} and {window:?}");

        let mut report = SweepReport::default();
        let mut progress = cursor;
        let mut advancing = true;

        for slot in backfill.chain(window) {
            report.slots_checked += 1;

            match self.resolver.reconcile_slot(slot).await {
                Ok(reconciliation) => {
                    report.count(reconciliation);

                    if advancing && progress.is_none_or(|progress| slot <= progress + 1) {
                        progress = Some(progress.map_or(slot, |progress| progress.max(slot)));
                    }
                }
                Err(error) => {
                    warn!("failed to reconcile slot {slot}: {error}");
                    report.failed += 1;
                    advancing = false;
                }
            }
        }

        if let Some(slot) = progress {
            self.commit_cursor(slot).await;
        }

        Ok(report)
    }

    async fn load_cursor(&self) -> Result<Option<Slot>> {
        let mut cursor = self.cursor.lock().await;

        if !cursor.loaded {
            cursor.slot = self
                .resolver
                .archive()
                .sweep_cursor()
                .await
                .context("unable to load sweep cursor")?;

            cursor.loaded = true;
        }

        Ok(cursor.slot)
    }

    // The cursor never moves backwards, even if passes overlap.
    async fn commit_cursor(&self, slot: Slot) {
        let mut cursor = self.cursor.lock().await;

        if cursor.slot >= Some(slot) {
            return;
        }

        match self.resolver.archive().put_sweep_cursor(slot).await {
            Ok(()) => cursor.slot = Some(slot),
            Err(error) => warn!("unable to persist sweep cursor at slot {slot}: {error}"),
        }
    }

    #[cfg(test)]
    async fn cursor(&self) -> Option<Slot> {
        self.cursor.lock().await.slot
    }
}

fn window_slots(head: Slot, recency_window: u64) -> RangeInclusive<Slot> {
    head.saturating_sub(recency_window.saturating_sub(1))..=head
}

fn backfill_slots(
    cursor: Option<Slot>,
    window_start: Slot,
    max_backfill_slots: u64,
) -> Range<Slot> {
    let Some(cursor) = cursor else {
        return window_start..window_start;
    };

    let start = cursor.saturating_add(1);
    let end = window_start.min(start.saturating_add(max_backfill_slots));

    start..end
}
