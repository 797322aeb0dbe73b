use core::time::Duration;
use std::sync::Arc;

use anyhow::anyhow;
use archive_store::Archive;
use beacon_api::BeaconNode;
use clock::SlotClock;
use tracing::{debug, info, warn};
use types::{
    block_id::{BlockId, BlockTag},
    nonstandard::{BlobSidecarSet, CanonicalRecord},
    primitives::{H256, Slot},
    source::SourceError,
};

use crate::{
    coalescing::{CoalescingRegistry, Resolution},
    config::ResolverConfig,
    error::Error,
    health::{Health, HealthStatus},
    slot_locks::SlotLocks,
};

/// What [`Resolver::reconcile_slot`] did to the archive.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reconciliation {
    /// The archive already agreed with the beacon node.
    Unchanged,
    /// A record or sidecar set was missing and has been stored.
    Backfilled,
    /// A different root was canonical in the archive.
    Reorged,
    /// The beacon node has no block at the slot and archived canonical records were demoted.
    Emptied,
    /// Neither the beacon node nor the archive has a block at the slot.
    Empty,
    /// The canonical block is known but its sidecars are no longer served by the beacon node.
    Pruned,
}

enum ArchivedSlot {
    Stored(CanonicalRecord, Arc<BlobSidecarSet>),
    // Left behind by a reorg to a block whose sidecars were already pruned.
    SidecarsMissing(CanonicalRecord),
    Unknown,
}

/// Answers blob sidecar requests from the archive or a live beacon node.
///
/// Cloning is cheap. Clones share the coalescing registry, slot locks and health state.
pub struct Resolver<B, A> {
    beacon_node: Arc<B>,
    archive: Arc<A>,
    registry: Arc<CoalescingRegistry>,
    slot_locks: Arc<SlotLocks>,
    health: Arc<Health>,
    clock: Arc<dyn SlotClock>,
    config: ResolverConfig,
}

impl<B, A> Clone for Resolver<B, A> {
    fn clone(&self) -> Self {
        Self {
            beacon_node: Arc::clone(&self.beacon_node),
            archive: Arc::clone(&self.archive),
            registry: Arc::clone(&self.registry),
            slot_locks: Arc::clone(&self.slot_locks),
            health: Arc::clone(&self.health),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}

impl<B: BeaconNode + 'static, A: Archive + 'static> Resolver<B, A> {
    #[must_use]
    pub fn new(
        beacon_node: Arc<B>,
        archive: Arc<A>,
        registry: Arc<CoalescingRegistry>,
        clock: Arc<dyn SlotClock>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            beacon_node,
            archive,
            registry,
            slot_locks: Arc::default(),
            health: Arc::default(),
            clock,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> ResolverConfig {
        self.config
    }

    #[must_use]
    pub const fn archive(&self) -> &Arc<A> {
        &self.archive
    }

    #[must_use]
    pub fn health(&self) -> HealthStatus {
        self.health.status()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.health().is_ready()
    }

    pub async fn resolve(&self, block_id: BlockId) -> Resolution {
        self.resolve_with_deadline(block_id, self.config.request_deadline)
            .await
    }

    /// Resolves `block_id`, giving up after `deadline`.
    ///
    /// Giving up only detaches the caller. The resolution itself keeps running for other
    /// callers waiting on it and still writes its result through to the archive.
    pub async fn resolve_with_deadline(&self, block_id: BlockId, deadline: Duration) -> Resolution {
        let resolver = self.clone();

        let resolution = self.registry.join_or_start(block_id, move || async move {
            resolver.resolve_uncoalesced(block_id).await
        });

        match tokio::time::timeout(deadline, resolution).await {
            Ok(result) => result,
            Err(_) => {
                debug!("deadline of {deadline:?} elapsed while resolving {block_id}");
                Err(Error::Timeout)
            }
        }
    }

    pub async fn head_slot(&self) -> Result<Slot, Error> {
        let result = self.beacon_node.resolve_tag(BlockTag::Head).await;
        let (slot, _) = self.observed_beacon_node(result)?;
        Ok(slot)
    }

    /// Whether archived canonicality at `slot` must be re-confirmed before it is trusted.
    #[must_use]
    pub fn is_within_recency_window(&self, slot: Slot) -> bool {
        match self.clock.current_slot() {
            Ok(current_slot) => current_slot.saturating_sub(slot) < self.config.recency_window,
            Err(error) => {
                warn!("unable to compute current slot: {error:#}");
                true
            }
        }
    }

    /// Brings the archived record of `record.root` in line with `record.canonical`.
    ///
    /// When `record` is canonical, any other canonical record at the same slot is demoted
    /// in the same archive write, so a slot never has two canonical records.
    pub async fn reconcile(&self, record: CanonicalRecord) -> Result<(), SourceError> {
        self.slot_locks
            .with_lock(record.slot, self.reconcile_locked(record))
            .await
    }

    /// Re-resolves `slot` against the beacon node and corrects the archive.
    pub async fn reconcile_slot(&self, slot: Slot) -> Result<Reconciliation, Error> {
        let records = self.observed_archive(self.archive.records(slot).await)?;
        let archived = records.iter().find(|record| record.canonical).copied();

        let live = match self.live_header(BlockId::Slot(slot)).await {
            Ok(live) => live,
            Err(SourceError::NotFound) => {
                let Some(archived) = archived else {
                    return Ok(Reconciliation::Empty);
                };

                info!(
                    "beacon node has no block at slot {slot}; demoting block {:?}",
                    archived.root,
                );

                self.reconcile(archived.with_canonical(false)).await?;

                return Ok(Reconciliation::Emptied);
            }
            Err(error) => return Err(error.into()),
        };

        let sidecars_stored =
            self.observed_archive(self.archive.contains_sidecars(live.root).await)?;

        let was_archived = records.iter().any(|record| record.root == live.root);

        let outcome = match archived {
            Some(archived) if archived.root != live.root => Reconciliation::Reorged,
            None if was_archived => Reconciliation::Reorged,
            Some(_) if sidecars_stored => Reconciliation::Unchanged,
            _ => Reconciliation::Backfilled,
        };

        if !sidecars_stored {
            let result = self.beacon_node.sidecars(live.root).await;

            match self.observed_beacon_node(result) {
                Ok(sidecar_set) => {
                    let result = self.archive.put_sidecars(Arc::new(sidecar_set)).await;
                    self.observed_archive(result)?;
                }
                Err(SourceError::NotFound) => {
                    warn!(
                        "blob sidecars of block {:?} at slot {slot} have already been pruned",
                        live.root,
                    );

                    self.reconcile(live).await?;

                    return Ok(Reconciliation::Pruned);
                }
                Err(error) => return Err(error.into()),
            }
        }

        self.reconcile(live).await?;

        if outcome == Reconciliation::Reorged {
            info!(
                "reconciled reorg at slot {slot}: canonical block is now {:?}",
                live.root,
            );
        }

        Ok(outcome)
    }

    async fn resolve_uncoalesced(&self, block_id: BlockId) -> Resolution {
        match block_id {
            // Tags are relative to the live chain and are never answered from the archive alone.
            BlockId::Tag(_) => {
                let live = self.live_header(block_id).await?;
                self.serve_live(live).await
            }
            BlockId::Slot(slot) => self.resolve_slot(slot).await,
            BlockId::Root(root) => self.resolve_root(root).await,
        }
    }

    async fn resolve_slot(&self, slot: Slot) -> Resolution {
        let mut archive_error = None;
        let mut root_without_sidecars = None;

        match self.archived_slot(slot).await {
            Ok(ArchivedSlot::Stored(archived, sidecar_set)) => {
                if !self.is_within_recency_window(slot) {
                    debug!("serving slot {slot} from archive");
                    return Ok(sidecar_set);
                }

                return self.confirm_canonical(archived, sidecar_set).await;
            }
            Ok(ArchivedSlot::SidecarsMissing(archived)) => {
                root_without_sidecars = Some(archived.root);
            }
            Ok(ArchivedSlot::Unknown) => {}
            Err(error) => {
                warn!("archive lookup of slot {slot} failed: {error}");
                archive_error = Some(error);
            }
        }

        let live = self
            .live_header(BlockId::Slot(slot))
            .await
            .map_err(|error| prefer_archive_error(error, archive_error))?;

        match self.serve_live(live).await {
            Err(Error::NotFound) if root_without_sidecars == Some(live.root) => {
                Err(sidecars_pruned(live))
            }
            resolution => resolution,
        }
    }

    async fn resolve_root(&self, root: H256) -> Resolution {
        let mut archive_error = None;

        match self.observed_archive(self.archive.sidecars(root).await) {
            Ok(sidecar_set) => {
                // Sidecars never change for a given root. Only the canonical flag can be stale.
                if self.is_within_recency_window(sidecar_set.slot) {
                    match self.live_header(BlockId::Root(root)).await {
                        Ok(live) => self.write_record(live).await,
                        Err(error) => {
                            debug!("unable to re-confirm canonicality of block {root:?}: {error}");
                        }
                    }
                }

                return Ok(Arc::new(sidecar_set));
            }
            Err(SourceError::NotFound) => {}
            Err(error) => {
                warn!("archive lookup of block {root:?} failed: {error}");
                archive_error = Some(error);
            }
        }

        let live = self
            .live_header(BlockId::Root(root))
            .await
            .map_err(|error| prefer_archive_error(error, archive_error))?;

        self.serve_live(live).await
    }

    async fn archived_slot(&self, slot: Slot) -> Result<ArchivedSlot, SourceError> {
        let records = self.observed_archive(self.archive.records(slot).await)?;

        let Some(archived) = records.into_iter().find(|record| record.canonical) else {
            return Ok(ArchivedSlot::Unknown);
        };

        match self.observed_archive(self.archive.sidecars(archived.root).await) {
            Ok(sidecar_set) => Ok(ArchivedSlot::Stored(archived, Arc::new(sidecar_set))),
            Err(SourceError::NotFound) => Ok(ArchivedSlot::SidecarsMissing(archived)),
            Err(error) => Err(error),
        }
    }

    async fn confirm_canonical(
        &self,
        archived: CanonicalRecord,
        sidecar_set: Arc<BlobSidecarSet>,
    ) -> Resolution {
        let slot = archived.slot;

        match self.live_header(BlockId::Slot(slot)).await {
            Ok(live) if live.root == archived.root => Ok(sidecar_set),
            Ok(live) => self.switch_canonical_root(archived, live).await,
            Err(SourceError::NotFound) => {
                info!(
                    "beacon node has no block at slot {slot}; demoting block {:?}",
                    archived.root,
                );

                self.write_record(archived.with_canonical(false)).await;

                Err(Error::NotFound)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn switch_canonical_root(
        &self,
        stale: CanonicalRecord,
        live: CanonicalRecord,
    ) -> Resolution {
        info!(
            "reorg at slot {}: canonical block changed from {:?} to {:?}",
            live.slot, stale.root, live.root,
        );

        let sidecar_set = match self.stored_or_live_sidecars(live.root).await {
            Ok(sidecar_set) => sidecar_set,
            Err(SourceError::NotFound) => {
                // Demote the stale record even though nothing can be served.
                self.write_record(live).await;

                return Err(sidecars_pruned(live));
            }
            Err(error) => return Err(error.into()),
        };

        self.write_record(live).await;

        Ok(sidecar_set)
    }

    async fn serve_live(&self, live: CanonicalRecord) -> Resolution {
        let sidecar_set = self.stored_or_live_sidecars(live.root).await?;

        self.write_record(live).await;

        Ok(sidecar_set)
    }

    async fn stored_or_live_sidecars(
        &self,
        root: H256,
    ) -> Result<Arc<BlobSidecarSet>, SourceError> {
        let stored = self.archive.sidecars(root).await;

        let archive_error = match self.observed_archive(stored) {
            Ok(sidecar_set) => return Ok(Arc::new(sidecar_set)),
            Err(SourceError::NotFound) => None,
            Err(error) => {
                warn!("archive lookup of block {root:?} failed: {error}");
                Some(error)
            }
        };

        let result = self.beacon_node.sidecars(root).await;

        let sidecar_set = self
            .observed_beacon_node(result)
            .map(Arc::new)
            .map_err(|error| prefer_archive_error(error, archive_error))?;

        self.write_sidecars(&sidecar_set).await;

        Ok(sidecar_set)
    }

    async fn write_sidecars(&self, sidecar_set: &Arc<BlobSidecarSet>) {
        let result = self.archive.put_sidecars(Arc::clone(sidecar_set)).await;

        if let Err(error) = self.observed_archive(result) {
            warn!(
                "failed to archive blob sidecars of block {:?}: {error}",
                sidecar_set.block_root,
            );
        }
    }

    async fn write_record(&self, record: CanonicalRecord) {
        if let Err(error) = self.reconcile(record).await {
            warn!(
                "failed to archive record of block {:?} at slot {}: {error}",
                record.root, record.slot,
            );
        }
    }

    async fn live_header(&self, block_id: BlockId) -> Result<CanonicalRecord, SourceError> {
        let result = self.beacon_node.header(block_id).await;
        self.observed_beacon_node(result)
    }

    async fn reconcile_locked(&self, record: CanonicalRecord) -> Result<(), SourceError> {
        let result = self.archive.reconcile_record(record).await;

        for demoted in self.observed_archive(result)? {
            info!("block {demoted:?} at slot {} is no longer canonical", record.slot);
        }

        Ok(())
    }

    fn observed_beacon_node<T>(&self, result: Result<T, SourceError>) -> Result<T, SourceError> {
        self.health.observe(self.beacon_node.kind(), &result);
        result
    }

    fn observed_archive<T>(&self, result: Result<T, SourceError>) -> Result<T, SourceError> {
        self.health.observe(self.archive.kind(), &result);
        result
    }
}

fn sidecars_pruned(live: CanonicalRecord) -> Error {
    Error::unavailable(anyhow!(
        "blob sidecars of canonical block {:?} at slot {} have already been pruned",
        live.root,
        live.slot,
    ))
}

// A block missing from the beacon node says nothing about the archive if the archive could not
// be consulted.
fn prefer_archive_error(error: SourceError, archive_error: Option<SourceError>) -> SourceError {
    match (error, archive_error) {
        (SourceError::NotFound, Some(archive_error)) => archive_error,
        (error, _) => error,
    }
}
