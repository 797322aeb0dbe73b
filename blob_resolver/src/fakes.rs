use core::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::anyhow;
use archive_store::{Archive, ArchiveStore, ArchiveStoreConfig};
use async_trait::async_trait;
use beacon_api::BeaconNode;
use database::Database;
use types::{
    block_id::{BlockId, BlockTag},
    containers::{BeaconBlockHeader, BlobSidecar, SignedBeaconBlockHeader},
    nonstandard::{BlobSidecarSet, CanonicalRecord},
    primitives::{H256, Slot},
    source::{SidecarSource, SourceError, SourceKind},
};

pub fn root(byte: u8) -> H256 {
    H256::repeat_byte(byte)
}

pub fn sidecar_set(root: H256, slot: Slot, blob_count: u64) -> BlobSidecarSet {
    let signed_block_header = SignedBeaconBlockHeader {
        message: BeaconBlockHeader {
            slot,
            ..BeaconBlockHeader::default()
        },
        ..SignedBeaconBlockHeader::default()
    };

    let sidecars = (0..blob_count)
        .map(|index| BlobSidecar {
            index,
            blob: [root.as_bytes(), index.to_le_bytes().as_slice()].concat(),
            signed_block_header,
            ..BlobSidecar::default()
        })
        .collect();

    BlobSidecarSet::new(root, slot, sidecars)
}

#[derive(Default)]
struct Chain {
    blocks: HashMap<H256, BlobSidecarSet>,
    canonical: BTreeMap<Slot, H256>,
    pruned: HashSet<H256>,
}

/// Beacon node backed by an in-memory chain that tests rewrite at will.
#[derive(Default)]
pub struct FakeBeaconNode {
    chain: Mutex<Chain>,
    delay: Mutex<Duration>,
    offline: AtomicBool,
    header_calls: AtomicUsize,
    sidecar_calls: AtomicUsize,
}

impl FakeBeaconNode {
    /// Adds a block and makes it canonical at its slot.
    pub fn add_block(&self, slot: Slot, root: H256, blob_count: u64) {
        let mut chain = self.chain();
        chain.blocks.insert(root, sidecar_set(root, slot, blob_count));
        chain.canonical.insert(slot, root);
    }

    pub fn remove_slot(&self, slot: Slot) {
        self.chain().canonical.remove(&slot);
    }

    pub fn prune(&self, root: H256) {
        self.chain().pruned.insert(root);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self
            .delay
            .lock()
            .expect("fake beacon node delay mutex should not be poisoned") = delay;
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn header_calls(&self) -> usize {
        self.header_calls.load(Ordering::SeqCst)
    }

    pub fn sidecar_calls(&self) -> usize {
        self.sidecar_calls.load(Ordering::SeqCst)
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain
            .lock()
            .expect("fake beacon node chain mutex should not be poisoned")
    }

    async fn respond(&self) -> Result<(), SourceError> {
        let delay = *self
            .delay
            .lock()
            .expect("fake beacon node delay mutex should not be poisoned");

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(SourceError::source_unavailable(anyhow!("connection refused")));
        }

        Ok(())
    }
}

#[async_trait]
impl SidecarSource for FakeBeaconNode {
    fn kind(&self) -> SourceKind {
        SourceKind::BeaconNode
    }

    async fn sidecars(&self, root: H256) -> Result<BlobSidecarSet, SourceError> {
        self.sidecar_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;

        let chain = self.chain();

        if chain.pruned.contains(&root) {
            return Err(SourceError::NotFound);
        }

        chain.blocks.get(&root).cloned().ok_or(SourceError::NotFound)
    }
}

#[async_trait]
impl BeaconNode for FakeBeaconNode {
    async fn header(&self, block_id: BlockId) -> Result<CanonicalRecord, SourceError> {
        self.header_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;

        let chain = self.chain();

        let root = match block_id {
            BlockId::Tag(BlockTag::Head) => chain.canonical.values().next_back().copied(),
            BlockId::Tag(BlockTag::Finalized | BlockTag::Genesis) => {
                chain.canonical.values().next().copied()
            }
            BlockId::Slot(slot) => chain.canonical.get(&slot).copied(),
            BlockId::Root(root) => chain.blocks.contains_key(&root).then_some(root),
        }
        .ok_or(SourceError::NotFound)?;

        let slot = chain
            .blocks
            .get(&root)
            .map(|set| set.slot)
            .ok_or(SourceError::NotFound)?;

        Ok(CanonicalRecord {
            slot,
            root,
            parent_root: H256::zero(),
            canonical: chain.canonical.get(&slot) == Some(&root),
            observed_at: 0,
        })
    }
}

/// In-memory [`ArchiveStore`] that counts writes and can be taken offline.
pub struct FakeArchive {
    store: ArchiveStore,
    offline: AtomicBool,
    sidecar_writes: AtomicUsize,
}

impl Default for FakeArchive {
    fn default() -> Self {
        let database = Arc::new(Database::in_memory());

        Self {
            store: ArchiveStore::new(database, ArchiveStoreConfig::default()),
            offline: AtomicBool::new(false),
            sidecar_writes: AtomicUsize::new(0),
        }
    }
}

impl FakeArchive {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sidecar_writes(&self) -> usize {
        self.sidecar_writes.load(Ordering::SeqCst)
    }

    pub async fn canonical_roots(&self, slot: Slot) -> Vec<H256> {
        self.store
            .records(slot)
            .await
            .expect("in-memory archive should be readable")
            .into_iter()
            .filter(|record| record.canonical)
            .map(|record| record.root)
            .collect()
    }

    pub async fn record(&self, slot: Slot, root: H256) -> Option<CanonicalRecord> {
        self.store
            .records(slot)
            .await
            .expect("in-memory archive should be readable")
            .into_iter()
            .find(|record| record.root == root)
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SourceError::storage_unavailable(anyhow!("disk unavailable")));
        }

        Ok(())
    }
}

#[async_trait]
impl SidecarSource for FakeArchive {
    fn kind(&self) -> SourceKind {
        SourceKind::Archive
    }

    async fn sidecars(&self, root: H256) -> Result<BlobSidecarSet, SourceError> {
        self.check()?;
        self.store.sidecars(root).await
    }
}

#[async_trait]
impl Archive for FakeArchive {
    async fn records(&self, slot: Slot) -> Result<Vec<CanonicalRecord>, SourceError> {
        self.check()?;
        self.store.records(slot).await
    }

    async fn contains_sidecars(&self, root: H256) -> Result<bool, SourceError> {
        self.check()?;
        self.store.contains_sidecars(root).await
    }

    async fn put_sidecars(&self, sidecar_set: Arc<BlobSidecarSet>) -> Result<(), SourceError> {
        self.check()?;
        self.sidecar_writes.fetch_add(1, Ordering::SeqCst);
        self.store.put_sidecars(sidecar_set).await
    }

    async fn put_record(&self, record: CanonicalRecord) -> Result<(), SourceError> {
        self.check()?;
        self.store.put_record(record).await
    }

    async fn mark_non_canonical(&self, slot: Slot, root: H256) -> Result<(), SourceError> {
        self.check()?;
        self.store.mark_non_canonical(slot, root).await
    }

    async fn reconcile_record(&self, record: CanonicalRecord) -> Result<Vec<H256>, SourceError> {
        self.check()?;
        self.store.reconcile_record(record).await
    }

    async fn sweep_cursor(&self) -> Result<Option<Slot>, SourceError> {
        self.check()?;
        self.store.sweep_cursor().await
    }

    async fn put_sweep_cursor(&self, slot: Slot) -> Result<(), SourceError> {
        self.check()?;
        self.store.put_sweep_cursor(slot).await
    }
}
