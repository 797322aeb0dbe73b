use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use database::Database;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use types::{
    nonstandard::{BlobSidecarSet, CanonicalRecord},
    primitives::{H256, Slot},
    source::{SidecarSource, SourceError, SourceKind},
};

use crate::config::ArchiveStoreConfig;

const RECORD_KEY_PREFIX: &str = "r";
const SIDECARS_KEY_PREFIX: &str = "s";
const SWEEP_CURSOR_KEY: &str = "cursor_sweep";

/// Durable storage of canonical records and blob sidecar sets.
#[async_trait]
pub trait Archive: SidecarSource {
    /// Returns every record stored for `slot`, ordered by block root.
    async fn records(&self, slot: Slot) -> Result<Vec<CanonicalRecord>, SourceError>;

    async fn contains_sidecars(&self, root: H256) -> Result<bool, SourceError>;

    /// Stores `sidecar_set` unless a set for the same root is already stored.
    async fn put_sidecars(&self, sidecar_set: Arc<BlobSidecarSet>) -> Result<(), SourceError>;

    /// Stores `record` unless a record for the same slot and root is already stored.
    async fn put_record(&self, record: CanonicalRecord) -> Result<(), SourceError>;

    async fn mark_non_canonical(&self, slot: Slot, root: H256) -> Result<(), SourceError>;

    /// Stores `record` or sets the canonical flag of the stored record of `record.root` to
    /// `record.canonical`. If `record` is canonical, every other canonical record at the same
    /// slot is demoted in the same write.
    ///
    /// Returns the roots of the demoted records.
    async fn reconcile_record(&self, record: CanonicalRecord) -> Result<Vec<H256>, SourceError>;

    async fn sweep_cursor(&self) -> Result<Option<Slot>, SourceError>;

    async fn put_sweep_cursor(&self, slot: Slot) -> Result<(), SourceError>;
}

pub struct ArchiveStore {
    database: Arc<Database>,
    // Held on the blocking pool for every read-modify-write of records.
    // An abandoned call keeps it until it finishes.
    record_lock: Arc<Mutex<()>>,
    config: ArchiveStoreConfig,
}

impl ArchiveStore {
    #[must_use]
    pub fn new(database: Arc<Database>, config: ArchiveStoreConfig) -> Self {
        Self {
            database,
            record_lock: Arc::default(),
            config,
        }
    }

    // `Database` is synchronous. Every call runs on the blocking pool and is abandoned
    // (not cancelled) if it takes longer than the storage timeout.
    async fn run_blocking<T: Send + 'static>(
        &self,
        operation: &'static str,
        function: impl FnOnce(&Database) -> Result<T> + Send + 'static,
    ) -> Result<T, SourceError> {
        let database = Arc::clone(&self.database);
        let task = tokio::task::spawn_blocking(move || function(&database));

        match tokio::time::timeout(self.config.storage_timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(error))) => Err(SourceError::storage_unavailable(
                error.context(format!("archive {operation} failed")),
            )),
            Ok(Err(join_error)) => Err(SourceError::storage_unavailable(
                anyhow!(join_error).context(format!("archive {operation} task failed")),
            )),
            Err(_) => Err(SourceError::storage_unavailable(anyhow!(
                "archive {operation} timed out after {:?}",
                self.config.storage_timeout,
            ))),
        }
    }

    async fn update_records<T: Send + 'static>(
        &self,
        operation: &'static str,
        function: impl FnOnce(&Database) -> Result<T> + Send + 'static,
    ) -> Result<T, SourceError> {
        let record_lock = Arc::clone(&self.record_lock);

        self.run_blocking(operation, move |database| {
            let _guard = record_lock
                .lock()
                .expect("archive record mutex is poisoned");

            function(database)
        })
        .await
    }
}

#[async_trait]
impl SidecarSource for ArchiveStore {
    fn kind(&self) -> SourceKind {
        SourceKind::Archive
    }

    async fn sidecars(&self, root: H256) -> Result<BlobSidecarSet, SourceError> {
        self.run_blocking("sidecar lookup", move |database| {
            get::<BlobSidecarSet>(database, sidecars_key(root))
        })
        .await?
        .ok_or(SourceError::NotFound)
    }
}

#[async_trait]
impl Archive for ArchiveStore {
    async fn records(&self, slot: Slot) -> Result<Vec<CanonicalRecord>, SourceError> {
        self.run_blocking("record lookup", move |database| records(database, slot))
            .await
    }

    async fn contains_sidecars(&self, root: H256) -> Result<bool, SourceError> {
        self.run_blocking("sidecar existence check", move |database| {
            database.contains_key(sidecars_key(root))
        })
        .await
    }

    async fn put_sidecars(&self, sidecar_set: Arc<BlobSidecarSet>) -> Result<(), SourceError> {
        let root = sidecar_set.block_root;

        let written = self
            .run_blocking("sidecar write", move |database| {
                let value_bytes = serde_json::to_vec(sidecar_set.as_ref())?;
                database.put_if_absent(sidecars_key(sidecar_set.block_root), value_bytes)
            })
            .await?;

        if written {
            debug!("archived blob sidecars of block {root:?}");
        }

        Ok(())
    }

    async fn put_record(&self, record: CanonicalRecord) -> Result<(), SourceError> {
        let written = self
            .update_records("record write", move |database| {
                let value_bytes = serde_json::to_vec(&record)?;
                database.put_if_absent(record_key(record.slot, record.root), value_bytes)
            })
            .await?;

        if written {
            debug!(
                "recorded block {:?} at slot {} (canonical: {})",
                record.root, record.slot, record.canonical,
            );
        }

        Ok(())
    }

    async fn mark_non_canonical(&self, slot: Slot, root: H256) -> Result<(), SourceError> {
        let found = self
            .update_records("canonical flag update", move |database| {
                let key = record_key(slot, root);

                let Some(record) = get::<CanonicalRecord>(database, &key)? else {
                    return Ok(false);
                };

                if record.canonical {
                    put(database, key, &record.with_canonical(false))?;
                }

                Ok(true)
            })
            .await?;

        if !found {
            return Err(SourceError::NotFound);
        }

        debug!("marked block {root:?} at slot {slot} as non-canonical");

        Ok(())
    }

    async fn reconcile_record(&self, record: CanonicalRecord) -> Result<Vec<H256>, SourceError> {
        let CanonicalRecord {
            slot,
            root,
            canonical,
            ..
        } = record;

        let (written, demoted) = self
            .update_records("record reconciliation", move |database| {
                let stored = records(database, slot)?;

                let demoted = stored
                    .iter()
                    .filter(|other| canonical && other.canonical && other.root != root)
                    .map(|other| other.with_canonical(false));

                let updated = match stored.iter().find(|existing| existing.root == root) {
                    None => Some(record),
                    Some(existing) if existing.canonical == canonical => None,
                    Some(existing) => Some(existing.with_canonical(canonical)),
                };

                let written = demoted.chain(updated).collect::<Vec<_>>();

                let pairs = written
                    .iter()
                    .map(|changed| -> Result<_> {
                        let value_bytes = serde_json::to_vec(changed)?;
                        Ok((record_key(changed.slot, changed.root), value_bytes))
                    })
                    .collect::<Result<Vec<_>>>()?;

                if !pairs.is_empty() {
                    database.put_batch(pairs)?;
                }

                let demoted = written
                    .iter()
                    .filter(|other| other.root != root)
                    .map(|other| other.root)
                    .collect::<Vec<_>>();

                Ok((!written.is_empty(), demoted))
            })
            .await?;

        if written {
            debug!("reconciled record of block {root:?} at slot {slot} (canonical: {canonical})");
        }

        Ok(demoted)
    }

    async fn sweep_cursor(&self) -> Result<Option<Slot>, SourceError> {
        self.run_blocking("sweep cursor lookup", |database| {
            get(database, SWEEP_CURSOR_KEY)
        })
        .await
    }

    async fn put_sweep_cursor(&self, slot: Slot) -> Result<(), SourceError> {
        self.run_blocking("sweep cursor write", move |database| {
            put(database, SWEEP_CURSOR_KEY, &slot)
        })
        .await
    }
}

fn records(database: &Database, slot: Slot) -> Result<Vec<CanonicalRecord>> {
    database
        .pairs_with_prefix(slot_prefix(slot))?
        .into_iter()
        .map(|(_, value_bytes)| decode(&value_bytes))
        .collect()
}

fn slot_prefix(slot: Slot) -> String {
    format!("{RECORD_KEY_PREFIX}{slot:020}")
}

fn record_key(slot: Slot, root: H256) -> String {
    format!("{}{root:?}", slot_prefix(slot))
}

fn sidecars_key(root: H256) -> String {
    format!("{SIDECARS_KEY_PREFIX}{root:?}")
}

fn get<V: DeserializeOwned>(database: &Database, key: impl AsRef<[u8]>) -> Result<Option<V>> {
    let value = match database.get(key)? {
        Some(bytes) => decode(&bytes)?,
        None => return Ok(None),
    };

    Ok(Some(value))
}

fn put(database: &Database, key: impl AsRef<[u8]>, value: &impl Serialize) -> Result<()> {
    database.put(key, serde_json::to_vec(value)?)
}

fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    serde_json::from_slice(bytes).context("archived value is malformed")
}
