use std::{
    borrow::Cow,
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use bytesize::ByteSize;
use im::OrdMap;
use libmdbx::{DatabaseFlags, Environment, Geometry, WriteFlags};
use snap::raw::{Decoder, Encoder};
use tap::Pipe as _;
use tracing::info;
use unwrap_none::UnwrapNone as _;

const GROWTH_STEP: ByteSize = ByteSize::mib(256);
const MAX_NAMED_DATABASES: usize = 4;

type Pairs = Vec<(Vec<u8>, Vec<u8>)>;

/// Ordered key-value store with snappy-compressed values.
///
/// Keys are compared bytewise, so fixed-width encodings of numbers sort numerically.
pub struct Database(DatabaseKind);

impl Database {
    pub fn persistent(name: &str, directory: impl AsRef<Path>, max_size: ByteSize) -> Result<Self> {
        fs_err::create_dir_all(&directory)?;

        let environment = Environment::builder()
            .set_max_dbs(MAX_NAMED_DATABASES)
            .set_geometry(Geometry {
                size: Some(..usize::try_from(max_size.as_u64())?),
                growth_step: Some(isize::try_from(GROWTH_STEP.as_u64())?),
                shrink_threshold: None,
                page_size: None,
            })
            .open(directory.as_ref())?;

        let transaction = environment.begin_rw_txn()?;
        transaction.create_db(Some(name), DatabaseFlags::default())?;
        transaction.commit()?;

        info!(
            "opened database {name} in {} (maximum size: {max_size})",
            directory.as_ref().display(),
        );

        Ok(Self(DatabaseKind::Persistent {
            database_name: name.to_owned(),
            environment,
        }))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self(DatabaseKind::InMemory {
            map: Mutex::default(),
        })
    }

    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        matches!(self.kind(), DatabaseKind::Persistent { .. })
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        let contains_key = match self.kind() {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_ro_txn()?;
                let database = transaction.open_db(Some(database_name))?;
                transaction
                    .get::<()>(database.dbi(), key.as_ref())?
                    .is_some()
            }
            DatabaseKind::InMemory { map } => map
                .lock()
                .expect("in-memory database mutex is poisoned")
                .contains_key(key.as_ref()),
        };

        Ok(contains_key)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        match self.kind() {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_ro_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                transaction
                    .get::<Cow<_>>(database.dbi(), key.as_ref())?
                    .map(|compressed| decompress(&compressed))
            }
            DatabaseKind::InMemory { map } => map
                .lock()
                .expect("in-memory database mutex is poisoned")
                .get(key.as_ref())
                .map(|compressed| decompress(compressed)),
        }
        .transpose()
    }

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_batch(core::iter::once((key, value)))
    }

    pub fn put_batch(
        &self,
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) -> Result<()> {
        match self.kind() {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_rw_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                for (key, value) in pairs {
                    let compressed = compress(value.as_ref())?;
                    transaction.put(database.dbi(), key, compressed, WriteFlags::default())?;
                }

                transaction.commit()?;
            }
            DatabaseKind::InMemory { map } => {
                // Build the new map first so that a failed compression leaves the map untouched.
                let mut map = map.lock().expect("in-memory database mutex is poisoned");
                let mut new_map = map.clone();

                for (key, value) in pairs {
                    let key = key.as_ref().into();
                    let compressed = compress(value.as_ref())?.into();
                    new_map.insert(key, compressed);
                }

                *map = new_map;
            }
        }

        Ok(())
    }

    /// Stores `value` under `key` unless the key is already present.
    ///
    /// Returns `true` if the value was written.
    /// The check and the write happen in one transaction.
    pub fn put_if_absent(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<bool> {
        let key = key.as_ref();
        let compressed = compress(value.as_ref())?;

        match self.kind() {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_rw_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                if transaction.get::<()>(database.dbi(), key)?.is_some() {
                    return Ok(false);
                }

                transaction.put(database.dbi(), key, compressed, WriteFlags::default())?;
                transaction.commit()?;
            }
            DatabaseKind::InMemory { map } => {
                let mut map = map.lock().expect("in-memory database mutex is poisoned");

                if map.contains_key(key) {
                    return Ok(false);
                }

                map.insert(key.into(), compressed.into());
            }
        }

        Ok(true)
    }

    /// Returns all pairs whose keys start with `prefix` in ascending key order.
    pub fn pairs_with_prefix(&self, prefix: impl AsRef<[u8]>) -> Result<Pairs> {
        let prefix = prefix.as_ref();
        self.scan_from(prefix, |key| key.starts_with(prefix))
    }

    fn scan_from(&self, start: &[u8], mut keep: impl FnMut(&[u8]) -> bool) -> Result<Pairs> {
        match self.kind() {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_ro_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                let mut cursor = transaction.cursor(&database)?;
                let mut pairs = vec![];
                let mut next = cursor.set_range::<Cow<[u8]>, Cow<[u8]>>(start)?;

                while let Some((key, compressed)) = next {
                    if !keep(&key) {
                        break;
                    }

                    pairs.push((key.into_owned(), decompress(&compressed)?));
                    next = cursor.next::<Cow<[u8]>, Cow<[u8]>>()?;
                }

                pairs
            }
            DatabaseKind::InMemory { map } => {
                // `OrdMap::clone` is cheap, so the lock is released before decompressing.
                let map = map
                    .lock()
                    .expect("in-memory database mutex is poisoned")
                    .clone();

                let start_pair = map.get_key_value(start);
                let (_, mut above) = map.split(start);

                if let Some((key, value)) = start_pair {
                    above
                        .insert(Arc::clone(key), Arc::clone(value))
                        .expect_none("start_pair should have been discarded by OrdMap::split");
                }

                above
                    .into_iter()
                    .take_while(|(key, _)| keep(key))
                    .map(|(key, value)| Ok((key.to_vec(), decompress(&value)?)))
                    .collect::<Result<_>>()?
            }
        }
        .pipe(Ok)
    }

    const fn kind(&self) -> &DatabaseKind {
        &self.0
    }
}

enum DatabaseKind {
    Persistent {
        database_name: String,
        environment: Environment,
    },
    InMemory {
        // `Arc<[u8]>` keeps clones of the whole map cheap.
        map: Mutex<InMemoryMap>,
    },
}

type InMemoryMap = OrdMap<Arc<[u8]>, Arc<[u8]>>;

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new().compress_vec(data).map_err(Into::into)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::new().decompress_vec(data).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    // The `TempDir` has to outlive the environment.
    type Constructor = fn() -> Result<(Database, Option<TempDir>)>;

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_get(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert_eq!(database.get("b/1")?, Some(to_bytes("one")));
        assert_eq!(database.get("r/02")?, Some(to_bytes("two")));
        assert_eq!(database.get("missing")?, None);

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_contains_key(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert!(database.contains_key("b/1")?);
        assert!(database.contains_key("r/03")?);
        assert!(!database.contains_key("r/04")?);
        assert!(!database.contains_key("b")?);

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_put_overwrites(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        database.put_batch([("x", "1"), ("x", "2"), ("x", "3")])?;

        assert_eq!(database.get("x")?, Some(to_bytes("3")));

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_put_if_absent_keeps_first_value(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert!(database.put_if_absent("x", "first")?);
        assert!(!database.put_if_absent("x", "second")?);
        assert!(!database.put_if_absent("b/1", "replacement")?);

        assert_eq!(database.get("x")?, Some(to_bytes("first")));
        assert_eq!(database.get("b/1")?, Some(to_bytes("one")));

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_pairs_with_prefix(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert_pairs_eq(
            database.pairs_with_prefix("r/")?,
            [("r/01", "one"), ("r/02", "two"), ("r/03", "three")],
        )?;

        assert_pairs_eq(database.pairs_with_prefix("r/02")?, [("r/02", "two")])?;
        assert_pairs_eq(database.pairs_with_prefix("b/")?, [("b/1", "one")])?;
        assert_pairs_eq(database.pairs_with_prefix("s/")?, [])?;

        Ok(())
    }

    // Scanning must not leave the in-memory map split.
    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_scans_do_not_modify_the_database(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert_pairs_eq(database.pairs_with_prefix("r/02")?, [("r/02", "two")])?;
        assert_pairs_eq(database.pairs_with_prefix("r/02")?, [("r/02", "two")])?;

        assert_eq!(database.get("b/1")?, Some(to_bytes("one")));
        assert_eq!(database.get("r/01")?, Some(to_bytes("one")));

        Ok(())
    }

    #[test]
    fn test_persistent_database_survives_reopening() -> Result<()> {
        let directory = TempDir::new()?;

        {
            let database = Database::persistent("test_db", directory.path(), ByteSize::mib(1))?;
            database.put("key", "value")?;
        }

        let database = Database::persistent("test_db", directory.path(), ByteSize::mib(1))?;

        assert!(database.is_persistent());
        assert_eq!(database.get("key")?, Some(to_bytes("value")));

        Ok(())
    }

    fn build_persistent_database() -> Result<(Database, Option<TempDir>)> {
        let directory = TempDir::new()?;
        let database = Database::persistent("test_db", directory.path(), ByteSize::mib(1))?;
        populate_database(&database)?;
        Ok((database, Some(directory)))
    }

    fn build_in_memory_database() -> Result<(Database, Option<TempDir>)> {
        let database = Database::in_memory();
        populate_database(&database)?;
        Ok((database, None))
    }

    fn populate_database(database: &Database) -> Result<()> {
        database.put_batch([("r/01", "one"), ("r/02", "two"), ("r/03", "three")])?;
        database.put("b/1", "one")?;
        Ok(())
    }

    fn assert_pairs_eq<'strings>(
        actual_pairs: Pairs,
        expected_pairs: impl IntoIterator<Item = (&'strings str, &'strings str)>,
    ) -> Result<()> {
        let actual_pairs = actual_pairs
            .into_iter()
            .map(|(key, value)| Ok((String::from_utf8(key)?, String::from_utf8(value)?)))
            .collect::<Result<Vec<_>>>()?;

        let expected_pairs = expected_pairs
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect::<Vec<_>>();

        assert_eq!(actual_pairs, expected_pairs);

        Ok(())
    }

    fn to_bytes(string: &str) -> Vec<u8> {
        string.as_bytes().to_vec()
    }
}
