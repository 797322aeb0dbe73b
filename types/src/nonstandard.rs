use serde::{Deserialize, Serialize};

use crate::{
    containers::BlobSidecar,
    primitives::{BlobIndex, H256, Slot, UnixSeconds},
};

/// What the archive knows about one block root observed at a slot.
///
/// Several records may exist for the same slot when competing forks were observed.
/// At most one of them is canonical at any time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CanonicalRecord {
    #[serde(with = "serde_utils::string_or_native")]
    pub slot: Slot,
    pub root: H256,
    pub parent_root: H256,
    pub canonical: bool,
    #[serde(with = "serde_utils::string_or_native")]
    pub observed_at: UnixSeconds,
}

impl CanonicalRecord {
    #[must_use]
    pub const fn with_canonical(self, canonical: bool) -> Self {
        Self { canonical, ..self }
    }
}

/// All blob sidecars of one block, ordered by index.
///
/// The contents are fixed once the block root is known. An empty set is valid.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlobSidecarSet {
    pub block_root: H256,
    #[serde(with = "serde_utils::string_or_native")]
    pub slot: Slot,
    pub sidecars: Vec<BlobSidecar>,
}

impl BlobSidecarSet {
    #[must_use]
    pub fn new(block_root: H256, slot: Slot, mut sidecars: Vec<BlobSidecar>) -> Self {
        sidecars.sort_by_key(|sidecar| sidecar.index);

        Self {
            block_root,
            slot,
            sidecars,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sidecars.is_empty()
    }

    /// Returns the sidecars with the requested indices.
    /// Indices not present in the set are skipped.
    pub fn filter_indices<'set>(
        &'set self,
        indices: &'set [BlobIndex],
    ) -> impl Iterator<Item = &'set BlobSidecar> {
        self.sidecars
            .iter()
            .filter(move |sidecar| indices.contains(&sidecar.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidecar(index: BlobIndex) -> BlobSidecar {
        BlobSidecar {
            index,
            ..BlobSidecar::default()
        }
    }

    #[test]
    fn blob_sidecar_set_new_sorts_by_index() {
        let set = BlobSidecarSet::new(H256::zero(), 5, vec![sidecar(2), sidecar(0), sidecar(1)]);

        let indices = set
            .sidecars
            .iter()
            .map(|sidecar| sidecar.index)
            .collect::<Vec<_>>();

        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn blob_sidecar_set_filter_indices_skips_missing_indices() {
        let set = BlobSidecarSet::new(H256::zero(), 5, vec![sidecar(0), sidecar(1), sidecar(2)]);

        let indices = set
            .filter_indices(&[2, 0, 9])
            .map(|sidecar| sidecar.index)
            .collect::<Vec<_>>();

        assert_eq!(indices, [0, 2]);
    }

    #[test]
    fn canonical_record_with_canonical_only_changes_flag() {
        let record = CanonicalRecord {
            slot: 1,
            root: H256::repeat_byte(1),
            parent_root: H256::repeat_byte(2),
            canonical: true,
            observed_at: 10,
        };

        let demoted = record.with_canonical(false);

        assert!(!demoted.canonical);
        assert_eq!(demoted.with_canonical(true), record);
    }
}
