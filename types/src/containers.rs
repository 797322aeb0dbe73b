use serde::{Deserialize, Serialize};

use crate::primitives::{
    BlobIndex, H256, KzgCommitment, KzgProof, SignatureBytes, Slot, ValidatorIndex,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlockHeader {
    #[serde(with = "serde_utils::string_or_native")]
    pub slot: Slot,
    #[serde(with = "serde_utils::string_or_native")]
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlobSidecar {
    #[serde(with = "serde_utils::string_or_native")]
    pub index: BlobIndex,
    #[serde(with = "serde_utils::prefixed_hex_or_bytes_vec")]
    pub blob: Vec<u8>,
    pub kzg_commitment: KzgCommitment,
    pub kzg_proof: KzgProof,
    pub signed_block_header: SignedBeaconBlockHeader,
    pub kzg_commitment_inclusion_proof: Vec<H256>,
}

impl BlobSidecar {
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.signed_block_header.message.slot
    }
}
