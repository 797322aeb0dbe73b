pub use ethereum_types::H256;
use primitive_types::{H384, H768};

pub type BlobIndex = u64;
pub type Slot = u64;
pub type UnixSeconds = u64;
pub type ValidatorIndex = u64;

// KZG commitments and proofs are carried as opaque bytes.
// Nothing in this workspace checks them against the blob.
pub type KzgCommitment = H384;
pub type KzgProof = H384;
pub type SignatureBytes = H768;
