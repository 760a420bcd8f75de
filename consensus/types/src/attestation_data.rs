use crate::{Checkpoint, Hash256, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The data upon which an attestation is based.
///
/// Attestations carrying byte-identical data may be aggregated together; the tree hash root of
/// this struct is the key the aggregation pool groups by.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct AttestationData {
    pub slot: Slot,
    #[serde(with = "serde_utils::quoted_u64")]
    pub index: u64,

    /// Root of the beacon block the attester is voting for (LMD GHOST vote).
    pub beacon_block_root: Hash256,

    /// Source checkpoint (FFG vote).
    pub source: Checkpoint,
    /// Target checkpoint (FFG vote).
    pub target: Checkpoint,
}
