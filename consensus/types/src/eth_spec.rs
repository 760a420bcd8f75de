use crate::ChainSpec;
use serde::{Deserialize, Serialize};
use ssz_types::typenum::{Unsigned, U128, U131072, U2048, U32, U4, U64, U8, U8192};
use std::fmt::Debug;

pub trait EthSpec: 'static + Default + Sync + Send + Clone + Debug + PartialEq + Eq {
    type MaxValidatorsPerCommittee: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxCommitteesPerSlot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /// Upper bound on aggregation bits for a whole slot; this caps the bitlists of both
    /// attestation variants.
    type MaxValidatorsPerSlot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /// Per-block attestation cap before the committee-bits format.
    type MaxAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /// Per-block attestation cap once the committee-bits format is active.
    type MaxAttestationsElectra: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SlotsPerEpoch: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;

    fn default_spec() -> ChainSpec;

    /// Returns the `SLOTS_PER_EPOCH` constant for this specification.
    fn slots_per_epoch() -> u64 {
        Self::SlotsPerEpoch::to_u64()
    }

    fn max_validators_per_committee() -> usize {
        Self::MaxValidatorsPerCommittee::to_usize()
    }

    fn max_committees_per_slot() -> usize {
        Self::MaxCommitteesPerSlot::to_usize()
    }

    fn max_validators_per_slot() -> usize {
        Self::MaxValidatorsPerSlot::to_usize()
    }

    fn max_attestations() -> usize {
        Self::MaxAttestations::to_usize()
    }

    fn max_attestations_electra() -> usize {
        Self::MaxAttestationsElectra::to_usize()
    }
}

/// Ethereum Foundation mainnet specification.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MainnetEthSpec;

impl EthSpec for MainnetEthSpec {
    type MaxValidatorsPerCommittee = U2048;
    type MaxCommitteesPerSlot = U64;
    type MaxValidatorsPerSlot = U131072;
    type MaxAttestations = U128;
    type MaxAttestationsElectra = U8;
    type SlotsPerEpoch = U32;

    fn default_spec() -> ChainSpec {
        ChainSpec::mainnet()
    }
}

/// Ethereum Foundation minimal specification, used for testing.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MinimalEthSpec;

impl EthSpec for MinimalEthSpec {
    type MaxValidatorsPerCommittee = U2048;
    type MaxCommitteesPerSlot = U4;
    type MaxValidatorsPerSlot = U8192;
    type MaxAttestations = U128;
    type MaxAttestationsElectra = U8;
    type SlotsPerEpoch = U8;

    fn default_spec() -> ChainSpec {
        ChainSpec::minimal()
    }
}
