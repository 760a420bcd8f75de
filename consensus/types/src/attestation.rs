use crate::{AttestationData, BitList, BitVector, CommitteeIndex, EthSpec, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq)]
pub enum Error {
    SszTypesError(ssz_types::Error),
    IncorrectAttestationVariant,
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Error {
        Error::SszTypesError(e)
    }
}

/// A validator vote on a chain head and checkpoint pair.
///
/// The `Base` variant reports for the single committee named by `data.index`; the `Electra`
/// variant may span several committees, identified by `committee_bits`, with the aggregation
/// bits of the covered committees laid out back-to-back in ascending committee order.
#[superstruct(
    variants(Base, Electra),
    variant_attributes(
        derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash,),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    cast_error(ty = "Error", expr = "Error::IncorrectAttestationVariant"),
    partial_getter_error(ty = "Error", expr = "Error::IncorrectAttestationVariant")
)]
#[derive(Debug, Clone, PartialEq, Serialize, Encode, TreeHash)]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct Attestation<E: EthSpec> {
    /// Bitfield of committee members that have signed, one bit per member.
    pub aggregation_bits: BitList<E::MaxValidatorsPerSlot>,
    pub data: AttestationData,
    /// Bitfield of the committees contributing to this attestation.
    #[superstruct(only(Electra))]
    pub committee_bits: BitVector<E::MaxCommitteesPerSlot>,
    /// Opaque aggregated signature over `data` from every set bit.
    pub signature: SignatureBytes,
}

impl<E: EthSpec> Attestation<E> {
    /// True when this attestation uses the committee-bits format.
    pub fn is_electra(&self) -> bool {
        matches!(self, Attestation::Electra(_))
    }

    /// The number of signers this attestation reports for.
    pub fn num_set_aggregation_bits(&self) -> usize {
        self.aggregation_bits().num_set_bits()
    }

    /// The committee this attestation reports for, when it covers exactly one.
    pub fn committee_index(&self) -> Option<CommitteeIndex> {
        match self {
            Attestation::Base(att) => Some(att.data.index),
            Attestation::Electra(att) => att.committee_index(),
        }
    }

    /// All committees contributing to this attestation, ascending.
    pub fn committee_indices(&self) -> Vec<CommitteeIndex> {
        match self {
            Attestation::Base(att) => vec![att.data.index],
            Attestation::Electra(att) => att.get_committee_indices(),
        }
    }

    /// True if `index` is one of the committees this attestation covers.
    pub fn covers_committee(&self, index: CommitteeIndex) -> bool {
        match self {
            Attestation::Base(att) => att.data.index == index,
            Attestation::Electra(att) => {
                att.committee_bits.get(index as usize).unwrap_or(false)
            }
        }
    }

    /// Whether the signers of `self` and `other` are disjoint.
    pub fn signers_disjoint_from(&self, other: &Self) -> bool {
        self.aggregation_bits()
            .intersection(other.aggregation_bits())
            .is_zero()
    }
}

impl<E: EthSpec> AttestationElectra<E> {
    /// The lowest committee contributing to this attestation.
    pub fn committee_index(&self) -> Option<CommitteeIndex> {
        self.get_committee_indices().first().copied()
    }

    pub fn get_committee_indices(&self) -> Vec<CommitteeIndex> {
        self.committee_bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| if bit { Some(index as u64) } else { None })
            .collect()
    }
}
