//! Consensus types shared across the workspace.
//!
//! This crate deliberately covers only what attestation aggregation needs: the attestation
//! containers for both wire formats, the data they commit to, and the slot/epoch/fork
//! machinery used to reason about retention windows and format milestones.

pub mod attestation;
pub mod attestation_data;
pub mod chain_spec;
pub mod checkpoint;
pub mod eth_spec;
pub mod fork_name;
pub mod signature_bytes;
pub mod slot_epoch;

pub use attestation::{
    Attestation, AttestationBase, AttestationElectra, Error as AttestationError,
};
pub use attestation_data::AttestationData;
pub use chain_spec::ChainSpec;
pub use checkpoint::Checkpoint;
pub use eth_spec::{EthSpec, MainnetEthSpec, MinimalEthSpec};
pub use fork_name::ForkName;
pub use signature_bytes::{SignatureBytes, SIGNATURE_BYTES_LEN};
pub use slot_epoch::{Epoch, Slot};

pub use ssz_types::{typenum, BitList, BitVector};

pub type Hash256 = ethereum_types::H256;
pub type CommitteeIndex = u64;
