//! Provides an in-memory pool that collects gossip attestations and serves maximally-useful
//! aggregates to a block proposer.
//!
//! **The pool performs no signature or attestation verification. It assumes every
//! `Attestation` offered to it has already been validated.**
//!
//! ## Details
//!
//! Attestations are grouped by the tree hash root of their `AttestationData`; attestations in
//! one group differ only in which committee members signed, so any bit-disjoint subset of a
//! group can be merged into a single aggregate. Groups are indexed by slot for retention:
//! a slot tick drops groups older than the retention window, and capacity pressure evicts
//! whole slots starting from the oldest (the newest slot is never evicted this way).
//!
//! The pool's collaborators are expressed as capability traits rather than concrete chain
//! machinery:
//!
//! - [`CommitteeResolver`] supplies per-slot committee sizes for committee-bits attestations.
//! - [`AttestationValidator`] decides whether attestation data may be included in a block
//!   built on a given state.
//! - [`ForkChecker`] confirms attestation data belongs to the fork being built on.
//! - [`SignatureAggregator`] combines opaque signature blobs.
//! - [`StateView`] is the narrow window onto the proposal state.
//!
//! Ingestion failures are expected (the gossip network is unreliable by design) and are
//! reported as [`Error`] values the caller can log and forget; only the invariant-violation
//! variants indicate a bug.

mod aggregate_builder;
mod attestation_group;
mod committee_resolver;
mod live_validators;
pub mod metrics;
mod pool;
#[cfg(test)]
mod test_utils;

pub use aggregate_builder::AggregateBuilder;
pub use attestation_group::{AggregateStream, AttestationGroup, GroupInsertOutcome};
pub use committee_resolver::{covered_bits_len, CommitteeResolver, CommitteeSizes};
pub use live_validators::{count_live_validators, LiveValidatorCounts};
pub use pool::{AggregatingAttestationPool, InsertOutcome};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use types::{AttestationData, Hash256, SignatureBytes, Slot};

/// The default hard cap on attestations stored across all slots.
pub const DEFAULT_MAX_POOL_SIZE: usize = 187_500;

/// The default number of slots an attestation is retained behind the current slot.
pub const DEFAULT_RETENTION_SLOTS: u64 = 64;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Hard cap on the total attestation count; exceeding it evicts the oldest slots.
    pub max_size: usize,
    /// Groups whose slot falls more than this many slots behind the current slot are
    /// dropped on the next slot tick.
    pub retention_slots: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_POOL_SIZE,
            retention_slots: DEFAULT_RETENTION_SLOTS,
        }
    }
}

/// Returned when an attestation was not stored, or when the pool detected an internal
/// inconsistency.
///
/// All variants except `EmptyAggregate` and `GroupIndexInconsistent` describe inputs the
/// pool chose to drop; those two should never occur and indicate a bug.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// The attestation slot is below the retention horizon. No changes were made.
    SlotTooLow {
        slot: Slot,
        lowest_permissible_slot: Slot,
    },
    /// The attestation's `aggregation_bits` field was empty.
    NoAggregationBitsSet,
    /// The attestation format does not match the protocol milestone of its slot.
    AttestationVariantMismatch { slot: Slot },
    /// Committee sizes for the attestation's slot could not be resolved.
    CommitteesUnresolvable { slot: Slot },
    /// The attestation's bitfield length differs from the one tracked for its group.
    InconsistentBitfieldLengths,
    /// The attestation covers a different committee set than its group.
    IncompatibleCommitteeBits,
    /// A bitfield operation failed.
    SszTypes(ssz_types::Error),
    /// An aggregate was built from zero attestations. This is an internal error.
    EmptyAggregate,
    /// The slot index references a group that does not exist. This is an internal error.
    GroupIndexInconsistent(Hash256),
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Error {
        Error::SszTypes(e)
    }
}

/// The narrow window onto the state a block is being built upon.
pub trait StateView {
    /// The slot of the block under construction.
    fn slot(&self) -> Slot;

    /// How many previous-epoch attestations the block may still include.
    fn previous_epoch_attestation_capacity(&self) -> usize;

    /// The block root this state has recorded for `slot`, if known.
    fn block_root_at_slot(&self, slot: Slot) -> Option<Hash256>;
}

/// Decides whether attestation data is includable in a block built on `state`.
///
/// Implementations apply the protocol's inclusion rules (target root matches the state's
/// view, acceptable source checkpoint, inclusion delay, and so on). The pool treats any
/// error as "skip this group" and logs it at debug level.
pub trait AttestationValidator<S: StateView> {
    type Error: Debug;

    fn validate_for_block_inclusion(
        &self,
        state: &S,
        data: &AttestationData,
    ) -> Result<(), Self::Error>;
}

/// Confirms attestation data belongs to the fork of the block being produced.
pub trait ForkChecker {
    fn in_block_fork(&self, data: &AttestationData) -> bool;
}

/// Combines opaque signature blobs into one.
///
/// Implementations must not interpret or mutate the inputs; the result is a fresh blob.
pub trait SignatureAggregator: Send + Sync {
    fn combine(&self, signatures: &[&SignatureBytes]) -> SignatureBytes;
}
