use std::collections::HashMap;
use types::{BitVector, CommitteeIndex, EthSpec, Slot};

/// The number of validators in each committee of a slot.
pub type CommitteeSizes = HashMap<CommitteeIndex, usize>;

/// Supplies per-slot committee sizes from chain state.
///
/// Implementations must answer synchronously from an already-loaded snapshot and never
/// block. When the backing state is not immediately available they return `None`; the pool
/// treats that as a drop.
pub trait CommitteeResolver: Send + Sync {
    /// Committee sizes for `slot` from the store's current view. The pool uses this for
    /// attestations in the current or previous epoch of that view.
    fn committees_size(&self, slot: Slot) -> Option<CommitteeSizes>;

    /// Committee sizes via the state at the start of `slot`'s epoch. The pool uses this for
    /// attestations one epoch older than the previous epoch.
    fn committees_size_at(&self, slot: Slot) -> Option<CommitteeSizes>;
}

/// The aggregation-bit length covered by the committees set in `committee_bits`.
///
/// Returns `None` when a covered committee is missing from `sizes`, which makes the
/// attestation unresolvable.
pub fn covered_bits_len<E: EthSpec>(
    sizes: &CommitteeSizes,
    committee_bits: &BitVector<E::MaxCommitteesPerSlot>,
) -> Option<usize> {
    committee_bits
        .iter()
        .enumerate()
        .filter(|(_, bit)| *bit)
        .map(|(index, _)| sizes.get(&(index as u64)).copied())
        .sum()
}
