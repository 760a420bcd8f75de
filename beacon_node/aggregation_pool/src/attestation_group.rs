use crate::aggregate_builder::AggregateBuilder;
use crate::committee_resolver::CommitteeSizes;
use crate::{Error, SignatureAggregator};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use types::{Attestation, AttestationData, BitList, BitVector, CommitteeIndex, EthSpec, Slot};

/// Outcome of offering an attestation to a group.
#[derive(Debug, PartialEq)]
pub enum GroupInsertOutcome {
    /// The attestation was stored.
    Stored,
    /// An identical attestation was already present. No changes were made.
    AlreadyKnown,
    /// Every signer is already covered by bits included on chain. No changes were made.
    Subsumed,
}

/// All pending attestations sharing one `AttestationData`, plus a record of the aggregation
/// bits already included on chain for that data.
///
/// Invariants:
///
/// - every member has the bitfield length the group was created with (and, for
///   committee-bits attestations, the committee layout of the first observation);
/// - no member's bits are a subset of the included-on-chain union.
pub struct AttestationGroup<E: EthSpec> {
    data: AttestationData,
    committees_size: Option<CommitteeSizes>,
    /// The committee layout shared by all members. `None` until the first committee-bits
    /// attestation is observed, and always `None` for pre-Electra groups.
    committee_bits: Option<BitVector<E::MaxCommitteesPerSlot>>,
    /// Members bucketed by participation count; insertion order is preserved per bucket.
    by_participation: BTreeMap<usize, Vec<Attestation<E>>>,
    /// Union of aggregation bits seen in blocks for this data.
    included: BitList<E::MaxValidatorsPerSlot>,
    /// Per-block-slot record of included bits, so a reorg can rewind the union.
    included_by_slot: BTreeMap<Slot, BitList<E::MaxValidatorsPerSlot>>,
    len: usize,
}

impl<E: EthSpec> AttestationGroup<E> {
    /// Create an empty group for `data` whose members carry `bits_len` aggregation bits.
    pub fn new(
        data: AttestationData,
        committees_size: Option<CommitteeSizes>,
        bits_len: usize,
    ) -> Result<Self, Error> {
        let included = BitList::with_capacity(bits_len)?;
        Ok(Self {
            data,
            committees_size,
            committee_bits: None,
            by_participation: BTreeMap::new(),
            included,
            included_by_slot: BTreeMap::new(),
            len: 0,
        })
    }

    pub fn data(&self) -> &AttestationData {
        &self.data
    }

    pub fn committees_size(&self) -> Option<&CommitteeSizes> {
        self.committees_size.as_ref()
    }

    pub fn set_committees_size(&mut self, sizes: CommitteeSizes) {
        self.committees_size = Some(sizes);
    }

    /// The number of attestations stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an attestation into the group.
    ///
    /// The attestation is dropped (`Subsumed`) when the chain has already included every
    /// one of its signers, and ignored (`AlreadyKnown`) when an identical attestation is
    /// present.
    pub fn insert(&mut self, attestation: Attestation<E>) -> Result<GroupInsertOutcome, Error> {
        self.check_layout(&attestation)?;
        self.observe_layout(&attestation);

        if covered_by(attestation.aggregation_bits(), &self.included) {
            return Ok(GroupInsertOutcome::Subsumed);
        }

        let participation = attestation.num_set_aggregation_bits();
        let bucket = self.by_participation.entry(participation).or_default();
        if bucket.iter().any(|existing| *existing == attestation) {
            return Ok(GroupInsertOutcome::AlreadyKnown);
        }

        bucket.push(attestation);
        self.len += 1;
        Ok(GroupInsertOutcome::Stored)
    }

    /// Record that `attestation` was included in a block at `block_slot`.
    ///
    /// Members whose signers are now fully covered are dropped; the number removed is
    /// returned so the pool can adjust its totals.
    pub fn on_attestation_included(
        &mut self,
        block_slot: Slot,
        attestation: &Attestation<E>,
    ) -> Result<usize, Error> {
        self.check_layout(attestation)?;
        self.observe_layout(attestation);

        let bits = attestation.aggregation_bits();
        match self.included_by_slot.entry(block_slot) {
            Entry::Occupied(mut entry) => {
                let merged = entry.get().union(bits);
                *entry.get_mut() = merged;
            }
            Entry::Vacant(entry) => {
                entry.insert(bits.clone());
            }
        }

        if covered_by(bits, &self.included) {
            return Ok(0);
        }
        self.included = self.included.union(bits);

        let included = &self.included;
        let mut removed = 0;
        self.by_participation.retain(|_, bucket| {
            bucket.retain(|member| {
                let keep = !covered_by(member.aggregation_bits(), included);
                if !keep {
                    removed += 1;
                }
                keep
            });
            !bucket.is_empty()
        });
        self.len -= removed;
        Ok(removed)
    }

    /// Forget inclusions from blocks past the reorg's common ancestor, so bits included on
    /// the abandoned fork become aggregable again.
    pub fn on_reorg(&mut self, common_ancestor_slot: Slot) {
        let discarded = self.included_by_slot.split_off(&(common_ancestor_slot + 1));
        if discarded.is_empty() {
            return;
        }

        let zeroed = BitList::with_capacity(self.included.len())
            .expect("length was accepted at group creation");
        self.included = self
            .included_by_slot
            .values()
            .fold(zeroed, |union, bits| union.union(bits));
    }

    /// Raw members in descending participation order; insertion order within equal counts.
    pub fn iter(&self) -> impl Iterator<Item = &Attestation<E>> {
        self.by_participation.values().rev().flatten()
    }

    /// Stream aggregates built from the group's members.
    ///
    /// The stream is deterministic for fixed group contents and may be restarted by calling
    /// this again. Aggregates emitted by one stream are pairwise bit-disjoint: a member
    /// overlapping previously emitted bits is skipped for the remainder of that stream.
    pub fn aggregates<'a, A: SignatureAggregator>(
        &'a self,
        aggregator: &'a A,
        committee_index: Option<CommitteeIndex>,
    ) -> AggregateStream<'a, E, A> {
        let candidates: Vec<&Attestation<E>> = self
            .iter()
            .filter(|attestation| {
                committee_index.map_or(true, |index| attestation.covers_committee(index))
            })
            .collect();
        let consumed = vec![false; candidates.len()];
        let emitted = BitList::with_capacity(self.included.len())
            .expect("length was accepted at group creation");
        AggregateStream {
            candidates,
            consumed,
            emitted,
            aggregator,
        }
    }

    /// Reject attestations that cannot share a bit-index space with this group.
    fn check_layout(&self, attestation: &Attestation<E>) -> Result<(), Error> {
        if attestation.aggregation_bits().len() != self.included.len() {
            return Err(Error::InconsistentBitfieldLengths);
        }
        if let (Some(layout), Attestation::Electra(att)) = (&self.committee_bits, attestation) {
            if *layout != att.committee_bits {
                return Err(Error::IncompatibleCommitteeBits);
            }
        }
        Ok(())
    }

    fn observe_layout(&mut self, attestation: &Attestation<E>) {
        if self.committee_bits.is_none() {
            if let Attestation::Electra(att) = attestation {
                self.committee_bits = Some(att.committee_bits.clone());
            }
        }
    }
}

/// True when every set bit of `bits` is also set in `cover`.
fn covered_by<N: ssz_types::typenum::Unsigned + Clone>(
    bits: &BitList<N>,
    cover: &BitList<N>,
) -> bool {
    bits.difference(cover).is_zero()
}

/// Lazily yields aggregates from a group, largest participation first.
pub struct AggregateStream<'a, E: EthSpec, A: SignatureAggregator> {
    candidates: Vec<&'a Attestation<E>>,
    consumed: Vec<bool>,
    emitted: BitList<E::MaxValidatorsPerSlot>,
    aggregator: &'a A,
}

impl<'a, E: EthSpec, A: SignatureAggregator> Iterator for AggregateStream<'a, E, A> {
    type Item = Result<Attestation<E>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut builder = AggregateBuilder::new();

        for index in 0..self.candidates.len() {
            if self.consumed[index] {
                continue;
            }
            let candidate = self.candidates[index];
            if !self
                .emitted
                .intersection(candidate.aggregation_bits())
                .is_zero()
            {
                // Overlaps an aggregate this stream already emitted, so it can never be
                // emitted again without breaking pairwise disjointness.
                self.consumed[index] = true;
                continue;
            }
            if builder.can_aggregate(candidate) {
                builder.aggregate(candidate);
                self.consumed[index] = true;
            }
        }

        if builder.is_empty() {
            return None;
        }
        if let Some(participants) = builder.participants() {
            self.emitted = self.emitted.union(participants);
        }
        Some(builder.build(self.aggregator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn group_of(attestations: &[Attestation<E>]) -> AttestationGroup<E> {
        let first = attestations.first().expect("at least one attestation");
        let mut group = AttestationGroup::new(
            first.data().clone(),
            None,
            first.aggregation_bits().len(),
        )
        .unwrap();
        for attestation in attestations {
            group.insert(attestation.clone()).unwrap();
        }
        group
    }

    fn collect_aggregates(group: &AttestationGroup<E>) -> Vec<Attestation<E>> {
        group
            .aggregates(&XorSignatureAggregator, None)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let a = base_attestation(1, 0, 8, &[0, 1]);
        let mut group = group_of(&[a.clone()]);

        assert_eq!(group.insert(a).unwrap(), GroupInsertOutcome::AlreadyKnown);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn mismatched_length_is_rejected() {
        let a = base_attestation(1, 0, 8, &[0]);
        let wrong = base_attestation(1, 0, 9, &[0]);
        let mut group = group_of(&[a]);

        assert_eq!(
            group.insert(wrong),
            Err(Error::InconsistentBitfieldLengths)
        );
    }

    #[test]
    fn inclusion_prunes_covered_members() {
        let small = base_attestation(1, 0, 8, &[0, 1]);
        let large = base_attestation(1, 0, 8, &[0, 1, 2, 3]);
        let mut group = group_of(&[small, large]);

        let on_chain = base_attestation(1, 0, 8, &[0, 1]);
        let removed = group
            .on_attestation_included(Slot::new(3), &on_chain)
            .unwrap();

        assert_eq!(removed, 1, "the fully covered member is dropped");
        assert_eq!(group.len(), 1);

        // Repeating the report changes nothing.
        let removed = group
            .on_attestation_included(Slot::new(3), &on_chain)
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn subsumed_after_inclusion() {
        let a = base_attestation(1, 0, 8, &[0, 1]);
        let mut group = group_of(&[a.clone()]);

        group
            .on_attestation_included(Slot::new(3), &base_attestation(1, 0, 8, &[0, 1, 2]))
            .unwrap();

        assert_eq!(group.insert(a).unwrap(), GroupInsertOutcome::Subsumed);
        assert_eq!(group.len(), 0);
    }

    #[test]
    fn reorg_rewinds_included_bits() {
        let a = base_attestation(1, 0, 8, &[0, 1]);
        let mut group = group_of(&[a.clone()]);

        group
            .on_attestation_included(Slot::new(2), &base_attestation(1, 0, 8, &[4]))
            .unwrap();
        group
            .on_attestation_included(Slot::new(5), &base_attestation(1, 0, 8, &[0, 1]))
            .unwrap();
        assert_eq!(group.len(), 0, "member was covered at slot 5");
        assert_eq!(
            group.insert(a.clone()).unwrap(),
            GroupInsertOutcome::Subsumed
        );

        // A reorg back past slot 5 forgets that inclusion but keeps slot 2's.
        group.on_reorg(Slot::new(4));
        assert_eq!(group.insert(a).unwrap(), GroupInsertOutcome::Stored);
        assert_eq!(
            group
                .insert(base_attestation(1, 0, 8, &[4]))
                .unwrap(),
            GroupInsertOutcome::Subsumed,
            "slot 2 inclusion is still known"
        );
    }

    #[test]
    fn reorg_at_or_after_inclusion_slot_keeps_state() {
        let a = base_attestation(1, 0, 8, &[0, 1]);
        let mut group = group_of(&[a.clone()]);
        group
            .on_attestation_included(Slot::new(5), &base_attestation(1, 0, 8, &[0, 1]))
            .unwrap();

        group.on_reorg(Slot::new(5));
        assert_eq!(group.insert(a).unwrap(), GroupInsertOutcome::Subsumed);
    }

    #[test]
    fn stream_merges_disjoint_members() {
        let group = group_of(&[
            base_attestation(1, 0, 8, &[0, 1]),
            base_attestation(1, 0, 8, &[2, 3]),
            base_attestation(1, 0, 8, &[4]),
        ]);

        let aggregates = collect_aggregates(&group);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(set_bits(&aggregates[0]), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stream_prefers_larger_members() {
        let group = group_of(&[
            base_attestation(1, 0, 8, &[0]),
            base_attestation(1, 0, 8, &[0, 1, 2]),
        ]);

        let aggregates = collect_aggregates(&group);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(
            set_bits(&aggregates[0]),
            vec![0, 1, 2],
            "the larger member seeds the aggregate; the overlapping one is skipped"
        );
    }

    #[test]
    fn stream_aggregates_are_pairwise_disjoint() {
        // {0,1} and {2,3} merge; {0,2} overlaps the emitted aggregate and is never yielded.
        let group = group_of(&[
            base_attestation(1, 0, 8, &[0, 1]),
            base_attestation(1, 0, 8, &[2, 3]),
            base_attestation(1, 0, 8, &[0, 2]),
        ]);

        let aggregates = collect_aggregates(&group);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(set_bits(&aggregates[0]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn stream_is_restartable_and_deterministic() {
        let group = group_of(&[
            base_attestation(1, 0, 8, &[0, 1]),
            base_attestation(1, 0, 8, &[1, 2]),
            base_attestation(1, 0, 8, &[3]),
        ]);

        let first = collect_aggregates(&group);
        let second = collect_aggregates(&group);
        assert_eq!(first, second);
    }

    #[test]
    fn stream_filters_by_committee() {
        let group = group_of(&[base_attestation(1, 7, 8, &[0, 1])]);

        let all: Vec<_> = group
            .aggregates(&XorSignatureAggregator, Some(7))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(all.len(), 1);

        let none: Vec<_> = group
            .aggregates(&XorSignatureAggregator, Some(6))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn electra_layout_is_fixed_by_first_member() {
        let sizes = committee_sizes(&[(0, 4), (1, 4)]);
        let first = electra_attestation(72, &[0], &sizes, &[0]);
        let same_layout = electra_attestation(72, &[0], &sizes, &[1]);
        let other_layout = electra_attestation(72, &[1], &sizes, &[2]);

        let mut group = AttestationGroup::new(
            first.data().clone(),
            Some(sizes),
            first.aggregation_bits().len(),
        )
        .unwrap();

        assert_eq!(group.insert(first).unwrap(), GroupInsertOutcome::Stored);
        assert_eq!(
            group.insert(same_layout).unwrap(),
            GroupInsertOutcome::Stored
        );
        assert_eq!(
            group.insert(other_layout),
            Err(Error::IncompatibleCommitteeBits)
        );
    }
}
