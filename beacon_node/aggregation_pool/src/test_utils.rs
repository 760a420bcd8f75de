//! Deterministic stand-ins for the pool's capabilities, shared by the unit tests.

use crate::committee_resolver::{CommitteeResolver, CommitteeSizes};
use crate::pool::AggregatingAttestationPool;
use crate::{
    AttestationValidator, ForkChecker, PoolConfig, SignatureAggregator, StateView,
};
use slog::o;
use std::collections::HashMap;
use types::{
    Attestation, AttestationBase, AttestationData, AttestationElectra, BitList, BitVector,
    ChainSpec, Checkpoint, Epoch, EthSpec, Hash256, MinimalEthSpec, SignatureBytes, Slot,
    SIGNATURE_BYTES_LEN,
};

pub type E = MinimalEthSpec;

pub fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!())
}

/// Combines signature blobs by byte-wise XOR: deterministic, order-independent, and clearly
/// distinguishable from any input.
pub struct XorSignatureAggregator;

impl SignatureAggregator for XorSignatureAggregator {
    fn combine(&self, signatures: &[&SignatureBytes]) -> SignatureBytes {
        let mut bytes = [0u8; SIGNATURE_BYTES_LEN];
        for signature in signatures {
            for (acc, byte) in bytes.iter_mut().zip(signature.as_bytes()) {
                *acc ^= byte;
            }
        }
        SignatureBytes::from(bytes)
    }
}

/// Answers every committee-size lookup with the same table.
pub struct FixedCommitteeResolver(pub CommitteeSizes);

impl CommitteeResolver for FixedCommitteeResolver {
    fn committees_size(&self, _slot: Slot) -> Option<CommitteeSizes> {
        Some(self.0.clone())
    }

    fn committees_size_at(&self, _slot: Slot) -> Option<CommitteeSizes> {
        Some(self.0.clone())
    }
}

/// A resolver with no state available at all.
pub struct UnresolvableCommittees;

impl CommitteeResolver for UnresolvableCommittees {
    fn committees_size(&self, _slot: Slot) -> Option<CommitteeSizes> {
        None
    }

    fn committees_size_at(&self, _slot: Slot) -> Option<CommitteeSizes> {
        None
    }
}

/// Distinguishes the recent-view lookup from the epoch-start lookup.
pub struct TwoTierResolver {
    pub recent: Option<CommitteeSizes>,
    pub epoch_start: Option<CommitteeSizes>,
}

impl CommitteeResolver for TwoTierResolver {
    fn committees_size(&self, _slot: Slot) -> Option<CommitteeSizes> {
        self.recent.clone()
    }

    fn committees_size_at(&self, _slot: Slot) -> Option<CommitteeSizes> {
        self.epoch_start.clone()
    }
}

pub struct TestStateView {
    pub slot: Slot,
    pub previous_epoch_attestation_capacity: usize,
    pub block_roots: HashMap<Slot, Hash256>,
}

impl StateView for TestStateView {
    fn slot(&self) -> Slot {
        self.slot
    }

    fn previous_epoch_attestation_capacity(&self) -> usize {
        self.previous_epoch_attestation_capacity
    }

    fn block_root_at_slot(&self, slot: Slot) -> Option<Hash256> {
        self.block_roots.get(&slot).copied()
    }
}

/// A state at `slot` that knows the canonical target root of every epoch up to its own.
pub fn state_at(slot: u64, previous_epoch_attestation_capacity: usize) -> TestStateView {
    let slot = Slot::new(slot);
    let slots_per_epoch = E::slots_per_epoch();
    let mut block_roots = HashMap::new();
    for epoch in 0..=slot.epoch(slots_per_epoch).as_u64() {
        let epoch = Epoch::new(epoch);
        block_roots.insert(epoch.start_slot(slots_per_epoch), target_root(epoch));
    }
    TestStateView {
        slot,
        previous_epoch_attestation_capacity,
        block_roots,
    }
}

pub struct AcceptAllValidator;

impl<S: StateView> AttestationValidator<S> for AcceptAllValidator {
    type Error = ();

    fn validate_for_block_inclusion(
        &self,
        _state: &S,
        _data: &AttestationData,
    ) -> Result<(), ()> {
        Ok(())
    }
}

/// Accepts attestation data only when its target root matches the state's record for the
/// target epoch's start slot.
pub struct TargetCheckingValidator;

impl<S: StateView> AttestationValidator<S> for TargetCheckingValidator {
    type Error = &'static str;

    fn validate_for_block_inclusion(
        &self,
        state: &S,
        data: &AttestationData,
    ) -> Result<(), Self::Error> {
        let start_slot = data.target.epoch.start_slot(E::slots_per_epoch());
        if state.block_root_at_slot(start_slot) == Some(data.target.root) {
            Ok(())
        } else {
            Err("target root does not match the state")
        }
    }
}

pub struct AllForks;

impl ForkChecker for AllForks {
    fn in_block_fork(&self, _data: &AttestationData) -> bool {
        true
    }
}

/// Treats data for one committee index as belonging to another fork.
pub struct RejectIndexFork(pub u64);

impl ForkChecker for RejectIndexFork {
    fn in_block_fork(&self, data: &AttestationData) -> bool {
        data.index != self.0
    }
}

/// The canonical target root tests use for `epoch`.
pub fn target_root(epoch: Epoch) -> Hash256 {
    Hash256::from_low_u64_be(0x7000 + epoch.as_u64())
}

pub fn attestation_data(slot: u64, index: u64) -> AttestationData {
    let slot = Slot::new(slot);
    let epoch = slot.epoch(E::slots_per_epoch());
    AttestationData {
        slot,
        index,
        beacon_block_root: Hash256::from_low_u64_be(0x1000 + slot.as_u64()),
        source: Checkpoint {
            epoch: epoch - 1,
            root: target_root(epoch - 1),
        },
        target: Checkpoint {
            epoch,
            root: target_root(epoch),
        },
    }
}

fn bits_seed(bits: &[usize]) -> u64 {
    bits.iter()
        .fold(0u64, |acc, &bit| acc.wrapping_mul(131).wrapping_add(bit as u64 + 1))
}

pub fn test_signature(seed: u64) -> SignatureBytes {
    let mut bytes = [0u8; SIGNATURE_BYTES_LEN];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = seed.wrapping_mul(31).wrapping_add(i as u64) as u8;
    }
    SignatureBytes::from(bytes)
}

/// A single-committee attestation with the given signer bits.
pub fn base_attestation(
    slot: u64,
    index: u64,
    committee_size: usize,
    bits: &[usize],
) -> Attestation<E> {
    let mut aggregation_bits = BitList::with_capacity(committee_size).unwrap();
    for &bit in bits {
        aggregation_bits.set(bit, true).unwrap();
    }
    Attestation::Base(AttestationBase {
        aggregation_bits,
        data: attestation_data(slot, index),
        signature: test_signature(slot ^ (index << 20) ^ (bits_seed(bits) << 28)),
    })
}

/// A committee-bits attestation covering `committees`, whose aggregation bits span the
/// covered committees back-to-back per `sizes`.
pub fn electra_attestation(
    slot: u64,
    committees: &[u64],
    sizes: &CommitteeSizes,
    bits: &[usize],
) -> Attestation<E> {
    electra_attestation_seeded(slot, 0, committees, sizes, bits)
}

/// Like `electra_attestation` but with a distinct beacon block root per `seed`, so tests can
/// mint many groups in one slot.
pub fn electra_attestation_seeded(
    slot: u64,
    seed: u64,
    committees: &[u64],
    sizes: &CommitteeSizes,
    bits: &[usize],
) -> Attestation<E> {
    let mut committee_bits = BitVector::new();
    for &committee in committees {
        committee_bits.set(committee as usize, true).unwrap();
    }
    let total: usize = committees.iter().map(|committee| sizes[committee]).sum();
    let mut aggregation_bits = BitList::with_capacity(total).unwrap();
    for &bit in bits {
        aggregation_bits.set(bit, true).unwrap();
    }
    let mut data = attestation_data(slot, 0);
    data.beacon_block_root = Hash256::from_low_u64_be(0x2000 + slot + (seed << 32));
    Attestation::Electra(AttestationElectra {
        aggregation_bits,
        data,
        committee_bits,
        signature: test_signature(slot ^ (seed << 16) ^ (bits_seed(bits) << 28)),
    })
}

pub fn set_bits(attestation: &Attestation<E>) -> Vec<usize> {
    attestation
        .aggregation_bits()
        .iter()
        .enumerate()
        .filter(|(_, bit)| *bit)
        .map(|(i, _)| i)
        .collect()
}

pub fn committee_sizes(entries: &[(u64, usize)]) -> CommitteeSizes {
    entries.iter().copied().collect()
}

/// A pool on the minimal schedule (no committee-bits milestone).
pub fn base_pool(
    config: PoolConfig,
) -> AggregatingAttestationPool<E, FixedCommitteeResolver, XorSignatureAggregator> {
    AggregatingAttestationPool::new(
        FixedCommitteeResolver(committee_sizes(&[(0, 8), (1, 8)])),
        XorSignatureAggregator,
        ChainSpec::minimal(),
        config,
        logger(),
    )
}

/// A pool whose committee-bits milestone activates at `fork_epoch`.
pub fn electra_pool(
    fork_epoch: u64,
    config: PoolConfig,
    sizes: CommitteeSizes,
) -> AggregatingAttestationPool<E, FixedCommitteeResolver, XorSignatureAggregator> {
    AggregatingAttestationPool::new(
        FixedCommitteeResolver(sizes),
        XorSignatureAggregator,
        ChainSpec {
            electra_fork_epoch: Some(Epoch::new(fork_epoch)),
        },
        config,
        logger(),
    )
}
