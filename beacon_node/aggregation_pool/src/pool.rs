use crate::attestation_group::{AttestationGroup, GroupInsertOutcome};
use crate::committee_resolver::{covered_bits_len, CommitteeResolver, CommitteeSizes};
use crate::live_validators::{count_live_validators, LiveValidatorCounts};
use crate::{
    metrics, AttestationValidator, Error, ForkChecker, PoolConfig, SignatureAggregator,
    StateView,
};
use parking_lot::RwLock;
use slog::{debug, Logger};
use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tree_hash::TreeHash;
use types::{Attestation, ChainSpec, CommitteeIndex, EthSpec, Hash256, Slot};

type AttestationDataRoot = Hash256;

/// Returned upon successfully handling an attestation offered to the pool.
#[derive(Debug, PartialEq)]
pub enum InsertOutcome {
    /// The `attestation.data` had not been seen before; a group was created for it.
    NewAttestationData,
    /// The attestation was added to an existing group.
    AttestationStored,
    /// An identical attestation was already known. No changes were made.
    AttestationAlreadyKnown,
    /// Every signer of the attestation is already included on chain. No changes were made.
    AttestationSubsumed,
}

struct PoolInner<E: EthSpec> {
    groups: HashMap<AttestationDataRoot, AttestationGroup<E>>,
    /// Group roots per slot. `BTreeSet` keeps within-slot iteration deterministic.
    slot_index: BTreeMap<Slot, BTreeSet<AttestationDataRoot>>,
    size: usize,
    current_slot: Slot,
    lowest_permissible_slot: Slot,
}

impl<E: EthSpec> Default for PoolInner<E> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
            slot_index: BTreeMap::new(),
            size: 0,
            current_slot: Slot::new(0),
            lowest_permissible_slot: Slot::new(0),
        }
    }
}

/// A pool of validated attestations, grouped by attestation data, that serves aggregates to
/// block production.
///
/// All operations take `&self` and are serialized through one pool-wide lock; gossip threads
/// call [`Self::insert_attestation`] concurrently and the block producer calls
/// [`Self::get_attestations_for_block`] against a consistent snapshot.
pub struct AggregatingAttestationPool<E, R, A>
where
    E: EthSpec,
    R: CommitteeResolver,
    A: SignatureAggregator,
{
    inner: RwLock<PoolInner<E>>,
    resolver: R,
    aggregator: A,
    spec: ChainSpec,
    config: PoolConfig,
    log: Logger,
}

impl<E, R, A> AggregatingAttestationPool<E, R, A>
where
    E: EthSpec,
    R: CommitteeResolver,
    A: SignatureAggregator,
{
    pub fn new(resolver: R, aggregator: A, spec: ChainSpec, config: PoolConfig, log: Logger) -> Self {
        Self {
            inner: RwLock::new(PoolInner::default()),
            resolver,
            aggregator,
            spec,
            config,
            log,
        }
    }

    /// Insert a validated attestation, merging it into the group for its data.
    ///
    /// Errors describe inputs the pool dropped; they are expected in normal operation and
    /// safe to ignore after logging.
    pub fn insert_attestation(&self, attestation: Attestation<E>) -> Result<InsertOutcome, Error> {
        let _timer = metrics::start_timer(&metrics::AGG_POOL_INSERT_SECONDS);
        let slot = attestation.data().slot;

        if attestation.aggregation_bits().is_zero() {
            return Err(Error::NoAggregationBitsSet);
        }

        let requires_committee_bits = self.spec.fork_name_at_slot::<E>(slot).electra_enabled();
        if requires_committee_bits != attestation.is_electra() {
            return Err(Error::AttestationVariantMismatch { slot });
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if slot < inner.lowest_permissible_slot {
            return Err(Error::SlotTooLow {
                slot,
                lowest_permissible_slot: inner.lowest_permissible_slot,
            });
        }

        let committees_size = if let Attestation::Electra(att) = &attestation {
            let sizes = self
                .resolve_committees(inner.current_slot, slot)
                .ok_or(Error::CommitteesUnresolvable { slot })?;
            let expected_len = covered_bits_len::<E>(&sizes, &att.committee_bits)
                .ok_or(Error::CommitteesUnresolvable { slot })?;
            if expected_len != att.aggregation_bits.len() {
                return Err(Error::InconsistentBitfieldLengths);
            }
            Some(sizes)
        } else {
            None
        };

        let data_root = attestation.data().tree_hash_root();

        let (created, group_outcome) = match inner.groups.entry(data_root) {
            Entry::Occupied(entry) => {
                let group = entry.into_mut();
                if group.committees_size().is_none() {
                    if let Some(sizes) = committees_size {
                        group.set_committees_size(sizes);
                    }
                }
                (false, group.insert(attestation)?)
            }
            Entry::Vacant(entry) => {
                let _timer = metrics::start_timer(&metrics::AGG_POOL_CREATE_GROUP_SECONDS);
                let mut group = AttestationGroup::new(
                    attestation.data().clone(),
                    committees_size,
                    attestation.aggregation_bits().len(),
                )?;
                let outcome = group.insert(attestation)?;
                entry.insert(group);
                inner.slot_index.entry(slot).or_default().insert(data_root);
                (true, outcome)
            }
        };

        let outcome = match group_outcome {
            GroupInsertOutcome::Stored if created => InsertOutcome::NewAttestationData,
            GroupInsertOutcome::Stored => InsertOutcome::AttestationStored,
            GroupInsertOutcome::AlreadyKnown => InsertOutcome::AttestationAlreadyKnown,
            GroupInsertOutcome::Subsumed => InsertOutcome::AttestationSubsumed,
        };

        if matches!(group_outcome, GroupInsertOutcome::Stored) {
            inner.size += 1;
            if inner.size > self.config.max_size {
                self.enforce_capacity(inner);
            }
        }

        metrics::set_gauge(&metrics::AGG_POOL_SIZE, inner.size as i64);
        Ok(outcome)
    }

    /// Called at each slot tick; drops groups that have fallen out of the retention window
    /// and bars future attestations below the new horizon.
    pub fn prune(&self, current_slot: Slot) {
        let _timer = metrics::start_timer(&metrics::AGG_POOL_PRUNE_SECONDS);
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        // Ignore out-of-order ticks so the horizon never moves backwards.
        let current_slot = std::cmp::max(inner.current_slot, current_slot);
        // Taking advantage of saturating subtraction on `Slot`.
        let lowest_permissible_slot = current_slot - self.config.retention_slots;

        inner.current_slot = current_slot;
        inner.lowest_permissible_slot = lowest_permissible_slot;

        let expired: Vec<Slot> = inner
            .slot_index
            .range(..lowest_permissible_slot)
            .map(|(slot, _)| *slot)
            .collect();
        for slot in expired {
            Self::remove_slot(inner, slot);
        }

        metrics::set_gauge(&metrics::AGG_POOL_SIZE, inner.size as i64);
    }

    /// Record attestations included in a block at `block_slot`.
    ///
    /// Groups subtract the included bits and drop fully-covered members. Data the pool has
    /// never seen gets an empty group so late-arriving copies are recognized as redundant.
    pub fn on_attestations_included<'a, I>(&self, block_slot: Slot, attestations: I)
    where
        I: IntoIterator<Item = &'a Attestation<E>>,
    {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        for attestation in attestations {
            let slot = attestation.data().slot;
            if slot < inner.lowest_permissible_slot {
                continue;
            }

            let data_root = attestation.data().tree_hash_root();
            let group = match inner.groups.entry(data_root) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let committees_size = if attestation.is_electra() {
                        self.resolve_committees(inner.current_slot, slot)
                    } else {
                        None
                    };
                    let group = match AttestationGroup::new(
                        attestation.data().clone(),
                        committees_size,
                        attestation.aggregation_bits().len(),
                    ) {
                        Ok(group) => group,
                        Err(error) => {
                            debug!(
                                self.log,
                                "Ignoring attestation included in block";
                                "error" => ?error,
                                "slot" => slot.as_u64()
                            );
                            continue;
                        }
                    };
                    inner.slot_index.entry(slot).or_default().insert(data_root);
                    entry.insert(group)
                }
            };

            match group.on_attestation_included(block_slot, attestation) {
                Ok(removed) => inner.size = inner.size.saturating_sub(removed),
                Err(error) => debug!(
                    self.log,
                    "Ignoring attestation included in block";
                    "error" => ?error,
                    "slot" => slot.as_u64()
                ),
            }
        }

        metrics::set_gauge(&metrics::AGG_POOL_SIZE, inner.size as i64);
    }

    /// Inform every group of a reorg back to `common_ancestor_slot`: inclusions recorded on
    /// the abandoned chain are forgotten and those bits become aggregable again.
    pub fn on_reorg(&self, common_ancestor_slot: Slot) {
        let mut inner = self.inner.write();
        for group in inner.groups.values_mut() {
            group.on_reorg(common_ancestor_slot);
        }
    }

    /// Returns the total number of attestations stored in `self`.
    pub fn num_attestations(&self) -> usize {
        self.inner.read().size
    }

    /// Assemble the best aggregates for a block built on `state`.
    ///
    /// Groups are walked newest slot first, strictly below the block's slot; each group is
    /// screened by `validator` and `fork_checker` before it streams aggregates. Within a
    /// slot, aggregates are ordered by descending participation (ties resolve stably);
    /// previous-epoch aggregates are limited by the state's capacity; at most the
    /// milestone's per-block cap is returned.
    ///
    /// An `Err` indicates an internal invariant violation, never a normal "no attestations"
    /// condition.
    pub fn get_attestations_for_block<S, V, F>(
        &self,
        state: &S,
        validator: &V,
        fork_checker: &F,
    ) -> Result<Vec<Attestation<E>>, Error>
    where
        S: StateView,
        V: AttestationValidator<S>,
        F: ForkChecker,
    {
        let _timer = metrics::start_timer(&metrics::AGG_POOL_BLOCK_PRODUCTION_SECONDS);
        let block_slot = state.slot();
        let requires_committee_bits =
            self.spec.fork_name_at_slot::<E>(block_slot).electra_enabled();
        let max_attestations = if requires_committee_bits {
            E::max_attestations_electra()
        } else {
            E::max_attestations()
        };
        let current_epoch = block_slot.epoch(E::slots_per_epoch());
        let mut previous_epoch_remaining = state.previous_epoch_attestation_capacity();

        let inner = self.inner.read();
        let mut selected = Vec::new();

        for (bucket_slot, roots) in inner.slot_index.range(..block_slot).rev() {
            if selected.len() >= max_attestations {
                break;
            }

            let mut bucket = Vec::new();
            for root in roots {
                let group = inner
                    .groups
                    .get(root)
                    .ok_or(Error::GroupIndexInconsistent(*root))?;

                if let Err(reason) = validator.validate_for_block_inclusion(state, group.data()) {
                    debug!(
                        self.log,
                        "Attestation data ineligible for block";
                        "reason" => ?reason,
                        "slot" => bucket_slot.as_u64()
                    );
                    continue;
                }
                if !fork_checker.in_block_fork(group.data()) {
                    continue;
                }

                for aggregate in group.aggregates(&self.aggregator, None) {
                    let aggregate = aggregate?;
                    if aggregate.is_electra() != requires_committee_bits {
                        continue;
                    }
                    bucket.push(aggregate);
                }
            }

            bucket.sort_by_key(|aggregate| Reverse(aggregate.num_set_aggregation_bits()));

            let bucket_epoch = bucket_slot.epoch(E::slots_per_epoch());
            for aggregate in bucket {
                if selected.len() >= max_attestations {
                    break;
                }
                if bucket_epoch < current_epoch {
                    if previous_epoch_remaining == 0 {
                        continue;
                    }
                    previous_epoch_remaining -= 1;
                }
                selected.push(aggregate);
            }
        }

        Ok(selected)
    }

    /// List stored aggregates for operators, newest slot first, optionally filtered by slot
    /// and committee index.
    pub fn get_attestations(
        &self,
        slot: Option<Slot>,
        committee_index: Option<CommitteeIndex>,
    ) -> Vec<Attestation<E>> {
        let inner = self.inner.read();
        let mut attestations = Vec::new();

        for (bucket_slot, roots) in inner.slot_index.iter().rev() {
            if let Some(want) = slot {
                if want != *bucket_slot {
                    continue;
                }
            }
            for root in roots {
                let group = match inner.groups.get(root) {
                    Some(group) => group,
                    None => continue,
                };
                for aggregate in group.aggregates(&self.aggregator, committee_index) {
                    match aggregate {
                        Ok(aggregate) => attestations.push(aggregate),
                        Err(error) => debug!(
                            self.log,
                            "Skipping malformed aggregate";
                            "error" => ?error
                        ),
                    }
                }
            }
        }

        attestations
    }

    /// Update the live-validator gauges from the pool's pending attestations.
    pub fn scrape_for_metrics<S: StateView>(&self, state: &S) -> LiveValidatorCounts {
        let inner = self.inner.read();
        let counts = count_live_validators::<E, _, _>(state, inner.groups.values());
        metrics::set_gauge(
            &metrics::AGG_POOL_CURRENT_LIVE_VALIDATORS,
            counts.current_epoch as i64,
        );
        metrics::set_gauge(
            &metrics::AGG_POOL_PREVIOUS_LIVE_VALIDATORS,
            counts.previous_epoch as i64,
        );
        counts
    }

    /// Resolve committee sizes for an attestation at `slot`, choosing the lookup strategy by
    /// how far behind the pool's view it is. Anything older than two epochs behind is
    /// unresolvable.
    fn resolve_committees(&self, current_slot: Slot, slot: Slot) -> Option<CommitteeSizes> {
        let slots_per_epoch = E::slots_per_epoch();
        let current_epoch = current_slot.epoch(slots_per_epoch);
        let attestation_epoch = slot.epoch(slots_per_epoch);

        if attestation_epoch + 1 >= current_epoch {
            self.resolver.committees_size(slot)
        } else if attestation_epoch + 2 == current_epoch {
            self.resolver.committees_size_at(slot)
        } else {
            None
        }
    }

    /// Evict whole slots, oldest first, until the pool is back under its size cap. The
    /// newest slot is never evicted: the pool prefers running over the cap to discarding
    /// its freshest attestations.
    fn enforce_capacity(&self, inner: &mut PoolInner<E>) {
        while inner.size > self.config.max_size && inner.slot_index.len() > 1 {
            let oldest_slot = match inner.slot_index.keys().next().copied() {
                Some(slot) => slot,
                None => break,
            };
            let evicted = Self::remove_slot(inner, oldest_slot);
            metrics::inc_counter_by(
                &metrics::AGG_POOL_EVICTED_ATTESTATIONS_TOTAL,
                evicted as u64,
            );
            debug!(
                self.log,
                "Evicted attestations under capacity pressure";
                "slot" => oldest_slot.as_u64(),
                "evicted" => evicted
            );
        }
    }

    /// Remove a whole slot bucket, returning how many attestations went with it.
    fn remove_slot(inner: &mut PoolInner<E>, slot: Slot) -> usize {
        let mut removed = 0;
        if let Some(roots) = inner.slot_index.remove(&slot) {
            for root in roots {
                if let Some(group) = inner.groups.remove(&root) {
                    removed += group.len();
                }
            }
        }
        inner.size = inner.size.saturating_sub(removed);
        removed
    }
}
