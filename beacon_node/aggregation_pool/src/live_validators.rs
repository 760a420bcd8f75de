use crate::attestation_group::AttestationGroup;
use crate::committee_resolver::CommitteeSizes;
use crate::StateView;
use std::collections::HashSet;
use types::{Attestation, CommitteeIndex, EthSpec, Slot};

/// Unique liveness signals derived from the pool's pending attestations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveValidatorCounts {
    pub current_epoch: usize,
    pub previous_epoch: usize,
}

/// Count unique `(slot, committee, bit)` liveness signals per tracked epoch.
///
/// Only attestations whose target root matches the state's record for the target epoch's
/// start slot are counted. The same bits seen at different slots, or for different
/// committees, are distinct signals; overlapping bits within one `(slot, committee)` are
/// counted once. Committee-bits attestations are decomposed into per-committee positions
/// via their group's committee sizes; groups whose sizes were never resolved contribute
/// nothing.
pub fn count_live_validators<'a, E, S, I>(state: &S, groups: I) -> LiveValidatorCounts
where
    E: EthSpec,
    S: StateView,
    I: IntoIterator<Item = &'a AttestationGroup<E>>,
{
    let slots_per_epoch = E::slots_per_epoch();
    let current_epoch = state.slot().epoch(slots_per_epoch);
    let previous_epoch = current_epoch - 1;

    let mut current = HashSet::new();
    let mut previous = HashSet::new();

    for group in groups {
        let data = group.data();
        let target_epoch = data.target.epoch;

        let signals = if target_epoch == current_epoch {
            &mut current
        } else if target_epoch == previous_epoch {
            &mut previous
        } else {
            continue;
        };

        let expected_root = state.block_root_at_slot(target_epoch.start_slot(slots_per_epoch));
        if expected_root != Some(data.target.root) {
            continue;
        }

        for attestation in group.iter() {
            record_signals(signals, attestation, group.committees_size(), data.slot);
        }
    }

    LiveValidatorCounts {
        current_epoch: current.len(),
        previous_epoch: previous.len(),
    }
}

fn record_signals<E: EthSpec>(
    signals: &mut HashSet<(Slot, CommitteeIndex, usize)>,
    attestation: &Attestation<E>,
    committees_size: Option<&CommitteeSizes>,
    slot: Slot,
) {
    match attestation {
        Attestation::Base(att) => {
            for (bit, is_set) in att.aggregation_bits.iter().enumerate() {
                if is_set {
                    signals.insert((slot, att.data.index, bit));
                }
            }
        }
        Attestation::Electra(att) => {
            let sizes = match committees_size {
                Some(sizes) => sizes,
                None => return,
            };
            let mut offset = 0;
            for committee in att.get_committee_indices() {
                let size = match sizes.get(&committee) {
                    Some(size) => *size,
                    None => return,
                };
                for position in 0..size {
                    if att.aggregation_bits.get(offset + position).unwrap_or(false) {
                        signals.insert((slot, committee, position));
                    }
                }
                offset += size;
            }
        }
    }
}
