use crate::{Epoch, EthSpec, ForkName, Slot};
use serde::{Deserialize, Serialize};

/// The activation schedule for protocol upgrades relevant to attestation handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Epoch at which the committee-bits attestation format activates. `None` means the
    /// upgrade is not scheduled.
    pub electra_fork_epoch: Option<Epoch>,
}

impl ChainSpec {
    /// The mainnet schedule.
    pub fn mainnet() -> Self {
        Self {
            electra_fork_epoch: Some(Epoch::new(364_032)),
        }
    }

    /// The minimal (testing) schedule: no upgrades scheduled.
    pub fn minimal() -> Self {
        Self {
            electra_fork_epoch: None,
        }
    }

    /// The fork in effect at `slot`.
    pub fn fork_name_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    /// The fork in effect at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        match self.electra_fork_epoch {
            Some(fork_epoch) if epoch >= fork_epoch => ForkName::Electra,
            _ => ForkName::Base,
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}
