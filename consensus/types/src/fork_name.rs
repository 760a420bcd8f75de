use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Protocol upgrades this workspace dispatches on.
///
/// Only the milestones that change the attestation container are represented: `Electra`
/// introduced the committee-bits attestation format and the smaller per-block attestation cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub enum ForkName {
    Base,
    Electra,
}

impl ForkName {
    pub fn list_all() -> Vec<ForkName> {
        vec![ForkName::Base, ForkName::Electra]
    }

    /// True when the committee-bits attestation format is in use.
    pub fn electra_enabled(self) -> bool {
        self >= ForkName::Electra
    }
}

impl FromStr for ForkName {
    type Err = String;

    fn from_str(fork_name: &str) -> Result<Self, String> {
        Ok(match fork_name.to_lowercase().as_str() {
            "phase0" | "base" => ForkName::Base,
            "electra" => ForkName::Electra,
            _ => return Err(format!("unknown fork name: {}", fork_name)),
        })
    }
}

impl Display for ForkName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ForkName::Base => "phase0".fmt(f),
            ForkName::Electra => "electra".fmt(f),
        }
    }
}

impl From<ForkName> for String {
    fn from(fork: ForkName) -> String {
        fork.to_string()
    }
}

impl TryFrom<String> for ForkName {
    type Error = String;

    fn try_from(fork_name: String) -> Result<Self, String> {
        Self::from_str(&fork_name)
    }
}
