use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether voters are currently allowed to cast votes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionState {
    /// Voting is allowed; election keys are frozen.
    Open,
    /// Voting is not allowed.
    Closed,
}

impl ElectionState {
    /// Interpret the raw `election_state` setting.
    /// An election that has never been opened is closed.
    pub fn from_setting(value: Option<&str>) -> Result<Self, UnknownElectionState> {
        value.map_or(Ok(Self::Closed), str::parse)
    }

    /// The value stored in the `election_state` setting.
    pub fn as_setting(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_setting())
    }
}

impl FromStr for ElectionState {
    type Err = UnknownElectionState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(UnknownElectionState(other.to_string())),
        }
    }
}

/// A stored election state that is neither `open` nor `closed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown election state {0:?}")]
pub struct UnknownElectionState(pub String);

/// Keys of the election settings store.
pub mod setting_keys {
    pub const ELECTION_STATE: &str = "election_state";
    pub const TEMPLATE: &str = "template";
    pub const PUBLIC_ELECTION_KEY: &str = "public_election_key";
    pub const PRIVATE_ELECTION_KEY: &str = "private_election_key";
}

/// Template used when none has been chosen.
pub const DEFAULT_TEMPLATE: &str = "default";
