use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::common::ElectionState;

/// Longest template name we accept.
pub const MAX_TEMPLATE_NAME_LENGTH: usize = 64;

/// The single human-readable outcome of an administrative action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything on the election settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSettings {
    pub state: ElectionState,
    pub template: String,
    pub public_election_key: Option<String>,
    pub has_private_election_key: bool,
    pub vote_count: u64,
    /// Whether `POST /admin/election/keys` would currently succeed.
    pub can_regenerate_keys: bool,
}

/// Request to open or close the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: ElectionState,
}

/// Request to switch the site template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateChange {
    pub template_name: String,
}

impl TemplateChange {
    /// Template names end up in filesystem paths, so keep them to a plain slug.
    pub fn is_valid(&self) -> bool {
        let name = &self.template_name;
        !name.is_empty()
            && name.len() <= MAX_TEMPLATE_NAME_LENGTH
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

/// The key voters encrypt their votes under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicElectionKey {
    pub public_election_key: String,
}

/// Decrypted totals per candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub totals: BTreeMap<String, u64>,
}
