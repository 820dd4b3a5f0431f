use serde::{Deserialize, Serialize};

use crate::model::db::Vote;

/// A cast vote as exported for offline tallying. Voter identities are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedVote {
    pub candidate: String,
    pub vote_cipher: String,
}

impl From<Vote> for EncryptedVote {
    fn from(vote: Vote) -> Self {
        Self {
            candidate: vote.vote.candidate,
            vote_cipher: vote.vote.vote_cipher,
        }
    }
}
