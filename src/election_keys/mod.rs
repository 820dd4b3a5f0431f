//! The election key lifecycle.
//!
//! Election keys may only be replaced while the election is closed and no
//! votes exist. Once either condition fails, the stored pair is frozen
//! until votes are purged and the election is closed again.

mod store;

#[cfg(test)]
mod memory;

pub use store::{ElectionStateSource, SettingsStore, Transaction, TransactionScope, VoteRepository};

#[cfg(test)]
pub use memory::InMemoryElection;

use crate::crypto::KeyGenerator;
use crate::error::Result;
use crate::model::common::{setting_keys, ElectionState};

pub const KEYS_REGENERATED_MESSAGE: &str =
    "New public and private election keys generated successfully.";

pub const REGENERATION_DENIED_REASON: &str = "Cannot generate public and private election keys \
     since elections are open or votes have already been cast.";

/// Outcome of a key regeneration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRegeneration {
    KeysRegenerated,
    RegenerationDenied(&'static str),
}

impl KeyRegeneration {
    /// The human-readable status to show the admin.
    pub fn message(&self) -> &'static str {
        match self {
            Self::KeysRegenerated => KEYS_REGENERATED_MESSAGE,
            Self::RegenerationDenied(reason) => reason,
        }
    }
}

/// Gates election key (re)generation behind the vote-integrity invariant.
pub struct ElectionKeyPolicy<'a, S, G: ?Sized> {
    scope: &'a S,
    generator: &'a G,
}

impl<'a, S, G> ElectionKeyPolicy<'a, S, G>
where
    S: TransactionScope,
    G: KeyGenerator + ?Sized,
{
    pub fn new(scope: &'a S, generator: &'a G) -> Self {
        Self { scope, generator }
    }

    /// Replace both election keys with a fresh pair, if the election allows it.
    ///
    /// The check and both writes happen in one transaction: either both keys
    /// change or neither does. Collaborator failures are returned as errors
    /// with the transaction rolled back.
    pub async fn attempt_regenerate_keys(&self) -> Result<KeyRegeneration> {
        let mut tx = self.scope.begin().await?;

        if !keys_mutable(&mut tx).await? {
            tx.rollback().await?;
            info!("Refused to regenerate election keys: election open or votes cast");
            return Ok(KeyRegeneration::RegenerationDenied(
                REGENERATION_DENIED_REASON,
            ));
        }

        let old_public = tx.get_setting(setting_keys::PUBLIC_ELECTION_KEY).await?;
        let old_private = tx.get_setting(setting_keys::PRIVATE_ELECTION_KEY).await?;
        let key_pair = loop {
            let pair = self.generator.generate_key_pair().await?;
            if old_public.as_ref() != Some(&pair.public_key)
                && old_private.as_ref() != Some(&pair.private_key)
            {
                break pair;
            }
            warn!("Key generator repeated the stored election keys, retrying");
        };

        tx.set_setting(setting_keys::PUBLIC_ELECTION_KEY, &key_pair.public_key)
            .await?;
        tx.set_setting(setting_keys::PRIVATE_ELECTION_KEY, &key_pair.private_key)
            .await?;
        tx.commit().await?;

        info!("Generated new election keys");
        Ok(KeyRegeneration::KeysRegenerated)
    }
}

/// Keys may change only while the election is closed and nobody has voted.
pub fn keys_may_change(state: ElectionState, vote_count: u64) -> bool {
    state == ElectionState::Closed && vote_count == 0
}

async fn keys_mutable<T: Transaction>(tx: &mut T) -> Result<bool> {
    let state = tx.get_election_state().await?;
    if state == ElectionState::Open {
        return Ok(false);
    }
    Ok(keys_may_change(state, tx.count_votes().await?))
}
