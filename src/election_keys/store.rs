//! The collaborators the key policy reads and writes through.
//!
//! All of them are reached via a [`Transaction`], so a single policy
//! decision sees one consistent snapshot and its writes land together.

use crate::error::Result;
use crate::model::common::ElectionState;

/// Key/value election settings.
#[rocket::async_trait]
pub trait SettingsStore {
    async fn get_setting(&mut self, key: &str) -> Result<Option<String>>;

    async fn set_setting(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Read access to cast votes.
#[rocket::async_trait]
pub trait VoteRepository {
    async fn count_votes(&mut self) -> Result<u64>;
}

/// Read access to whether the election is open.
#[rocket::async_trait]
pub trait ElectionStateSource {
    async fn get_election_state(&mut self) -> Result<ElectionState>;
}

/// An open transaction over all the election collaborators.
///
/// Dropping a transaction without committing it must have the same effect
/// as rolling it back.
#[rocket::async_trait]
pub trait Transaction: SettingsStore + VoteRepository + ElectionStateSource + Send {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Something that can start transactions, e.g. a database connection.
#[rocket::async_trait]
pub trait TransactionScope: Sync {
    type Tx: Transaction;

    async fn begin(&self) -> Result<Self::Tx>;
}
