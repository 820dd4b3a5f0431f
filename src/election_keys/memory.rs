//! An in-process election used to exercise the key policy without a database.

use std::collections::HashMap;
use std::sync::Arc;

use rocket::{
    http::Status,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

use crate::error::{Error, Result};
use crate::model::common::{setting_keys, ElectionState};

use super::store::{
    ElectionStateSource, SettingsStore, Transaction, TransactionScope, VoteRepository,
};

#[derive(Debug, Default)]
struct ElectionData {
    settings: HashMap<String, String>,
    votes: u64,
    fail_next_commit: bool,
}

/// Settings and a vote counter behind one lock. Transactions hold the lock
/// for their whole lifetime, so they are fully serialised.
#[derive(Debug, Clone, Default)]
pub struct InMemoryElection(Arc<Mutex<ElectionData>>);

impl InMemoryElection {
    pub fn with_settings<'a>(settings: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let data = ElectionData {
            settings: settings
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };
        Self(Arc::new(Mutex::new(data)))
    }

    /// Committed value of a setting.
    pub async fn setting(&self, key: &str) -> Option<String> {
        self.0.lock().await.settings.get(key).cloned()
    }

    /// Write a setting outside of any transaction.
    pub async fn put_setting(&self, key: &str, value: &str) {
        self.0
            .lock()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
    }

    pub async fn vote_count(&self) -> u64 {
        self.0.lock().await.votes
    }

    pub async fn cast_votes(&self, count: u64) {
        self.0.lock().await.votes += count;
    }

    pub async fn purge_votes(&self) {
        self.0.lock().await.votes = 0;
    }

    /// Make the next commit fail, discarding its writes.
    pub async fn fail_next_commit(&self) {
        self.0.lock().await.fail_next_commit = true;
    }
}

/// Writes are buffered and only applied on commit.
pub struct InMemoryTransaction {
    data: OwnedMutexGuard<ElectionData>,
    pending: HashMap<String, String>,
}

#[rocket::async_trait]
impl SettingsStore for InMemoryTransaction {
    async fn get_setting(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self
            .pending
            .get(key)
            .or_else(|| self.data.settings.get(key))
            .cloned())
    }

    async fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        self.pending.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[rocket::async_trait]
impl VoteRepository for InMemoryTransaction {
    async fn count_votes(&mut self) -> Result<u64> {
        Ok(self.data.votes)
    }
}

#[rocket::async_trait]
impl ElectionStateSource for InMemoryTransaction {
    async fn get_election_state(&mut self) -> Result<ElectionState> {
        let value = self.get_setting(setting_keys::ELECTION_STATE).await?;
        Ok(ElectionState::from_setting(value.as_deref())?)
    }
}

#[rocket::async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        if self.data.fail_next_commit {
            self.data.fail_next_commit = false;
            return Err(Error::Status(
                Status::InternalServerError,
                "Simulated commit failure".to_string(),
            ));
        }
        let pending = std::mem::take(&mut self.pending);
        self.data.settings.extend(pending);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[rocket::async_trait]
impl TransactionScope for InMemoryElection {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryTransaction {
            data: self.0.clone().lock_owned().await,
            pending: HashMap::new(),
        })
    }
}
