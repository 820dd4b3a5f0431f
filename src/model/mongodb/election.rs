use mongodb::{
    bson::doc,
    options::{
        Acknowledgment, FindOneAndUpdateOptions, ReadConcern, ReturnDocument, TransactionOptions,
        UpdateOptions, WriteConcern,
    },
    Client, ClientSession, Database,
};
use rocket::{
    futures::TryStreamExt,
    request::{self, FromRequest, Request},
    State,
};

use crate::election_keys::{
    ElectionStateSource, SettingsStore, Transaction, TransactionScope, VoteRepository,
};
use crate::error::Result;
use crate::model::{
    common::{setting_keys, ElectionState},
    db::{Setting, Vote},
};

use super::Coll;

/// The election's settings and votes as stored in MongoDB.
///
/// Transactions are multi-document MongoDB transactions with snapshot reads
/// and majority writes, so they need a replica set.
pub struct MongoElection {
    client: Client,
    settings: Coll<Setting>,
    votes: Coll<Vote>,
}

impl MongoElection {
    pub fn new(client: &Client, db: &Database) -> Self {
        Self {
            client: client.clone(),
            settings: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    /// Read a setting outside of any transaction.
    pub async fn setting(&self, key: &str) -> Result<Option<String>> {
        let setting = self.settings.find_one(doc! { "_id": key }, None).await?;
        Ok(setting.and_then(|s| s.value))
    }

    /// Write a single setting outside of any transaction.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let upsert = UpdateOptions::builder().upsert(true).build();
        self.settings
            .update_one(doc! { "_id": key }, doc! { "$set": { "value": value } }, upsert)
            .await?;
        Ok(())
    }

    pub async fn election_state(&self) -> Result<ElectionState> {
        let value = self.setting(setting_keys::ELECTION_STATE).await?;
        Ok(ElectionState::from_setting(value.as_deref())?)
    }

    pub async fn count_votes(&self) -> Result<u64> {
        Ok(self.votes.count_documents(None, None).await?)
    }

    /// Every cast vote.
    pub async fn all_votes(&self) -> Result<Vec<Vote>> {
        Ok(self.votes.find(None, None).await?.try_collect().await?)
    }

    /// Delete every vote, provided the election is closed.
    /// Returns the number of votes deleted, or `None` if the election is open.
    pub async fn purge_votes(&self) -> Result<Option<u64>> {
        let mut tx = self.begin().await?;
        if tx.get_election_state().await? == ElectionState::Open {
            tx.rollback().await?;
            return Ok(None);
        }

        let deleted = tx
            .votes
            .delete_many_with_session(doc! {}, None, &mut tx.session)
            .await?
            .deleted_count;
        tx.commit().await?;
        info!("Purged {deleted} votes");
        Ok(Some(deleted))
    }
}

#[rocket::async_trait]
impl TransactionScope for MongoElection {
    type Tx = MongoTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let mut session = self.client.start_session(None).await?;
        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build();
        session.start_transaction(options).await?;
        Ok(MongoTransaction {
            session,
            settings: self.settings.clone(),
            votes: self.votes.clone(),
        })
    }
}

/// Get the database handles from the managed state.
///
/// Panics iff the [`Client`] or [`Database`] is not managed by [`rocket::Rocket`].
#[rocket::async_trait]
impl<'r> FromRequest<'r> for MongoElection {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(MongoElection::new(client, db))
    }
}

/// An in-progress MongoDB transaction. Dropping it aborts the transaction.
pub struct MongoTransaction {
    session: ClientSession,
    settings: Coll<Setting>,
    votes: Coll<Vote>,
}

#[rocket::async_trait]
impl SettingsStore for MongoTransaction {
    async fn get_setting(&mut self, key: &str) -> Result<Option<String>> {
        let setting = self
            .settings
            .find_one_with_session(doc! { "_id": key }, None, &mut self.session)
            .await?;
        Ok(setting.and_then(|s| s.value))
    }

    async fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        let upsert = UpdateOptions::builder().upsert(true).build();
        self.settings
            .update_one_with_session(
                doc! { "_id": key },
                doc! { "$set": { "value": value } },
                upsert,
                &mut self.session,
            )
            .await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl VoteRepository for MongoTransaction {
    async fn count_votes(&mut self) -> Result<u64> {
        Ok(self
            .votes
            .count_documents_with_session(None, None, &mut self.session)
            .await?)
    }
}

#[rocket::async_trait]
impl ElectionStateSource for MongoTransaction {
    /// Reading the state also writes to it, so that anyone changing the state
    /// before we commit conflicts with this transaction. Votes are only cast
    /// while the election is open, so this also keeps the vote count stable.
    async fn get_election_state(&mut self) -> Result<ElectionState> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let setting = self
            .settings
            .find_one_and_update_with_session(
                doc! { "_id": setting_keys::ELECTION_STATE },
                doc! { "$inc": { "revision": 1_i64 } },
                options,
                &mut self.session,
            )
            .await?;
        let value = setting.and_then(|s| s.value);
        Ok(ElectionState::from_setting(value.as_deref())?)
    }
}

#[rocket::async_trait]
impl Transaction for MongoTransaction {
    async fn commit(mut self) -> Result<()> {
        self.session.commit_transaction().await?;
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.session.abort_transaction().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mongodb::{error::TRANSIENT_TRANSACTION_ERROR, Client as MongoClient};
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::error::Error;

    use super::*;

    fn election(client: &Client, db: &Database) -> MongoElection {
        let mongo = client.rocket().state::<MongoClient>().unwrap();
        MongoElection::new(mongo, db)
    }

    #[backend_test]
    async fn overlapping_state_reads_conflict(client: Client, db: Database) {
        let election = election(&client, &db);
        election
            .set_setting(setting_keys::ELECTION_STATE, "closed")
            .await
            .unwrap();

        let mut first = election.begin().await.unwrap();
        assert_eq!(
            first.get_election_state().await.unwrap(),
            ElectionState::Closed
        );

        // A second regeneration cannot get past the state check while the
        // first one is still deciding.
        let mut second = election.begin().await.unwrap();
        let err = second.get_election_state().await.unwrap_err();
        match err {
            Error::Db(ref e) => assert!(e.contains_label(TRANSIENT_TRANSACTION_ERROR)),
            ref other => panic!("expected a write conflict, got {other}"),
        }
        assert_eq!(err.status(), Status::Conflict);
        drop(second);

        first.commit().await.unwrap();
    }

    #[backend_test]
    async fn state_change_waits_for_open_transaction(client: Client, db: Database) {
        let election = election(&client, &db);
        election
            .set_setting(setting_keys::ELECTION_STATE, "closed")
            .await
            .unwrap();

        let mut tx = election.begin().await.unwrap();
        assert_eq!(tx.get_election_state().await.unwrap(), ElectionState::Closed);
        tx.set_setting(setting_keys::PUBLIC_ELECTION_KEY, "A")
            .await
            .unwrap();

        let admin = MongoElection::new(&election.client, &db);
        let opening = rocket::tokio::spawn(async move {
            admin
                .set_setting(setting_keys::ELECTION_STATE, "open")
                .await
        });

        tx.commit().await.unwrap();
        opening.await.unwrap().unwrap();

        // The key written under a closed election landed, and the election
        // opened only afterwards.
        assert_eq!(election.election_state().await.unwrap(), ElectionState::Open);
        assert_eq!(
            election
                .setting(setting_keys::PUBLIC_ELECTION_KEY)
                .await
                .unwrap(),
            Some("A".to_string())
        );
    }

    #[backend_test]
    async fn purge_refused_while_open(client: Client, db: Database) {
        let election = election(&client, &db);
        election
            .set_setting(setting_keys::ELECTION_STATE, "open")
            .await
            .unwrap();
        assert_eq!(election.purge_votes().await.unwrap(), None);

        election
            .set_setting(setting_keys::ELECTION_STATE, "closed")
            .await
            .unwrap();
        assert_eq!(election.purge_votes().await.unwrap(), Some(0));
    }
}
