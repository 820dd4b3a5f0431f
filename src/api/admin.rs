use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    crypto::{PaillierKeyGenerator, PaillierPrivateKey},
    election_keys::{keys_may_change, ElectionKeyPolicy, KeyRegeneration},
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            election::{
                ElectionResults, ElectionSettings, StateChange, StatusMessage, TemplateChange,
            },
            vote::EncryptedVote,
        },
        common::{setting_keys, ElectionState, DEFAULT_TEMPLATE},
        db::Admin,
        mongodb::MongoElection,
    },
    tally::tally_votes,
};

pub const INVALID_STATE_MESSAGE: &str =
    "You attempted to change the election state with invalid data.";
pub const STATE_CHANGED_MESSAGE: &str = "Election state changed successfully.";
pub const INVALID_TEMPLATE_MESSAGE: &str =
    "Template field must not be empty nor have invalid data.";
pub const TEMPLATE_CHANGED_MESSAGE: &str = "Current template changed successfully.";
pub const PURGE_DENIED_MESSAGE: &str = "Cannot delete votes while the election is open.";

pub fn routes() -> Vec<Route> {
    routes![
        election_settings,
        regenerate_keys,
        change_state,
        change_template,
        purge_votes,
        dump_votes,
        tally,
    ]
}

/// A status message with the status code it should be sent with.
type Reply = (Status, Json<StatusMessage>);

fn reply(status: Status, message: impl Into<String>) -> Reply {
    (status, Json(StatusMessage::new(message)))
}

/// Read-only: nothing here takes part in the key policy's transactions.
#[get("/admin/election")]
async fn election_settings(
    _token: AuthToken<Admin>,
    election: MongoElection,
) -> Result<Json<ElectionSettings>> {
    let state = election.election_state().await?;
    let vote_count = election.count_votes().await?;
    let settings = ElectionSettings {
        state,
        template: election
            .setting(setting_keys::TEMPLATE)
            .await?
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
        public_election_key: election.setting(setting_keys::PUBLIC_ELECTION_KEY).await?,
        has_private_election_key: election
            .setting(setting_keys::PRIVATE_ELECTION_KEY)
            .await?
            .is_some(),
        vote_count,
        can_regenerate_keys: keys_may_change(state, vote_count),
    };
    Ok(Json(settings))
}

/// Any request body is ignored; there is nothing to configure.
#[post("/admin/election/keys")]
async fn regenerate_keys(
    _token: AuthToken<Admin>,
    election: MongoElection,
    generator: &State<PaillierKeyGenerator>,
) -> Result<Reply> {
    let policy = ElectionKeyPolicy::new(&election, generator.inner());
    let outcome = policy.attempt_regenerate_keys().await?;
    let status = match outcome {
        KeyRegeneration::KeysRegenerated => Status::Ok,
        KeyRegeneration::RegenerationDenied(_) => Status::Conflict,
    };
    Ok(reply(status, outcome.message()))
}

#[post("/admin/election/state", data = "<change>")]
async fn change_state(
    _token: AuthToken<Admin>,
    change: Option<Json<StateChange>>,
    election: MongoElection,
) -> Result<Reply> {
    let Some(change) = change else {
        return Ok(reply(Status::BadRequest, INVALID_STATE_MESSAGE));
    };

    election
        .set_setting(setting_keys::ELECTION_STATE, change.state.as_setting())
        .await?;
    info!("Election state set to {}", change.state);
    Ok(reply(Status::Ok, STATE_CHANGED_MESSAGE))
}

#[post("/admin/election/template", data = "<change>")]
async fn change_template(
    _token: AuthToken<Admin>,
    change: Option<Json<TemplateChange>>,
    election: MongoElection,
) -> Result<Reply> {
    let change = match change {
        Some(change) if change.is_valid() => change,
        _ => return Ok(reply(Status::BadRequest, INVALID_TEMPLATE_MESSAGE)),
    };

    election
        .set_setting(setting_keys::TEMPLATE, &change.template_name)
        .await?;
    info!("Template set to '{}'", change.template_name);
    Ok(reply(Status::Ok, TEMPLATE_CHANGED_MESSAGE))
}

#[delete("/admin/election/votes")]
async fn purge_votes(_token: AuthToken<Admin>, election: MongoElection) -> Result<Reply> {
    match election.purge_votes().await? {
        Some(deleted) => Ok(reply(
            Status::Ok,
            format!(
                "Deleted {deleted} vote{}.",
                if deleted != 1 { "s" } else { "" }
            ),
        )),
        None => Ok(reply(Status::Conflict, PURGE_DENIED_MESSAGE)),
    }
}

/// All cast votes, still encrypted, for offline tallying.
#[get("/admin/election/votes")]
async fn dump_votes(
    _token: AuthToken<Admin>,
    election: MongoElection,
) -> Result<Json<Vec<EncryptedVote>>> {
    let votes = election.all_votes().await?;
    Ok(Json(votes.into_iter().map(EncryptedVote::from).collect()))
}

/// Decrypted totals. Only available once the election has closed.
#[get("/admin/election/tally")]
async fn tally(_token: AuthToken<Admin>, election: MongoElection) -> Result<Json<ElectionResults>> {
    if election.election_state().await? == ElectionState::Open {
        return Err(Error::Status(
            Status::Conflict,
            "Cannot tally votes while the election is open.".to_string(),
        ));
    }

    let private_key: PaillierPrivateKey = election
        .setting(setting_keys::PRIVATE_ELECTION_KEY)
        .await?
        .ok_or_else(|| Error::not_found("private election key"))?
        .parse()?;
    let votes: Vec<EncryptedVote> = election
        .all_votes()
        .await?
        .into_iter()
        .map(EncryptedVote::from)
        .collect();

    let totals = tally_votes(&private_key, &votes)?;
    Ok(Json(ElectionResults { totals }))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use mongodb::{bson::doc, options::UpdateOptions};
    use num_bigint::BigUint;
    use rand::{rngs::StdRng, SeedableRng};
    use rocket::{
        futures::TryStreamExt,
        http::{uri::Origin, ContentType},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::crypto::PaillierPublicKey;
    use crate::election_keys::{KEYS_REGENERATED_MESSAGE, REGENERATION_DENIED_REASON};
    use crate::model::{
        db::{NewVote, Setting},
        mongodb::Coll,
    };

    use super::*;

    async fn settings_of(client: &Client) -> ElectionSettings {
        let response = client.get(uri!(election_settings)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    async fn post_json(client: &Client, uri: Origin<'static>, body: &str) -> (Status, StatusMessage) {
        let response = client
            .post(uri)
            .header(ContentType::JSON)
            .body(body)
            .dispatch()
            .await;
        (response.status(), response.into_json().await.unwrap())
    }

    async fn regenerate(client: &Client) -> (Status, StatusMessage) {
        let response = client.post(uri!(regenerate_keys)).dispatch().await;
        (response.status(), response.into_json().await.unwrap())
    }

    async fn set_state(settings: &Coll<Setting>, state: ElectionState) {
        settings
            .update_one(
                doc! { "_id": setting_keys::ELECTION_STATE },
                doc! { "$set": { "value": state.as_setting() } },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await
            .unwrap();
    }

    #[backend_test(admin)]
    async fn fresh_election_settings(client: Client, stored: Coll<Setting>) {
        let settings = settings_of(&client).await;
        // Viewing the settings must not write any.
        assert_eq!(stored.count_documents(None, None).await.unwrap(), 0);

        assert_eq!(settings.state, ElectionState::Closed);
        assert_eq!(settings.template, DEFAULT_TEMPLATE);
        assert_eq!(settings.public_election_key, None);
        assert!(!settings.has_private_election_key);
        assert_eq!(settings.vote_count, 0);
        assert!(settings.can_regenerate_keys);
    }

    #[backend_test(admin)]
    async fn regenerate_keys_while_closed(client: Client) {
        let (status, message) = regenerate(&client).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(message.message, KEYS_REGENERATED_MESSAGE);

        let first = settings_of(&client).await;
        assert!(first.has_private_election_key);
        let first_key = first.public_election_key.unwrap();
        first_key.parse::<PaillierPublicKey>().unwrap();

        // Keys can be replaced again as long as nobody has voted.
        let (status, _) = regenerate(&client).await;
        assert_eq!(Status::Ok, status);
        let second_key = settings_of(&client).await.public_election_key.unwrap();
        assert_ne!(first_key, second_key);
    }

    #[backend_test(admin)]
    async fn votes_freeze_keys(client: Client, settings: Coll<Setting>, votes: Coll<NewVote>) {
        regenerate(&client).await;
        let before: Vec<Setting> = settings
            .find(None, None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        votes
            .insert_one(NewVote::example("Juan dela Cruz", "c1"), None)
            .await
            .unwrap();

        let (status, message) = regenerate(&client).await;
        assert_eq!(Status::Conflict, status);
        assert_eq!(message.message, REGENERATION_DENIED_REASON);
        assert!(!settings_of(&client).await.can_regenerate_keys);

        // Only the revision counter may move.
        let after: Vec<Setting> = settings
            .find(None, None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let values = |s: &[Setting]| {
            s.iter()
                .map(|s| (s.key.clone(), s.value.clone()))
                .collect::<BTreeMap<_, _>>()
        };
        assert_eq!(values(&before), values(&after));
    }

    #[backend_test(admin)]
    async fn open_election_freezes_keys(client: Client, settings: Coll<Setting>) {
        regenerate(&client).await;
        let key = settings_of(&client).await.public_election_key;
        set_state(&settings, ElectionState::Open).await;

        let (status, message) = regenerate(&client).await;
        assert_eq!(Status::Conflict, status);
        assert_eq!(message.message, REGENERATION_DENIED_REASON);
        assert_eq!(settings_of(&client).await.public_election_key, key);
    }

    #[backend_test(admin)]
    async fn change_election_state(client: Client) {
        let (status, message) =
            post_json(&client, uri!(change_state), r#"{ "state": "open" }"#).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(message.message, STATE_CHANGED_MESSAGE);
        assert_eq!(settings_of(&client).await.state, ElectionState::Open);

        for body in [r#"{ "state": "ajar" }"#, "{}", "open"] {
            let (status, message) = post_json(&client, uri!(change_state), body).await;
            assert_eq!(Status::BadRequest, status);
            assert_eq!(message.message, INVALID_STATE_MESSAGE);
        }
        assert_eq!(settings_of(&client).await.state, ElectionState::Open);

        let (status, _) = post_json(&client, uri!(change_state), r#"{ "state": "closed" }"#).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(settings_of(&client).await.state, ElectionState::Closed);
    }

    #[backend_test(admin)]
    async fn change_site_template(client: Client) {
        let (status, message) = post_json(
            &client,
            uri!(change_template),
            &json!({ "template_name": "yes-or-yes" }).to_string(),
        )
        .await;
        assert_eq!(Status::Ok, status);
        assert_eq!(message.message, TEMPLATE_CHANGED_MESSAGE);
        assert_eq!(settings_of(&client).await.template, "yes-or-yes");

        for body in [
            json!({ "template_name": "" }).to_string(),
            json!({ "template_name": "../secrets" }).to_string(),
            json!({}).to_string(),
        ] {
            let (status, message) = post_json(&client, uri!(change_template), &body).await;
            assert_eq!(Status::BadRequest, status);
            assert_eq!(message.message, INVALID_TEMPLATE_MESSAGE);
        }
        assert_eq!(settings_of(&client).await.template, "yes-or-yes");
    }

    #[backend_test(admin)]
    async fn purge_only_while_closed(client: Client, settings: Coll<Setting>, votes: Coll<NewVote>) {
        votes
            .insert_many(
                [
                    NewVote::example("Juan dela Cruz", "c1"),
                    NewVote::example("Maria Clara", "c2"),
                ],
                None,
            )
            .await
            .unwrap();

        set_state(&settings, ElectionState::Open).await;
        let response = client.delete(uri!(purge_votes)).dispatch().await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(settings_of(&client).await.vote_count, 2);

        set_state(&settings, ElectionState::Closed).await;
        let response = client.delete(uri!(purge_votes)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let message: StatusMessage = response.into_json().await.unwrap();
        assert_eq!(message.message, "Deleted 2 votes.");

        // Keys are mutable again.
        let settings = settings_of(&client).await;
        assert_eq!(settings.vote_count, 0);
        assert!(settings.can_regenerate_keys);
    }

    #[backend_test(admin)]
    async fn dump_and_tally_votes(client: Client, settings: Coll<Setting>, votes: Coll<NewVote>) {
        regenerate(&client).await;
        let public_key: PaillierPublicKey = settings_of(&client)
            .await
            .public_election_key
            .unwrap()
            .parse()
            .unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let one = BigUint::from(1_u32);
        let ballots = ["Juan dela Cruz", "Maria Clara", "Juan dela Cruz"]
            .into_iter()
            .map(|candidate| {
                let cipher = public_key.encrypt(&one, &mut rng).unwrap();
                NewVote::example(candidate, &cipher.to_string())
            })
            .collect::<Vec<_>>();
        votes.insert_many(&ballots, None).await.unwrap();

        let response = client.get(uri!(dump_votes)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let dump: Vec<EncryptedVote> = response.into_json().await.unwrap();
        assert_eq!(dump.len(), 3);
        assert!(dump.iter().all(|vote| ballots
            .iter()
            .any(|ballot| ballot.vote_cipher == vote.vote_cipher)));

        set_state(&settings, ElectionState::Open).await;
        let response = client.get(uri!(tally)).dispatch().await;
        assert_eq!(Status::Conflict, response.status());
        let message: StatusMessage = response.into_json().await.unwrap();
        assert_eq!(message.message, "Cannot tally votes while the election is open.");

        set_state(&settings, ElectionState::Closed).await;
        let response = client.get(uri!(tally)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let results: ElectionResults = response.into_json().await.unwrap();
        assert_eq!(results.totals.get("Juan dela Cruz"), Some(&2));
        assert_eq!(results.totals.get("Maria Clara"), Some(&1));
    }

    #[backend_test(admin)]
    async fn tally_without_keys(client: Client) {
        let response = client.get(uri!(tally)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn admin_routes_need_login(client: Client) {
        let response = client.get(uri!(election_settings)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
        let message: StatusMessage = response.into_json().await.unwrap();
        assert_eq!(message.message, "Not logged in");

        let response = client.post(uri!(regenerate_keys)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.delete(uri!(purge_votes)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.get(uri!(dump_votes)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
