use rocket::{serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::election::PublicElectionKey, common::setting_keys, mongodb::MongoElection,
};

pub fn routes() -> Vec<Route> {
    routes![public_key]
}

/// The key voting clients encrypt ballots under. Needs no login.
#[get("/admin/election/public-key")]
async fn public_key(election: MongoElection) -> Result<Json<PublicElectionKey>> {
    let public_election_key = election
        .setting(setting_keys::PUBLIC_ELECTION_KEY)
        .await?
        .ok_or_else(|| Error::not_found("public election key"))?;
    Ok(Json(PublicElectionKey {
        public_election_key,
    }))
}
