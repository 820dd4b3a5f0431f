use std::fmt::Display;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR};
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    tokio::task::JoinError,
    Request,
};
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::model::{api::election::StatusMessage, common::UnknownElectionState};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Key generation task failed: {0}")]
    KeyGeneration(#[from] JoinError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    CorruptState(#[from] UnknownElectionState),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a 404 with a description of what was missing.
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {what}"))
    }

    /// The HTTP status this error is answered with.
    pub fn status(&self) -> Status {
        match self {
            // Lost a race with a concurrent transaction; retrying may succeed.
            Self::Db(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR) => Status::Conflict,
            Self::Db(_) | Self::KeyGeneration(_) | Self::Crypto(_) | Self::CorruptState(_) => {
                Status::InternalServerError
            }
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Argon2(_) => Status::BadRequest,
            Self::Status(status, _) => *status,
        }
    }
}

/// Message left behind by a failing request guard for the catcher to send,
/// since catchers never see the guard's error value.
#[derive(Debug, Default)]
pub struct GuardFailure(Option<String>);

impl GuardFailure {
    /// Remember `message` as the reason this request failed.
    pub fn record(req: &Request<'_>, message: impl Into<String>) {
        req.local_cache(|| GuardFailure(Some(message.into())));
    }

    /// The recorded message, if any guard failed with one.
    pub fn message(req: &Request<'_>) -> Option<String> {
        req.local_cache(GuardFailure::default).0.clone()
    }
}

/// Answer every uncaught error status with a JSON status message.
#[catch(default)]
pub fn json_catcher(status: Status, req: &Request<'_>) -> (Status, Json<StatusMessage>) {
    let message = GuardFailure::message(req)
        .unwrap_or_else(|| status.reason().unwrap_or("Unknown error").to_string());
    (status, Json(StatusMessage::new(message)))
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();

        let log_msg = format!("{} {}: {self}", req.method(), req.uri());
        let message = if status.class() == StatusClass::ServerError {
            error!("{log_msg}");
            // Internals stay in the log.
            "Internal server error.".to_string()
        } else {
            warn!("{log_msg}");
            self.to_string()
        };

        (status, Json(StatusMessage::new(message))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::errors::ErrorKind;
    use rocket::{
        local::asynchronous::Client,
        request::{FromRequest, Outcome},
    };

    use crate::crypto::CryptoError;

    use super::*;

    const TALLY_WHILE_OPEN: &str = "Cannot tally votes while the election is open.";

    #[get("/conflict")]
    fn conflict() -> Result<()> {
        Err(Error::Status(Status::Conflict, TALLY_WHILE_OPEN.to_string()))
    }

    #[get("/broken")]
    fn broken() -> Result<()> {
        Err(CryptoError::MalformedKey("secret details".to_string()).into())
    }

    struct Doorman;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for Doorman {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            GuardFailure::record(req, "Not on the list");
            Outcome::Failure((Status::Unauthorized, ()))
        }
    }

    #[get("/guarded")]
    fn guarded(_doorman: Doorman) {}

    async fn client() -> Client {
        let rocket = rocket::build()
            .mount("/", routes![conflict, broken, guarded])
            .register("/", catchers![json_catcher]);
        Client::tracked(rocket).await.unwrap()
    }

    #[rocket::async_test]
    async fn errors_answer_with_a_status_message() {
        let client = client().await;

        let response = client.get("/conflict").dispatch().await;
        assert_eq!(Status::Conflict, response.status());
        let body: StatusMessage = response.into_json().await.unwrap();
        assert_eq!(body.message, TALLY_WHILE_OPEN);

        let response = client.get("/broken").dispatch().await;
        assert_eq!(Status::InternalServerError, response.status());
        let body: StatusMessage = response.into_json().await.unwrap();
        assert_eq!(body.message, "Internal server error.");
    }

    #[rocket::async_test]
    async fn catcher_answers_with_a_status_message() {
        let client = client().await;

        let response = client.get("/guarded").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
        let body: StatusMessage = response.into_json().await.unwrap();
        assert_eq!(body.message, "Not on the list");

        let response = client.get("/nowhere").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body: StatusMessage = response.into_json().await.unwrap();
        assert_eq!(body.message, "Not Found");
    }

    #[test]
    fn statuses() {
        assert_eq!(Error::not_found("key").status(), Status::NotFound);
        assert_eq!(
            Error::from(JwtError::from(ErrorKind::ExpiredSignature)).status(),
            Status::Unauthorized
        );
        assert_eq!(
            Error::from(JwtError::from(ErrorKind::InvalidToken)).status(),
            Status::BadRequest
        );
        assert_eq!(
            Error::from(UnknownElectionState("ajar".to_string())).status(),
            Status::InternalServerError
        );
        assert_eq!(
            Error::from(CryptoError::PlaintextTooLarge).status(),
            Status::InternalServerError
        );
    }
}
