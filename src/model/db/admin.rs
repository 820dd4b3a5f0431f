use std::ops::{Deref, DerefMut};

use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::admin::AdminCredentials, mongodb::Coll, mongodb::Id};

/// Username of the admin created when the database has none.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
/// Initial password of the default admin. Change it after first login.
pub const DEFAULT_ADMIN_PASSWORD: &str = "botos-admin";

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // A malformed hash can never match anything.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Insert the default admin if there are no admins at all, so a fresh
/// deployment can still be logged into.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>) -> Result<()> {
    if admins.count_documents(None, None).await? > 0 {
        return Ok(());
    }

    warn!("No admins found, creating default admin '{DEFAULT_ADMIN_USERNAME}'");
    let admin = bootstrap_admin(AdminCredentials {
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password: DEFAULT_ADMIN_PASSWORD.to_string(),
    })?;
    admins.insert_one(admin, None).await?;
    Ok(())
}

/// Hash the credentials of an admin created at startup.
fn bootstrap_admin(credentials: AdminCredentials) -> Result<NewAdmin> {
    let username = credentials.username.clone();
    NewAdmin::try_from(credentials).map_err(|_| {
        Error::Status(
            Status::InternalServerError,
            format!("Cannot create admin '{username}' from the built-in credentials"),
        )
    })
}
