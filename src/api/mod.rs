use rocket::{Catcher, Route};

mod admin;
pub mod auth;
mod public;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(auth::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![crate::error::json_catcher]
}
