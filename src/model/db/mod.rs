//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs are serialised in MongoDB's own format.

pub mod admin;
pub use admin::{Admin, NewAdmin};

pub mod setting;
pub use setting::Setting;

pub mod vote;
pub use vote::{NewVote, Vote};
