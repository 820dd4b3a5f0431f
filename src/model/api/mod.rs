//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Election keys and ciphertexts are serialised as hex strings.

pub mod admin;
pub mod auth;
pub mod election;
pub mod vote;
