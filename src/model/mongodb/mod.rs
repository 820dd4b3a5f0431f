mod bson;
mod collection;
mod election;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use election::{MongoElection, MongoTransaction};
