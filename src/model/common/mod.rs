pub mod election;

pub use election::{setting_keys, ElectionState, UnknownElectionState, DEFAULT_TEMPLATE};
