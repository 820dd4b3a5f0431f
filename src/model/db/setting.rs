use serde::{Deserialize, Serialize};

/// A single election setting. The key doubles as the document ID, so each
/// setting exists at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    #[serde(rename = "_id")]
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    /// Bumped whenever a transaction relies on this setting staying put,
    /// so that concurrent writers conflict with that transaction.
    #[serde(default)]
    pub revision: i64,
}
