use crate::{epoch_to_time, ItemId, Time};

/// One user profile, keyed by handle in the backing store
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct User {
    pub id: String,
    /// Account creation time, seconds since epoch
    pub created: i64,
    pub karma: i64,
    pub about: Option<String>,
    pub submitted: Option<Vec<ItemId>>,
}

impl User {
    /// Parses a raw store value; any missing or wrong-typed required
    /// field means "no item"
    pub fn from_value(value: serde_json::Value) -> Option<User> {
        serde_json::from_value(value).ok()
    }

    pub fn created_at(&self) -> Option<Time> {
        epoch_to_time(self.created)
    }
}
