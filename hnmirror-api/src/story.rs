use crate::{epoch_to_time, ItemId, Time};

/// One story as read from the backing store. Immutable once parsed; a
/// later fetch produces a new value.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Story {
    pub id: ItemId,
    pub title: String,
    pub by: String,
    /// Creation time, seconds since epoch
    pub time: i64,
    pub score: i64,
    // TODO: check whether job stories are really the only items missing descendants
    pub descendants: Option<i64>,
    pub url: Option<String>,
    pub text: Option<String>,
    /// Ordered ids of the top-level comments
    pub kids: Option<Vec<ItemId>>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Story {
    /// Parses a raw store value; any missing or wrong-typed required
    /// field means "no item"
    pub fn from_value(value: serde_json::Value) -> Option<Story> {
        serde_json::from_value(value).ok()
    }

    pub fn posted_at(&self) -> Option<Time> {
        epoch_to_time(self.time)
    }
}
