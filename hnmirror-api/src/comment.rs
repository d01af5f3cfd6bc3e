use crate::{epoch_to_time, ItemId, Time};

/// One comment, together with its assembled reply tree.
///
/// `replies` never comes from the wire: it stays `None` until the tree
/// assembler has expanded this comment's `kids` at least once.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: ItemId,
    /// Absent on removed ("dead") comments
    pub by: Option<String>,
    /// Creation time, seconds since epoch
    pub time: i64,
    pub text: Option<String>,
    /// Ordered ids of the direct replies
    pub kids: Option<Vec<ItemId>>,
    pub parent: Option<ItemId>,
    #[serde(skip)]
    pub replies: Option<Vec<Comment>>,
}

impl Comment {
    /// Parses a raw store value; any missing or wrong-typed required
    /// field means "no item"
    pub fn from_value(value: serde_json::Value) -> Option<Comment> {
        serde_json::from_value(value).ok()
    }

    pub fn is_dead(&self) -> bool {
        self.by.is_none()
    }

    pub fn posted_at(&self) -> Option<Time> {
        epoch_to_time(self.time)
    }
}
