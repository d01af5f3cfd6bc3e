use std::fmt;

mod category;
pub use category::Category;

mod comment;
pub use comment::Comment;

mod error;
pub use error::Error;

mod search;
pub use search::{SearchResult, SearchResultKind};

mod story;
pub use story::Story;

mod user;
pub use user::User;

pub type Time = chrono::DateTime<chrono::Utc>;

/// Integer id of a story or comment in the backing store
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub(crate) fn epoch_to_time(secs: i64) -> Option<Time> {
    use chrono::TimeZone;
    chrono::Utc.timestamp_opt(secs, 0).single()
}
