mod fetch;
pub use fetch::fetch_ordered;

mod observers;
pub use observers::{ObserverRegistry, ObserverToken, ReleaseFn};

mod search;
pub use search::{filter_stories, search, SearchSnapshot, Searcher, DEBOUNCE_DELAY};

mod store;
pub use store::{
    category_path, comments_path, item_path, resolve_store_path, user_path, ChangeCallback,
    ItemStore, StoreHandle,
};

mod sync;
pub use sync::{LiveFeed, SyncEngine, DEFAULT_STORY_LIMIT};

mod tree;
pub use tree::{assemble_comment_trees, DEFAULT_MAX_DEPTH};

pub mod api {
    pub use hnmirror_api::*;
}
