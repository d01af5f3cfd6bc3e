use async_trait::async_trait;
use serde_json::Value;

use crate::api::{Category, Error, ItemId};

/// Opaque handle to one live change subscription inside the store
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StoreHandle(pub u64);

pub type ChangeCallback = Box<dyn FnMut(Value) + Send>;

/// The remote tree store the mirror is built on.
///
/// Values are string-keyed mappings (or plain arrays for the listing
/// paths); parsing them is the caller's problem. Change delivery is
/// at-least-once and may coalesce rapid updates.
#[async_trait]
pub trait ItemStore: Send + Sync + 'static {
    /// Single read of the value at `path`
    async fn read_once(&self, path: &str) -> Result<Value, Error>;

    /// Registers `on_change` at `path`. The callback is invoked once
    /// immediately with the current value, then again on every change,
    /// until the returned handle is passed to [`unsubscribe`].
    ///
    /// [`unsubscribe`]: ItemStore::unsubscribe
    fn subscribe(&self, path: &str, on_change: ChangeCallback) -> Result<StoreHandle, Error>;

    fn unsubscribe(&self, path: &str, handle: StoreHandle);
}

#[async_trait]
impl<S: ItemStore + ?Sized> ItemStore for std::sync::Arc<S> {
    async fn read_once(&self, path: &str) -> Result<Value, Error> {
        (**self).read_once(path).await
    }

    fn subscribe(&self, path: &str, on_change: ChangeCallback) -> Result<StoreHandle, Error> {
        (**self).subscribe(path, on_change)
    }

    fn unsubscribe(&self, path: &str, handle: StoreHandle) {
        (**self).unsubscribe(path, handle)
    }
}

pub fn category_path(category: Category) -> String {
    format!("v0/{}", category.feed_name())
}

pub fn item_path(id: ItemId) -> String {
    format!("v0/item/{id}")
}

pub fn user_path(username: &str) -> String {
    format!("v0/user/{username}")
}

/// Logical path keying the comments observer for a story. No value
/// lives there: comments are derived from the story's own `kids` list,
/// so the actual subscription goes to [`resolve_store_path`] of this.
pub fn comments_path(story_id: ItemId) -> String {
    format!("v0/item/{story_id}_comments")
}

/// Maps a logical observer path back to the store path actually
/// subscribed to
pub fn resolve_store_path(path: &str) -> String {
    path.replace("_comments", "")
}
