use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::api::{Category, Comment, Error, ItemId, Story, User};
use crate::fetch::fetch_ordered;
use crate::observers::{ObserverRegistry, ObserverToken, ReleaseFn};
use crate::store::{
    category_path, comments_path, item_path, resolve_store_path, user_path, ChangeCallback,
    ItemStore, StoreHandle,
};
use crate::tree::{assemble_comment_trees, DEFAULT_MAX_DEPTH};

/// How many ids of a listing are fetched when the caller does not say
pub const DEFAULT_STORY_LIMIT: usize = 100;

/// Mirrors stories, comment trees and users out of the backing store,
/// in one-shot and live-updating form.
///
/// The live `observe_*` operations must be called from within a tokio
/// runtime: each change notification re-runs the corresponding fetch
/// pipeline on a spawned task.
pub struct SyncEngine<S> {
    store: Arc<S>,
    observers: Arc<ObserverRegistry>,
    max_depth: usize,
}

impl<S: ItemStore> SyncEngine<S> {
    pub fn new(store: S) -> SyncEngine<S> {
        SyncEngine::with_max_depth(store, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(store: S, max_depth: usize) -> SyncEngine<S> {
        SyncEngine {
            store: Arc::new(store),
            observers: Arc::new(ObserverRegistry::new()),
            max_depth,
        }
    }

    /// Reads the ordered id list of `category` and fetches the first
    /// `limit` stories. Ids that cannot be fetched or parsed are
    /// dropped; a failure reading the listing itself is surfaced.
    pub async fn fetch_stories(
        &self,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Story>, Error> {
        let path = category_path(category);
        let value = self.store.read_once(&path).await?;
        let ids: Vec<ItemId> =
            serde_json::from_value(value).map_err(|_| Error::ParsingFailed(path))?;
        let ids: Vec<ItemId> = ids.into_iter().take(limit).collect();
        Ok(fetch_ordered(&ids, |id| fetch_story_opt(&self.store, id)).await)
    }

    /// Transport failures are surfaced; a value that does not parse as
    /// a story is `None`
    pub async fn fetch_story(&self, id: ItemId) -> Result<Option<Story>, Error> {
        let value = self.store.read_once(&item_path(id)).await?;
        Ok(Story::from_value(value))
    }

    pub async fn fetch_user(&self, username: &str) -> Result<User, Error> {
        let path = user_path(username);
        let value = self.store.read_once(&path).await?;
        User::from_value(value).ok_or(Error::ParsingFailed(path))
    }

    /// Expands `ids` into full comment trees, bounded by this engine's
    /// maximum depth. Never fails: unusable branches collapse to empty
    /// reply lists.
    pub async fn fetch_comments(&self, ids: &[ItemId]) -> Vec<Comment> {
        assemble_comment_trees(&self.store, ids, 0, self.max_depth).await
    }

    /// Live variant of [`fetch_stories`]: re-runs the listing pipeline
    /// every time the category's id list changes. A malformed id list
    /// withholds the delivery instead of ending the stream.
    ///
    /// [`fetch_stories`]: SyncEngine::fetch_stories
    pub fn observe_stories(
        &self,
        category: Category,
        limit: usize,
    ) -> Result<LiveFeed<Vec<Story>>, Error> {
        let path = category_path(category);
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.observers.subscribe(
            &path,
            Some(category.display_name().to_owned()),
            || {
                let store = self.store.clone();
                let rt = tokio::runtime::Handle::current();
                let on_change: ChangeCallback = Box::new(move |value| {
                    let ids: Vec<ItemId> = match serde_json::from_value(value) {
                        Ok(ids) => ids,
                        Err(err) => {
                            tracing::warn!(?err, category = %category, "malformed id list");
                            return;
                        }
                    };
                    let ids: Vec<ItemId> = ids.into_iter().take(limit).collect();
                    let store = store.clone();
                    let tx = tx.clone();
                    rt.spawn(async move {
                        let stories =
                            fetch_ordered(&ids, |id| fetch_story_opt(&store, id)).await;
                        let _ = tx.send(stories);
                    });
                });
                let handle = self.store.subscribe(&path, on_change)?;
                Ok((handle, self.release_fn(&path, handle)))
            },
        )?;
        Ok(self.feed(rx, token))
    }

    /// Live variant of [`fetch_story`]; `None` deliveries mean the
    /// item is currently unparseable or gone.
    ///
    /// [`fetch_story`]: SyncEngine::fetch_story
    pub fn observe_story(&self, id: ItemId) -> Result<LiveFeed<Option<Story>>, Error> {
        let path = item_path(id);
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self
            .observers
            .subscribe(&path, Some(format!("Story-{id}")), || {
                let on_change: ChangeCallback = Box::new(move |value| {
                    let _ = tx.send(Story::from_value(value));
                });
                let handle = self.store.subscribe(&path, on_change)?;
                Ok((handle, self.release_fn(&path, handle)))
            })?;
        Ok(self.feed(rx, token))
    }

    /// Re-assembles the whole comment tree of `story_id` every time
    /// the story itself changes. The observer is keyed by the logical
    /// comments path but subscribes at the story's path, since the
    /// tree is derived from the story's `kids` list.
    pub fn observe_comments(&self, story_id: ItemId) -> Result<LiveFeed<Vec<Comment>>, Error> {
        let path = comments_path(story_id);
        let store_path = resolve_store_path(&path);
        let (tx, rx) = mpsc::unbounded_channel();
        let max_depth = self.max_depth;
        let token = self
            .observers
            .subscribe(&path, Some(format!("Comments-{story_id}")), || {
                let store = self.store.clone();
                let rt = tokio::runtime::Handle::current();
                let on_change: ChangeCallback = Box::new(move |value| {
                    match Story::from_value(value).and_then(|story| story.kids) {
                        Some(kids) if !kids.is_empty() => {
                            let store = store.clone();
                            let tx = tx.clone();
                            rt.spawn(async move {
                                let trees =
                                    assemble_comment_trees(&store, &kids, 0, max_depth).await;
                                let _ = tx.send(trees);
                            });
                        }
                        _ => {
                            let _ = tx.send(Vec::new());
                        }
                    }
                });
                let handle = self.store.subscribe(&store_path, on_change)?;
                Ok((handle, self.release_fn(&path, handle)))
            })?;
        Ok(self.feed(rx, token))
    }

    /// Releases the observer `token` refers to; a no-op if it has
    /// already been superseded
    pub fn stop_observing(&self, token: &ObserverToken) {
        self.observers.unsubscribe(token);
    }

    pub fn stop_observing_path(&self, path: &str) {
        self.observers.unsubscribe_path(path);
    }

    pub fn stop_all_observers(&self) {
        self.observers.unsubscribe_all();
    }

    pub fn active_observers(&self) -> usize {
        self.observers.len()
    }

    fn release_fn(&self, logical_path: &str, handle: StoreHandle) -> ReleaseFn {
        let store = self.store.clone();
        let path = resolve_store_path(logical_path);
        Box::new(move || store.unsubscribe(&path, handle))
    }

    fn feed<T>(&self, rx: mpsc::UnboundedReceiver<T>, token: ObserverToken) -> LiveFeed<T> {
        LiveFeed {
            rx,
            token,
            registry: self.observers.clone(),
        }
    }
}

async fn fetch_story_opt<S: ItemStore>(store: &Arc<S>, id: ItemId) -> Option<Story> {
    match store.read_once(&item_path(id)).await {
        Ok(value) => Story::from_value(value),
        Err(err) => {
            tracing::debug!(?err, %id, "dropping unfetchable story");
            None
        }
    }
}

/// Infinite stream of snapshots from one live observer.
///
/// Dropping the feed releases its registry entry, even before the
/// first delivery; the release is identity-checked, so a feed that was
/// superseded on the same path never tears down its successor.
pub struct LiveFeed<T> {
    rx: mpsc::UnboundedReceiver<T>,
    token: ObserverToken,
    registry: Arc<ObserverRegistry>,
}

impl<T> LiveFeed<T> {
    /// The token backing this feed; useful for subject-tagging
    /// deliveries when the consumer switches interests
    pub fn token(&self) -> &ObserverToken {
        &self.token
    }
}

impl<T> Stream for LiveFeed<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for LiveFeed<T> {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.token);
    }
}
