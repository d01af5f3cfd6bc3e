use std::sync::Arc;

use async_recursion::async_recursion;

use crate::api::{Comment, ItemId};
use crate::fetch::fetch_ordered;
use crate::store::{item_path, ItemStore};

/// Comment recursion never goes past this many levels unless the
/// engine is configured otherwise
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Recursively expands `ids` into full comment trees.
///
/// The depth guard runs before any fetch at a level, so backing-store
/// cycles or pathologically deep threads terminate with an empty reply
/// list instead of recursing forever. Sibling subtrees are expanded
/// concurrently; reply order within a level follows the parent's
/// `kids` order. A branch that cannot be fetched collapses to an empty
/// reply list without affecting its siblings.
#[async_recursion]
pub async fn assemble_comment_trees<S: ItemStore>(
    store: &Arc<S>,
    ids: &[ItemId],
    depth: usize,
    max_depth: usize,
) -> Vec<Comment> {
    if depth > max_depth {
        return Vec::new();
    }

    let mut comments = fetch_ordered(ids, |id| fetch_comment(store, id)).await;

    let with_kids: Vec<(usize, Vec<ItemId>)> = comments
        .iter()
        .enumerate()
        .filter_map(|(idx, comment)| match &comment.kids {
            Some(kids) if !kids.is_empty() => Some((idx, kids.clone())),
            _ => None,
        })
        .collect();

    let expanded = futures::future::join_all(with_kids.into_iter().map(|(idx, kids)| {
        async move {
            let replies = assemble_comment_trees(store, &kids, depth + 1, max_depth).await;
            (idx, replies)
        }
    }))
    .await;

    for (idx, replies) in expanded {
        comments[idx].replies = Some(replies);
    }

    comments
}

async fn fetch_comment<S: ItemStore>(store: &Arc<S>, id: ItemId) -> Option<Comment> {
    match store.read_once(&item_path(id)).await {
        Ok(value) => Comment::from_value(value),
        Err(err) => {
            tracing::debug!(?err, %id, "dropping unfetchable comment");
            None
        }
    }
}
