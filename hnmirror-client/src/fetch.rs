use std::future::Future;

use futures::future;

use crate::api::ItemId;

/// Fetches every id concurrently and returns the successfully-fetched
/// items in the same relative order as `ids`.
///
/// One bad id must never invalidate a whole listing or subtree, so ids
/// whose fetch returns `None` are silently dropped. This is a single
/// fork/join barrier: all fetches are launched at once and joined
/// before anything is returned, which also makes the output order
/// independent of completion order.
pub async fn fetch_ordered<T, F, Fut>(ids: &[ItemId], fetch: F) -> Vec<T>
where
    F: Fn(ItemId) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    future::join_all(ids.iter().copied().map(fetch))
        .await
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn preserves_input_order_whatever_the_completion_order() {
        let ids: Vec<ItemId> = (1..=5).map(ItemId).collect();
        // earlier ids finish last
        let fetched = fetch_ordered(&ids, |id| async move {
            tokio::time::sleep(Duration::from_millis(100 - 10 * id.0)).await;
            Some(id.0)
        })
        .await;
        assert_eq!(fetched, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn drops_failed_ids_silently() {
        let ids: Vec<ItemId> = (1..=6).map(ItemId).collect();
        let fetched = fetch_ordered(&ids, |id| async move {
            (id.0 % 2 == 1).then_some(id.0)
        })
        .await;
        assert_eq!(fetched, vec![1, 3, 5]);
        assert!(fetched.len() <= ids.len());
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let fetched: Vec<u64> = fetch_ordered(&[], |id| async move { Some(id.0) }).await;
        assert!(fetched.is_empty());
    }
}
