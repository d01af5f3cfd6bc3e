use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::api::{Error, Time};
use crate::store::StoreHandle;

/// One live registration with the backing store.
///
/// Owned by the [`ObserverRegistry`] until the holder releases it or a
/// new registration on the same path supersedes it.
#[derive(Clone, Debug)]
pub struct ObserverToken {
    pub id: Uuid,
    /// Logical path this token is keyed by; may differ from the store
    /// path actually subscribed to
    pub path: String,
    pub handle: StoreHandle,
    /// Human-readable label of what is being observed
    pub category: Option<String>,
    pub created_at: Time,
}

impl ObserverToken {
    fn new(path: &str, handle: StoreHandle, category: Option<String>) -> ObserverToken {
        ObserverToken {
            id: Uuid::new_v4(),
            path: path.to_owned(),
            handle,
            category,
            created_at: Utc::now(),
        }
    }
}

/// Releases the underlying store subscription; must capture the
/// resolved store path, not the logical one
pub type ReleaseFn = Box<dyn FnOnce() + Send>;

struct ActiveObserver {
    token: ObserverToken,
    release: ReleaseFn,
}

/// Tracks at most one live store subscription per logical path.
///
/// This is the only mutable shared state in the core; every operation
/// takes the one lock, so no two subscriptions for the same path can
/// ever be live at once, even under rapid re-subscription.
pub struct ObserverRegistry {
    active: Mutex<HashMap<String, ActiveObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> ObserverRegistry {
        ObserverRegistry {
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new observer at `path`, superseding (and releasing)
    /// any existing one. `factory` creates the store subscription and
    /// returns its handle together with the closure that will release
    /// it later.
    pub fn subscribe<F>(
        &self,
        path: &str,
        category: Option<String>,
        factory: F,
    ) -> Result<ObserverToken, Error>
    where
        F: FnOnce() -> Result<(StoreHandle, ReleaseFn), Error>,
    {
        let mut active = self.active.lock();
        if let Some(previous) = active.remove(path) {
            (previous.release)();
        }
        let (handle, release) = factory()?;
        let token = ObserverToken::new(path, handle, category);
        active.insert(
            path.to_owned(),
            ActiveObserver {
                token: token.clone(),
                release,
            },
        );
        Ok(token)
    }

    /// Releases the observer registered at `path`, if any
    pub fn unsubscribe_path(&self, path: &str) {
        let removed = self.active.lock().remove(path);
        if let Some(observer) = removed {
            (observer.release)();
        }
    }

    /// Releases the observer `token` refers to, unless it has already
    /// been superseded by a newer registration on the same path
    pub fn unsubscribe(&self, token: &ObserverToken) {
        let removed = {
            let mut active = self.active.lock();
            match active.get(&token.path) {
                Some(current) if current.token.id == token.id => active.remove(&token.path),
                _ => None,
            }
        };
        if let Some(observer) = removed {
            (observer.release)();
        }
    }

    /// Releases every outstanding store subscription; used at full
    /// shutdown
    pub fn unsubscribe_all(&self) {
        let drained: Vec<ActiveObserver> = {
            let mut active = self.active.lock();
            active.drain().map(|(_, observer)| observer).collect()
        };
        for observer in drained {
            (observer.release)();
        }
    }

    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

impl Default for ObserverRegistry {
    fn default() -> ObserverRegistry {
        ObserverRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_factory(
        handle: u64,
        released: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> Result<(StoreHandle, ReleaseFn), Error> {
        let released = released.clone();
        move || {
            Ok((
                StoreHandle(handle),
                Box::new(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                }) as ReleaseFn,
            ))
        }
    }

    #[test]
    fn resubscribing_replaces_and_releases_the_previous_observer() {
        let registry = ObserverRegistry::new();
        let first_released = Arc::new(AtomicUsize::new(0));
        let second_released = Arc::new(AtomicUsize::new(0));

        let first = registry
            .subscribe("v0/topstories", None, counting_factory(1, &first_released))
            .unwrap();
        let second = registry
            .subscribe("v0/topstories", None, counting_factory(2, &second_released))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(first_released.load(Ordering::SeqCst), 1);
        assert_eq!(second_released.load(Ordering::SeqCst), 0);
        assert_ne!(first.id, second.id);
        assert_eq!(second.handle, StoreHandle(2));
    }

    #[test]
    fn stale_token_cannot_tear_down_its_successor() {
        let registry = ObserverRegistry::new();
        let first_released = Arc::new(AtomicUsize::new(0));
        let second_released = Arc::new(AtomicUsize::new(0));

        let first = registry
            .subscribe("v0/item/1", None, counting_factory(1, &first_released))
            .unwrap();
        let second = registry
            .subscribe("v0/item/1", None, counting_factory(2, &second_released))
            .unwrap();

        // first was already released when superseded; unsubscribing it
        // again must not touch the live observer
        registry.unsubscribe(&first);
        assert_eq!(registry.len(), 1);
        assert_eq!(first_released.load(Ordering::SeqCst), 1);
        assert_eq!(second_released.load(Ordering::SeqCst), 0);

        registry.unsubscribe(&second);
        assert_eq!(registry.len(), 0);
        assert_eq!(second_released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_path_is_idempotent() {
        let registry = ObserverRegistry::new();
        let released = Arc::new(AtomicUsize::new(0));
        registry
            .subscribe("v0/beststories", None, counting_factory(1, &released))
            .unwrap();

        registry.unsubscribe_path("v0/beststories");
        registry.unsubscribe_path("v0/beststories");
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_all_releases_everything() {
        let registry = ObserverRegistry::new();
        let released = Arc::new(AtomicUsize::new(0));
        for (i, path) in ["v0/topstories", "v0/item/1", "v0/item/2_comments"]
            .iter()
            .enumerate()
        {
            registry
                .subscribe(path, None, counting_factory(i as u64, &released))
                .unwrap();
        }

        registry.unsubscribe_all();
        assert!(registry.is_empty());
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failed_factory_leaves_no_entry() {
        let registry = ObserverRegistry::new();
        let result = registry.subscribe("v0/topstories", None, || {
            Err(Error::ObserverFailed {
                path: "v0/topstories".to_owned(),
                message: "nope".to_owned(),
            })
        });
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn token_carries_its_category_label() {
        let registry = ObserverRegistry::new();
        let released = Arc::new(AtomicUsize::new(0));
        let token = registry
            .subscribe(
                "v0/topstories",
                Some("Top".to_owned()),
                counting_factory(7, &released),
            )
            .unwrap();
        assert_eq!(token.category.as_deref(), Some("Top"));
        assert_eq!(token.path, "v0/topstories");
    }
}
