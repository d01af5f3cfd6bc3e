use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use hnmirror_client::{
    api::{Category, Error},
    category_path, ChangeCallback, ItemStore, StoreHandle,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// In-memory backing store for tests.
///
/// Mimics the real store's contract: reads of absent paths succeed
/// with `Null` (parsing fails above, not the transport), subscribers
/// get the current value immediately and again on every `set`, and
/// unsubscribing by handle stops deliveries. Release counts are kept
/// per path so tests can assert subscriptions are torn down exactly
/// once.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    observers: HashMap<String, Vec<(StoreHandle, ChangeCallback)>>,
    releases: HashMap<String, usize>,
    failing: HashSet<String>,
    next_handle: u64,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Stores `value` at `path` and notifies every observer of that
    /// path
    pub fn set(&self, path: &str, value: Value) {
        let mut inner = self.inner.lock();
        inner.values.insert(path.to_owned(), value.clone());
        if let Some(observers) = inner.observers.get_mut(path) {
            for (_, on_change) in observers.iter_mut() {
                on_change(value.clone());
            }
        }
    }

    /// Stores an item value at `v0/item/{id}`, taking the id from the
    /// value itself
    pub fn set_item(&self, item: Value) {
        let id = item
            .get("id")
            .and_then(Value::as_u64)
            .expect("item value without a numeric id");
        self.set(&format!("v0/item/{id}"), item);
    }

    pub fn set_category(&self, category: Category, ids: &[u64]) {
        self.set(&category_path(category), json!(ids));
    }

    /// Makes every subsequent `read_once` of `path` fail with a
    /// transport error
    pub fn fail_reads_at(&self, path: &str) {
        self.inner.lock().failing.insert(path.to_owned());
    }

    /// Number of currently live subscriptions at `path`
    pub fn observer_count(&self, path: &str) -> usize {
        self.inner
            .lock()
            .observers
            .get(path)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// How many subscriptions at `path` have been released so far
    pub fn release_count(&self, path: &str) -> usize {
        self.inner.lock().releases.get(path).copied().unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> MemoryStore {
        MemoryStore::new()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn read_once(&self, path: &str) -> Result<Value, Error> {
        let inner = self.inner.lock();
        if inner.failing.contains(path) {
            return Err(Error::Network {
                path: path.to_owned(),
                message: "simulated outage".to_owned(),
            });
        }
        Ok(inner.values.get(path).cloned().unwrap_or(Value::Null))
    }

    fn subscribe(&self, path: &str, mut on_change: ChangeCallback) -> Result<StoreHandle, Error> {
        let mut inner = self.inner.lock();
        inner.next_handle += 1;
        let handle = StoreHandle(inner.next_handle);
        let current = inner.values.get(path).cloned().unwrap_or(Value::Null);
        on_change(current);
        inner
            .observers
            .entry(path.to_owned())
            .or_default()
            .push((handle, on_change));
        Ok(handle)
    }

    fn unsubscribe(&self, path: &str, handle: StoreHandle) {
        let mut inner = self.inner.lock();
        let removed = match inner.observers.get_mut(path) {
            Some(observers) => {
                let before = observers.len();
                observers.retain(|(h, _)| *h != handle);
                observers.len() != before
            }
            None => false,
        };
        if removed {
            *inner.releases.entry(path.to_owned()).or_default() += 1;
        }
    }
}
