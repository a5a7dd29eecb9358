use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{KeyValueStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory key-value store with lazy expiry.
///
/// Intended for tests/dev. Expired entries are dropped when next touched, so
/// memory is only reclaimed for keys that are read or scanned again.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Command("in-memory store lock poisoned".to_string()))
    }

    /// Live key count. Test hook.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|m| m.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Look up a live entry, evicting it if it has lapsed.
fn live<'a>(map: &'a mut HashMap<String, Entry>, key: &str, now: Instant) -> Option<&'a mut Entry> {
    if map.get(key).is_some_and(|e| !e.is_live(now)) {
        map.remove(key);
    }
    map.get_mut(key)
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl;
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut map = self.lock()?;
        Ok(live(&mut map, key, Instant::now()).map(|e| e.value.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut map = self.lock()?;
        Ok(map
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut map = self.lock()?;
        Ok(map.remove(key).is_some_and(|e| e.is_live(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut map = self.lock()?;
        match live(&mut map, key, now) {
            Some(entry) => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let mut map = self.lock()?;
        map.retain(|_, e| e.is_live(now));
        Ok(map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_get_del() {
        let store = InMemoryKvStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.del("k").await.unwrap());
        assert!(!store.del("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_lapse_after_ttl() {
        let store = InMemoryKvStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_extends_only_live_keys() {
        let store = InMemoryKvStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(store.expire("k", Duration::from_secs(10)).await.unwrap());

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!store.expire("k", Duration::from_secs(10)).await.unwrap());
        assert!(!store.expire("missing", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn take_hands_the_value_out_once() {
        let store = Arc::new(InMemoryKvStore::new());
        store.set("rt:x", "s1", Duration::from_secs(60)).await.unwrap();

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.take("rt:x").await.unwrap() }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.take("rt:x").await.unwrap() }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
        assert_eq!(store.get("rt:x").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_skips_other_prefixes_and_lapsed_keys() {
        let store = InMemoryKvStore::new();
        store.set("rt:a", "s", Duration::from_secs(60)).await.unwrap();
        store.set("rt:b", "s", Duration::from_secs(5)).await.unwrap();
        store.set("session:s", "{}", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        let keys = store.scan_prefix("rt:").await.unwrap();
        assert_eq!(keys, vec!["rt:a".to_string()]);
    }
}
