use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::trace;

use super::models::{ClickEvent, Link, NewClickEvent};
use super::{ClickStore, LinkStore};
use crate::errors::Result;

/// Links keyed by code. Deleted codes are kept as tombstones and never
/// issued again, so click history can not attach to a later owner.
#[derive(Default)]
pub struct MemoryLinkStore {
    inner: DashMap<String, Link>,
    retired: DashSet<String>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn insert_new(&self, link: Link) -> Result<bool> {
        // entry() holds the shard lock, so the absence check and the insert are one step
        match self.inner.entry(link.code.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(_) if self.retired.contains(&link.code) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(link);
                Ok(true)
            }
        }
    }

    async fn get(&self, code: &str) -> Result<Option<Link>> {
        Ok(self.inner.get(code).map(|l| l.value().clone()))
    }

    async fn update(&self, link: Link) -> Result<bool> {
        match self.inner.get_mut(&link.code) {
            Some(mut existing) => {
                *existing = link;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, code: &str) -> Result<bool> {
        // tombstone while the shard is locked so insert_new can not slip in between
        match self.inner.entry(code.to_string()) {
            Entry::Occupied(slot) => {
                self.retired.insert(code.to_string());
                slot.remove();
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = self
            .inner
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();

        // newest first, code as tie-breaker for a stable order
        links.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(links)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.len())
    }
}

pub struct MemoryClickStore {
    events: DashMap<String, Vec<ClickEvent>>,
    next_id: AtomicU64,
}

impl MemoryClickStore {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryClickStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClickStore for MemoryClickStore {
    async fn append(&self, event: NewClickEvent) -> Result<ClickEvent> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stored = ClickEvent {
            id,
            code: event.code,
            timestamp: event.timestamp,
            metadata: event.metadata,
        };

        self.events
            .entry(stored.code.clone())
            .or_default()
            .push(stored.clone());

        trace!("MemoryClickStore: appended click #{} for '{}'", id, stored.code);
        Ok(stored)
    }

    async fn events_for(&self, code: &str) -> Result<Vec<ClickEvent>> {
        Ok(self
            .events
            .get(code)
            .map(|events| events.value().clone())
            .unwrap_or_default())
    }

    async fn count_for(&self, code: &str) -> Result<u64> {
        Ok(self
            .events
            .get(code)
            .map(|events| events.len() as u64)
            .unwrap_or(0))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.events.iter().map(|e| e.value().len()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn link(code: &str, owner: &str, age_secs: i64) -> Link {
        Link {
            code: code.to_string(),
            target_url: format!("https://example.com/{}", code),
            owner_id: owner.to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_new_rejects_taken_code() {
        let store = MemoryLinkStore::new();
        assert!(store.insert_new(link("abc", "alice", 0)).await.unwrap());
        assert!(!store.insert_new(link("abc", "bob", 0)).await.unwrap());

        let stored = store.get("abc").await.unwrap().unwrap();
        assert_eq!(stored.owner_id, "alice");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_same_code_have_one_winner() {
        let store = Arc::new(MemoryLinkStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_new(link("race", &format!("user{}", i), 0))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_by_owner_is_scoped_and_newest_first() {
        let store = MemoryLinkStore::new();
        store.insert_new(link("old", "alice", 100)).await.unwrap();
        store.insert_new(link("new", "alice", 1)).await.unwrap();
        store.insert_new(link("bobs", "bob", 0)).await.unwrap();

        let codes: Vec<String> = store
            .list_by_owner("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.code)
            .collect();
        assert_eq!(codes, vec!["new", "old"]);
    }

    #[test]
    fn test_update_and_remove_unknown_code() {
        let store = MemoryLinkStore::new();
        assert!(!tokio_test::block_on(store.update(link("ghost", "alice", 0))).unwrap());
        assert!(!tokio_test::block_on(store.remove("ghost")).unwrap());

        tokio_test::block_on(store.insert_new(link("real", "alice", 0))).unwrap();
        assert!(tokio_test::block_on(store.remove("real")).unwrap());
        assert!(tokio_test::block_on(store.get("real")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_removed_code_is_never_reissued() {
        let store = MemoryLinkStore::new();
        assert!(store.insert_new(link("promo", "alice", 0)).await.unwrap());
        assert!(store.remove("promo").await.unwrap());

        assert!(!store.insert_new(link("promo", "bob", 0)).await.unwrap());
        assert!(store.get("promo").await.unwrap().is_none());
        assert!(!store.remove("promo").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_click_ids_are_monotonic() {
        let store = MemoryClickStore::new();
        let mut last = 0;
        for code in ["a", "b", "a"] {
            let event = store
                .append(NewClickEvent {
                    code: code.to_string(),
                    timestamp: Utc::now(),
                    metadata: BTreeMap::new(),
                })
                .await
                .unwrap();
            assert!(event.id > last);
            last = event.id;
        }

        assert_eq!(store.count_for("a").await.unwrap(), 2);
        assert_eq!(store.count_for("missing").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 3);
    }
}
