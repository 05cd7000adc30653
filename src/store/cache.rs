//! Time-based read cache in front of an [`EntityStore`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{EntityStore, StoreError, TimetableQuery};
use crate::model::{Entity, TimetableData};

/// Default lifetime of a cached read: six hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(21_600);

#[derive(Debug)]
struct Cached<T> {
    stored_at: Instant,
    value: T,
}

impl<T: Clone> Cached<T> {
    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.stored_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Caches entity listings and timetable lookups for a fixed TTL.
///
/// Lookups that find nothing are not cached. Subscription calls always go to
/// the wrapped store.
pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    entities: Mutex<Option<Cached<Vec<Entity>>>>,
    timetables: Mutex<HashMap<TimetableQuery, Cached<TimetableData>>>,
}

impl<S: EntityStore> CachedStore<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            ttl: DEFAULT_CACHE_TTL,
            entities: Mutex::new(None),
            timetables: Mutex::new(HashMap::new()),
        }
    }

    /// Sets how long a cached read stays valid.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Drops every cached read.
    pub async fn invalidate(&self) {
        *self.entities.lock().await = None;
        self.timetables.lock().await.clear();
        debug!("Store cache invalidated");
    }

    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: EntityStore> EntityStore for CachedStore<S> {
    async fn get_all_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let mut cached = self.entities.lock().await;
        if let Some(entities) = cached.as_ref().and_then(|c| c.fresh(self.ttl)) {
            debug!("Cache hit: all entities");
            return Ok(entities);
        }

        debug!("Cache miss: all entities");
        let entities = self.inner.get_all_entities().await?;
        *cached = Some(Cached {
            stored_at: Instant::now(),
            value: entities.clone(),
        });
        Ok(entities)
    }

    async fn get_timetable_by_query(
        &self,
        query: &TimetableQuery,
    ) -> Result<Option<TimetableData>, StoreError> {
        if let Some(timetable) = self
            .timetables
            .lock()
            .await
            .get(query)
            .and_then(|c| c.fresh(self.ttl))
        {
            debug!("Cache hit: {:?}", query);
            return Ok(Some(timetable));
        }

        debug!("Cache miss: {:?}", query);
        let timetable = self.inner.get_timetable_by_query(query).await?;
        if let Some(ref found) = timetable {
            self.timetables.lock().await.insert(
                query.clone(),
                Cached {
                    stored_at: Instant::now(),
                    value: found.clone(),
                },
            );
        }
        Ok(timetable)
    }

    async fn get_subscribed_users(&self, entity_name: &str) -> Result<Vec<i64>, StoreError> {
        self.inner.get_subscribed_users(entity_name).await
    }

    async fn user_subscribe(&self, user_id: i64, entity_name: &str) -> Result<bool, StoreError> {
        self.inner.user_subscribe(user_id, entity_name).await
    }

    async fn user_unsubscribe(
        &self,
        user_id: i64,
        entity_name: &str,
    ) -> Result<bool, StoreError> {
        self.inner.user_unsubscribe(user_id, entity_name).await
    }

    async fn user_is_subscribed(
        &self,
        user_id: i64,
        entity_name: &str,
    ) -> Result<bool, StoreError> {
        self.inner.user_is_subscribed(user_id, entity_name).await
    }
}

impl<S> std::fmt::Debug for CachedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_second_read_served_from_cache() {
        let store = CachedStore::new(MemoryStore::groups(&["ИС-21", "ИС-22"]));

        assert_eq!(store.get_all_entities().await.unwrap().len(), 2);
        assert_eq!(store.get_all_entities().await.unwrap().len(), 2);
        assert_eq!(store.inner().entity_reads(), 1);

        let query = TimetableQuery::new().entity_name("ИС-21");
        assert!(store.get_timetable_by_query(&query).await.unwrap().is_some());
        assert!(store.get_timetable_by_query(&query).await.unwrap().is_some());
        assert_eq!(store.inner().timetable_reads(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = CachedStore::new(MemoryStore::groups(&["ИС-21"]));

        store.get_all_entities().await.unwrap();
        store.invalidate().await;
        store.get_all_entities().await.unwrap();
        assert_eq!(store.inner().entity_reads(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let store = CachedStore::new(MemoryStore::groups(&["ИС-21"])).with_ttl(Duration::ZERO);

        store.get_all_entities().await.unwrap();
        store.get_all_entities().await.unwrap();
        assert_eq!(store.inner().entity_reads(), 2);
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let store = CachedStore::new(MemoryStore::groups(&["ИС-21"]));
        let query = TimetableQuery::new().entity_name("нет такой");

        assert!(store.get_timetable_by_query(&query).await.unwrap().is_none());
        assert!(store.get_timetable_by_query(&query).await.unwrap().is_none());
        assert_eq!(store.inner().timetable_reads(), 2);
    }

    #[tokio::test]
    async fn test_subscriptions_pass_through() {
        let store = CachedStore::new(MemoryStore::groups(&["ИС-21"]));
        store.user_subscribe(7, "ИС-21").await.unwrap();
        assert_eq!(store.get_subscribed_users("ИС-21").await.unwrap(), vec![7]);
        assert!(store.inner().user_is_subscribed(7, "ИС-21").await.unwrap());
    }
}
