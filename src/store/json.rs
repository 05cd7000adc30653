//! File-backed store: a JSON timetable snapshot plus a subscriptions file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{EntityStore, StoreError, TimetableQuery};
use crate::model::{Entity, TimetableData};

/// A user's subscription to one entity's change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub tg_id: i64,
    pub entity_name: String,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    fn is_for(&self, user_id: i64, entity_name: &str) -> bool {
        self.tg_id == user_id && self.entity_name == entity_name
    }
}

/// Store that serves timetables from a snapshot loaded at start-up.
///
/// Subscriptions are written back to their file on every change.
#[derive(Debug)]
pub struct JsonEntityStore {
    timetables: Vec<TimetableData>,
    subscriptions_path: PathBuf,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl JsonEntityStore {
    /// Loads the timetable snapshot and any existing subscriptions.
    ///
    /// A missing subscriptions file starts with no subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or parsed, or if any
    /// entity in it is invalid.
    pub async fn load(
        store_path: impl AsRef<Path>,
        subscriptions_path: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let store_path = store_path.as_ref();
        let raw = tokio::fs::read_to_string(store_path).await?;
        let timetables: Vec<TimetableData> = serde_json::from_str(&raw)?;

        let subscriptions_path = subscriptions_path.into();
        let subscriptions = match tokio::fs::read_to_string(&subscriptions_path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No subscriptions file at {}, starting empty",
                    subscriptions_path.display()
                );
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let store = Self::new(timetables, subscriptions_path, subscriptions)?;
        info!(
            "Loaded {} timetables and {} subscriptions from {}",
            store.timetables.len(),
            store.subscriptions.read().await.len(),
            store_path.display()
        );
        Ok(store)
    }

    /// Builds a store from already parsed data.
    ///
    /// Repeated (user, entity) subscriptions are collapsed into the first one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an entity with a non-positive id
    /// or an empty name, or for a duplicate (type, id) pair.
    pub fn new(
        timetables: Vec<TimetableData>,
        subscriptions_path: impl Into<PathBuf>,
        subscriptions: Vec<Subscription>,
    ) -> Result<Self, StoreError> {
        validate(&timetables)?;
        Ok(Self {
            timetables,
            subscriptions_path: subscriptions_path.into(),
            subscriptions: RwLock::new(unique_subscriptions(subscriptions)),
        })
    }

    async fn save(&self, subscriptions: &[Subscription]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(subscriptions)?;
        tokio::fs::write(&self.subscriptions_path, json).await?;
        Ok(())
    }
}

fn unique_subscriptions(subscriptions: Vec<Subscription>) -> Vec<Subscription> {
    let total = subscriptions.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<Subscription> = subscriptions
        .into_iter()
        .filter(|s| seen.insert((s.tg_id, s.entity_name.clone())))
        .collect();

    if unique.len() < total {
        warn!("Dropped {} duplicate subscription(s)", total - unique.len());
    }
    unique
}

fn validate(timetables: &[TimetableData]) -> Result<(), StoreError> {
    let mut seen = HashSet::with_capacity(timetables.len());

    for timetable in timetables {
        let entity = &timetable.entity;
        if entity.id <= 0 {
            return Err(StoreError::Validation(format!(
                "{} '{}' has non-positive id {}",
                entity.entity_type, entity.name, entity.id
            )));
        }
        if entity.name.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "{} {} has an empty name",
                entity.entity_type, entity.id
            )));
        }
        if !seen.insert((entity.entity_type, entity.id)) {
            return Err(StoreError::Validation(format!(
                "duplicate {} id {}",
                entity.entity_type, entity.id
            )));
        }
    }

    Ok(())
}

#[async_trait]
impl EntityStore for JsonEntityStore {
    async fn get_all_entities(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self
            .timetables
            .iter()
            .map(|timetable| timetable.entity.clone())
            .collect())
    }

    async fn get_timetable_by_query(
        &self,
        query: &TimetableQuery,
    ) -> Result<Option<TimetableData>, StoreError> {
        Ok(self
            .timetables
            .iter()
            .find(|timetable| query.matches(timetable))
            .cloned())
    }

    async fn get_subscribed_users(&self, entity_name: &str) -> Result<Vec<i64>, StoreError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .iter()
            .filter(|s| s.entity_name == entity_name)
            .map(|s| s.tg_id)
            .collect())
    }

    async fn user_subscribe(&self, user_id: i64, entity_name: &str) -> Result<bool, StoreError> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.iter().any(|s| s.is_for(user_id, entity_name)) {
            return Ok(true);
        }

        subscriptions.push(Subscription {
            tg_id: user_id,
            entity_name: entity_name.to_owned(),
            created_at: Utc::now(),
        });
        if let Err(e) = self.save(&subscriptions).await {
            subscriptions.pop();
            return Err(e);
        }

        debug!("User {} subscribed to {}", user_id, entity_name);
        Ok(true)
    }

    async fn user_unsubscribe(
        &self,
        user_id: i64,
        entity_name: &str,
    ) -> Result<bool, StoreError> {
        let mut subscriptions = self.subscriptions.write().await;
        let Some(index) = subscriptions
            .iter()
            .position(|s| s.is_for(user_id, entity_name))
        else {
            return Ok(false);
        };

        let removed = subscriptions.remove(index);
        if let Err(e) = self.save(&subscriptions).await {
            subscriptions.insert(index, removed);
            return Err(e);
        }

        debug!("User {} unsubscribed from {}", user_id, entity_name);
        Ok(true)
    }

    async fn user_is_subscribed(
        &self,
        user_id: i64,
        entity_name: &str,
    ) -> Result<bool, StoreError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.iter().any(|s| s.is_for(user_id, entity_name)))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::model::EntityType;
    use crate::store::memory::sample_timetable;

    fn write_snapshot(dir: &TempDir, timetables: &[TimetableData]) -> PathBuf {
        let path = dir.path().join("timetables.json");
        std::fs::write(&path, serde_json::to_string(timetables).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_snapshot_without_subscriptions() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            &dir,
            &[
                sample_timetable(EntityType::Group, 1, "ИС-21"),
                sample_timetable(EntityType::Professor, 1, "Иванов И. И."),
            ],
        );

        let store = JsonEntityStore::load(&path, dir.path().join("subscriptions.json"))
            .await
            .unwrap();
        assert_eq!(store.get_all_entities().await.unwrap().len(), 2);
        assert!(store.get_subscribed_users("ИС-21").await.unwrap().is_empty());

        let entity = store.find_entity_by_name("Иванов И. И.").await.unwrap();
        assert_eq!(entity.map(|e| e.entity_type), Some(EntityType::Professor));
        assert!(store.find_entity_by_name("иванов").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscriptions_persist_between_loads() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(&dir, &[sample_timetable(EntityType::Group, 1, "ИС-21")]);
        let subs_path = dir.path().join("subscriptions.json");

        let store = JsonEntityStore::load(&path, &subs_path).await.unwrap();
        assert!(store.user_subscribe(111, "ИС-21").await.unwrap());
        assert!(store.user_subscribe(111, "ИС-21").await.unwrap());
        assert!(store.user_subscribe(222, "ИС-21").await.unwrap());

        let reloaded = JsonEntityStore::load(&path, &subs_path).await.unwrap();
        assert_eq!(
            reloaded.get_subscribed_users("ИС-21").await.unwrap(),
            vec![111, 222]
        );
        assert!(reloaded.user_is_subscribed(222, "ИС-21").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_subscriptions_are_collapsed() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(&dir, &[sample_timetable(EntityType::Group, 1, "ИС-21")]);
        let subs_path = dir.path().join("subscriptions.json");
        let row = |tg_id| Subscription {
            tg_id,
            entity_name: "ИС-21".to_owned(),
            created_at: Utc::now(),
        };
        let rows = vec![row(111), row(222), row(111)];
        std::fs::write(&subs_path, serde_json::to_string(&rows).unwrap()).unwrap();

        let store = JsonEntityStore::load(&path, &subs_path).await.unwrap();
        assert_eq!(
            store.get_subscribed_users("ИС-21").await.unwrap(),
            vec![111, 222]
        );

        assert!(store.user_unsubscribe(111, "ИС-21").await.unwrap());
        assert!(!store.user_is_subscribed(111, "ИС-21").await.unwrap());
    }

    #[tokio::test]
    async fn test_unsubscribe_missing_is_false() {
        let dir = TempDir::new().unwrap();
        let store =
            JsonEntityStore::new(Vec::new(), dir.path().join("s.json"), Vec::new()).unwrap();

        assert!(!store.user_unsubscribe(111, "ИС-21").await.unwrap());
        store.user_subscribe(111, "ИС-21").await.unwrap();
        assert!(store.user_unsubscribe(111, "ИС-21").await.unwrap());
        assert!(!store.user_is_subscribed(111, "ИС-21").await.unwrap());
    }

    #[test]
    fn test_validation_rejects_bad_entities() {
        let dir = TempDir::new().unwrap();
        let subs = dir.path().join("s.json");

        let bad_id = sample_timetable(EntityType::Group, 0, "ИС-21");
        assert!(matches!(
            JsonEntityStore::new(vec![bad_id], &subs, Vec::new()),
            Err(StoreError::Validation(_))
        ));

        let empty_name = sample_timetable(EntityType::Group, 1, " ");
        assert!(matches!(
            JsonEntityStore::new(vec![empty_name], &subs, Vec::new()),
            Err(StoreError::Validation(_))
        ));

        let duplicate = vec![
            sample_timetable(EntityType::Group, 1, "ИС-21"),
            sample_timetable(EntityType::Group, 1, "ИС-22"),
        ];
        assert!(matches!(
            JsonEntityStore::new(duplicate, &subs, Vec::new()),
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_snapshot_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timetables.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonEntityStore::load(&path, dir.path().join("s.json")).await;
        assert!(matches!(result, Err(StoreError::Parse(_))));
    }
}
