//! In-memory store used by tests across the crate.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::Mutex;

use super::{EntityStore, StoreError, TimetableQuery};
use crate::model::{
    Entity, EntityType, Lesson, Metadata, ScheduleType, Semester, TimetableData, WeekNumber,
};

pub(crate) fn sample_timetable(entity_type: EntityType, id: i64, name: &str) -> TimetableData {
    let mut lesson = Lesson::new(
        ScheduleType::Regular,
        NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        "Математика",
    );
    lesson.groups = vec![name.to_owned()];

    TimetableData {
        entity: Entity::new(entity_type, id, name),
        metadata: Metadata {
            years: "2024-2025".to_owned(),
            date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap_or_default(),
            week_number: WeekNumber::Odd,
            semester: Some(Semester::Autumn),
        },
        lessons: vec![lesson],
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    pub timetables: Vec<TimetableData>,
    pub subscriptions: Mutex<Vec<(i64, String)>>,
    pub entity_reads: AtomicUsize,
    pub timetable_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn with_entities(entities: &[(EntityType, i64, &str)]) -> Self {
        Self {
            timetables: entities
                .iter()
                .map(|&(entity_type, id, name)| sample_timetable(entity_type, id, name))
                .collect(),
            ..Self::default()
        }
    }

    pub fn groups(names: &[&str]) -> Self {
        let entities: Vec<_> = names
            .iter()
            .zip(1..)
            .map(|(&name, id)| (EntityType::Group, id, name))
            .collect();
        Self::with_entities(&entities)
    }

    pub fn entity_reads(&self) -> usize {
        self.entity_reads.load(Ordering::SeqCst)
    }

    pub fn timetable_reads(&self) -> usize {
        self.timetable_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_all_entities(&self) -> Result<Vec<Entity>, StoreError> {
        self.entity_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.timetables.iter().map(|t| t.entity.clone()).collect())
    }

    async fn get_timetable_by_query(
        &self,
        query: &TimetableQuery,
    ) -> Result<Option<TimetableData>, StoreError> {
        self.timetable_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.timetables.iter().find(|t| query.matches(t)).cloned())
    }

    async fn get_subscribed_users(&self, entity_name: &str) -> Result<Vec<i64>, StoreError> {
        let subscriptions = self.subscriptions.lock().await;
        Ok(subscriptions
            .iter()
            .filter(|(_, name)| name == entity_name)
            .map(|(user, _)| *user)
            .collect())
    }

    async fn user_subscribe(&self, user_id: i64, entity_name: &str) -> Result<bool, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        if !subscriptions
            .iter()
            .any(|(user, name)| *user == user_id && name == entity_name)
        {
            subscriptions.push((user_id, entity_name.to_owned()));
        }
        Ok(true)
    }

    async fn user_unsubscribe(
        &self,
        user_id: i64,
        entity_name: &str,
    ) -> Result<bool, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let before = subscriptions.len();
        subscriptions.retain(|(user, name)| !(*user == user_id && name == entity_name));
        Ok(subscriptions.len() != before)
    }

    async fn user_is_subscribed(
        &self,
        user_id: i64,
        entity_name: &str,
    ) -> Result<bool, StoreError> {
        let subscriptions = self.subscriptions.lock().await;
        Ok(subscriptions
            .iter()
            .any(|(user, name)| *user == user_id && name == entity_name))
    }
}
