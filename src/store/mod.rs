//! Entity store: timetables, entity lookup and subscriptions.
//!
//! The bot only talks to [`EntityStore`]; [`JsonEntityStore`] is the file
//! backed implementation and [`CachedStore`] adds a time-based read cache in
//! front of any store.

mod cache;
mod filter;
mod json;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Entity, EntityType, Semester, TimetableData, WeekNumber};

pub use cache::{CachedStore, DEFAULT_CACHE_TTL};
pub use filter::LessonFilter;
pub use json::{JsonEntityStore, Subscription};

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse store data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    Validation(String),
}

/// Read and subscription operations the bot needs from its backing store.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Every entity that has a timetable.
    async fn get_all_entities(&self) -> Result<Vec<Entity>, StoreError>;

    /// First timetable matching every field set on `query`.
    async fn get_timetable_by_query(
        &self,
        query: &TimetableQuery,
    ) -> Result<Option<TimetableData>, StoreError>;

    /// Entity whose name equals `name` exactly.
    async fn find_entity_by_name(&self, name: &str) -> Result<Option<Entity>, StoreError> {
        let query = TimetableQuery::new().entity_name(name);
        Ok(self
            .get_timetable_by_query(&query)
            .await?
            .map(|timetable| timetable.entity))
    }

    /// Telegram user ids subscribed to `entity_name`.
    async fn get_subscribed_users(&self, entity_name: &str) -> Result<Vec<i64>, StoreError>;

    /// Subscribes a user. Returns true when the subscription exists afterwards,
    /// including when it already existed.
    async fn user_subscribe(&self, user_id: i64, entity_name: &str) -> Result<bool, StoreError>;

    /// Removes a subscription. Returns false when there was none.
    async fn user_unsubscribe(&self, user_id: i64, entity_name: &str)
    -> Result<bool, StoreError>;

    async fn user_is_subscribed(&self, user_id: i64, entity_name: &str)
    -> Result<bool, StoreError>;
}

/// Timetable lookup criteria. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TimetableQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<i64>,
    pub entity_name: Option<String>,
    pub years: Option<String>,
    pub date: Option<NaiveDate>,
    pub week_number: Option<WeekNumber>,
    pub semester: Option<Semester>,
}

impl TimetableQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    #[must_use]
    pub const fn entity_id(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    #[must_use]
    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn years(mut self, years: impl Into<String>) -> Self {
        self.years = Some(years.into());
        self
    }

    #[must_use]
    pub const fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub const fn week_number(mut self, week_number: WeekNumber) -> Self {
        self.week_number = Some(week_number);
        self
    }

    #[must_use]
    pub const fn semester(mut self, semester: Semester) -> Self {
        self.semester = Some(semester);
        self
    }

    /// Returns true if `timetable` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, timetable: &TimetableData) -> bool {
        let entity = &timetable.entity;
        let metadata = &timetable.metadata;

        self.entity_type.is_none_or(|t| t == entity.entity_type)
            && self.entity_id.is_none_or(|id| id == entity.id)
            && self
                .entity_name
                .as_deref()
                .is_none_or(|name| name == entity.name)
            && self.years.as_deref().is_none_or(|years| years == metadata.years)
            && self.date.is_none_or(|date| date == metadata.date)
            && self
                .week_number
                .is_none_or(|week| week == metadata.week_number)
            && self.semester.is_none_or(|s| Some(s) == metadata.semester)
    }
}

#[cfg(test)]
mod tests {
    use super::memory::sample_timetable;
    use super::*;

    #[test]
    fn test_empty_query_matches_everything() {
        let timetable = sample_timetable(EntityType::Group, 1, "ИС-21");
        assert!(TimetableQuery::new().matches(&timetable));
    }

    #[test]
    fn test_query_requires_all_set_fields() {
        let timetable = sample_timetable(EntityType::Group, 1, "ИС-21");

        let query = TimetableQuery::new()
            .entity_type(EntityType::Group)
            .entity_name("ИС-21");
        assert!(query.matches(&timetable));

        let query = query.entity_id(2);
        assert!(!query.matches(&timetable));

        let query = TimetableQuery::new().semester(Semester::Spring);
        assert!(!query.matches(&timetable));
    }
}
