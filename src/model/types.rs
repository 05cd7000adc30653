//! Timetable records: entities, lessons and change events.

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use super::enums::{
    ChangeType, DayName, EntityType, LessonType, ScheduleForm, ScheduleType, Semester, Subgroup,
    WeekNumber,
};
use super::value::FieldValue;

/// A group, professor or auditorium that owns a timetable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub id: i64,
    pub name: String,
}

impl Entity {
    #[must_use]
    pub fn new(entity_type: EntityType, id: i64, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            id,
            name: name.into(),
        }
    }
}

/// One scheduled class: either a one-off (`day_date` set) or a slot recurring
/// on `week_number` / `day_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub schedule_type: ScheduleType,
    pub time_begin: NaiveTime,
    pub lesson_name: String,
    #[serde(default)]
    pub schedule_form: Option<ScheduleForm>,
    #[serde(default)]
    pub week_number: Option<WeekNumber>,
    #[serde(default)]
    pub day_name: Option<DayName>,
    #[serde(default)]
    pub day_date: Option<NaiveDate>,
    #[serde(default, with = "duration_secs")]
    pub duration: Option<TimeDelta>,
    #[serde(default)]
    pub lesson_type: Option<LessonType>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub professors: Vec<String>,
    #[serde(default)]
    pub auditorium: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "subgroups")]
    pub subgroup: Subgroup,
}

impl Lesson {
    /// Creates a lesson with only the mandatory fields set.
    #[must_use]
    pub fn new(
        schedule_type: ScheduleType,
        time_begin: NaiveTime,
        lesson_name: impl Into<String>,
    ) -> Self {
        Self {
            schedule_type,
            time_begin,
            lesson_name: lesson_name.into(),
            schedule_form: None,
            week_number: None,
            day_name: None,
            day_date: None,
            duration: None,
            lesson_type: None,
            groups: Vec::new(),
            professors: Vec::new(),
            auditorium: None,
            location: None,
            subgroup: Subgroup::Common,
        }
    }

    /// Returns true for a lesson that happens once on `day_date`.
    #[must_use]
    pub const fn is_one_off(&self) -> bool {
        self.day_date.is_some()
    }
}

/// Generic named-field diff, used for timetable metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field_name: String,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonChange {
    pub change_type: ChangeType,
    pub old_lesson: Option<Lesson>,
    pub new_lesson: Option<Lesson>,
}

impl LessonChange {
    #[must_use]
    pub const fn added(lesson: Lesson) -> Self {
        Self {
            change_type: ChangeType::Added,
            old_lesson: None,
            new_lesson: Some(lesson),
        }
    }

    #[must_use]
    pub const fn removed(lesson: Lesson) -> Self {
        Self {
            change_type: ChangeType::Removed,
            old_lesson: Some(lesson),
            new_lesson: None,
        }
    }

    #[must_use]
    pub const fn modified(old: Lesson, new: Lesson) -> Self {
        Self {
            change_type: ChangeType::Modified,
            old_lesson: Some(old),
            new_lesson: Some(new),
        }
    }
}

/// Everything the scraper detected for one entity in one diff cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TimetableChangeData {
    pub entity: Entity,
    pub metadata_changes: Option<Vec<FieldChange>>,
    pub lesson_changes: Option<Vec<LessonChange>>,
}

impl TimetableChangeData {
    /// Lesson changes, or an empty slice when the field is absent.
    #[must_use]
    pub fn lesson_changes(&self) -> &[LessonChange] {
        self.lesson_changes.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub years: String,
    pub date: NaiveDate,
    pub week_number: WeekNumber,
    #[serde(default)]
    pub semester: Option<Semester>,
}

/// A full timetable as kept by the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableData {
    pub entity: Entity,
    pub metadata: Metadata,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

/// Serializes an optional duration as whole seconds.
mod duration_secs {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<TimeDelta>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<TimeDelta>, D::Error> {
        let secs = Option::<i64>::deserialize(deserializer)?;
        Ok(secs.map(TimeDelta::seconds))
    }
}
