//! Dynamically typed values carried by [`FieldChange`](super::FieldChange).

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use super::enums::{
    ChangeType, DayName, EntityType, LessonType, ScheduleForm, ScheduleType, Subgroup, WeekNumber,
};
use super::types::{Entity, FieldChange, Lesson, LessonChange, TimetableChangeData};

/// A member of any known enumeration, resolved without a field type to guide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValue {
    ScheduleType(ScheduleType),
    ScheduleForm(ScheduleForm),
    WeekNumber(WeekNumber),
    DayName(DayName),
    LessonType(LessonType),
    Subgroup(Subgroup),
    EntityType(EntityType),
    ChangeType(ChangeType),
}

impl EnumValue {
    /// Tries each known enumeration in a fixed order and returns the first
    /// member whose wire string equals `raw`.
    #[must_use]
    pub fn resolve(raw: &str) -> Option<Self> {
        ScheduleType::from_wire(raw)
            .map(Self::ScheduleType)
            .or_else(|| ScheduleForm::from_wire(raw).map(Self::ScheduleForm))
            .or_else(|| WeekNumber::from_wire(raw).map(Self::WeekNumber))
            .or_else(|| DayName::from_wire(raw).map(Self::DayName))
            .or_else(|| LessonType::from_wire(raw).map(Self::LessonType))
            .or_else(|| Subgroup::from_wire(raw).map(Self::Subgroup))
            .or_else(|| EntityType::from_wire(raw).map(Self::EntityType))
            .or_else(|| ChangeType::from_wire(raw).map(Self::ChangeType))
    }

    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::ScheduleType(v) => v.as_wire(),
            Self::ScheduleForm(v) => v.as_wire(),
            Self::WeekNumber(v) => v.as_wire(),
            Self::DayName(v) => v.as_wire(),
            Self::LessonType(v) => v.as_wire(),
            Self::Subgroup(v) => v.as_wire(),
            Self::EntityType(v) => v.as_wire(),
            Self::ChangeType(v) => v.as_wire(),
        }
    }
}

/// One of the composite records the queue can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Lesson(Lesson),
    Entity(Entity),
    FieldChange(FieldChange),
    LessonChange(LessonChange),
    TimetableChange(TimetableChangeData),
}

/// Any value that may appear in an untyped position of a message.
///
/// Enum strings nobody recognises stay [`FieldValue::Text`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    Enum(EnumValue),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Duration(TimeDelta),
    Record(Box<Record>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<EnumValue> for FieldValue {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}
