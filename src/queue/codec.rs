//! Tagged JSON codec for queue messages.
//!
//! Every non-primitive value is wrapped in a single-key object whose key names
//! its wire shape:
//!
//! | value            | wire form                                  |
//! |------------------|--------------------------------------------|
//! | enum member      | `{"__enum__": "Лекция"}`                   |
//! | date / datetime  | `{"__datetime__": "2024-09-02"}`           |
//! | time of day      | `{"__time__": "08:00:00"}`                 |
//! | duration         | `{"__timedelta__": 5400.0}`                |
//! | record           | `{"__lesson__": {...}}`, `{"__entity__": {...}}`, ... |
//!
//! Decoding walks tags depth-first: nested records and lists of records are
//! rebuilt before the record that contains them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::model::{
    ChangeType, Entity, EntityType, EnumValue, FieldChange, FieldValue, Lesson, LessonChange,
    Record, ScheduleType, Subgroup, TimetableChangeData, WireEnum,
};

/// Errors produced while encoding or decoding a message body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field '{field}' in {record}")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("Expected {expected}, found {found}")]
    WrongShape {
        expected: &'static str,
        found: String,
    },

    #[error("Unknown {name} value: {value:?}")]
    UnknownEnum { name: &'static str, value: String },

    #[error("Invalid {kind} value: {value:?}")]
    InvalidTemporal { kind: &'static str, value: String },
}

/// Wire discriminators, one per tagged shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Enum,
    DateTime,
    Time,
    TimeDelta,
    Lesson,
    Entity,
    FieldChange,
    LessonChange,
    TimetableChangeData,
}

impl Tag {
    /// Lookup order used when an object is inspected for a tag.
    pub const ALL: [Self; 9] = [
        Self::Enum,
        Self::DateTime,
        Self::Time,
        Self::TimeDelta,
        Self::Lesson,
        Self::Entity,
        Self::FieldChange,
        Self::LessonChange,
        Self::TimetableChangeData,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Enum => "__enum__",
            Self::DateTime => "__datetime__",
            Self::Time => "__time__",
            Self::TimeDelta => "__timedelta__",
            Self::Lesson => "__lesson__",
            Self::Entity => "__entity__",
            Self::FieldChange => "__fieldchange__",
            Self::LessonChange => "__lessonchange__",
            Self::TimetableChangeData => "__timetablechangedata__",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.key() == key)
    }

    /// Finds the first tag present in an object, following [`Tag::ALL`].
    fn find_in(object: &Map<String, Value>) -> Option<(Self, &Value)> {
        Self::ALL
            .into_iter()
            .find_map(|tag| object.get(tag.key()).map(|inner| (tag, inner)))
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serializes a change event into a message body.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode(change: &TimetableChangeData) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(&timetable_change_to_wire(change))?)
}

fn tagged(tag: Tag, inner: Value) -> Value {
    let mut object = Map::with_capacity(1);
    object.insert(tag.key().to_owned(), inner);
    Value::Object(object)
}

fn enum_to_wire<E: WireEnum>(value: E) -> Value {
    tagged(Tag::Enum, Value::String(value.as_wire().to_owned()))
}

fn optional<T>(value: Option<T>, encode: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, encode)
}

fn date_to_wire(date: NaiveDate) -> Value {
    tagged(Tag::DateTime, Value::String(date.format("%Y-%m-%d").to_string()))
}

fn datetime_to_wire(datetime: NaiveDateTime) -> Value {
    tagged(
        Tag::DateTime,
        Value::String(datetime.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    )
}

fn time_to_wire(time: NaiveTime) -> Value {
    tagged(Tag::Time, Value::String(time.format("%H:%M:%S%.f").to_string()))
}

#[allow(clippy::cast_precision_loss)]
fn duration_to_wire(duration: TimeDelta) -> Value {
    let seconds = duration.num_milliseconds() as f64 / 1000.0;
    tagged(Tag::TimeDelta, json!(seconds))
}

fn strings_to_wire(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

fn lesson_to_wire(lesson: &Lesson) -> Value {
    tagged(
        Tag::Lesson,
        json!({
            "schedule_type": enum_to_wire(lesson.schedule_type),
            "time_begin": time_to_wire(lesson.time_begin),
            "lesson_name": lesson.lesson_name,
            "schedule_form": optional(lesson.schedule_form, enum_to_wire),
            "week_number": optional(lesson.week_number, enum_to_wire),
            "day_name": optional(lesson.day_name, enum_to_wire),
            "day_date": optional(lesson.day_date, date_to_wire),
            "duration": optional(lesson.duration, duration_to_wire),
            "lesson_type": optional(lesson.lesson_type, enum_to_wire),
            "groups": strings_to_wire(&lesson.groups),
            "professors": strings_to_wire(&lesson.professors),
            "auditorium": lesson.auditorium,
            "location": lesson.location,
            "subgroups": enum_to_wire(lesson.subgroup),
        }),
    )
}

fn entity_to_wire(entity: &Entity) -> Value {
    tagged(
        Tag::Entity,
        json!({
            "type": enum_to_wire(entity.entity_type),
            "id": entity.id,
            "name": entity.name,
        }),
    )
}

fn field_change_to_wire(change: &FieldChange) -> Value {
    tagged(
        Tag::FieldChange,
        json!({
            "field_name": change.field_name,
            "old_value": value_to_wire(&change.old_value),
            "new_value": value_to_wire(&change.new_value),
        }),
    )
}

fn lesson_change_to_wire(change: &LessonChange) -> Value {
    tagged(
        Tag::LessonChange,
        json!({
            "change_type": enum_to_wire(change.change_type),
            "old_lesson": optional(change.old_lesson.as_ref(), lesson_to_wire),
            "new_lesson": optional(change.new_lesson.as_ref(), lesson_to_wire),
        }),
    )
}

fn timetable_change_to_wire(change: &TimetableChangeData) -> Value {
    let metadata_changes = change
        .metadata_changes
        .as_ref()
        .map(|items| items.iter().map(field_change_to_wire).collect::<Vec<_>>());
    let lesson_changes = change
        .lesson_changes
        .as_ref()
        .map(|items| items.iter().map(lesson_change_to_wire).collect::<Vec<_>>());

    tagged(
        Tag::TimetableChangeData,
        json!({
            "entity": entity_to_wire(&change.entity),
            "metadata_changes": metadata_changes,
            "lesson_changes": lesson_changes,
        }),
    )
}

fn record_to_wire(record: &Record) -> Value {
    match record {
        Record::Lesson(lesson) => lesson_to_wire(lesson),
        Record::Entity(entity) => entity_to_wire(entity),
        Record::FieldChange(change) => field_change_to_wire(change),
        Record::LessonChange(change) => lesson_change_to_wire(change),
        Record::TimetableChange(change) => timetable_change_to_wire(change),
    }
}

/// Encodes an untyped value.
#[must_use]
pub fn value_to_wire(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(flag) => Value::Bool(*flag),
        FieldValue::Number(number) => Value::Number(number.clone()),
        FieldValue::Text(text) => Value::String(text.clone()),
        FieldValue::List(items) => Value::Array(items.iter().map(value_to_wire).collect()),
        FieldValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), value_to_wire(item)))
                .collect(),
        ),
        FieldValue::Enum(member) => tagged(Tag::Enum, Value::String(member.as_wire().to_owned())),
        FieldValue::Date(date) => date_to_wire(*date),
        FieldValue::DateTime(datetime) => datetime_to_wire(*datetime),
        FieldValue::Time(time) => time_to_wire(*time),
        FieldValue::Duration(duration) => duration_to_wire(*duration),
        FieldValue::Record(record) => record_to_wire(record),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Parses a message body into a change event.
///
/// # Errors
///
/// Returns an error for invalid JSON, for a body that is not a tagged
/// timetable change, and for any malformed record inside it.
pub fn decode(body: &[u8]) -> Result<TimetableChangeData, CodecError> {
    let value: Value = serde_json::from_slice(body)?;
    decode_value(&value)
}

/// Decodes an already parsed wire value into a change event.
///
/// # Errors
///
/// Same as [`decode`], minus JSON syntax errors.
pub fn decode_value(value: &Value) -> Result<TimetableChangeData, CodecError> {
    match value_from_wire(value)? {
        FieldValue::Record(record) => match *record {
            Record::TimetableChange(change) => Ok(change),
            other => Err(wrong_shape("timetable change", &other)),
        },
        other => Err(wrong_shape("timetable change", &other)),
    }
}

/// Decodes any wire value, rebuilding tagged shapes wherever they appear.
///
/// # Errors
///
/// Returns an error if a tagged shape is malformed.
pub fn value_from_wire(value: &Value) -> Result<FieldValue, CodecError> {
    Ok(match value {
        Value::Null => FieldValue::Null,
        Value::Bool(flag) => FieldValue::Bool(*flag),
        Value::Number(number) => FieldValue::Number(number.clone()),
        Value::String(text) => FieldValue::Text(text.clone()),
        Value::Array(items) => FieldValue::List(
            items
                .iter()
                .map(value_from_wire)
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(object) => match Tag::find_in(object) {
            Some((tag, inner)) => tagged_from_wire(tag, inner)?,
            None => FieldValue::Map(
                object
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), value_from_wire(item)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
        },
    })
}

fn tagged_from_wire(tag: Tag, inner: &Value) -> Result<FieldValue, CodecError> {
    Ok(match tag {
        Tag::Enum => match inner {
            Value::String(raw) => {
                EnumValue::resolve(raw)
                    .map_or_else(|| FieldValue::Text(raw.clone()), FieldValue::Enum)
            }
            other => value_from_wire(other)?,
        },
        Tag::DateTime => {
            let raw = as_str(inner, "ISO date")?;
            match parse_date(raw) {
                Some(date) => FieldValue::Date(date),
                None => FieldValue::DateTime(parse_datetime(raw)?),
            }
        }
        Tag::Time => FieldValue::Time(parse_time(as_str(inner, "ISO time")?)?),
        Tag::TimeDelta => FieldValue::Duration(parse_seconds(inner)?),
        Tag::Lesson => record(Record::Lesson(lesson_from_fields(as_object(inner)?)?)),
        Tag::Entity => record(Record::Entity(entity_from_fields(as_object(inner)?)?)),
        Tag::FieldChange => record(Record::FieldChange(field_change_from_fields(as_object(
            inner,
        )?)?)),
        Tag::LessonChange => record(Record::LessonChange(lesson_change_from_fields(
            as_object(inner)?,
        )?)),
        Tag::TimetableChangeData => record(Record::TimetableChange(
            timetable_change_from_fields(as_object(inner)?)?,
        )),
    })
}

fn record(record: Record) -> FieldValue {
    FieldValue::Record(Box::new(record))
}

fn lesson_from_fields(fields: &Map<String, Value>) -> Result<Lesson, CodecError> {
    const RECORD: &str = "lesson";

    let schedule_type: ScheduleType = required(fields, RECORD, "schedule_type", enum_from_wire)?;
    let time_begin = required(fields, RECORD, "time_begin", time_from_wire)?;
    let lesson_name = required(fields, RECORD, "lesson_name", |v| {
        as_str(v, "string").map(str::to_owned)
    })?;

    let mut lesson = Lesson::new(schedule_type, time_begin, lesson_name);
    lesson.schedule_form = optional_field(fields, "schedule_form", enum_from_wire)?;
    lesson.week_number = optional_field(fields, "week_number", enum_from_wire)?;
    lesson.day_name = optional_field(fields, "day_name", enum_from_wire)?;
    lesson.day_date = optional_field(fields, "day_date", date_from_wire)?;
    lesson.duration = optional_field(fields, "duration", duration_from_wire)?;
    lesson.lesson_type = optional_field(fields, "lesson_type", enum_from_wire)?;
    lesson.groups = optional_field(fields, "groups", strings_from_wire)?.unwrap_or_default();
    lesson.professors =
        optional_field(fields, "professors", strings_from_wire)?.unwrap_or_default();
    lesson.auditorium = optional_field(fields, "auditorium", non_empty_string)?.flatten();
    lesson.location = optional_field(fields, "location", non_empty_string)?.flatten();
    lesson.subgroup =
        optional_field::<Subgroup>(fields, "subgroups", enum_from_wire)?.unwrap_or_default();
    Ok(lesson)
}

fn entity_from_fields(fields: &Map<String, Value>) -> Result<Entity, CodecError> {
    const RECORD: &str = "entity";

    let entity_type: EntityType = required(fields, RECORD, "type", enum_from_wire)?;
    let id = required(fields, RECORD, "id", |v| {
        v.as_i64().ok_or_else(|| shape("integer", v))
    })?;
    let name = optional_field(fields, "name", |v| as_str(v, "string").map(str::to_owned))?
        .unwrap_or_default();
    Ok(Entity::new(entity_type, id, name))
}

fn field_change_from_fields(fields: &Map<String, Value>) -> Result<FieldChange, CodecError> {
    let field_name = required(fields, "field change", "field_name", |v| {
        as_str(v, "string").map(str::to_owned)
    })?;
    let old_value = fields.get("old_value").map_or(Ok(FieldValue::Null), value_from_wire)?;
    let new_value = fields.get("new_value").map_or(Ok(FieldValue::Null), value_from_wire)?;
    Ok(FieldChange {
        field_name,
        old_value,
        new_value,
    })
}

fn lesson_change_from_fields(fields: &Map<String, Value>) -> Result<LessonChange, CodecError> {
    let change_type: ChangeType = required(fields, "lesson change", "change_type", enum_from_wire)?;
    Ok(LessonChange {
        change_type,
        old_lesson: optional_field(fields, "old_lesson", lesson_from_wire)?,
        new_lesson: optional_field(fields, "new_lesson", lesson_from_wire)?,
    })
}

fn timetable_change_from_fields(
    fields: &Map<String, Value>,
) -> Result<TimetableChangeData, CodecError> {
    let entity = required(fields, "timetable change", "entity", |v| {
        match value_from_wire(v)? {
            FieldValue::Record(record) => match *record {
                Record::Entity(entity) => Ok(entity),
                other => Err(wrong_shape("entity", &other)),
            },
            other => Err(wrong_shape("entity", &other)),
        }
    })?;

    let metadata_changes = optional_field(fields, "metadata_changes", |v| {
        list_of(v, |item| match value_from_wire(item)? {
            FieldValue::Record(record) => match *record {
                Record::FieldChange(change) => Ok(change),
                other => Err(wrong_shape("field change", &other)),
            },
            other => Err(wrong_shape("field change", &other)),
        })
    })?;

    let lesson_changes = optional_field(fields, "lesson_changes", |v| {
        list_of(v, |item| match value_from_wire(item)? {
            FieldValue::Record(record) => match *record {
                Record::LessonChange(change) => Ok(change),
                other => Err(wrong_shape("lesson change", &other)),
            },
            other => Err(wrong_shape("lesson change", &other)),
        })
    })?;

    Ok(TimetableChangeData {
        entity,
        metadata_changes,
        lesson_changes,
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn required<T>(
    fields: &Map<String, Value>,
    record: &'static str,
    field: &'static str,
    decode: impl FnOnce(&Value) -> Result<T, CodecError>,
) -> Result<T, CodecError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(CodecError::MissingField { record, field }),
        Some(value) => decode(value),
    }
}

fn optional_field<T>(
    fields: &Map<String, Value>,
    field: &str,
    decode: impl FnOnce(&Value) -> Result<T, CodecError>,
) -> Result<Option<T>, CodecError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode(value).map(Some),
    }
}

/// Unwraps a tag if present, otherwise returns the value itself.
fn untag(value: &Value, tag: Tag) -> &Value {
    value
        .as_object()
        .and_then(|object| object.get(tag.key()))
        .unwrap_or(value)
}

/// Decodes an enum for a typed field, matching only that field's members.
fn enum_from_wire<E: WireEnum>(value: &Value) -> Result<E, CodecError> {
    let raw = as_str(untag(value, Tag::Enum), "enum string")?;
    E::from_wire(raw).ok_or_else(|| CodecError::UnknownEnum {
        name: E::NAME,
        value: raw.to_owned(),
    })
}

fn time_from_wire(value: &Value) -> Result<NaiveTime, CodecError> {
    parse_time(as_str(untag(value, Tag::Time), "ISO time")?)
}

fn date_from_wire(value: &Value) -> Result<NaiveDate, CodecError> {
    let raw = as_str(untag(value, Tag::DateTime), "ISO date")?;
    match parse_date(raw) {
        Some(date) => Ok(date),
        None => parse_datetime(raw).map(|datetime| datetime.date()),
    }
}

fn duration_from_wire(value: &Value) -> Result<TimeDelta, CodecError> {
    parse_seconds(untag(value, Tag::TimeDelta))
}

fn lesson_from_wire(value: &Value) -> Result<Lesson, CodecError> {
    match value_from_wire(value)? {
        FieldValue::Record(record) => match *record {
            Record::Lesson(lesson) => Ok(lesson),
            other => Err(wrong_shape("lesson", &other)),
        },
        other => Err(wrong_shape("lesson", &other)),
    }
}

fn strings_from_wire(value: &Value) -> Result<Vec<String>, CodecError> {
    list_of(value, |item| as_str(item, "string").map(str::to_owned))
}

fn non_empty_string(value: &Value) -> Result<Option<String>, CodecError> {
    let text = as_str(value, "string")?;
    Ok((!text.is_empty()).then(|| text.to_owned()))
}

fn list_of<T>(
    value: &Value,
    decode: impl Fn(&Value) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    value
        .as_array()
        .ok_or_else(|| shape("list", value))?
        .iter()
        .map(decode)
        .collect()
}

fn as_str<'a>(value: &'a Value, expected: &'static str) -> Result<&'a str, CodecError> {
    value.as_str().ok_or_else(|| shape(expected, value))
}

fn as_object<'a>(value: &'a Value) -> Result<&'a Map<String, Value>, CodecError> {
    value.as_object().ok_or_else(|| shape("field map", value))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, CodecError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|datetime| datetime.naive_local()))
        .map_err(|_| CodecError::InvalidTemporal {
            kind: "datetime",
            value: raw.to_owned(),
        })
}

fn parse_time(raw: &str) -> Result<NaiveTime, CodecError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| CodecError::InvalidTemporal {
            kind: "time",
            value: raw.to_owned(),
        })
}

#[allow(clippy::cast_possible_truncation)]
fn parse_seconds(value: &Value) -> Result<TimeDelta, CodecError> {
    let seconds = value.as_f64().ok_or_else(|| shape("number of seconds", value))?;
    if !seconds.is_finite() {
        return Err(CodecError::InvalidTemporal {
            kind: "duration",
            value: seconds.to_string(),
        });
    }
    Ok(TimeDelta::milliseconds((seconds * 1000.0).round() as i64))
}

fn shape(expected: &'static str, found: &Value) -> CodecError {
    CodecError::WrongShape {
        expected,
        found: found.to_string(),
    }
}

fn wrong_shape(expected: &'static str, found: &impl std::fmt::Debug) -> CodecError {
    CodecError::WrongShape {
        expected,
        found: format!("{found:?}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeDelta};
    use serde_json::json;

    use super::*;
    use crate::model::{DayName, LessonType, ScheduleForm, WeekNumber};

    fn recurring_lesson() -> Lesson {
        let mut lesson = Lesson::new(
            ScheduleType::Regular,
            NaiveTime::from_hms_opt(9, 40, 0).unwrap(),
            "Базы данных",
        );
        lesson.schedule_form = Some(ScheduleForm::FullTime);
        lesson.week_number = Some(WeekNumber::Odd);
        lesson.day_name = Some(DayName::Tuesday);
        lesson.duration = Some(TimeDelta::seconds(5400));
        lesson.lesson_type = Some(LessonType::Lab);
        lesson.groups = vec!["ИС-21".to_owned(), "ИС-22".to_owned()];
        lesson.professors = vec!["Иванов И. И.".to_owned()];
        lesson.auditorium = Some("Л-301".to_owned());
        lesson.subgroup = Subgroup::First;
        lesson
    }

    fn one_off_lesson() -> Lesson {
        let mut lesson = Lesson::new(
            ScheduleType::Session,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            "Экзамен по физике",
        );
        lesson.day_date = NaiveDate::from_ymd_opt(2025, 1, 15);
        lesson.lesson_type = Some(LessonType::Exam);
        lesson
    }

    fn sample_change() -> TimetableChangeData {
        TimetableChangeData {
            entity: Entity::new(EntityType::Group, 42, "ИС-21"),
            metadata_changes: Some(vec![FieldChange {
                field_name: "week_number".to_owned(),
                old_value: FieldValue::Enum(EnumValue::WeekNumber(WeekNumber::Odd)),
                new_value: FieldValue::Enum(EnumValue::WeekNumber(WeekNumber::Even)),
            }]),
            lesson_changes: Some(vec![
                LessonChange::added(one_off_lesson()),
                LessonChange::modified(recurring_lesson(), one_off_lesson()),
                LessonChange::removed(recurring_lesson()),
            ]),
        }
    }

    #[test]
    fn test_round_trip_full_change() {
        let change = sample_change();
        let body = encode(&change).unwrap();
        assert_eq!(decode(&body).unwrap(), change);
    }

    #[test]
    fn test_round_trip_with_absent_optionals() {
        let change = TimetableChangeData {
            entity: Entity::new(EntityType::Auditorium, 3, "Л-301"),
            metadata_changes: None,
            lesson_changes: None,
        };
        let body = encode(&change).unwrap();
        assert_eq!(decode(&body).unwrap(), change);

        let bare = Lesson::new(
            ScheduleType::Consultation,
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            "Консультация",
        );
        let change = TimetableChangeData {
            lesson_changes: Some(vec![LessonChange::added(bare)]),
            ..change
        };
        let body = encode(&change).unwrap();
        assert_eq!(decode(&body).unwrap(), change);
    }

    #[test]
    fn test_wire_shape_of_lesson() {
        let wire = lesson_to_wire(&recurring_lesson());
        let fields = &wire["__lesson__"];
        assert_eq!(fields["schedule_type"], json!({"__enum__": "Расписание занятий"}));
        assert_eq!(fields["time_begin"], json!({"__time__": "09:40:00"}));
        assert_eq!(fields["duration"], json!({"__timedelta__": 5400.0}));
        assert_eq!(fields["subgroups"], json!({"__enum__": "1 подгруппа"}));
        assert_eq!(fields["day_date"], Value::Null);
    }

    #[test]
    fn test_decode_producer_message() {
        let body = json!({
            "__timetablechangedata__": {
                "entity": {"__entity__": {"type": {"__enum__": "group"}, "id": 5, "name": "ИС-21"}},
                "metadata_changes": null,
                "lesson_changes": [{
                    "__lessonchange__": {
                        "change_type": {"__enum__": "lesson_added"},
                        "old_lesson": null,
                        "new_lesson": {"__lesson__": {
                            "schedule_type": {"__enum__": "Расписание сессии"},
                            "time_begin": {"__time__": "08:00:00"},
                            "lesson_name": "Физика",
                            "day_date": {"__datetime__": "2025-01-15T00:00:00"},
                            "duration": {"__timedelta__": 5400.0},
                            "groups": ["ИС-21"],
                            "professors": [],
                            "auditorium": "",
                            "location": "",
                            "subgroups": {"__enum__": ""}
                        }}
                    }
                }]
            }
        });
        let change = decode(body.to_string().as_bytes()).unwrap();
        assert_eq!(change.entity.name, "ИС-21");
        let lesson = change.lesson_changes()[0].new_lesson.as_ref().unwrap();
        assert_eq!(lesson.day_date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(lesson.auditorium, None);
        assert_eq!(lesson.subgroup, Subgroup::Common);
        assert_eq!(lesson.duration, Some(TimeDelta::seconds(5400)));

        let reencoded: Value = serde_json::from_slice(&encode(&change).unwrap()).unwrap();
        let fields = &reencoded["__timetablechangedata__"]["lesson_changes"][0]
            ["__lessonchange__"]["new_lesson"]["__lesson__"];
        assert_eq!(fields["auditorium"], Value::Null);
        assert_eq!(fields["day_date"], json!({"__datetime__": "2025-01-15"}));
        assert_eq!(decode_value(&reencoded).unwrap(), change);
    }

    #[test]
    fn test_typed_field_uses_its_own_enum() {
        // "Консультация" is a LessonType member; the untyped resolver would
        // find it there too, but a schedule_type field must reject it.
        let fields = json!({
            "schedule_type": {"__enum__": "Консультация"},
            "time_begin": {"__time__": "08:00"},
            "lesson_name": "x"
        });
        let err = lesson_from_fields(fields.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::UnknownEnum { name: "ScheduleType", .. }));
    }

    #[test]
    fn test_unknown_enum_passes_through_untyped() {
        let value = value_from_wire(&json!({"__enum__": "Осенний"})).unwrap();
        assert_eq!(value, FieldValue::Text("Осенний".to_owned()));

        let value = value_from_wire(&json!({"__enum__": "Лекция"})).unwrap();
        assert_eq!(value, FieldValue::Enum(EnumValue::LessonType(LessonType::Lecture)));
    }

    #[test]
    fn test_untyped_values_round_trip() {
        let value = FieldValue::List(vec![
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()),
            FieldValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 9, 2)
                    .unwrap()
                    .and_hms_opt(8, 30, 0)
                    .unwrap(),
            ),
            FieldValue::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap()),
            FieldValue::Duration(TimeDelta::milliseconds(1500)),
            FieldValue::Text("2024-2025".to_owned()),
            FieldValue::Null,
        ]);
        assert_eq!(value_from_wire(&value_to_wire(&value)).unwrap(), value);
    }

    #[test]
    fn test_decode_rejects_non_change_bodies() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode(b"[1, 2]"), Err(CodecError::WrongShape { .. })));

        let entity_only =
            json!({"__entity__": {"type": {"__enum__": "group"}, "id": 1, "name": "a"}});
        assert!(matches!(
            decode(entity_only.to_string().as_bytes()),
            Err(CodecError::WrongShape { .. })
        ));
    }

    #[test]
    fn test_missing_required_field() {
        let body = json!({"__timetablechangedata__": {"lesson_changes": []}});
        let err = decode(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MissingField { record: "timetable change", field: "entity" }
        ));
    }

    #[test]
    fn test_tag_keys_are_unique() {
        for tag in Tag::ALL {
            assert_eq!(Tag::from_key(tag.key()), Some(tag));
        }
    }
}
