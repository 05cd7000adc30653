//! Domain model shared by the queue, the renderer and the store.

mod enums;
mod macros;
mod types;
mod value;

pub use enums::{
    ChangeType, DayName, EntityType, LessonType, ScheduleForm, ScheduleType, Semester, Subgroup,
    WeekNumber, WireEnum,
};
pub use types::{
    Entity, FieldChange, Lesson, LessonChange, Metadata, TimetableChangeData, TimetableData,
};
pub use value::{EnumValue, FieldValue, Record};
