//! Closed enumerations of the timetable domain.
//!
//! Members are encoded as the same human-readable strings the notification
//! texts print, so a decoded value can be shown to users verbatim.

use super::macros::wire_enum;

/// An enumeration encoded as a fixed set of strings.
pub trait WireEnum: Sized + Copy {
    /// Type name used in error messages.
    const NAME: &'static str;

    fn as_wire(self) -> &'static str;

    fn from_wire(value: &str) -> Option<Self>;
}

wire_enum!(
    /// Kind of entity that owns a timetable.
    EntityType {
        Group => "group",
        Professor => "professor",
        Auditorium => "auditorium",
    }
);

wire_enum!(
    /// Which schedule a lesson belongs to.
    ScheduleType {
        Regular => "Расписание занятий",
        Consultation => "Расписание консультаций",
        Session => "Расписание сессии",
    }
);

wire_enum!(
    /// Form of study.
    ScheduleForm {
        FullTime => "Очная",
        PartTime => "Заочная",
        Mixed => "Очно-заочная",
    }
);

wire_enum!(
    /// Week parity of a recurring lesson.
    WeekNumber {
        Odd => "1 неделя",
        Even => "2 неделя",
    }
);

wire_enum!(
    /// Weekday of a recurring lesson.
    DayName {
        Monday => "Понедельник",
        Tuesday => "Вторник",
        Wednesday => "Среда",
        Thursday => "Четверг",
        Friday => "Пятница",
        Saturday => "Суббота",
        Sunday => "Воскресенье",
    }
);

wire_enum!(
    LessonType {
        Lecture => "Лекция",
        Practice => "Практика",
        Lab => "Лабораторная работа",
        Consultation => "Консультация",
        Exam => "Экзамен",
    }
);

wire_enum!(
    /// Part of a group attending a lesson. `Common` means the whole group.
    Subgroup {
        Common => "",
        First => "1 подгруппа",
        Second => "2 подгруппа",
    }
);

wire_enum!(
    /// Kind of a lesson-level change.
    ChangeType {
        Added => "lesson_added",
        Removed => "lesson_removed",
        Modified => "lesson_modified",
    }
);

wire_enum!(
    Semester {
        Autumn => "Осенний",
        Spring => "Весенний",
    }
);

impl Default for Subgroup {
    fn default() -> Self {
        Self::Common
    }
}

impl DayName {
    /// Maps a chrono weekday to the timetable day name.
    #[must_use]
    pub const fn from_weekday(weekday: chrono::Weekday) -> Self {
        match weekday {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

impl WeekNumber {
    /// Week parity used by the university calendar for a given date.
    ///
    /// Odd ISO weeks are taught as the second week, even ISO weeks as the first.
    #[must_use]
    pub fn for_date(date: chrono::NaiveDate) -> Self {
        use chrono::Datelike;

        if date.iso_week().week() % 2 == 0 {
            Self::Odd
        } else {
            Self::Even
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_every_member_round_trips_through_wire_string() {
        for &member in LessonType::ALL {
            assert_eq!(LessonType::from_wire(member.as_wire()), Some(member));
        }
        for &member in DayName::ALL {
            assert_eq!(DayName::from_wire(member.as_wire()), Some(member));
        }
        for &member in ChangeType::ALL {
            assert_eq!(ChangeType::from_wire(member.as_wire()), Some(member));
        }
        for &member in Subgroup::ALL {
            assert_eq!(Subgroup::from_wire(member.as_wire()), Some(member));
        }
    }

    #[test]
    fn test_unknown_wire_string() {
        assert_eq!(WeekNumber::from_wire("3 неделя"), None);
        assert_eq!(EntityType::from_wire("GROUP"), None);
    }

    #[test]
    fn test_serde_uses_wire_string() {
        let json = serde_json::to_string(&DayName::Friday).unwrap();
        assert_eq!(json, "\"Пятница\"");
        let back: DayName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DayName::Friday);
        assert!(serde_json::from_str::<DayName>("\"Friday\"").is_err());
    }

    #[test]
    fn test_week_parity() {
        // 2024-01-01 is ISO week 1.
        let week_one = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(WeekNumber::for_date(week_one), WeekNumber::Even);
        let week_two = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(WeekNumber::for_date(week_two), WeekNumber::Odd);
    }

    #[test]
    fn test_subgroup_default_is_common() {
        assert_eq!(Subgroup::default(), Subgroup::Common);
        assert_eq!(Subgroup::Common.as_wire(), "");
    }
}
