//! Builder for narrowing a timetable's lessons.

use chrono::{NaiveDate, NaiveTime};

use crate::model::{DayName, Lesson, LessonType, ScheduleForm, ScheduleType, Subgroup, WeekNumber};

type Predicate = Box<dyn Fn(&Lesson) -> bool + Send + Sync>;

/// Chains lesson predicates; [`LessonFilter::build`] keeps lessons matching all
/// of them, in their original order.
///
/// ```
/// # use timetable_bot::model::{DayName, Lesson, WeekNumber};
/// # use timetable_bot::store::LessonFilter;
/// # let lessons: Vec<Lesson> = Vec::new();
/// let monday = LessonFilter::new(&lessons)
///     .week_number(WeekNumber::Odd)
///     .day_name(DayName::Monday)
///     .build();
/// assert!(monday.is_empty());
/// ```
pub struct LessonFilter<'a> {
    lessons: &'a [Lesson],
    predicates: Vec<Predicate>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl<'a> LessonFilter<'a> {
    #[must_use]
    pub fn new(lessons: &'a [Lesson]) -> Self {
        Self {
            lessons,
            predicates: Vec::new(),
        }
    }

    /// Adds an arbitrary predicate.
    #[must_use]
    pub fn custom(mut self, predicate: impl Fn(&Lesson) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    #[must_use]
    pub fn schedule_type(self, schedule_type: ScheduleType) -> Self {
        self.custom(move |l| l.schedule_type == schedule_type)
    }

    #[must_use]
    pub fn schedule_form(self, schedule_form: ScheduleForm) -> Self {
        self.custom(move |l| l.schedule_form == Some(schedule_form))
    }

    /// Matches the lesson name case-insensitively, whole or as a substring.
    #[must_use]
    pub fn lesson_name(self, name: &str, contains: bool) -> Self {
        let name = name.to_owned();
        if contains {
            self.custom(move |l| contains_ignore_case(&l.lesson_name, &name))
        } else {
            self.custom(move |l| eq_ignore_case(&l.lesson_name, &name))
        }
    }

    #[must_use]
    pub fn week_number(self, week_number: WeekNumber) -> Self {
        self.custom(move |l| l.week_number == Some(week_number))
    }

    #[must_use]
    pub fn day_name(self, day_name: DayName) -> Self {
        self.custom(move |l| l.day_name == Some(day_name))
    }

    #[must_use]
    pub fn lesson_type(self, lesson_type: LessonType) -> Self {
        self.custom(move |l| l.lesson_type == Some(lesson_type))
    }

    /// Keeps lessons for `subgroup` and lessons for the whole group.
    #[must_use]
    pub fn subgroup(self, subgroup: Subgroup) -> Self {
        self.custom(move |l| l.subgroup == subgroup || l.subgroup == Subgroup::Common)
    }

    #[must_use]
    pub fn time_before(self, time: NaiveTime) -> Self {
        self.custom(move |l| l.time_begin < time)
    }

    #[must_use]
    pub fn time_after(self, time: NaiveTime) -> Self {
        self.custom(move |l| l.time_begin > time)
    }

    /// Inclusive on both ends.
    #[must_use]
    pub fn time_between(self, start: NaiveTime, end: NaiveTime) -> Self {
        self.custom(move |l| (start..=end).contains(&l.time_begin))
    }

    // Date predicates never match recurring lessons.

    #[must_use]
    pub fn date_before(self, date: NaiveDate) -> Self {
        self.custom(move |l| l.day_date.is_some_and(|d| d < date))
    }

    #[must_use]
    pub fn date_after(self, date: NaiveDate) -> Self {
        self.custom(move |l| l.day_date.is_some_and(|d| d > date))
    }

    #[must_use]
    pub fn date_between(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.custom(move |l| l.day_date.is_some_and(|d| (start..=end).contains(&d)))
    }

    #[must_use]
    pub fn date_equals(self, date: NaiveDate) -> Self {
        self.custom(move |l| l.day_date == Some(date))
    }

    /// Matches a group exactly, or case-insensitively as a substring.
    #[must_use]
    pub fn has_group(self, group: &str, exact: bool) -> Self {
        let group = group.to_owned();
        if exact {
            self.custom(move |l| l.groups.contains(&group))
        } else {
            self.custom(move |l| l.groups.iter().any(|g| contains_ignore_case(g, &group)))
        }
    }

    /// Matches a professor exactly, or case-insensitively as a substring.
    #[must_use]
    pub fn has_professor(self, professor: &str, exact: bool) -> Self {
        let professor = professor.to_owned();
        if exact {
            self.custom(move |l| l.professors.contains(&professor))
        } else {
            self.custom(move |l| {
                l.professors
                    .iter()
                    .any(|p| contains_ignore_case(p, &professor))
            })
        }
    }

    #[must_use]
    pub fn auditorium(self, auditorium: &str, contains: bool) -> Self {
        let auditorium = auditorium.to_owned();
        self.custom(move |l| {
            l.auditorium.as_deref().is_some_and(|a| {
                if contains {
                    contains_ignore_case(a, &auditorium)
                } else {
                    eq_ignore_case(a, &auditorium)
                }
            })
        })
    }

    #[must_use]
    pub fn build(self) -> Vec<&'a Lesson> {
        self.lessons
            .iter()
            .filter(|lesson| self.predicates.iter().all(|p| p(*lesson)))
            .collect()
    }
}

impl std::fmt::Debug for LessonFilter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonFilter")
            .field("lessons", &self.lessons.len())
            .field("predicates", &self.predicates.len())
            .finish()
    }
}
