//! HTML rendering of lesson changes for Telegram.
//!
//! Every entity name (the changed entity, auditoriums, professors, groups) is
//! linked to a bot deep link that opens that entity's timetable.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{ChangeType, Lesson, LessonChange, Subgroup, TimetableChangeData};

/// Longest message that is sent as is.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Characters kept from an oversized message.
const TRUNCATED_CHARS: usize = 3950;

const TRUNCATION_NOTICE: &str = "...\n\n<i>Сообщение слишком длинное</i>";

const NO_CHANGES: &str = "<i>Нет значимых изменений</i>";

/// Builds the deep link for an entity name.
pub type LinkBuilder<'a> = &'a (dyn Fn(&str) -> String + Sync);

/// Renders the notification for a change event.
///
/// Returns `None` when the event carries no lesson changes. Metadata changes
/// are not shown.
#[must_use]
pub fn render(change: &TimetableChangeData, links: LinkBuilder<'_>) -> Option<String> {
    let lesson_changes = change.lesson_changes();
    if lesson_changes.is_empty() {
        return None;
    }

    if let Some(metadata) = &change.metadata_changes {
        debug!(
            "Skipping {} metadata change(s) for '{}'",
            metadata.len(),
            change.entity.name
        );
    }

    let mut text = format!(
        "🔔 <b>Изменения в расписании: {}</b>\n\n",
        linked(&change.entity.name, links)
    );
    for lesson_change in lesson_changes {
        render_change(&mut text, lesson_change, links);
    }

    Some(truncate(text))
}

fn render_change(text: &mut String, change: &LessonChange, links: LinkBuilder<'_>) {
    text.push_str(section_title(change.change_type));
    text.push('\n');

    match (change.change_type, &change.old_lesson, &change.new_lesson) {
        (ChangeType::Modified, Some(old), Some(new)) => {
            text.push_str(&lesson_header(new));
            let diff = lesson_diff(old, new, links);
            if diff.is_empty() {
                text.push_str(NO_CHANGES);
                text.push('\n');
            } else {
                text.push_str("Изменения:\n");
                for line in diff {
                    text.push_str(&format!("• {line}\n"));
                }
            }
        }
        (ChangeType::Added, _, Some(lesson))
        | (ChangeType::Removed, Some(lesson), _)
        | (ChangeType::Modified, Some(lesson), None)
        | (ChangeType::Modified, None, Some(lesson)) => {
            text.push_str(&format_lesson(lesson, links));
        }
        _ => {}
    }

    text.push('\n');
}

const fn section_title(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::Added => "<b>➕ Добавлено занятие:</b>",
        ChangeType::Removed => "<b>➖ Удалено занятие:</b>",
        ChangeType::Modified => "<b>🔄 Изменено занятие:</b>",
    }
}

/// Bold header line: date and time for one-offs, week, day and time otherwise.
fn lesson_header(lesson: &Lesson) -> String {
    let time = lesson.time_begin.format("%H:%M").to_string();
    let when = match lesson.day_date {
        Some(date) => format!("{}, {time}", date.format("%d.%m.%Y")),
        None => {
            let mut parts: Vec<&str> = Vec::with_capacity(3);
            if let Some(week) = lesson.week_number {
                parts.push(week.as_wire());
            }
            if let Some(day) = lesson.day_name {
                parts.push(day.as_wire());
            }
            parts.push(time.as_str());
            parts.join(", ")
        }
    };
    format!("<b>{} - {}</b>\n", escape(&when), escape(&lesson.lesson_name))
}

/// Full rendering of a single lesson.
fn format_lesson(lesson: &Lesson, links: LinkBuilder<'_>) -> String {
    let mut text = lesson_header(lesson);

    if let Some(lesson_type) = lesson.lesson_type {
        text.push_str(&format!("Тип: {}\n", escape(lesson_type.as_wire())));
    }
    if let Some(auditorium) = &lesson.auditorium {
        text.push_str(&format!("Аудитория: {}\n", linked(auditorium, links)));
    }
    if !lesson.professors.is_empty() {
        text.push_str(&format!(
            "Преподаватели: {}\n",
            linked_list(&lesson.professors, links)
        ));
    }
    if lesson.subgroup != Subgroup::Common {
        text.push_str(&format!("Подгруппа: {}\n", escape(lesson.subgroup.as_wire())));
    }
    if !lesson.groups.is_empty() {
        text.push_str(&format!("Группы: {}\n", linked_list(&lesson.groups, links)));
    }

    text
}

/// One line per tracked field that differs between `old` and `new`.
fn lesson_diff(old: &Lesson, new: &Lesson, links: LinkBuilder<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut push = |label: &str, before: String, after: String| {
        lines.push(format!("{label}: <s>{before}</s> → <b>{after}</b>"));
    };

    if old.auditorium != new.auditorium {
        let side = |a: &Option<String>| a.as_deref().map(|a| linked(a, links)).unwrap_or_default();
        push("Аудитория", side(&old.auditorium), side(&new.auditorium));
    }

    if let (Some(before), Some(after)) = (old.lesson_type, new.lesson_type)
        && before != after
    {
        push("Тип", escape(before.as_wire()), escape(after.as_wire()));
    }

    if !old.professors.is_empty()
        && !new.professors.is_empty()
        && as_set(&old.professors) != as_set(&new.professors)
    {
        push(
            "Преподаватели",
            linked_list(&old.professors, links),
            linked_list(&new.professors, links),
        );
    }

    if old.subgroup != Subgroup::Common
        && new.subgroup != Subgroup::Common
        && old.subgroup != new.subgroup
    {
        push(
            "Подгруппа",
            escape(old.subgroup.as_wire()),
            escape(new.subgroup.as_wire()),
        );
    }

    if let (Some(before), Some(after)) = (old.day_date, new.day_date)
        && before != after
    {
        push(
            "Дата",
            before.format("%d.%m.%Y").to_string(),
            after.format("%d.%m.%Y").to_string(),
        );
    }

    let (old_time, new_time) = (
        old.time_begin.format("%H:%M").to_string(),
        new.time_begin.format("%H:%M").to_string(),
    );
    if old_time != new_time {
        push("Время", old_time, new_time);
    }

    if !old.is_one_off() && !new.is_one_off() {
        if let (Some(before), Some(after)) = (old.day_name, new.day_name)
            && before != after
        {
            push("День", escape(before.as_wire()), escape(after.as_wire()));
        }
        if let (Some(before), Some(after)) = (old.week_number, new.week_number)
            && before != after
        {
            push("Неделя", escape(before.as_wire()), escape(after.as_wire()));
        }
    }

    if old.lesson_name != new.lesson_name {
        push("Название", escape(&old.lesson_name), escape(&new.lesson_name));
    }

    if !old.groups.is_empty()
        && !new.groups.is_empty()
        && as_set(&old.groups) != as_set(&new.groups)
    {
        push(
            "Группы",
            linked_list(&old.groups, links),
            linked_list(&new.groups, links),
        );
    }

    lines
}

fn as_set(items: &[String]) -> BTreeSet<&str> {
    items.iter().map(String::as_str).collect()
}

/// `<a>` element pointing at the deep link for `name`.
#[must_use]
pub fn linked(name: &str, links: LinkBuilder<'_>) -> String {
    format!("<a href='{}'>{}</a>", escape(&links(name)), escape(name))
}

/// Comma-separated [`linked`] names.
#[must_use]
pub fn linked_list(names: &[String], links: LinkBuilder<'_>) -> String {
    names
        .iter()
        .map(|name| linked(name, links))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escapes text for Telegram's HTML parse mode.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Caps a message at [`MAX_MESSAGE_CHARS`], counting characters.
///
/// Whole lines are kept so that no tag is left open.
fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text;
    }
    let budget = text
        .char_indices()
        .nth(TRUNCATED_CHARS)
        .map_or(text.len(), |(index, _)| index);
    let cut = text[..budget].rfind('\n').map_or(0, |index| index + 1);

    let mut kept = text[..cut].to_owned();
    kept.push_str(TRUNCATION_NOTICE);
    kept
}
