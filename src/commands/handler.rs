//! Command handler implementation.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate, NaiveTime, TimeDelta, Timelike};
use tracing::{debug, info, warn};

use super::types::{BotCommand, CommandResult};
use crate::model::{
    DayName, Entity, EntityType, Lesson, ScheduleType, Semester, Subgroup, WeekNumber,
};
use crate::notify::{LinkBuilder, escape, linked, linked_list};
use crate::search::{Resolution, search};
use crate::store::{EntityStore, LessonFilter, StoreError, TimetableQuery};
use crate::telegram::{Messenger, decode_payload};

const START_PROMPT: &str =
    "Напиши название группы, фамилию преподавателя или аудиторию, как ты делал(а) это на сайте";
const BAD_LINK: &str = "Не удалось распознать ссылку";
const NOTHING_FOUND: &str = "Ничего не найдено по вашему запросу. Попробуйте другой запрос.";
const CHOOSE_PROMPT: &str = "Выберите вариант из списка:";
const NO_LESSONS: &str = "Занятия не найдены для выбранных фильтров";
const STORE_FAILED: &str = "Не удалось загрузить расписание. Попробуйте позже.";
const SUBSCRIPTION_FAILED: &str = "Не удалось изменить статус подписки. Попробуйте позже.";

/// Lesson length when the timetable does not give one.
const DEFAULT_LESSON_MINUTES: i64 = 90;

/// Start times of the numbered daily pairs and their markers.
const PAIRS: [(u32, u32, &str); 8] = [
    (8, 0, "1️⃣"),
    (9, 40, "2️⃣"),
    (11, 30, "3️⃣"),
    (13, 30, "4️⃣"),
    (15, 10, "5️⃣"),
    (16, 50, "6️⃣"),
    (18, 30, "7️⃣"),
    (20, 10, "8️⃣"),
];

/// Handles bot commands against the entity store.
pub struct CommandHandler {
    store: Arc<dyn EntityStore>,

    /// Used for deep links in replies.
    messenger: Arc<dyn Messenger>,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self { store, messenger }
    }

    /// Tries to parse and execute a command from a message.
    ///
    /// Returns `None` if the message is not something the bot answers.
    pub async fn try_handle(&self, user_id: i64, message_text: &str) -> Option<CommandResult> {
        self.try_handle_on(user_id, message_text, Local::now().date_naive())
            .await
    }

    /// Same as [`try_handle`](Self::try_handle) with an explicit current date.
    pub async fn try_handle_on(
        &self,
        user_id: i64,
        message_text: &str,
        today: NaiveDate,
    ) -> Option<CommandResult> {
        let command = BotCommand::parse(message_text)?;

        debug!("Handling command from {}: {}", user_id, command);
        let result = self.execute(user_id, command, today).await;
        info!("Command result for {}: success={}", user_id, result.success);

        Some(result)
    }

    /// Executes a parsed command.
    async fn execute(&self, user_id: i64, command: BotCommand, today: NaiveDate) -> CommandResult {
        match command {
            BotCommand::Start(None) => CommandResult::success(START_PROMPT),
            BotCommand::Start(Some(payload)) => self.handle_start(user_id, &payload, today).await,
            BotCommand::Help => Self::handle_help(),
            BotCommand::Subscribe(name) => self.handle_subscribe(user_id, &name).await,
            BotCommand::Unsubscribe(name) => self.handle_unsubscribe(user_id, &name).await,
            BotCommand::Search(query) => self.handle_search(user_id, &query, today).await,
        }
    }

    async fn handle_start(&self, user_id: i64, payload: &str, today: NaiveDate) -> CommandResult {
        match decode_payload(payload) {
            Some(query) => self.handle_search(user_id, &query, today).await,
            None => {
                debug!("Undecodable start payload: {}", payload);
                CommandResult::error(BAD_LINK)
            }
        }
    }

    async fn handle_search(&self, user_id: i64, query: &str, today: NaiveDate) -> CommandResult {
        let resolution = match search(self.store.as_ref(), query).await {
            Ok(resolution) => resolution,
            Err(e) => return store_failure(&e),
        };

        match resolution {
            Resolution::NoMatch => CommandResult::error(NOTHING_FOUND),
            Resolution::Single(entity) => self.handle_timetable(user_id, &entity, today).await,
            Resolution::Multiple(entities) => CommandResult::success(self.picklist(&entities)),
        }
    }

    /// Entity header, today's lessons and a subscription hint.
    async fn handle_timetable(
        &self,
        user_id: i64,
        entity: &Entity,
        today: NaiveDate,
    ) -> CommandResult {
        let query = TimetableQuery::new()
            .entity_type(entity.entity_type)
            .entity_id(entity.id);

        let timetable = match self.store.get_timetable_by_query(&query).await {
            Ok(Some(timetable)) => timetable,
            Ok(None) => {
                warn!("Entity '{}' has no timetable", entity.name);
                return CommandResult::error(NOTHING_FOUND);
            }
            Err(e) => return store_failure(&e),
        };

        let subscribed = match self.store.user_is_subscribed(user_id, &entity.name).await {
            Ok(subscribed) => subscribed,
            Err(e) => return store_failure(&e),
        };

        let links = |name: &str| self.messenger.build_deep_link(name);
        let week = WeekNumber::for_date(today);
        let day = DayName::from_weekday(today.weekday());

        let mut lessons = LessonFilter::new(&timetable.lessons)
            .schedule_type(ScheduleType::Regular)
            .week_number(week)
            .day_name(day)
            .build();
        lessons.sort_by_key(|lesson| lesson.time_begin);

        let metadata = &timetable.metadata;
        let semester = metadata.semester.map_or("", Semester::as_wire);
        let mut text = format!(
            "<b>{}: {}</b>\n<b>{}</b>\n<b>{} | {} (Сегодня)</b>\n\n",
            entity_type_label(entity.entity_type),
            linked(&entity.name, &links),
            escape(format!("{semester} {}", metadata.years).trim()),
            week.as_wire(),
            day.as_wire(),
        );

        if lessons.is_empty() {
            text.push_str(NO_LESSONS);
            text.push_str("\n\n");
        }
        for lesson in lessons {
            format_lesson(&mut text, lesson, &links);
        }

        if subscribed {
            let _ = write!(
                text,
                "🔕 Отслеживание включено. Выключить: /unsubscribe {}",
                escape(&entity.name)
            );
        } else {
            let _ = write!(
                text,
                "🔔 Следить за изменениями: /subscribe {}",
                escape(&entity.name)
            );
        }

        CommandResult::success(text)
    }

    fn picklist(&self, entities: &[Entity]) -> String {
        let links = |name: &str| self.messenger.build_deep_link(name);
        let mut text = format!("{CHOOSE_PROMPT}\n");
        for entity in entities {
            let _ = writeln!(text, "• {}", linked(&entity.name, &links));
        }
        text
    }

    fn handle_help() -> CommandResult {
        let mut lines = vec![START_PROMPT.to_owned(), String::new()];

        for (cmd, usage, desc) in BotCommand::all_commands() {
            let usage = if usage.is_empty() {
                String::new()
            } else {
                format!(" {}", escape(usage))
            };
            lines.push(format!("/{cmd}{usage} - {desc}"));
        }

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_subscribe(&self, user_id: i64, name: &str) -> CommandResult {
        let entity = match self.store.find_entity_by_name(name).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                return CommandResult::error(format!(
                    "Расписание «{}» не найдено. Укажите точное название, как в результатах поиска.",
                    escape(name)
                ));
            }
            Err(e) => return store_failure(&e),
        };

        match self.store.user_subscribe(user_id, &entity.name).await {
            Ok(true) => {
                info!("User {} subscribed to '{}'", user_id, entity.name);
                CommandResult::success(format!(
                    "Отслеживание расписания включено: <b>{}</b>",
                    escape(&entity.name)
                ))
            }
            Ok(false) => CommandResult::error(SUBSCRIPTION_FAILED),
            Err(e) => {
                warn!("Failed to subscribe {} to '{}': {}", user_id, entity.name, e);
                CommandResult::error(SUBSCRIPTION_FAILED)
            }
        }
    }

    async fn handle_unsubscribe(&self, user_id: i64, name: &str) -> CommandResult {
        match self.store.user_unsubscribe(user_id, name).await {
            Ok(true) => {
                info!("User {} unsubscribed from '{}'", user_id, name);
                CommandResult::success(format!(
                    "Отслеживание расписания выключено: <b>{}</b>",
                    escape(name)
                ))
            }
            Ok(false) => CommandResult::error(format!(
                "Вы не отслеживаете расписание «{}»",
                escape(name)
            )),
            Err(e) => {
                warn!("Failed to unsubscribe {} from '{}': {}", user_id, name, e);
                CommandResult::error(SUBSCRIPTION_FAILED)
            }
        }
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler").finish_non_exhaustive()
    }
}

fn store_failure(err: &StoreError) -> CommandResult {
    warn!("Store request failed: {}", err);
    CommandResult::error(STORE_FAILED)
}

const fn entity_type_label(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Group => "Группа",
        EntityType::Professor => "Преподаватель",
        EntityType::Auditorium => "Аудитория",
    }
}

fn pair_marker(time: NaiveTime) -> &'static str {
    PAIRS
        .iter()
        .find(|&&(hour, minute, _)| time.hour() == hour && time.minute() == minute)
        .map_or("🔹", |&(_, _, marker)| marker)
}

/// One lesson of the day view: name, time slot, place and people.
fn format_lesson(text: &mut String, lesson: &Lesson, links: LinkBuilder<'_>) {
    let duration = lesson
        .duration
        .unwrap_or_else(|| TimeDelta::minutes(DEFAULT_LESSON_MINUTES));
    let end = lesson.time_begin + duration;

    let _ = writeln!(text, "<b>{}</b>", escape(&lesson.lesson_name));
    let _ = write!(
        text,
        "{} <b>{}-{}</b>",
        pair_marker(lesson.time_begin),
        lesson.time_begin.format("%H:%M"),
        end.format("%H:%M")
    );
    if let Some(lesson_type) = lesson.lesson_type {
        let _ = write!(text, " | {}", lesson_type.as_wire());
    }
    if lesson.subgroup != Subgroup::Common {
        let _ = write!(text, " | {}", lesson.subgroup.as_wire());
    }
    text.push('\n');

    if let Some(auditorium) = lesson.auditorium.as_deref().filter(|a| !a.is_empty()) {
        let _ = writeln!(text, "{}", linked(auditorium, links));
    }
    if !lesson.professors.is_empty() {
        let _ = writeln!(text, "{}", linked_list(&lesson.professors, links));
    }
    if !lesson.groups.is_empty() {
        let _ = writeln!(text, "{}", linked_list(&lesson.groups, links));
    }
    text.push('\n');
}
