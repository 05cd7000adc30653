//! Command types and definitions.

use std::fmt;

/// Messages the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start`, optionally carrying an encoded deep-link payload.
    Start(Option<String>),

    /// Show usage information.
    Help,

    /// Subscribe to change notifications for an entity.
    Subscribe(String),

    /// Stop change notifications for an entity.
    Unsubscribe(String),

    /// Any plain text: look up a timetable by name.
    Search(String),
}

impl BotCommand {
    /// Parses a message text.
    ///
    /// Slash commands are matched case-insensitively and may carry a
    /// `@botname` suffix. Any other non-empty text is a search. Returns `None`
    /// for empty text, unknown commands and commands missing their argument.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let Some(command_text) = text.strip_prefix('/') else {
            return Some(Self::Search(text.to_owned()));
        };

        let (cmd, args) = match command_text.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, Some(args.trim()).filter(|a| !a.is_empty())),
            None => (command_text, None),
        };
        let cmd = cmd.split_once('@').map_or(cmd, |(cmd, _)| cmd).to_lowercase();

        match cmd.as_str() {
            "start" => Some(Self::Start(args.map(str::to_owned))),
            "help" | "h" => Some(Self::Help),
            "subscribe" | "sub" => args.map(|a| Self::Subscribe(a.to_owned())),
            "unsubscribe" | "unsub" => args.map(|a| Self::Unsubscribe(a.to_owned())),
            "search" | "find" => args.map(|a| Self::Search(a.to_owned())),
            _ => None,
        }
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Help => "help",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Search(_) => "search",
        }
    }

    /// Commands advertised in the Telegram menu and in help, as
    /// `(command, usage, description)`.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("start", "", "Начать поиск расписания"),
            ("search", "<название>", "Найти группу, преподавателя или аудиторию"),
            ("subscribe", "<название>", "Следить за изменениями расписания"),
            ("unsubscribe", "<название>", "Перестать следить за изменениями"),
            ("help", "", "Показать справку"),
        ]
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(Some(payload)) => write!(f, "start {payload}"),
            Self::Subscribe(name) => write!(f, "subscribe {name}"),
            Self::Unsubscribe(name) => write!(f, "unsubscribe {name}"),
            Self::Search(query) => write!(f, "search {query}"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// HTML reply to show the user.
    pub message: String,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_is_search() {
        assert_eq!(
            BotCommand::parse("  ИС-21 "),
            Some(BotCommand::Search("ИС-21".to_owned()))
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(BotCommand::parse(""), None);
        assert_eq!(BotCommand::parse("   \n"), None);
    }

    #[test]
    fn test_parse_start() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start(None)));
        assert_eq!(
            BotCommand::parse("/start 0JjQoS0yMQ"),
            Some(BotCommand::Start(Some("0JjQoS0yMQ".to_owned())))
        );
    }

    #[test]
    fn test_parse_bot_suffix() {
        assert_eq!(
            BotCommand::parse("/start@sibsau_bot"),
            Some(BotCommand::Start(None))
        );
        assert_eq!(
            BotCommand::parse("/subscribe@sibsau_bot ИС-21"),
            Some(BotCommand::Subscribe("ИС-21".to_owned()))
        );
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(BotCommand::parse("/HELP"), Some(BotCommand::Help));
        assert_eq!(
            BotCommand::parse("/Unsubscribe Иванов И. И."),
            Some(BotCommand::Unsubscribe("Иванов И. И.".to_owned()))
        );
    }

    #[test]
    fn test_parse_argument_keeps_inner_whitespace() {
        assert_eq!(
            BotCommand::parse("/subscribe   Иванов  И. И.  "),
            Some(BotCommand::Subscribe("Иванов  И. И.".to_owned()))
        );
    }

    #[test]
    fn test_parse_missing_argument() {
        assert_eq!(BotCommand::parse("/subscribe"), None);
        assert_eq!(BotCommand::parse("/unsubscribe   "), None);
        assert_eq!(BotCommand::parse("/search"), None);
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(BotCommand::parse("/settings"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(BotCommand::Help.to_string(), "help");
        assert_eq!(
            BotCommand::Subscribe("ИС-21".to_owned()).to_string(),
            "subscribe ИС-21"
        );
    }
}
