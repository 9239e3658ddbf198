use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column holding the entry identifier.
pub const COLUMN_ID: &str = "id";
/// Column holding the lowercase level name.
pub const COLUMN_LEVEL: &str = "level";
/// Column holding the human readable message.
pub const COLUMN_MESSAGE: &str = "message";
/// Column holding the serialized JSON context.
pub const COLUMN_CONTEXT: &str = "context";
/// Column holding the event timestamp.
pub const COLUMN_TIME: &str = "time";

/// Width of the `id` column.
pub const ID_MAX_LEN: usize = 40;
/// Width of the `level` column.
pub const LEVEL_MAX_LEN: usize = 40;
/// Width of the `message` column, in characters.
pub const MESSAGE_MAX_LEN: usize = 510;

/// Severity of a persisted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Panic,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Fatal,
        Level::Panic,
    ];

    /// Name written into the `level` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            "panic" => Ok(Level::Panic),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// One row of the log table.
///
/// `id` and `time` are normally left empty by callers; the store fills
/// them in right before the row is inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub level: Level,
    pub message: String,
    pub context: String,
    pub time: Option<DateTime<Utc>>,
}

impl LogEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogEntry {
            id: String::new(),
            level,
            message: message.into(),
            context: String::new(),
            time: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Cut `message` down to [`MESSAGE_MAX_LEN`] characters.
pub(crate) fn truncate_message(message: &mut String) {
    if let Some((idx, _)) = message.char_indices().nth(MESSAGE_MAX_LEN) {
        message.truncate(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_round_trip() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>(), Ok(level));
            assert!(level.as_str().len() <= LEVEL_MAX_LEN);
        }
        assert_eq!("WARN".parse::<Level>(), Ok(Level::Warning));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Level::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn new_entry_is_unassigned() {
        let entry = LogEntry::new(Level::Info, "hello").with_context("{}");
        assert!(entry.id.is_empty());
        assert!(entry.time.is_none());
        assert_eq!(entry.context, "{}");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let mut long = "é".repeat(MESSAGE_MAX_LEN + 10);
        truncate_message(&mut long);
        assert_eq!(long.chars().count(), MESSAGE_MAX_LEN);

        let mut short = String::from("short");
        truncate_message(&mut short);
        assert_eq!(short, "short");
    }
}
