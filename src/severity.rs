use crate::record::Level;
use serde::Serialize;

/// Severity vocabulary of the Google Cloud Logging `LogEntry` schema.
///
/// The full schema defines eight values, but the level mapping only
/// ever produces six: `Notice` and `Emergency` are reserved schema
/// values with no corresponding front-end level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

/// Map a front-end level to its Cloud Logging severity.
///
/// **Parameters**
/// - `level`: level carried by the [`LogRecord`](crate::record::LogRecord).
///
/// **Returns**
/// - `Some(severity)` for the six mapped levels.
/// - `None` for levels with no entry (`Trace`); the formatter omits the
///   `severity` key for those rather than failing the record.
///
/// Panic maps to `Alert`, one step below the schema's maximum, matching
/// the upstream mapping.
pub fn severity_for(level: Level) -> Option<Severity> {
    match level {
        Level::Trace => None,
        Level::Debug => Some(Severity::Debug),
        Level::Info => Some(Severity::Info),
        Level::Warn => Some(Severity::Warning),
        Level::Error => Some(Severity::Error),
        Level::Fatal => Some(Severity::Critical),
        Level::Panic => Some(Severity::Alert),
    }
}
