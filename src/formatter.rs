use crate::caller::CallerResolver;
use crate::error::FormatError;
use crate::record::{FieldValue, LogRecord};
use crate::severity::severity_for;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

/// Reserved output key carrying caller attribution, fixed by the Cloud
/// Logging `LogEntry` schema.
pub const SOURCE_LOCATION_KEY: &str = "logging.googleapis.com/sourceLocation";

/// Caller attribution attached to a formatted line.
///
/// Field names follow the `LogEntrySourceLocation` wire schema:
/// <https://cloud.google.com/logging/docs/reference/v2/rest/v2/LogEntry#logentrysourcelocation>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// Renders a [`LogRecord`] as one newline-terminated JSON line in the
/// Cloud Logging structured format.
///
/// The formatter holds no per-record state; the only thing shared
/// between calls is the resolver's skip cache, so a single instance
/// can be used concurrently from any number of threads.
pub struct GcpFormatter {
    with_source_info: bool,
    resolver: CallerResolver,
}

impl GcpFormatter {
    /// Formatter with the default runtime stack walker.
    ///
    /// **Parameters**
    /// - `with_source_info`: when `true`, each line carries a
    ///   [`SourceLocation`] resolved through the caller-attribution
    ///   walk; when `false`, the stack is never touched.
    pub fn new(with_source_info: bool) -> Self {
        Self::with_resolver(with_source_info, CallerResolver::default())
    }

    /// Formatter over an explicitly constructed resolver, for hosts
    /// whose framework naming differs or for tests that script the
    /// stack walker.
    pub fn with_resolver(with_source_info: bool, resolver: CallerResolver) -> Self {
        Self {
            with_source_info,
            resolver,
        }
    }

    pub fn resolver(&self) -> &CallerResolver {
        &self.resolver
    }

    /// Format one record.
    ///
    /// **Returns**
    /// - `Ok(bytes)`: a single JSON object plus exactly one trailing
    ///   newline.
    /// - `Err(FormatError::SkipNotFound)` if source info is enabled and
    ///   no skip depth could be determined for the record's level; no
    ///   partial output is produced.
    /// - `Err(FormatError::Serialize)` if the field set could not be
    ///   encoded.
    ///
    /// The record is only read. Error-valued fields are coerced to
    /// their text description so they do not serialize as `{}`.
    pub fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        let mut data = serde_json::Map::with_capacity(record.fields.len() + 3);

        for (key, value) in &record.fields {
            let value = match value {
                FieldValue::Value(v) => v.clone(),
                FieldValue::Error(e) => Value::String(e.to_string()),
            };
            data.insert(key.clone(), value);
        }

        data.insert(
            "time".to_string(),
            Value::String(record.time.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        // Levels without a schema mapping get no severity key at all.
        if let Some(severity) = severity_for(record.level) {
            data.insert(
                "severity".to_string(),
                Value::String(severity.as_str().to_string()),
            );
        }
        data.insert("message".to_string(), Value::String(record.message.clone()));

        if self.with_source_info {
            let skip = self.resolver.skip_depth(record.level)?;
            if let Some(frame) = self.resolver.caller_at(skip) {
                let location = SourceLocation {
                    file: frame.file,
                    line: frame.line,
                    function: frame.function,
                };
                data.insert(SOURCE_LOCATION_KEY.to_string(), serde_json::to_value(&location)?);
            }
        }

        let mut serialized = serde_json::to_vec(&data)?;
        serialized.push(b'\n');
        Ok(serialized)
    }
}
