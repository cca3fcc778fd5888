use crate::formatter::GcpFormatter;
use crate::record::{FieldValue, Level, LogRecord};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Mutex;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns every event into a
/// [`LogRecord`], renders it with [`GcpFormatter`], and writes the
/// resulting line to the configured destination.
///
/// Formatting and writing happen synchronously on the emitting thread;
/// there is no buffering or retry here. Failures to format or write a
/// record are reported on stderr and the record is dropped, since the
/// layer cannot log through the pipeline it implements.
pub struct GcpLayer {
    formatter: GcpFormatter,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl GcpLayer {
    /// Layer over an explicit formatter and destination.
    ///
    /// **Parameters**
    /// - `formatter`: [`GcpFormatter`] used to render every event.
    /// - `writer`: destination for the newline-terminated JSON lines.
    pub fn new(formatter: GcpFormatter, writer: Box<dyn Write + Send>) -> Self {
        Self {
            formatter,
            writer: Mutex::new(writer),
        }
    }

    /// Layer writing to stdout, the usual destination for containerized
    /// services whose stdout is collected by the logging agent.
    pub fn stdout(with_source_info: bool) -> Self {
        Self::new(GcpFormatter::new(with_source_info), Box::new(std::io::stdout()))
    }
}

impl<S> Layer<S> for GcpLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let record = LogRecord {
            time: Utc::now(),
            level: Level::from(*event.metadata().level()),
            message: message.unwrap_or_default(),
            fields,
        };

        match self.formatter.format(&record) {
            Ok(line) => {
                let mut writer = self.writer.lock().expect("log writer lock poisoned");
                if let Err(e) = writer.write_all(&line) {
                    eprintln!("failed to write log line: {}", e);
                }
            }
            Err(e) => eprintln!("failed to format log record: {}", e),
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, FieldValue>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), FieldValue::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), FieldValue::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), FieldValue::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), FieldValue::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), FieldValue::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields
            .insert(field.name().to_string(), FieldValue::error(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .insert(field.name().to_string(), FieldValue::from(format!("{:?}", value)));
        }
    }
}
