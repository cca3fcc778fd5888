use crate::formatter::GcpFormatter;
use crate::layer::GcpLayer;
use std::io::Write;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Initialize global `tracing` subscriber that writes Cloud Logging
/// JSON lines to stdout.
///
/// **Parameters**
/// - `with_source_info`: when `true`, every line carries a
///   `logging.googleapis.com/sourceLocation` object resolved from the
///   call stack; this is the formatter's only configuration knob.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`GcpLayer`] as the global
/// default subscriber, so all `tracing` events in the process are
/// rendered by the formatter. Panics if a global subscriber is already
/// set.
pub fn init_tracing(with_source_info: bool) {
    let subscriber = Registry::default().with(GcpLayer::stdout(with_source_info));
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
}

/// Like [`init_tracing`], but writing to an explicit destination
/// instead of stdout.
pub fn init_tracing_with_writer(with_source_info: bool, writer: Box<dyn Write + Send>) {
    let layer = GcpLayer::new(GcpFormatter::new(with_source_info), writer);
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
}
