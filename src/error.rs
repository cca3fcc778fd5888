use crate::record::Level;
use thiserror::Error;

/// Errors a single `format` call can return.
///
/// Both variants fail only the record being formatted; the caller's
/// logging front-end owns any fallback behavior.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The bounded stack-walk window never left logging-framework code,
    /// so no trustworthy skip depth exists for this level. Defaulting
    /// to a depth of zero would silently attribute every line at this
    /// level to the wrong call site, so the record is rejected instead.
    #[error("could not find caller skip depth for log level {0}")]
    SkipNotFound(Level),

    /// The output field set could not be encoded as JSON.
    #[error("failed to serialize log fields to JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}
