pub mod record;
pub mod severity;
pub mod error;
pub mod skip_cache;
pub mod caller;
pub mod formatter;
pub mod layer;
pub mod init;
