//! Default logger - forwards cache events to `tracing`.

use stash_core::ports::{CacheLogger, LogRecord};
use tracing::field::display;

/// [`CacheLogger`] that emits `tracing` events under the `stash` target,
/// carrying the record's key, pattern, count and error as fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

macro_rules! emit {
    ($level:ident, $record:expr) => {{
        let record = $record;
        tracing::$level!(
            target: "stash",
            key = record.key,
            pattern = record.pattern,
            count = record.count,
            error = record.error.map(display),
            "{}",
            record.message
        );
    }};
}

impl CacheLogger for TracingLogger {
    fn info(&self, record: &LogRecord<'_>) {
        emit!(info, record);
    }

    fn warn(&self, record: &LogRecord<'_>) {
        emit!(warn, record);
    }

    fn error(&self, record: &LogRecord<'_>) {
        emit!(error, record);
    }

    fn debug(&self, record: &LogRecord<'_>) {
        emit!(debug, record);
    }
}
