use std::fmt;

/// One cache log event: a short message plus the fields that identify it.
#[derive(Clone, Copy, Default)]
pub struct LogRecord<'a> {
    pub message: &'a str,
    pub key: Option<&'a str>,
    pub pattern: Option<&'a str>,
    pub count: Option<u64>,
    pub error: Option<&'a dyn fmt::Display>,
}

impl<'a> LogRecord<'a> {
    pub fn new(message: &'a str) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }

    pub fn key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn pattern(mut self, pattern: &'a str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn error(mut self, error: &'a dyn fmt::Display) -> Self {
        self.error = Some(error);
        self
    }
}

impl fmt::Debug for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRecord")
            .field("message", &self.message)
            .field("key", &self.key)
            .field("pattern", &self.pattern)
            .field("count", &self.count)
            .field("error", &self.error.map(|e| e.to_string()))
            .finish()
    }
}

/// Logger capability injected into the cache facade.
///
/// Implementations must not panic; logging never influences control flow.
pub trait CacheLogger: Send + Sync {
    fn info(&self, record: &LogRecord<'_>);
    fn warn(&self, record: &LogRecord<'_>);
    fn error(&self, record: &LogRecord<'_>);
    fn debug(&self, record: &LogRecord<'_>);
}

/// Logger that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl CacheLogger for NoopLogger {
    fn info(&self, _record: &LogRecord<'_>) {}
    fn warn(&self, _record: &LogRecord<'_>) {}
    fn error(&self, _record: &LogRecord<'_>) {}
    fn debug(&self, _record: &LogRecord<'_>) {}
}
