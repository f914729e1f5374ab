use std::sync::Arc;

use crate::event::slow::is_slow_message;
use crate::event::{Event, LogRecord, Severity};
use crate::state::Engine;

/// Receiver of log records from the database's logging subsystem.
///
/// Called on the logging path of every backend, so implementations must not
/// fail, block or allocate.
pub trait LogSink: Send + Sync {
    fn handle_record(&self, record: &LogRecord<'_>);
}

/// Feeds qualifying log records into an [`Engine`].
pub struct LogHook {
    engine: Arc<Engine>,
}

impl LogHook {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

impl LogSink for LogHook {
    #[inline]
    fn handle_record(&self, record: &LogRecord<'_>) {
        if is_slow_message(record.message) {
            self.engine.record_slow();
        }

        if let Some(severity) = Severity::from_level(record.level) {
            self.engine.record_event(Event {
                error_code: record.sqlstate,
                db_id: record.db_id,
                user_id: record.user_id,
                severity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sqlstate;
    use crate::config::EngineConfig;
    use crate::event::level;

    fn hook() -> (Arc<Engine>, LogHook) {
        let engine = Arc::new(Engine::new());
        engine.initialize(&EngineConfig::default()).expect("init");
        let hook = LogHook::new(Arc::clone(&engine));
        (engine, hook)
    }

    fn record(level: u8, message: &str) -> LogRecord<'_> {
        LogRecord {
            level,
            sqlstate: sqlstate::parse("42P01").expect("valid"),
            db_id: 1,
            user_id: 2,
            message,
        }
    }

    #[test]
    fn test_tracks_warning_error_fatal() {
        let (engine, hook) = hook();
        hook.handle_record(&record(level::WARNING, "w"));
        hook.handle_record(&record(level::WARNING_CLIENT_ONLY, "w"));
        hook.handle_record(&record(level::ERROR, "e"));
        hook.handle_record(&record(level::FATAL, "f"));
        assert_eq!(engine.totals().expect("totals"), [2, 1, 1]);
    }

    #[test]
    fn test_ignores_untracked_levels() {
        let (engine, hook) = hook();
        for lvl in [level::LOG, level::INFO, level::NOTICE, level::PANIC] {
            hook.handle_record(&record(lvl, "ignored"));
        }
        assert_eq!(engine.totals().expect("totals"), [0, 0, 0]);
    }

    #[test]
    fn test_counts_slow_messages_at_any_level() {
        let (engine, hook) = hook();
        hook.handle_record(&record(level::LOG, "duration: 1500.2 ms  statement: select 1"));
        hook.handle_record(&record(level::ERROR, "duration: 3.0 ms"));
        assert_eq!(engine.slow().expect("slow").count, 2);
        assert_eq!(engine.totals().expect("totals"), [0, 1, 0]);
    }

    #[test]
    fn test_detached_engine_drops_silently() {
        let hook = LogHook::new(Arc::new(Engine::new()));
        hook.handle_record(&record(level::ERROR, "duration: 1 ms"));
    }
}
