use std::sync::Arc;
use std::thread;
use std::time::Duration;

use logerrors::catalog::{sqlstate, NOT_KNOWN_ERROR};
use logerrors::config::EngineConfig;
use logerrors::event::{level, LogRecord, Severity};
use logerrors::report::TOTAL_ROW_NAME;
use logerrors::ring::SAFETY_INTERVALS;
use logerrors::{Engine, LogHook, LogSink, NoopResolver, Report};

fn config(intervals_count: usize, messages_per_interval: usize) -> EngineConfig {
    EngineConfig {
        interval: Duration::from_millis(1000),
        intervals_count,
        messages_per_interval,
        excluded_codes: Vec::new(),
    }
}

fn engine_with(cfg: &EngineConfig) -> Engine {
    let engine = Engine::new();
    engine.initialize(cfg).expect("init");
    engine
}

fn code(state: &str) -> i32 {
    sqlstate::parse(state).expect("valid sqlstate")
}

#[test]
fn three_errors_survive_one_rotation_then_expire() {
    let engine = engine_with(&config(2, 100));
    let x = code("42P01");

    for _ in 0..3 {
        engine.record(x, 1, 1, Severity::Error as u8);
    }
    engine.rotate().expect("rotate");

    let short = engine.collect(1).expect("short");
    assert_eq!(short.len(), 1);
    assert_eq!(short[0].count, 3);
    assert_eq!(short[0].key.error_code, x);
    assert_eq!(short[0].key.db_id, 1);
    assert_eq!(short[0].key.user_id, 1);
    assert_eq!(short[0].key.severity, Severity::Error);

    assert_eq!(engine.collect(2).expect("long"), short);

    engine.rotate().expect("rotate");
    engine.rotate().expect("rotate");
    assert!(engine.collect(2).expect("long").is_empty());
    assert_eq!(engine.totals().expect("totals")[Severity::Error.index()], 3);
}

#[test]
fn event_visible_only_within_window() {
    let intervals_count = 4;
    let engine = engine_with(&config(intervals_count, 16));
    engine.record(code("23505"), 1, 1, Severity::Fatal as u8);

    let actual = intervals_count + SAFETY_INTERVALS;
    for rotations in 1..=(actual + 2) {
        engine.rotate().expect("rotate");
        for window in 1..=intervals_count {
            let visible = !engine.collect(window).expect("collect").is_empty();
            let expected = rotations <= window;
            assert_eq!(
                visible, expected,
                "rotations={rotations} window={window}"
            );
        }
    }
}

#[test]
fn totals_exact_under_overflow() {
    let engine = engine_with(&config(2, 4));
    for _ in 0..1_000 {
        engine.record(code("57014"), 1, 1, Severity::Error as u8);
    }
    engine.rotate().expect("rotate");

    assert_eq!(engine.totals().expect("totals"), [0, 1_000, 0]);
    let rows = engine.collect(1).expect("collect");
    assert_eq!(rows[0].count, 4);
    assert_eq!(engine.stats().expect("stats").overwritten, 996);
}

#[test]
fn reset_is_idempotent_and_leaves_zero_totals() {
    let engine = engine_with(&config(2, 16));
    engine.record(code("42P01"), 1, 1, Severity::Error as u8);
    engine.record(code("01000"), 1, 1, Severity::Warning as u8);
    engine.rotate().expect("rotate");

    engine.reset().expect("reset");
    let first = Report::build(&engine, &NoopResolver).expect("report");
    engine.reset().expect("reset again");
    let second = Report::build(&engine, &NoopResolver).expect("report");

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!(first
        .iter()
        .all(|row| row.name == TOTAL_ROW_NAME && row.count == 0));
}

#[test]
fn exclusion_suppresses_only_that_code() {
    let cfg = EngineConfig {
        excluded_codes: vec!["42P01".to_string()],
        ..config(2, 16)
    };
    let engine = engine_with(&cfg);
    engine.record(code("42P01"), 1, 1, Severity::Error as u8);
    engine.record(code("42P01"), 1, 1, Severity::Error as u8);
    engine.record(code("23505"), 1, 1, Severity::Error as u8);
    engine.rotate().expect("rotate");

    assert_eq!(engine.totals().expect("totals"), [0, 1, 0]);
    let rows = engine.collect(2).expect("collect");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "unique_violation");
}

#[test]
fn unknown_code_reports_as_not_known() {
    let engine = engine_with(&config(2, 16));
    engine.record(code("ZZ123"), 1, 1, Severity::Warning as u8);
    engine.rotate().expect("rotate");

    let rows = Report::build(&engine, &NoopResolver).expect("report");
    let short = &rows[3];
    assert_eq!(short.name, NOT_KNOWN_ERROR);
    assert_eq!(short.code.as_deref(), Some("ZZ123"));
    assert_eq!(short.severity, "WARNING");
}

#[test]
fn concurrent_producers_keep_exact_totals() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 10_000;

    let engine = Arc::new(engine_with(&config(2, 256)));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let x = code("40P01");
                for i in 0..PER_THREAD {
                    engine.record(x, t as u32, i as u32 % 4, Severity::Error as u8);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer thread");
    }

    assert_eq!(
        engine.totals().expect("totals")[Severity::Error.index()],
        (THREADS * PER_THREAD) as u64
    );
}

#[test]
fn producers_race_rotation_and_reads() {
    let engine = Arc::new(engine_with(&config(3, 64)));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..20_000u32 {
                    engine.record(code("53200"), t, i % 5, (i % 3) as u8);
                }
            })
        })
        .collect();

    let rotator = {
        let engine = Arc::clone(&engine);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                engine.rotate().expect("rotate");
                thread::yield_now();
            }
        })
    };

    for _ in 0..50 {
        for row in engine.collect(3).expect("collect") {
            assert!(row.count > 0);
            assert_eq!(row.name, "out_of_memory");
        }
    }

    for handle in producers {
        handle.join().expect("producer thread");
    }
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    rotator.join().expect("rotator thread");

    let totals = engine.totals().expect("totals");
    assert_eq!(totals.iter().sum::<u64>(), 80_000);
}

#[test]
fn log_hook_pipeline_end_to_end() {
    let engine = Arc::new(engine_with(&config(2, 16)));
    let hook = LogHook::new(Arc::clone(&engine));

    let base = LogRecord {
        level: level::ERROR,
        sqlstate: code("22012"),
        db_id: 3,
        user_id: 4,
        message: "division by zero",
    };
    hook.handle_record(&base);
    hook.handle_record(&LogRecord {
        level: level::NOTICE,
        ..base
    });
    hook.handle_record(&LogRecord {
        level: level::LOG,
        message: "duration: 2001.5 ms  statement: select 1/0",
        ..base
    });
    engine.rotate().expect("rotate");

    let rows = engine.collect(1).expect("collect");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "division_by_zero");
    assert_eq!(engine.slow().expect("slow").count, 1);
}

#[test]
fn shutdown_detaches_state() {
    let engine = engine_with(&config(2, 16));
    engine.shutdown();
    engine.record(code("42P01"), 1, 1, Severity::Error as u8);
    assert!(engine.collect(1).is_err());
    assert!(Report::build(&engine, &NoopResolver).is_err());
}
