use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use logerrors::catalog::sqlstate;
use logerrors::config::EngineConfig;
use logerrors::event::{level, LogRecord, Severity};
use logerrors::{Engine, LogHook, LogSink, NoopResolver, Report};

fn build_engine(excluded: &[&str]) -> Arc<Engine> {
    let engine = Arc::new(Engine::new());
    engine
        .initialize(&EngineConfig {
            interval: Duration::from_secs(5),
            intervals_count: 120,
            messages_per_interval: 1000,
            excluded_codes: excluded.iter().map(|c| c.to_string()).collect(),
        })
        .expect("init");
    engine
}

/// Fills every retained interval with a realistic mix of codes.
fn build_populated_engine() -> Arc<Engine> {
    let engine = build_engine(&[]);
    let codes: Vec<i32> = ["42P01", "23505", "57014", "40P01", "22012", "ZZ999"]
        .iter()
        .map(|c| sqlstate::parse(c).expect("valid"))
        .collect();

    for interval in 0..120u32 {
        for i in 0..1000u32 {
            let code = codes[(i as usize + interval as usize) % codes.len()];
            engine.record(code, i % 16, i % 32, (i % 3) as u8);
        }
        engine.rotate().expect("rotate");
    }
    engine
}

fn bench_record(c: &mut Criterion) {
    let engine = build_engine(&["57014"]);
    let code = sqlstate::parse("42P01").expect("valid");
    let excluded = sqlstate::parse("57014").expect("valid");

    c.bench_function("engine/record", |b| {
        b.iter(|| engine.record(black_box(code), 1, 2, Severity::Error as u8))
    });

    c.bench_function("engine/record_excluded", |b| {
        b.iter(|| engine.record(black_box(excluded), 1, 2, Severity::Error as u8))
    });

    let hook = LogHook::new(Arc::clone(&engine));
    let record = LogRecord {
        level: level::ERROR,
        sqlstate: code,
        db_id: 1,
        user_id: 2,
        message: "relation \"missing\" does not exist",
    };
    c.bench_function("log_hook/handle_record", |b| {
        b.iter(|| hook.handle_record(black_box(&record)))
    });
}

fn bench_rotate(c: &mut Criterion) {
    let engine = build_engine(&[]);

    c.bench_function("engine/rotate", |b| {
        b.iter(|| engine.rotate().expect("rotate"))
    });
}

fn bench_collect(c: &mut Criterion) {
    let engine = build_populated_engine();

    c.bench_function("engine/collect_short", |b| {
        b.iter(|| black_box(engine.collect(1).expect("collect").len()))
    });

    c.bench_function("engine/collect_long", |b| {
        b.iter(|| black_box(engine.collect(120).expect("collect").len()))
    });

    c.bench_function("report/build", |b| {
        b.iter(|| black_box(Report::build(&engine, &NoopResolver).expect("report").len()))
    });
}

fn bench_suite(c: &mut Criterion) {
    bench_record(c);
    bench_rotate(c);
    bench_collect(c);
}

criterion_group!(benches, bench_suite);
criterion_main!(benches);
