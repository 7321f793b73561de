use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use mergetail::feeds::parse_timestamped_line;
use mergetail::formatters::EntryFormatter;
use mergetail::merge::MergeBuilder;
use mergetail::parsers::LogEntryParser;

const KEY_VALUE_LINE: &str =
    r#"level=info msg="request served" method=GET path=/api/v1/users status=200 took=12ms"#;
const JSON_LINE: &str = r#"{"level":"warn","msg":"slow query","table":"users","rows":1250,"tags":["db","primary"],"ctx":{"shard":3}}"#;
const RAW_LINE: &str = "Starting worker pool with 8 threads on 0.0.0.0:8080";

fn bench_parse_key_value(c: &mut Criterion) {
    let parser = LogEntryParser::new();
    c.bench_function("parse_key_value", |b| {
        b.iter(|| black_box(parser.parse(black_box(KEY_VALUE_LINE))));
    });
}

fn bench_parse_json(c: &mut Criterion) {
    let parser = LogEntryParser::new();
    c.bench_function("parse_json", |b| {
        b.iter(|| black_box(parser.parse(black_box(JSON_LINE))));
    });
}

fn bench_parse_raw_fallback(c: &mut Criterion) {
    let parser = LogEntryParser::new();
    c.bench_function("parse_raw_fallback", |b| {
        b.iter(|| black_box(parser.parse(black_box(RAW_LINE))));
    });
}

fn bench_format(c: &mut Criterion) {
    let entry = LogEntryParser::new().parse(KEY_VALUE_LINE);
    let plain = EntryFormatter::new(false);
    let colored = EntryFormatter::new(true);

    c.bench_function("format_plain", |b| {
        b.iter(|| black_box(plain.format(black_box(&entry))));
    });
    c.bench_function("format_colored", |b| {
        b.iter(|| black_box(colored.format(black_box(&entry))));
    });
}

fn bench_split_timestamp(c: &mut Criterion) {
    let line = format!("2024-07-27T12:34:56.789012345Z {}", KEY_VALUE_LINE);
    c.bench_function("split_timestamp", |b| {
        b.iter(|| black_box(parse_timestamped_line(black_box(&line))));
    });
}

fn bench_merge_four_sources(c: &mut Criterion) {
    const SOURCES: usize = 4;
    const LINES_PER_SOURCE: i64 = 250;
    let base = Utc.with_ymd_and_hms(2024, 7, 27, 12, 0, 0).unwrap();

    c.bench_function("merge_4x250", |b| {
        b.iter_batched(
            || {
                let mut builder = MergeBuilder::with_capacity(LINES_PER_SOURCE as usize);
                for source in 0..SOURCES {
                    let sender = builder.register(format!("src{}", source)).unwrap();
                    for i in 0..LINES_PER_SOURCE {
                        let ts = base + Duration::milliseconds(i * SOURCES as i64 + source as i64);
                        sender.send(ts, "msg=tick").unwrap();
                    }
                }
                builder.build()
            },
            |engine| black_box(engine.count()),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_parse_key_value,
    bench_parse_json,
    bench_parse_raw_fallback,
    bench_format,
    bench_split_timestamp,
    bench_merge_four_sources
);
criterion_main!(benches);
