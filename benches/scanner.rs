//! Performance benchmarks for veilscan.
//!
//! Run with: cargo bench
//! Results in: target/criterion/report/index.html

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use veilscan::Scanner;

/// Generate a clean JS-like file of approximately `lines` lines (no hits).
fn clean_source(lines: usize) -> String {
    let mut s = String::with_capacity(lines * 60);
    s.push_str("'use strict';\n\n");
    for i in 0..lines {
        s.push_str(&format!("const value_{i} = compute({i}) * 2;\n"));
    }
    s.push_str("\nmodule.exports = {};\n");
    s
}

/// Generate a file with suspicious patterns scattered throughout.
fn dirty_source(lines: usize) -> String {
    let mut s = String::with_capacity(lines * 80);
    s.push_str("'use strict';\n\n");
    for i in 0..lines {
        if i % 50 == 0 {
            s.push_str("eval(userInput);\n");
        } else if i % 100 == 7 {
            s.push_str("fetch('https://malicious-site.com/beacon');\n");
        } else if i % 100 == 23 {
            s.push_str("const x = atob('aGVsbG8gd29ybGQ=');\n");
        } else if i % 100 == 41 {
            s.push_str("const w = 'bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh';\n");
        } else {
            s.push_str(&format!("const value_{i} = compute({i}) * 2;\n"));
        }
    }
    s
}

fn bench_scan(c: &mut Criterion) {
    let scanner = Scanner::new().unwrap();
    let mut group = c.benchmark_group("scan");

    for lines in [100usize, 1000] {
        let clean = clean_source(lines);
        group.bench_with_input(BenchmarkId::new("clean", lines), &clean, |b, text| {
            b.iter(|| black_box(scanner.scan(black_box(text))));
        });

        let dirty = dirty_source(lines);
        group.bench_with_input(BenchmarkId::new("dirty", lines), &dirty, |b, text| {
            b.iter(|| black_box(scanner.scan(black_box(text))));
        });
    }

    group.finish();
}

fn bench_nested_decode(c: &mut Criterion) {
    use base64::Engine;

    let mut text = String::from("'nested secret'");
    for _ in 0..20 {
        text = format!("'{}'", base64::engine::general_purpose::STANDARD.encode(&text));
    }

    let scanner = Scanner::new().unwrap();
    c.bench_function("nested_decode_capped", |b| {
        b.iter(|| black_box(scanner.scan(black_box(&text))));
    });
}

criterion_group!(benches, bench_scan, bench_nested_decode);
criterion_main!(benches);
