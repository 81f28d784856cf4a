//! CFI Operation Benchmarks
//!
//! Parse, compare and range synthesis over paths from a few steps up to a
//! few dozen, the depth real chapter markup reaches.
//!
//! Run with: `cargo bench --bench cfi_operations`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use reader_cfi::cfi::{compare, make_range_identifier, parse};

/// Point CFI `depth` element steps deep ending in a text offset
fn deep_cfi(depth: usize, last: u32, offset: u32) -> String {
    let mut path = String::new();
    for _ in 1..depth {
        path.push_str("/4");
    }
    format!("epubcfi(/6/14[chap05ref]!{}/{}/1:{})", path, last, offset)
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("cfi_parse");

    for depth in [4, 16, 40] {
        let input = deep_cfi(depth, 2, 17);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &input, |b, input| {
            b.iter(|| parse(black_box(input)).unwrap())
        });
    }

    group.bench_function("range", |b| {
        b.iter(|| parse(black_box("epubcfi(/6/4[chap01ref]!/4[body01]/10[para05],/2/1:1,/3:4)")).unwrap())
    });

    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("cfi_compare");

    for depth in [4, 16, 40] {
        let a = parse(&deep_cfi(depth, 2, 3)).unwrap();
        let b = parse(&deep_cfi(depth, 2, 9)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &(a, b), |bench, (a, b)| {
            bench.iter(|| compare(black_box(a), black_box(b)).unwrap())
        });
    }

    group.finish();
}

fn bench_make_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("cfi_make_range");

    for depth in [4, 16, 40] {
        let a = deep_cfi(depth, 2, 0);
        let b = deep_cfi(depth, 8, 12);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &(a, b), |bench, (a, b)| {
            bench.iter(|| make_range_identifier(black_box(a), black_box(b)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_compare, bench_make_range);
criterion_main!(benches);
