use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use quickdao::{Matcher, Modifier};

/// `n` equality conditions ANDed together, with an OR group of two on every fifth.
fn build_matcher(n: usize) -> Matcher {
    let mut m = Matcher::new();
    for i in 0..n {
        m = m.eq(&format!("col{i}"), i as i64);
        if i % 5 == 0 {
            m = m.add(Matcher::or().gt("score", i as i64).null("deleted_at", false));
        }
    }
    m
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher/build");

    for n in [1, 5, 20, 100] {
        let m = build_matcher(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &m, |b, m| {
            b.iter(|| black_box(m.build()));
        });
    }

    group.finish();
}

fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher/in_list");

    for n in [5, 50, 500] {
        let ids: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            b.iter(|| black_box(Matcher::new().in_list("id", ids.iter().copied()).build()));
        });
    }

    group.finish();
}

fn bench_modifier(c: &mut Criterion) {
    c.bench_function("modifier/to_sql", |b| {
        let modifier = Modifier::new()
            .add("name", "renamed")
            .self_add("balance", 10)
            .self_minus("quota", 1);
        b.iter(|| black_box(modifier.to_sql()));
    });
}

criterion_group!(benches, bench_build, bench_in_list, bench_modifier);
criterion_main!(benches);
