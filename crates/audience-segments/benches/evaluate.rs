//! Condition evaluation and membership resolution benchmarks

use audience_segments::domain::aggregates::{SegmentDraft, SegmentType};
use audience_segments::domain::value_objects::{
    Condition, ConditionGroup, CustomerRecord, EntityId, Field, NumberTest, RecordSnapshot, Test, TextTest,
};
use audience_segments::{ConditionEvaluator, MembershipResolver, Segment};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn records(count: usize) -> Vec<CustomerRecord> {
    (0..count)
        .map(|i| {
            CustomerRecord::new(EntityId::from_string(format!("c{i}")))
                .with(Field::Revenue, (i % 1000) as f64)
                .with(Field::Country, if i % 3 == 0 { "NG" } else { "GH" })
                .with(Field::Email, format!("user{i}@example.com"))
        })
        .collect()
}

fn rules() -> ConditionGroup {
    let country = ConditionGroup::any(vec![
        Condition::new(Field::Country, Test::Text(TextTest::Equals("NG".into()))).unwrap(),
        Condition::new(Field::Email, Test::Text(TextTest::EndsWith("@example.org".into()))).unwrap(),
    ]);
    ConditionGroup::all(vec![
        Condition::new(Field::Revenue, Test::Number(NumberTest::GreaterThan(250.0))).unwrap(),
    ])
    .with_group(country)
}

fn evaluate_benchmark(c: &mut Criterion) {
    let evaluator = ConditionEvaluator::default();
    let group = rules();
    let record = &records(1)[0];

    c.bench_function("evaluate_nested_group", |b| {
        b.iter(|| black_box(evaluator.evaluate(black_box(&group), black_box(record))))
    });
}

fn resolve_benchmark(c: &mut Criterion) {
    let evaluator = ConditionEvaluator::default();
    let segment = Segment::create(SegmentDraft {
        name: "Bench".into(),
        segment_type: SegmentType::Mixed,
        root_group: rules(),
        static_members: vec![EntityId::from("c1"), EntityId::from("c2")],
        excluded_members: vec![EntityId::from("c3")],
        ..Default::default()
    })
    .unwrap();

    let mut group = c.benchmark_group("resolve_membership");
    for size in [1_000, 10_000, 100_000] {
        let snapshot = RecordSnapshot::new(1, records(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| black_box(MembershipResolver::resolve(&evaluator, &segment, snapshot)))
        });
    }
    group.finish();
}

criterion_group!(benches, evaluate_benchmark, resolve_benchmark);
criterion_main!(benches);
