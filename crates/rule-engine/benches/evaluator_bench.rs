//! 规则求值性能基准测试
//!
//! 覆盖操作符解析、单个叶子条件求值与完整规则执行。

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rule_engine::{Almanac, Condition, Event, OperatorMap, Rule, RuleExecutor};
use serde_json::json;
use std::hint::black_box;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// 操作符解析：基础名称与已缓存的组合名称
fn bench_operator_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_resolution");
    let map = OperatorMap::with_defaults();
    map.get("not:everyFact:someValue:equal").unwrap();

    for name in ["equal", "everyFact:greaterThan", "not:everyFact:someValue:equal"] {
        group.bench_with_input(BenchmarkId::new("get", name), name, |b, name| {
            b.iter(|| map.get(black_box(name)))
        });
    }

    group.bench_function("cold_chain", |b| {
        b.iter(|| {
            let map = OperatorMap::with_defaults();
            map.get(black_box("not:everyFact:greaterThan"))
        })
    });

    group.finish();
}

/// 操作符直接求值
fn bench_operator_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_evaluation");
    let map = OperatorMap::with_defaults();

    let cases = [
        ("greaterThan", json!(1000), json!(500)),
        ("in", json!("b"), json!(["a", "b", "c", "d", "e"])),
        ("contains", json!(["a", "b", "c", "d", "e"]), json!("d")),
        ("everyFact:lessThan", json!([1, 2, 3, 4, 5]), json!(10)),
    ];

    for (name, fact, value) in cases {
        let operator = map.get(name).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| operator.evaluate(black_box(&fact), black_box(&value)))
        });
    }

    group.finish();
}

/// 完整规则执行，按子条件数量扩展
fn bench_rule_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_execution");
    let rt = runtime();
    let executor = RuleExecutor::with_defaults();

    let almanac = Almanac::new();
    almanac.add_runtime_fact("amount", 1500).unwrap();
    almanac
        .add_runtime_fact("user", json!({"level": "gold", "tags": ["vip"]}))
        .unwrap();

    for size in [1, 5, 20] {
        let children: Vec<_> = (0..size)
            .map(|i| {
                if i % 2 == 0 {
                    json!({"fact": "amount", "operator": "greaterThan", "value": i})
                } else {
                    json!({"fact": "user", "path": "$.level", "operator": "in", "value": ["gold", "silver"]})
                }
            })
            .collect();
        let rule = Rule::new(
            Condition::from_value(&json!({"all": children})).unwrap(),
            Event::new("bench"),
        )
        .unwrap();

        group.bench_with_input(BenchmarkId::new("all", size), &rule, |b, rule| {
            b.iter(|| rt.block_on(executor.execute(black_box(rule), &almanac)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_operator_resolution,
    bench_operator_evaluation,
    bench_rule_execution,
);
criterion_main!(benches);
