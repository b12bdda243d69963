use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgrepo::{Column, ColumnType, Compiler, FindArgs, ModelMetadata, ModelRegistry, ParamList};
use serde_json::json;

fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    let mut columns = vec![
        Column::new("id", ColumnType::Integer).primary(),
        Column::new("tags", ColumnType::StringArray),
    ];
    for i in 0..100 {
        columns.push(Column::new(format!("col{i}"), ColumnType::String));
    }
    registry.register(ModelMetadata::new("Wide", "wide", columns).expect("valid metadata"));
    registry
}

/// `{"or": [{"col0": "v0", "col1": {"contains": "v1"}}, ...]}` with `n` members.
fn build_filter(n: usize) -> serde_json::Value {
    let members: Vec<_> = (0..n)
        .map(|i| {
            let a = format!("col{}", (2 * i) % 100);
            let b = format!("col{}", (2 * i + 1) % 100);
            json!({ a: format!("v{i}"), b: { "contains": format!("v{i}") } })
        })
        .collect();
    json!({ "or": members, "tags": ["a", "b"], "id": { "!": [1, 2, 3] } })
}

fn bench_where(c: &mut Criterion) {
    let registry = registry();
    let model = registry.get("wide").expect("registered");
    let compiler = Compiler::new(model, &registry);
    let mut group = c.benchmark_group("where_compile/build_where_statement");

    for n in [1, 5, 10, 50] {
        let filter = build_filter(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &filter, |b, filter| {
            b.iter(|| {
                let mut params = ParamList::new();
                black_box(compiler.build_where_statement(filter, &mut params).ok());
                black_box(params.len());
            });
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let registry = registry();
    let model = registry.get("wide").expect("registered");
    let compiler = Compiler::new(model, &registry);
    let mut group = c.benchmark_group("where_compile/select");

    for n in [1, 10, 50] {
        let args = FindArgs::new()
            .filter(build_filter(n))
            .sort("col0 desc, col1")
            .limit(25)
            .skip(50);
        group.bench_with_input(BenchmarkId::from_parameter(n), &args, |b, args| {
            b.iter(|| black_box(compiler.select(args).ok()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_where, bench_select);
criterion_main!(benches);
