use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use gt_recon::{Dataset, Row, Value, aggregate, match_datasets};

fn generate_lines(name: &str, rows: usize, drift: usize) -> Dataset {
    let headers = ["File_Name", "Product_Service_SKU_Name_Original", "UOM", "Unit Price"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = (0..rows)
        .map(|i| {
            let uom = if i % 4 == 0 { "kg" } else { "ea" };
            let price = if drift > 0 && i % drift == 0 { i + 1 } else { i };
            Row::new(
                i + 2,
                vec![
                    Some(Value::String(format!("invoice_{}.pdf", i % 50))),
                    Some(Value::String(format!("Product {}", i % 400))),
                    Some(Value::String(uom.to_string())),
                    Some(Value::Integer(price as i64)),
                ],
            )
        })
        .collect();
    Dataset::new(name, &headers, rows).expect("dataset")
}

fn bench_match_throughput(c: &mut Criterion) {
    let keys = ["Product_Service_SKU_Name_Original", "File_Name", "UOM"]
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>();
    let primary = generate_lines("pipeline", 20_000, 7);
    let secondary = generate_lines("truth", 20_000, 0);

    let mut group = c.benchmark_group("reconcile_rows");

    group.bench_function("match_20k", |b| {
        b.iter(|| match_datasets(&primary, &secondary, &keys).expect("match"));
    });

    group.bench_function("match_and_aggregate_20k", |b| {
        b.iter_batched(
            || (),
            |_| {
                let result = match_datasets(&primary, &secondary, &keys).expect("match");
                aggregate(&result, &primary, &secondary, Some("File_Name")).expect("aggregate")
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_match_throughput);
criterion_main!(benches);
