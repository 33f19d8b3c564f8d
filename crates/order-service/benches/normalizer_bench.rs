//! 负载归一化性能基准测试

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use order_service::PayloadNormalizer;
use order_shared::test_utils::TestOrders;
use std::hint::black_box;

/// 带 n 个明细项的 XML 负载
fn xml_with_items(n: usize) -> String {
    let items: String = (0..n)
        .map(|i| format!("<Item sku=\"SKU-{i}\"><Quantity>{i}</Quantity></Item>"))
        .collect();
    format!(
        "<Order><Header><Id>A1</Id><Type>digital</Type><Location>S1</Location></Header>\
         <Details>{items}</Details></Order>"
    )
}

fn bench_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let normalizer = PayloadNormalizer::new();

    let json = TestOrders::json_payload("A1", "digital", "S1");
    let xml = TestOrders::xml_payload("A1", "digital", "S1");

    group.bench_function("json", |b| {
        b.iter(|| normalizer.normalize(black_box(&json), black_box("application/json")))
    });

    group.bench_function("xml", |b| {
        b.iter(|| normalizer.normalize(black_box(&xml), black_box("application/xml")))
    });

    group.finish();
}

fn bench_xml_details_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("xml_details_size");
    let normalizer = PayloadNormalizer::new();

    for n in [1, 10, 100] {
        let payload = xml_with_items(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &payload, |b, payload| {
            b.iter(|| normalizer.normalize(black_box(payload), "application/xml"))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_formats, bench_xml_details_size);
criterion_main!(benches);
