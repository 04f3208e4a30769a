use std::hint::black_box;
use std::path::Path;

use criterion::{criterion_group, criterion_main, Criterion};

use atlas_core::lookup::{LookupStrategy, SliceDefinition};
use atlas_core::query::QueryDescriptor;
use atlas_core::tabular::TabularLookup;

fn tabular_fetch_benchmark(c: &mut Criterion) {
    let lookup = TabularLookup::from_csv_path("trade", Path::new("tests/data/trade.csv"))
        .expect("Should be able to load the trade fixture");
    let query = QueryDescriptor::from_json(include_str!("../tests/requests/country_products.json"))
        .expect("Should be able to parse the descriptor");
    let slice_def = SliceDefinition::new("country_products", "trade");

    c.bench_function("tabular fetch country products", |b| {
        b.iter(|| {
            lookup.fetch(black_box(&slice_def), black_box(&query)).ok();
        })
    });
}

criterion_group!(benches, tabular_fetch_benchmark);
criterion_main!(benches);
