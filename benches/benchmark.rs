use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use sfi::codec::{decode, encode};
use sfi::construct::{FactVector, PrimeRegistry, Record};
use sfi::generate::{AttributeTable, Generator};
use sfi::query::{compile, filter, QueryCriteria};

fn setup(count: usize) -> (PrimeRegistry, Vec<Record>, Vec<FactVector>) {
    let table = AttributeTable::shipments();
    let mut generator = Generator::new(Some(42));
    let mut registry = PrimeRegistry::new();
    let records: Vec<Record> = (0..count).map(|_| generator.record(&table)).collect();
    let vectors = records
        .iter()
        .map(|record| encode(record, &mut registry).unwrap())
        .collect();
    (registry, records, vectors)
}

fn bench_encode(c: &mut Criterion) {
    let (mut registry, records, _) = setup(1_000);
    c.bench_function("encode 1k shipments", |b| {
        b.iter(|| {
            for record in &records {
                black_box(encode(black_box(record), &mut registry).unwrap());
            }
        })
    });
}

fn bench_filter(c: &mut Criterion) {
    let (registry, _, vectors) = setup(100_000);
    let criteria = QueryCriteria::new()
        .with("origin", "Chicago")
        .with("status", "In Transit");
    let divisor = compile(&criteria, &registry).unwrap();
    c.bench_function("filter 100k shipments", |b| {
        b.iter(|| black_box(filter(black_box(&vectors), &divisor).len()))
    });
}

fn bench_decode(c: &mut Criterion) {
    let (mut registry, _, vectors) = setup(1_000);
    // a registry with many more values than any shipment uses
    for i in 0..10_000 {
        registry.get_or_assign("reference", &format!("value{i}")).unwrap();
    }
    c.bench_function("decode 1k shipments against 10k primes", |b| {
        b.iter(|| {
            for vector in &vectors {
                black_box(decode(black_box(vector), &registry).unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_encode, bench_filter, bench_decode);
criterion_main!(benches);
