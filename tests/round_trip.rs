use std::collections::HashSet;

use sfi::codec::{decode, encode};
use sfi::construct::{PrimeRegistry, Record};
use sfi::generate::{AttributeTable, Generator};

fn generated(count: usize, seed: u64) -> Vec<Record> {
    let table = AttributeTable::shipments();
    let mut generator = Generator::new(Some(seed));
    (0..count).map(|_| generator.record(&table)).collect()
}

#[test]
fn decode_inverts_encode() {
    let mut registry = PrimeRegistry::new();
    for record in generated(500, 11) {
        let vector = encode(&record, &mut registry).unwrap();
        assert_eq!(decode(&vector, &registry).unwrap(), record);
    }
}

#[test]
fn encoding_is_deterministic() {
    let mut registry = PrimeRegistry::new();
    for record in generated(100, 12) {
        let first = encode(&record, &mut registry).unwrap();
        let second = encode(&record, &mut registry).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn vectors_are_square_free() {
    let mut registry = PrimeRegistry::new();
    for record in generated(200, 13) {
        let vector = encode(&record, &mut registry).unwrap();
        for (prime, _) in registry.primes_ascending() {
            let square = prime.to_biguint() * prime.to_biguint();
            assert!(
                !vector.is_divisible_by(&square),
                "{prime} appears more than once in {vector}"
            );
        }
    }
}

#[test]
fn primes_are_unique_across_categories() {
    let mut registry = PrimeRegistry::new();
    // the same value name in different categories gets different primes
    let a = registry.get_or_assign("origin", "Paris").unwrap();
    let b = registry.get_or_assign("destination", "Paris").unwrap();
    assert_ne!(a, b);
    for record in generated(300, 14) {
        encode(&record, &mut registry).unwrap();
    }
    let assignments = registry.all_assignments();
    let primes: HashSet<u64> = assignments.iter().map(|a| a.prime.get()).collect();
    assert_eq!(primes.len(), assignments.len());
    assert_eq!(assignments.len(), registry.len());
}

#[test]
fn assignment_is_idempotent() {
    let mut registry = PrimeRegistry::new();
    let first = registry.get_or_assign("carrier", "SwiftLog").unwrap();
    assert_eq!(registry.len(), 1);
    let second = registry.get_or_assign("carrier", "SwiftLog").unwrap();
    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.lookup_value(first).unwrap().value(), "SwiftLog");
}

#[test]
fn listing_is_grouped_by_category() {
    let mut registry = PrimeRegistry::new();
    registry.get_or_assign("status", "Pending").unwrap();
    registry.get_or_assign("origin", "Miami").unwrap();
    registry.get_or_assign("status", "Delayed").unwrap();
    let listing: Vec<(String, String, u64)> = registry
        .all_assignments()
        .into_iter()
        .map(|a| (a.category, a.value, a.prime.get()))
        .collect();
    assert_eq!(
        listing,
        vec![
            ("origin".to_string(), "Miami".to_string(), 3),
            ("status".to_string(), "Pending".to_string(), 2),
            ("status".to_string(), "Delayed".to_string(), 5),
        ]
    );
}
