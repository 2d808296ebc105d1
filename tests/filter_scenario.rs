use sfi::codec::{decode, encode};
use sfi::construct::{FactVector, PrimeRegistry, Record};
use sfi::query::{compile, filter, QueryCriteria};
use sfi::SfiError;

fn shipment(origin: &str, status: &str) -> Record {
    Record::new().with("origin", origin).with("status", status)
}

#[test]
fn nyc_delivered_scenario() {
    let mut registry = PrimeRegistry::new();
    let first = encode(&shipment("NYC", "delivered"), &mut registry).unwrap();
    assert_eq!(first, FactVector::from(6u64));
    assert_eq!(registry.lookup_prime("origin", "NYC").unwrap().get(), 2);
    assert_eq!(registry.lookup_prime("status", "delivered").unwrap().get(), 3);

    let second = encode(&shipment("LA", "delivered"), &mut registry).unwrap();
    assert_eq!(second, FactVector::from(15u64));
    assert_eq!(registry.lookup_prime("origin", "LA").unwrap().get(), 5);

    let stored: Vec<FactVector> = [6u64, 10, 15].into_iter().map(FactVector::from).collect();
    let divisor = compile(&QueryCriteria::new().with("origin", "NYC"), &registry).unwrap();
    assert_eq!(divisor.to_string(), "2");
    let matched: Vec<&FactVector> = filter(&stored, &divisor);
    assert_eq!(matched, vec![&stored[0], &stored[1]]);

    assert_eq!(decode(&FactVector::from(15u64), &registry).unwrap(), shipment("LA", "delivered"));
    assert!(matches!(
        decode(&FactVector::from(7u64), &registry),
        Err(SfiError::UnknownFactor { .. })
    ));
}

#[test]
fn filter_matches_exactly_the_selected_values() {
    let mut registry = PrimeRegistry::new();
    let origins = ["NYC", "LA", "Chicago"];
    let statuses = ["pending", "delivered", "delayed"];
    let carriers = ["PrimeShip", "SwiftLog"];
    let mut records = Vec::new();
    for origin in origins {
        for status in statuses {
            for carrier in carriers {
                records.push(shipment(origin, status).with("carrier", carrier));
            }
        }
    }
    let vectors: Vec<FactVector> = records
        .iter()
        .map(|r| encode(r, &mut registry).unwrap())
        .collect();

    for origin in origins {
        let divisor = compile(&QueryCriteria::new().with("origin", origin), &registry).unwrap();
        let matched = filter(&vectors, &divisor);
        let expected: Vec<&FactVector> = records
            .iter()
            .zip(&vectors)
            .filter(|(r, _)| r.get("origin") == Some(origin))
            .map(|(_, v)| v)
            .collect();
        assert_eq!(matched, expected, "single criterion origin={origin}");
    }

    // AND semantics over several categories
    for status in statuses {
        for carrier in carriers {
            let criteria = QueryCriteria::new()
                .with("origin", "LA")
                .with("status", status)
                .with("carrier", carrier);
            let divisor = compile(&criteria, &registry).unwrap();
            let matched = filter(&vectors, &divisor);
            assert_eq!(matched.len(), 1);
            let decoded = decode(matched[0], &registry).unwrap();
            assert_eq!(decoded, shipment("LA", status).with("carrier", carrier));
        }
    }
}

#[test]
fn criteria_on_unassigned_values_fail_softly() {
    let mut registry = PrimeRegistry::new();
    encode(&shipment("NYC", "delivered"), &mut registry).unwrap();
    let error = compile(&QueryCriteria::new().with("origin", "Atlantis"), &registry).unwrap_err();
    assert!(matches!(error, SfiError::UnknownCriterion { .. }));
    assert!(error.is_user_error());
    assert!(!error.is_fatal());
    assert_eq!(error.to_string(), "No such attribute value: origin=Atlantis");
}

#[test]
fn products_beyond_machine_words_filter_exactly() {
    let mut registry = PrimeRegistry::new();
    // forty categories, each with values drawn late enough to push the product past 2^128
    for i in 0..400 {
        registry.get_or_assign(&format!("filler{i}"), "x").unwrap();
    }
    let record: Record = (0..40).map(|i| (format!("category{i:02}"), format!("value{i}"))).collect();
    let vector = encode(&record, &mut registry).unwrap();
    assert!(vector.as_biguint().bits() > 128);
    let criteria: QueryCriteria = (0..40)
        .step_by(3)
        .map(|i| (format!("category{i:02}"), format!("value{i}")))
        .collect();
    let divisor = compile(&criteria, &registry).unwrap();
    assert_eq!(filter(std::slice::from_ref(&vector), &divisor).len(), 1);
    assert_eq!(decode(&vector, &registry).unwrap(), record);
}
