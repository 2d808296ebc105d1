use std::sync::Arc;

use sfi::construct::{Database, FactVector, Record};
use sfi::generate::{AttributeGroup, AttributeTable};
use sfi::interface::{Envelope, FactInterface};
use sfi::persist::PersistenceMode;
use sfi::query::QueryCriteria;
use sfi::SfiError;

fn interface(preassign: bool) -> FactInterface {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let table = AttributeTable::shipments();
    if preassign {
        db.preassign(&table).unwrap();
    }
    FactInterface::new(Arc::new(db), table, Some(2024))
}

#[test]
fn zero_count_is_rejected_before_any_assignment() {
    let iface = interface(false);
    assert!(matches!(iface.generate(0, None), Err(SfiError::InvalidParameter(_))));
    assert!(iface.database().read_registry().unwrap().is_empty());
    assert!(iface.database().read_shipments().unwrap().is_empty());
}

#[test]
fn generate_stores_decodable_shipments() {
    let iface = interface(false);
    let report = iface.generate(40, None).unwrap();
    assert_eq!(report.count, 40);
    assert_eq!(report.shipments.len(), 40);
    let stored = iface.database().read_shipments().unwrap().clone();
    assert_eq!(stored.len(), 40);
    for (generated, shipment) in report.shipments.iter().zip(&stored) {
        assert_eq!(generated.id, shipment.id);
        assert_eq!(generated.fact_vector, shipment.fact_vector);
        let decoded = iface.decode(&shipment.fact_vector).unwrap();
        assert_eq!(decoded.decoded, generated.record);
        assert!(decoded.missing.is_empty());
    }
    // a second generation replaces the first
    iface.generate(5, None).unwrap();
    assert_eq!(iface.database().read_shipments().unwrap().len(), 5);
}

#[test]
fn seeded_generation_is_reproducible() {
    let first = interface(true).generate(10, Some(99)).unwrap();
    let second = interface(true).generate(10, Some(99)).unwrap();
    let vectors = |r: &sfi::interface::GenerateReport| {
        r.shipments.iter().map(|s| s.fact_vector.clone()).collect::<Vec<_>>()
    };
    assert_eq!(vectors(&first), vectors(&second));
}

#[test]
fn filter_reports_matches_in_stored_order() {
    let iface = interface(true);
    iface.generate(200, None).unwrap();
    let criteria = QueryCriteria::new().with("origin", "New York").with("priority", "Express");
    let report = iface.filter(&criteria, true).unwrap();
    // New York = 2, Express = 73
    assert_eq!(report.filter_vector.to_string(), "146");
    assert_eq!(report.total_checked, 200);
    assert_eq!(report.matches_found, report.results.len());
    let decoded = report.decoded.unwrap();
    assert_eq!(decoded.len(), report.results.len());
    for record in &decoded {
        assert_eq!(record.get("origin"), Some("New York"));
        assert_eq!(record.get("priority"), Some("Express"));
    }
    let stored = iface.database().read_shipments().unwrap();
    let expected: Vec<&str> = stored
        .iter()
        .filter(|s| s.fact_vector.is_divisible_by(&146u64.into()))
        .map(|s| s.id.as_str())
        .collect();
    let found: Vec<&str> = report.results.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(found, expected);
}

#[test]
fn filter_errors() {
    let iface = interface(true);
    assert!(matches!(iface.filter(&QueryCriteria::new(), false), Err(SfiError::EmptyQuery)));
    let unknown = QueryCriteria::new().with("origin", "Atlantis");
    assert!(matches!(
        iface.filter(&unknown, false),
        Err(SfiError::UnknownCriterion { .. })
    ));
}

#[test]
fn decode_reports_missing_categories() {
    let iface = interface(true);
    // Chicago = 5, Delivered = 59
    let report = iface.decode(&FactVector::from(5u64 * 59)).unwrap();
    assert_eq!(
        report.decoded,
        Record::new().with("origin", "Chicago").with("status", "Delivered")
    );
    assert_eq!(report.missing, vec!["destination", "carrier", "priority"]);
    assert!(matches!(
        iface.decode(&FactVector::from(5u64 * 59 * 83)),
        Err(SfiError::UnknownFactor { .. })
    ));
}

#[test]
fn list_primes_marks_unassigned_values() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let table = AttributeTable::new(vec![
        AttributeGroup::new("origin", &["NYC", "LA"]),
        AttributeGroup::new("status", &["delivered"]),
    ])
    .unwrap();
    db.encode(&Record::new().with("origin", "LA").with("status", "delivered")).unwrap();
    db.encode(&Record::new().with("origin", "Boston").with("weight", "heavy")).unwrap();
    let iface = FactInterface::new(Arc::new(db), table, None);
    let report = iface.list_primes().unwrap();
    assert_eq!(report.assignments, 4);
    let flat: Vec<(String, String, Option<u64>)> = report
        .categories
        .iter()
        .flat_map(|c| {
            c.values
                .iter()
                .map(move |v| (c.category.clone(), v.value.clone(), v.prime.map(|p| p.get())))
        })
        .collect();
    assert_eq!(
        flat,
        vec![
            ("origin".to_string(), "NYC".to_string(), None),
            ("origin".to_string(), "LA".to_string(), Some(2)),
            ("origin".to_string(), "Boston".to_string(), Some(5)),
            ("status".to_string(), "delivered".to_string(), Some(3)),
            ("weight".to_string(), "heavy".to_string(), Some(7)),
        ]
    );
}

#[test]
fn lookups() {
    let iface = interface(true);
    assert_eq!(iface.lookup_value("carrier", "GlobalEx").unwrap().prime.get(), 41);
    let assignment = iface.lookup_prime(41).unwrap();
    assert_eq!((assignment.category.as_str(), assignment.value.as_str()), ("carrier", "GlobalEx"));
    assert!(matches!(iface.lookup_prime(42), Err(SfiError::NotFound(_))));
    assert!(matches!(iface.lookup_prime(83), Err(SfiError::NotFound(_))));
    assert!(matches!(iface.lookup_value("carrier", "Pigeon"), Err(SfiError::NotFound(_))));
}

#[test]
fn envelopes_carry_success_flags() {
    let iface = interface(true);
    let ok = serde_json::to_value(Envelope::from_result(iface.decode(&FactVector::from(2u64)))).unwrap();
    assert_eq!(ok["success"], true);
    assert_eq!(ok["vector"], "2");
    assert_eq!(ok["decoded"]["origin"], "New York");
    let failed = serde_json::to_value(Envelope::from_result(iface.decode(&FactVector::from(1u64)))).unwrap();
    assert_eq!(failed["success"], false);
    assert!(failed["error"].as_str().unwrap().starts_with("Invalid fact vector"));
}
