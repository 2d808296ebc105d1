//! The operations offered to the host process.
//!
//! Every operation is synchronous and returns a serializable report. The HTTP
//! server and the command line both sit on top of [`FactInterface`], wrapping
//! reports in an [`Envelope`] that carries a `success` flag.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::codec;
use crate::construct::{Database, FactVector, Prime, PrimeAssignment, Record, Shipment};
use crate::error::{Result, SfiError};
use crate::generate::{AttributeTable, Generator};
use crate::query::{self, Divisor, QueryCriteria};

#[derive(Debug, Serialize)]
pub struct ValueListing {
    pub value: String,
    /// `None` while no prime has been assigned to the value yet.
    pub prime: Option<Prime>,
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub category: String,
    pub values: Vec<ValueListing>,
}

#[derive(Debug, Serialize)]
pub struct PrimeMapReport {
    pub assignments: usize,
    pub categories: Vec<CategoryListing>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedShipment {
    pub id: String,
    pub record: Record,
    pub fact_vector: FactVector,
}

#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub count: usize,
    pub shipments: Vec<GeneratedShipment>,
    pub duration_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct FilterReport {
    pub criteria_used: QueryCriteria,
    pub filter_vector: Divisor,
    pub total_checked: usize,
    pub matches_found: usize,
    pub results: Vec<Shipment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<Vec<Record>>,
    pub duration_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct DecodeReport {
    pub vector: FactVector,
    pub decoded: Record,
    /// Categories of the attribute table the vector does not populate.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// The JSON shape of every answer: `{"success": true, ...report}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
impl<T: Serialize> Envelope<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self { success: true, data: Some(data), error: None },
            Err(e) => Self { success: false, data: None, error: Some(e.to_string()) },
        }
    }
}

pub struct FactInterface {
    db: Arc<Database>,
    table: AttributeTable,
    seed: Option<u64>,
}

impl FactInterface {
    pub fn new(db: Arc<Database>, table: AttributeTable, seed: Option<u64>) -> Self {
        Self { db, table, seed }
    }
    pub fn database(&self) -> &Database {
        &self.db
    }
    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// The prime map grouped by category: the attribute table first, in table
    /// order, then categories that only exist in the registry.
    pub fn list_primes(&self) -> Result<PrimeMapReport> {
        let registry = self.db.read_registry()?;
        let mut by_category: BTreeMap<String, Vec<PrimeAssignment>> = BTreeMap::new();
        for assignment in registry.all_assignments() {
            by_category
                .entry(assignment.category.clone())
                .or_default()
                .push(assignment);
        }
        let mut categories = Vec::new();
        for group in self.table.groups() {
            let mut values: Vec<ValueListing> = group
                .values
                .iter()
                .map(|value| ValueListing {
                    value: value.clone(),
                    prime: registry.lookup_prime(&group.category, value),
                })
                .collect();
            // values that were encoded without being in the table
            if let Some(assigned) = by_category.remove(&group.category) {
                values.extend(
                    assigned
                        .into_iter()
                        .filter(|a| !group.values.contains(&a.value))
                        .map(|a| ValueListing { value: a.value, prime: Some(a.prime) }),
                );
            }
            categories.push(CategoryListing { category: group.category.clone(), values });
        }
        for (category, assigned) in by_category {
            categories.push(CategoryListing {
                category,
                values: assigned
                    .into_iter()
                    .map(|a| ValueListing { value: a.value, prime: Some(a.prime) })
                    .collect(),
            });
        }
        Ok(PrimeMapReport { assignments: registry.len(), categories })
    }

    /// Draws `count` shipments from the attribute table, encodes them and
    /// replaces the stored shipments with them.
    pub fn generate(&self, count: usize, seed: Option<u64>) -> Result<GenerateReport> {
        if count == 0 {
            warn!("refusing to generate zero shipments");
            return Err(SfiError::InvalidParameter(
                "count must be a positive integer".into(),
            ));
        }
        self.table.validate()?;
        let started = Instant::now();
        let mut generator = Generator::new(seed.or(self.seed));
        let records: Vec<Record> = (0..count).map(|_| generator.record(&self.table)).collect();
        let vectors = self.db.encode_all(&records)?;
        let generated_at = Utc::now();
        let generated: Vec<GeneratedShipment> = records
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(sequence, (record, fact_vector))| GeneratedShipment {
                id: generator.shipment_id(sequence),
                record,
                fact_vector,
            })
            .collect();
        let shipments = generated
            .iter()
            .map(|g| Shipment {
                id: g.id.clone(),
                fact_vector: g.fact_vector.clone(),
                generated_at,
            })
            .collect();
        self.db.replace_shipments(shipments)?;
        let duration_seconds = started.elapsed().as_secs_f64();
        info!(count, duration_seconds, "generated shipments");
        Ok(GenerateReport { count, shipments: generated, duration_seconds })
    }

    /// Stored shipments having every value in the criteria. With `details` the
    /// matches are decoded as well.
    pub fn filter(&self, criteria: &QueryCriteria, details: bool) -> Result<FilterReport> {
        let started = Instant::now();
        let registry = self.db.read_registry()?;
        let divisor = query::compile(criteria, &registry)?;
        let stored = self.db.read_shipments()?;
        let matched = query::filter(stored.as_slice(), &divisor);
        let decoded = if details {
            let vectors: Vec<&FactVector> = matched.iter().map(|s| &s.fact_vector).collect();
            Some(
                codec::decode_all(&vectors, &registry)
                    .into_iter()
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            None
        };
        let results: Vec<Shipment> = matched.into_iter().cloned().collect();
        let duration_seconds = started.elapsed().as_secs_f64();
        info!(
            filter_vector = %divisor,
            total_checked = stored.len(),
            matches_found = results.len(),
            duration_seconds,
            "filtered shipments"
        );
        Ok(FilterReport {
            criteria_used: criteria.clone(),
            filter_vector: divisor,
            total_checked: stored.len(),
            matches_found: results.len(),
            results,
            decoded,
            duration_seconds,
        })
    }

    pub fn decode(&self, vector: &FactVector) -> Result<DecodeReport> {
        let registry = self.db.read_registry()?;
        let decoded = codec::decode(vector, &registry).inspect_err(|e| {
            if e.is_fatal() {
                error!(%vector, error = %e, "decoding hit a corrupt registry");
            } else {
                warn!(%vector, error = %e, "could not decode vector");
            }
        })?;
        let missing = decoded.missing(self.table.categories());
        Ok(DecodeReport { vector: vector.clone(), decoded, missing })
    }

    pub fn lookup_value(&self, category: &str, value: &str) -> Result<PrimeAssignment> {
        let registry = self.db.read_registry()?;
        registry
            .lookup_prime(category, value)
            .map(|prime| PrimeAssignment {
                category: category.to_owned(),
                value: value.to_owned(),
                prime,
            })
            .ok_or_else(|| SfiError::NotFound(format!("no prime is assigned to {}={}", category, value)))
    }

    pub fn lookup_prime(&self, n: u64) -> Result<PrimeAssignment> {
        let registry = self.db.read_registry()?;
        Prime::new(n)
            .and_then(|prime| {
                registry
                    .lookup_value(prime)
                    .map(|attribute| PrimeAssignment::new(attribute, prime))
            })
            .ok_or_else(|| SfiError::NotFound(format!("{} is not an assigned prime", n)))
    }
}
