use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

// maps keyed by short strings use a fast hasher
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;

// used to keep the one-to-one mapping between attribute values and their primes
use bimap::BiMap;

// fact vectors are products of primes and quickly outgrow any machine word
use num_bigint::BigUint;
use num_traits::{One, Zero};

// used for persistence
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

// fact vectors travel as decimal strings
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

// used for timestamps on shipments
use chrono::{DateTime, Utc};

// used to print out readable forms of a construct
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

// our own stuff that we need
use crate::codec;
use crate::error::{Result, SfiError};
use crate::generate::AttributeTable;
use crate::persist::{PersistenceMode, Persistor};
use crate::prime::{is_prime, PrimeSource};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Prime -------------
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct Prime(u64);

impl Prime {
    pub fn new(n: u64) -> Option<Self> {
        is_prime(n).then_some(Self(n))
    }
    // Only the prime source and the persistence layer may skip the primality check,
    // restored primes are checked by the registry when retained.
    pub(crate) fn unchecked(n: u64) -> Self {
        Self(n)
    }
    pub fn get(&self) -> u64 {
        self.0
    }
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from(self.0)
    }
}
impl fmt::Display for Prime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl<'de> Deserialize<'de> for Prime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let n = u64::deserialize(deserializer)?;
        Prime::new(n).ok_or_else(|| de::Error::custom(format!("{n} is not a prime")))
    }
}
impl ToSql for Prime {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let stored = i64::try_from(self.0)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(stored))
    }
}
impl FromSql for Prime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let stored = value.as_i64()?;
        u64::try_from(stored)
            .map(Prime::unchecked)
            .map_err(|_| FromSqlError::OutOfRange(stored))
    }
}

// ------------- AttributeValue -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct AttributeValue {
    category: String,
    value: String,
}
impl AttributeValue {
    pub fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
    // Immutable after creation, so only getters are exposed.
    pub fn category(&self) -> &str {
        &self.category
    }
    pub fn value(&self) -> &str {
        &self.value
    }
}
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.category, self.value)
    }
}

// ------------- PrimeAssignment -------------
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PrimeAssignment {
    pub category: String,
    pub value: String,
    pub prime: Prime,
}
impl PrimeAssignment {
    pub fn new(attribute: &AttributeValue, prime: Prime) -> Self {
        Self {
            category: attribute.category().to_owned(),
            value: attribute.value().to_owned(),
            prime,
        }
    }
}

// ------------- PrimeRegistry -------------
/// The bijection between attribute values and primes.
///
/// Every new attribute value draws the next prime from the source, so primes
/// are globally unique across categories and the pairing never changes once
/// made. Both directions live in a single [`BiMap`], which means an assignment
/// is either fully visible or not visible at all.
#[derive(Debug)]
pub struct PrimeRegistry {
    kept: BiMap<Arc<AttributeValue>, Prime>,
    ascending: Vec<Prime>,
    source: PrimeSource,
}
impl PrimeRegistry {
    pub fn new() -> Self {
        Self {
            kept: BiMap::new(),
            ascending: Vec::new(),
            source: PrimeSource::new(),
        }
    }
    pub fn get_or_assign(&mut self, category: &str, value: &str) -> Result<Prime> {
        if category.is_empty() {
            return Err(SfiError::InvalidParameter(format!(
                "the value '{}' has an empty category name",
                value
            )));
        }
        let keepsake = AttributeValue::new(category, value);
        if let Some(prime) = self.kept.get_by_left(&keepsake) {
            return Ok(*prime);
        }
        let prime = self
            .source
            .generate()
            .ok_or_else(|| SfiError::CorruptAssignment("the prime source is exhausted".into()))?;
        self.kept
            .insert_no_overwrite(Arc::new(keepsake), prime)
            .map_err(|(attribute, prime)| {
                SfiError::corrupt_prime(prime, &format!("already issued when assigning {}", attribute))
            })?;
        self.ascending.push(prime);
        debug!(category, value, %prime, "assigned prime");
        Ok(prime)
    }
    /// Restores a previously made assignment. Returns whether it was already kept.
    pub fn retain(&mut self, assignment: PrimeAssignment) -> Result<bool> {
        let prime = assignment.prime;
        if !is_prime(prime.get()) {
            return Err(SfiError::corrupt_prime(prime, "is not a prime"));
        }
        let keepsake = AttributeValue::new(assignment.category, assignment.value);
        let by_value = self.kept.get_by_left(&keepsake).copied();
        let by_prime = self.kept.get_by_right(&prime).cloned();
        match (by_value, by_prime) {
            (Some(kept), _) if kept == prime => Ok(true),
            (Some(kept), _) => Err(SfiError::CorruptAssignment(format!(
                "{} is assigned {} but a snapshot assigns it {}",
                keepsake, kept, prime
            ))),
            (None, Some(attribute)) => Err(SfiError::corrupt_prime(
                prime,
                &format!("maps to both {} and {}", attribute, keepsake),
            )),
            (None, None) => {
                self.kept.insert(Arc::new(keepsake), prime);
                let position = self.ascending.partition_point(|p| *p < prime);
                self.ascending.insert(position, prime);
                self.source.retain(prime);
                Ok(false)
            }
        }
    }
    pub fn lookup_prime(&self, category: &str, value: &str) -> Option<Prime> {
        self.kept
            .get_by_left(&AttributeValue::new(category, value))
            .copied()
    }
    pub fn lookup_value(&self, prime: Prime) -> Option<&AttributeValue> {
        self.kept.get_by_right(&prime).map(|attribute| attribute.as_ref())
    }
    /// All assignments, grouped by category and ascending by prime within a category.
    pub fn all_assignments(&self) -> Vec<PrimeAssignment> {
        let mut assignments: Vec<PrimeAssignment> = self
            .primes_ascending()
            .map(|(prime, attribute)| PrimeAssignment::new(attribute, prime))
            .collect();
        // stable, so primes stay ascending within each category
        assignments.sort_by(|a, b| a.category.cmp(&b.category));
        assignments
    }
    pub fn primes_ascending(&self) -> impl Iterator<Item = (Prime, &AttributeValue)> + '_ {
        self.ascending
            .iter()
            .filter_map(|prime| self.lookup_value(*prime).map(|attribute| (*prime, attribute)))
    }
    // New primes are always drawn above every kept prime, so the latest
    // assignments are found at the tail of the ascending sequence.
    pub fn assignments_since(&self, kept: usize) -> Vec<PrimeAssignment> {
        self.ascending
            .iter()
            .skip(kept)
            .filter_map(|prime| {
                self.lookup_value(*prime)
                    .map(|attribute| PrimeAssignment::new(attribute, *prime))
            })
            .collect()
    }
    pub fn highest_prime(&self) -> Option<Prime> {
        self.ascending.last().copied()
    }
    pub fn len(&self) -> usize {
        self.ascending.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ascending.is_empty()
    }
}
impl Default for PrimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Record -------------
/// One value per category. Categories iterate in lexicographic order, which
/// is the order the encoder multiplies primes in.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }
    pub fn with(mut self, category: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(category, value);
        self
    }
    pub fn insert(&mut self, category: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(category.into(), value.into())
    }
    pub fn get(&self, category: &str) -> Option<&str> {
        self.0.get(category).map(String::as_str)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }
    pub fn categories(&self) -> btree_map::Keys<'_, String, String> {
        self.0.keys()
    }
    /// The given categories that this record does not populate.
    pub fn missing<'a>(&self, categories: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        categories
            .into_iter()
            .filter(|category| !self.0.contains_key(*category))
            .map(str::to_owned)
            .collect()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl<C: Into<String>, V: Into<String>> FromIterator<(C, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(c, v)| (c.into(), v.into())).collect())
    }
}
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(c, v)| format!("{}: {}", c, v)).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

// ------------- FactVector -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FactVector(BigUint);

impl FactVector {
    /// The empty product, which every encoding starts from.
    pub fn one() -> Self {
        Self(BigUint::one())
    }
    pub fn multiply(&mut self, prime: Prime) {
        self.0 *= prime.get();
    }
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
    pub fn is_divisible_by(&self, divisor: &BigUint) -> bool {
        !divisor.is_zero() && (&self.0 % divisor).is_zero()
    }
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }
}
impl From<BigUint> for FactVector {
    fn from(n: BigUint) -> Self {
        Self(n)
    }
}
impl From<u64> for FactVector {
    fn from(n: u64) -> Self {
        Self(BigUint::from(n))
    }
}
impl FromStr for FactVector {
    type Err = SfiError;
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SfiError::InvalidVector(format!(
                "'{}' is not a positive decimal integer",
                s
            )));
        }
        BigUint::from_str(digits)
            .map(Self)
            .map_err(|e| SfiError::InvalidVector(format!("'{}': {}", s, e)))
    }
}
impl fmt::Display for FactVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl Serialize for FactVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_str_radix(10))
    }
}
impl<'de> Deserialize<'de> for FactVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FactVectorVisitor;
        impl<'de> de::Visitor<'de> for FactVectorVisitor {
            type Value = FactVector;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal string")
            }
            fn visit_u64<E: de::Error>(self, n: u64) -> std::result::Result<FactVector, E> {
                Ok(FactVector::from(n))
            }
            fn visit_i64<E: de::Error>(self, n: i64) -> std::result::Result<FactVector, E> {
                u64::try_from(n)
                    .map(FactVector::from)
                    .map_err(|_| E::custom(format!("{n} is negative")))
            }
            fn visit_f64<E: de::Error>(self, n: f64) -> std::result::Result<FactVector, E> {
                Err(E::custom(format!(
                    "{n} is not exact, large fact vectors must be given as decimal strings"
                )))
            }
            fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<FactVector, E> {
                s.parse().map_err(E::custom)
            }
        }
        deserializer.deserialize_any(FactVectorVisitor)
    }
}
impl ToSql for FactVector {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_str_radix(10)))
    }
}
impl FromSql for FactVector {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: SfiError| FromSqlError::Other(Box::new(e)))
    }
}

// ------------- Shipment -------------
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub fact_vector: FactVector,
    pub generated_at: DateTime<Utc>,
}

// ------------- Database -------------
// The registry is the single mutation point and sits behind a write lock,
// readers take snapshots through the read side.
pub struct Database {
    registry: Arc<RwLock<PrimeRegistry>>,
    shipments: Arc<RwLock<Vec<Shipment>>>,
    // responsible for the the persistence layer
    persistor: Arc<Mutex<Persistor>>,
    // assignments below this index of the registry are known to be written
    persisted: Mutex<usize>,
}

impl Database {
    pub fn new(mode: PersistenceMode) -> Result<Database> {
        let persistor = Persistor::new(mode)?;
        let database = Database {
            registry: Arc::new(RwLock::new(PrimeRegistry::new())),
            shipments: Arc::new(RwLock::new(Vec::new())),
            persistor: Arc::new(Mutex::new(persistor)),
            persisted: Mutex::new(0),
        };
        database.restore()?;
        Ok(database)
    }
    fn restore(&self) -> Result<()> {
        let (assignments, shipments) = {
            let mut persistor = self.persistor.lock()?;
            (persistor.restore_assignments()?, persistor.restore_shipments()?)
        };
        let mut registry = self.registry.write()?;
        for assignment in assignments {
            registry.retain(assignment)?;
        }
        info!(
            assignments = registry.len(),
            shipments = shipments.len(),
            "restored database"
        );
        *self.persisted.lock()? = registry.len();
        *self.shipments.write()? = shipments;
        Ok(())
    }
    pub fn read_registry(&self) -> Result<RwLockReadGuard<'_, PrimeRegistry>> {
        Ok(self.registry.read()?)
    }
    pub fn read_shipments(&self) -> Result<RwLockReadGuard<'_, Vec<Shipment>>> {
        Ok(self.shipments.read()?)
    }
    pub fn assign(&self, category: &str, value: &str) -> Result<Prime> {
        let mut registry = self.registry.write()?;
        let prime = registry.get_or_assign(category, value);
        self.persist_pending(&registry)?;
        prime
    }
    /// Assigns primes to every value of the table, in table order.
    pub fn preassign(&self, table: &AttributeTable) -> Result<usize> {
        let mut registry = self.registry.write()?;
        let kept = registry.len();
        let mut outcome = Ok(());
        'groups: for group in table.groups() {
            for value in &group.values {
                if let Err(e) = registry.get_or_assign(&group.category, value) {
                    outcome = Err(e);
                    break 'groups;
                }
            }
        }
        self.persist_pending(&registry)?;
        outcome.map(|_| registry.len() - kept)
    }
    pub fn encode(&self, record: &Record) -> Result<FactVector> {
        let mut registry = self.registry.write()?;
        let vector = codec::encode(record, &mut registry);
        self.persist_pending(&registry)?;
        vector
    }
    pub fn encode_all(&self, records: &[Record]) -> Result<Vec<FactVector>> {
        let mut registry = self.registry.write()?;
        let vectors = records
            .iter()
            .map(|record| codec::encode(record, &mut registry))
            .collect::<Result<Vec<_>>>();
        // assignments made before a failing record stand and are persisted as well
        self.persist_pending(&registry)?;
        vectors
    }
    // Writes every assignment past the watermark. The watermark only moves
    // after a complete write, so assignments from a failed call are retried
    // by the next one. Callers hold the registry write lock.
    fn persist_pending(&self, registry: &PrimeRegistry) -> Result<()> {
        let mut persisted = self.persisted.lock()?;
        let pending = registry.assignments_since(*persisted);
        if pending.is_empty() {
            return Ok(());
        }
        let mut persistor = self.persistor.lock()?;
        for assignment in &pending {
            persistor.persist_assignment(assignment)?;
        }
        *persisted = registry.len();
        debug!(count = pending.len(), "persisted new prime assignments");
        Ok(())
    }
    /// Stored shipments are replaced as a whole, like a regenerated data file.
    pub fn replace_shipments(&self, shipments: Vec<Shipment>) -> Result<()> {
        self.persistor.lock()?.replace_shipments(&shipments)?;
        *self.shipments.write()? = shipments;
        Ok(())
    }
}
