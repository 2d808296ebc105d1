//! Filtering stored fact vectors by divisibility.
//!
//! Criteria compile into a single divisor, the product of the primes of the
//! wanted values. A vector matches when the divisor divides it, which holds
//! exactly when the record selected every wanted value (AND semantics).

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigUint;
use num_traits::One;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::construct::{FactVector, PrimeRegistry, Shipment};
use crate::error::{Result, SfiError};

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryCriteria(BTreeMap<String, String>);

impl QueryCriteria {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }
    pub fn with(mut self, category: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(category.into(), value.into());
        self
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl<C: Into<String>, V: Into<String>> FromIterator<(C, V)> for QueryCriteria {
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(c, v)| (c.into(), v.into())).collect())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Divisor(BigUint);

impl Divisor {
    pub fn divides(&self, vector: &FactVector) -> bool {
        vector.is_divisible_by(&self.0)
    }
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}
impl fmt::Display for Divisor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl Serialize for Divisor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_str_radix(10))
    }
}

/// Resolves every criterion to its prime and multiplies them. Never assigns primes.
pub fn compile(criteria: &QueryCriteria, registry: &PrimeRegistry) -> Result<Divisor> {
    if criteria.is_empty() {
        return Err(SfiError::EmptyQuery);
    }
    let mut product = BigUint::one();
    for (category, value) in criteria.iter() {
        let prime = registry
            .lookup_prime(category, value)
            .ok_or_else(|| SfiError::UnknownCriterion {
                category: category.to_owned(),
                value: value.to_owned(),
            })?;
        product *= prime.get();
    }
    debug!(criteria = criteria.len(), divisor = %product, "compiled query");
    Ok(Divisor(product))
}

/// Anything that carries a fact vector can be filtered.
pub trait Encoded {
    fn fact_vector(&self) -> &FactVector;
}
impl Encoded for FactVector {
    fn fact_vector(&self) -> &FactVector {
        self
    }
}
impl Encoded for Shipment {
    fn fact_vector(&self) -> &FactVector {
        &self.fact_vector
    }
}

/// The candidates whose vectors the divisor divides, in input order.
/// Candidates are spread over the rayon pool, the ordered collect keeps them in place.
pub fn filter<'c, T: Encoded + Sync>(candidates: &'c [T], divisor: &Divisor) -> Vec<&'c T> {
    candidates
        .par_iter()
        .filter(|candidate| divisor.divides(candidate.fact_vector()))
        .collect()
}
