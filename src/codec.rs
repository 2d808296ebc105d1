//! Encoding records into fact vectors and decoding them back.
//!
//! Decoding is closed-world factorization: a vector is only ever divided by
//! the primes the registry has handed out, in ascending order. A residual that
//! none of them explains means the vector and the registry disagree, it is
//! never factored any further.

use std::collections::HashMap;

use num_integer::Integer;
use num_traits::{One, Zero};
use rayon::prelude::*;
use tracing::{error, trace};

use crate::construct::{FactVector, OtherHasher, Prime, PrimeRegistry, Record};
use crate::error::{Result, SfiError};

/// Multiplies the primes of the record's values, assigning primes to values
/// seen for the first time. Categories are visited in lexicographic order.
pub fn encode(record: &Record, registry: &mut PrimeRegistry) -> Result<FactVector> {
    if record.is_empty() {
        return Err(SfiError::InvalidParameter(
            "a record must populate at least one category".into(),
        ));
    }
    // validate everything before the registry is touched
    if let Some((_, value)) = record.iter().find(|(category, _)| category.is_empty()) {
        return Err(SfiError::InvalidParameter(format!(
            "the value '{}' has an empty category name",
            value
        )));
    }
    let mut vector = FactVector::one();
    for (category, value) in record.iter() {
        let prime = registry.get_or_assign(category, value)?;
        vector.multiply(prime);
    }
    trace!(%record, %vector, "encoded");
    Ok(vector)
}

pub fn decode(vector: &FactVector, registry: &PrimeRegistry) -> Result<Record> {
    if vector.is_zero() {
        return Err(SfiError::InvalidVector("0 is not a product of primes".into()));
    }
    if vector.is_one() {
        return Err(SfiError::InvalidVector(
            "1 is the empty product and populates no category".into(),
        ));
    }
    let mut remainder = vector.as_biguint().clone();
    let mut record = Record::new();
    let mut seen: HashMap<&str, Prime, OtherHasher> = HashMap::default();
    for (prime, attribute) in registry.primes_ascending() {
        if remainder.is_one() {
            break;
        }
        let divisor = prime.to_biguint();
        // no larger prime can divide what is left
        if divisor > remainder {
            break;
        }
        let (quotient, rest) = remainder.div_rem(&divisor);
        if !rest.is_zero() {
            continue;
        }
        if quotient.is_multiple_of(&divisor) {
            return Err(SfiError::InvalidVector(format!(
                "{} is divisible by {} more than once and cannot be an encoding",
                vector, prime
            )));
        }
        if let Some(previous) = seen.insert(attribute.category(), prime) {
            let corruption = SfiError::CorruptAssignment(format!(
                "primes {} and {} of category '{}' both divide {}",
                previous,
                prime,
                attribute.category(),
                vector
            ));
            error!(error = %corruption, "registry invariant violated while decoding");
            return Err(corruption);
        }
        record.insert(attribute.category(), attribute.value());
        remainder = quotient;
    }
    if !remainder.is_one() {
        return Err(SfiError::UnknownFactor {
            vector: vector.clone(),
            residual: FactVector::from(remainder),
        });
    }
    Ok(record)
}

/// Decodes many vectors against one registry snapshot, in parallel, keeping input order.
pub fn decode_all(vectors: &[&FactVector], registry: &PrimeRegistry) -> Vec<Result<Record>> {
    vectors
        .par_iter()
        .map(|vector| decode(vector, registry))
        .collect()
}
