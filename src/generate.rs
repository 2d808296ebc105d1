//! Random shipments drawn from an attribute table.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::construct::{OtherHasher, Record};
use crate::error::{Result, SfiError};

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AttributeGroup {
    pub category: String,
    pub values: Vec<String>,
}
impl AttributeGroup {
    pub fn new(category: &str, values: &[&str]) -> Self {
        Self {
            category: category.to_owned(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// The allowed values per category, in the order they were listed.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTable(Vec<AttributeGroup>);

impl AttributeTable {
    pub fn new(groups: Vec<AttributeGroup>) -> Result<Self> {
        let table = Self(groups);
        table.validate()?;
        Ok(table)
    }
    pub fn shipments() -> Self {
        Self(vec![
            AttributeGroup::new("origin", &["New York", "Los Angeles", "Chicago", "Houston", "Miami"]),
            AttributeGroup::new("destination", &["London", "Tokyo", "Paris", "Sydney", "Berlin"]),
            AttributeGroup::new("carrier", &["PrimeShip", "SwiftLog", "GlobalEx", "CargoFast"]),
            AttributeGroup::new("status", &["Pending", "In Transit", "Delivered", "Delayed", "Customs Hold"]),
            AttributeGroup::new("priority", &["Standard", "Express", "Overnight"]),
        ])
    }
    // Tables also arrive through configuration, so this is public.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(SfiError::InvalidParameter("the attribute table has no categories".into()));
        }
        let mut categories: HashSet<&str, OtherHasher> = HashSet::default();
        for group in &self.0 {
            if group.category.is_empty() {
                return Err(SfiError::InvalidParameter("a category has an empty name".into()));
            }
            if !categories.insert(&group.category) {
                return Err(SfiError::InvalidParameter(format!(
                    "category '{}' is listed more than once",
                    group.category
                )));
            }
            if group.values.is_empty() {
                return Err(SfiError::InvalidParameter(format!(
                    "category '{}' has no values",
                    group.category
                )));
            }
            let mut values: HashSet<&str, OtherHasher> = HashSet::default();
            if let Some(duplicate) = group.values.iter().find(|v| !values.insert(v.as_str())) {
                return Err(SfiError::InvalidParameter(format!(
                    "value '{}' is listed more than once in category '{}'",
                    duplicate, group.category
                )));
            }
        }
        Ok(())
    }
    pub fn groups(&self) -> &[AttributeGroup] {
        &self.0
    }
    pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|group| group.category.as_str())
    }
}
impl Default for AttributeTable {
    fn default() -> Self {
        Self::shipments()
    }
}

/// Picks one value per category uniformly. Seeded generators repeat themselves.
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
    pub fn record(&mut self, table: &AttributeTable) -> Record {
        table
            .groups()
            .iter()
            .filter_map(|group| {
                group
                    .values
                    .choose(&mut self.rng)
                    .map(|value| (group.category.clone(), value.clone()))
            })
            .collect()
    }
    /// Identifiers look like `SHP` followed by five random digits and the sequence number.
    pub fn shipment_id(&mut self, sequence: usize) -> String {
        format!("SHP{:05}{:03}", self.rng.gen_range(10000..=99999), sequence)
    }
}
