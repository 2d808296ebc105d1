//! Layered configuration: built-in defaults, then an optional `sfi.toml`
//! (or any other format the `config` crate understands), then `SFI_*`
//! environment variables.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::generate::AttributeTable;
use crate::persist::PersistenceMode;

pub const IN_MEMORY: &str = ":memory:";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file holding the registry and the shipments, `:memory:` keeps nothing.
    pub database: String,
    pub bind: String,
    pub seed: Option<u64>,
    pub default_count: usize,
    /// Assign primes to the whole attribute table at startup, in table order.
    pub preassign: bool,
    pub attributes: AttributeTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: "sfi.db".into(),
            bind: "0.0.0.0:5000".into(),
            seed: None,
            default_count: 100,
            preassign: true,
            attributes: AttributeTable::shipments(),
        }
    }
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name("sfi").required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(source)
            .add_source(Environment::with_prefix("SFI"))
            .build()?
            .try_deserialize()?;
        settings.attributes.validate()?;
        Ok(settings)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        if self.database == IN_MEMORY {
            PersistenceMode::InMemory
        } else {
            PersistenceMode::File(self.database.clone())
        }
    }
}
