//! SFI – shipment fact indexing with prime products.
//!
//! Every attribute value (a category paired with one of its values, such as
//! `origin = "Chicago"`) is assigned its own prime. A record selects one value
//! per category and is stored as the product of the selected primes, its
//! *fact vector*. Because primes are globally unique:
//! * A record matches a query exactly when the product of the queried primes
//!   divides its fact vector.
//! * A fact vector is decoded by trial division against the registered primes
//!   only, never by general factorization.
//!
//! ## Modules
//! * [`construct`] – Primes, attribute values, records, fact vectors, the
//!   [`construct::PrimeRegistry`] and the [`construct::Database`] owning it.
//! * [`prime`] – The [`prime::PrimeSource`] handing out primes in ascending order.
//! * [`codec`] – Encoding records into fact vectors and decoding them back.
//! * [`query`] – Compiling criteria into a divisor and filtering by divisibility.
//! * [`generate`] – Attribute tables and random shipment generation.
//! * [`persist`] – SQLite persistence & restoration layer.
//! * [`interface`] – The host operations: list primes, generate, filter, decode, lookup.
//! * [`server`] – JSON over HTTP on top of the interface.
//! * [`settings`] – Layered configuration.
//!
//! ## Quick Start
//! ```
//! use sfi::construct::{Database, Record};
//! use sfi::persist::PersistenceMode;
//! use sfi::query::{self, QueryCriteria};
//!
//! let db = Database::new(PersistenceMode::InMemory).unwrap();
//! let vector = db.encode(&Record::new().with("origin", "NYC").with("status", "delivered")).unwrap();
//! assert_eq!(vector.to_string(), "6");
//! let registry = db.read_registry().unwrap();
//! let divisor = query::compile(&QueryCriteria::new().with("origin", "NYC"), &registry).unwrap();
//! assert!(divisor.divides(&vector));
//! ```
//!
//! ## Concurrency
//! Assigning primes is the only mutation and happens behind the registry's
//! write lock. Filtering and decoding read a registry snapshot and spread
//! their work over a rayon pool.

pub mod codec;
pub mod construct;
pub mod error;
pub mod generate;
pub mod interface;
pub mod persist;
pub mod prime;
pub mod query;
pub mod server;
pub mod settings;

pub use error::{Result, SfiError};
