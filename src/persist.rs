// used for persistence
use rusqlite::{params, Connection, Error, OptionalExtension};
use tracing::debug;

use crate::construct::{PrimeAssignment, Shipment};
use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// ------------- Persistence -------------
pub struct Persistor {
    pub db: Connection,
    pub mode: PersistenceMode,
}
impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Persistor> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            create table if not exists PrimeAssignment (
                Prime integer not null,
                Category text not null,
                Value text not null,
                constraint referenceable_Prime primary key (
                    Prime
                ),
                constraint unique_AttributeValue unique (
                    Category,
                    Value
                )
            );-- STRICT;
            create table if not exists Shipment (
                Shipment_Identity text not null,
                FactVector text not null,
                GeneratedAt text not null,
                constraint referenceable_Shipment_Identity primary key (
                    Shipment_Identity
                )
            );-- STRICT;
            ",
        )?;
        debug!(?mode, "opened persistor");
        Ok(Persistor {
            db: connection,
            mode,
        })
    }
    /// Returns whether the assignment was already persisted.
    pub fn persist_assignment(&mut self, assignment: &PrimeAssignment) -> Result<bool> {
        let existing = self
            .db
            .prepare_cached(
                "
                select Prime
                    from PrimeAssignment
                    where Prime = ?
            ",
            )?
            .query_row(params![&assignment.prime], |r| r.get::<_, i64>(0))
            .optional()?;
        if existing.is_some() {
            return Ok(true);
        }
        self.db
            .prepare_cached(
                "
                insert into PrimeAssignment (
                    Prime,
                    Category,
                    Value
                ) values (?, ?, ?)
            ",
            )?
            .execute(params![&assignment.prime, &assignment.category, &assignment.value])?;
        Ok(false)
    }
    pub fn replace_shipments(&mut self, shipments: &[Shipment]) -> Result<()> {
        let transaction = self.db.transaction()?;
        transaction.execute("delete from Shipment", [])?;
        {
            let mut add_shipment = transaction.prepare_cached(
                "
                insert into Shipment (
                    Shipment_Identity,
                    FactVector,
                    GeneratedAt
                ) values (?, ?, ?)
            ",
            )?;
            for shipment in shipments {
                add_shipment.execute(params![
                    &shipment.id,
                    &shipment.fact_vector,
                    &shipment.generated_at
                ])?;
            }
        }
        transaction.commit()?;
        debug!(shipments = shipments.len(), "persisted shipments");
        Ok(())
    }
    // Ascending by prime, which is the order the primes were issued in.
    pub fn restore_assignments(&mut self) -> Result<Vec<PrimeAssignment>> {
        let mut all_assignments = self.db.prepare_cached(
            "
            select Prime, Category, Value
                from PrimeAssignment
                order by Prime
        ",
        )?;
        let assignments = all_assignments
            .query_map([], |row| {
                Ok(PrimeAssignment {
                    prime: row.get(0)?,
                    category: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, Error>>()?;
        Ok(assignments)
    }
    pub fn restore_shipments(&mut self) -> Result<Vec<Shipment>> {
        let mut all_shipments = self.db.prepare_cached(
            "
            select Shipment_Identity, FactVector, GeneratedAt
                from Shipment
                order by rowid
        ",
        )?;
        let shipments = all_shipments
            .query_map([], |row| {
                Ok(Shipment {
                    id: row.get(0)?,
                    fact_vector: row.get(1)?,
                    generated_at: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, Error>>()?;
        Ok(shipments)
    }
}
