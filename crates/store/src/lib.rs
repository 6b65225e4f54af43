//! Transactional persistence for the marketplace.
//!
//! [`Store`] hands out [`Transaction`]s; every read and write of a workflow
//! goes through one transaction and becomes visible only on commit.
//! Two backends are provided: [`InMemoryStore`] for tests and local runs,
//! and [`PostgresStore`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{OrderFilter, Store, Transaction, constraints};
