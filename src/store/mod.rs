//! Data-store clients used by the deletion routine.
//!
//! `ConnectIdStore` is the seam between request handling and the query
//! engine. `PgStore` talks to PostgreSQL; `MemoryStore` keeps tables in memory
//! and records every statement it is asked to run.

mod memory;
mod postgres;
mod sql;

pub use memory::{MemoryStore, StoreCall};
pub use postgres::PgStore;
pub use sql::{delete_statement, existence_statement, quote_identifier};

use crate::registry::TableTarget;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StoreError::Connection(format!("Pool error: {}", err))
    }
}

#[async_trait]
pub trait ConnectIdStore: Send + Sync {
    /// Name of the project (database) the targets live in.
    fn project(&self) -> &str;

    /// Identifiers from `ids` that currently have at least one row in `target`.
    /// `ids` is bound as a single string-array parameter.
    async fn existing_ids(&self, target: &TableTarget, ids: &[String]) -> Result<Vec<String>, StoreError>;

    /// Delete every row whose identifier is in `ids` and wait for completion.
    /// Returns the number of rows removed.
    async fn delete_ids(&self, target: &TableTarget, ids: &[String]) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
