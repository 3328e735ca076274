use super::sql::{delete_statement, existence_statement};
use super::{ConnectIdStore, StoreError};
use crate::config::Config;
use crate::registry::TableTarget;
use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Object, Pool, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// PostgreSQL-backed store. A dataset maps to a schema and the project to the
/// database the pool is connected to.
pub struct PgStore {
    pool: Pool,
    project: String,
}

impl PgStore {
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let pool = create_pool(&config.database_url, config.max_connections)?;

        let client = pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Ping and discover the database name in one round trip
        let row = client
            .query_one("SELECT current_database()", &[])
            .await
            .map_err(|e| StoreError::Connection(format!("Ping failed: {}", e)))?;
        let database: String = row.get(0);

        let project = config.project_id.clone().unwrap_or(database);

        info!("Connected to PostgreSQL, project: {}", project);

        Ok(Self { pool, project })
    }

    async fn client(&self) -> Result<Object, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ConnectIdStore for PgStore {
    fn project(&self) -> &str {
        &self.project
    }

    async fn existing_ids(&self, target: &TableTarget, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let client = self.client().await?;
        let query = existence_statement(target);

        debug!("Executing existence check: {}", query);

        let rows = client.query(&query, &[&ids]).await?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, String>("connect_id")
                    .map_err(StoreError::from)
            })
            .collect()
    }

    async fn delete_ids(&self, target: &TableTarget, ids: &[String]) -> Result<u64, StoreError> {
        let client = self.client().await?;
        let query = delete_statement(target);

        debug!("Executing delete: {}", query);

        let affected = client.execute(&query, &[&ids]).await?;
        Ok(affected)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client.execute("SELECT 1", &[]).await?;
        Ok(())
    }
}

fn create_pool(database_url: &str, max_size: u32) -> Result<Pool, StoreError> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| StoreError::Connection(format!("Failed to create pool: {}", e)))
}
