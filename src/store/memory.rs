use super::{ConnectIdStore, StoreError};
use crate::registry::TableTarget;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// A statement the store was asked to run, with its bound identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ExistenceCheck { target: String, ids: Vec<String> },
    Delete { target: String, ids: Vec<String> },
}

#[derive(Default)]
struct Failures {
    existence: Option<String>,
    delete: Option<String>,
}

/// In-memory store that records every call. Rows are raw identifier values
/// and may carry surrounding whitespace, like the real table can.
pub struct MemoryStore {
    project: String,
    tables: Mutex<HashMap<(String, String), Vec<String>>>,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<Failures>,
}

impl MemoryStore {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
        }
    }

    pub fn with_table<I, S>(mut self, dataset: &str, table: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.get_mut().insert(
            (dataset.to_string(), table.to_string()),
            rows.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub async fn fail_existence_check(&self, cause: &str) {
        self.failures.lock().await.existence = Some(cause.to_string());
    }

    pub async fn fail_delete(&self, cause: &str) {
        self.failures.lock().await.delete = Some(cause.to_string());
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    pub async fn delete_calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                StoreCall::Delete { ids, .. } => Some(ids.clone()),
                StoreCall::ExistenceCheck { .. } => None,
            })
            .collect()
    }

    /// Current rows of a table, if it exists.
    pub async fn rows(&self, dataset: &str, table: &str) -> Option<Vec<String>> {
        self.tables
            .lock()
            .await
            .get(&(dataset.to_string(), table.to_string()))
            .cloned()
    }

    fn key(target: &TableTarget) -> (String, String) {
        (target.dataset.clone(), target.table.clone())
    }

    fn missing_table(&self, target: &TableTarget) -> StoreError {
        StoreError::Query(format!(
            "Not found: Table {} was not found",
            target.qualified_name(&self.project)
        ))
    }
}

#[async_trait]
impl ConnectIdStore for MemoryStore {
    fn project(&self) -> &str {
        &self.project
    }

    async fn existing_ids(&self, target: &TableTarget, ids: &[String]) -> Result<Vec<String>, StoreError> {
        self.calls.lock().await.push(StoreCall::ExistenceCheck {
            target: target.qualified_name(&self.project),
            ids: ids.to_vec(),
        });

        if let Some(cause) = &self.failures.lock().await.existence {
            return Err(StoreError::Query(cause.clone()));
        }

        let tables = self.tables.lock().await;
        let rows = tables
            .get(&Self::key(target))
            .ok_or_else(|| self.missing_table(target))?;

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let found = rows
            .iter()
            .map(|row| row.trim())
            .filter(|id| wanted.contains(id) && seen.insert(*id))
            .map(str::to_string)
            .collect();

        Ok(found)
    }

    async fn delete_ids(&self, target: &TableTarget, ids: &[String]) -> Result<u64, StoreError> {
        self.calls.lock().await.push(StoreCall::Delete {
            target: target.qualified_name(&self.project),
            ids: ids.to_vec(),
        });

        if let Some(cause) = &self.failures.lock().await.delete {
            return Err(StoreError::Query(cause.clone()));
        }

        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(&Self::key(target))
            .ok_or_else(|| self.missing_table(target))?;

        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = rows.len();
        rows.retain(|row| !doomed.contains(row.trim()));

        Ok((before - rows.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
