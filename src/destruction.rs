//! Deletion routine: existence check, then a delete scoped to the rows that
//! were just confirmed, then a summary of what happened.

use crate::error::{DestructionError, Result};
use crate::registry::TableTarget;
use crate::store::ConnectIdStore;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

pub const NO_MATCH_MESSAGE: &str = "No matching Connect_IDs found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestructionOutcome {
    NoMatch {
        not_found: Vec<String>,
    },
    Deleted {
        qualified_table: String,
        deleted_ids: Vec<String>,
        not_found: Vec<String>,
    },
}

impl DestructionOutcome {
    pub fn deleted_ids(&self) -> &[String] {
        match self {
            DestructionOutcome::NoMatch { .. } => &[],
            DestructionOutcome::Deleted { deleted_ids, .. } => deleted_ids,
        }
    }

    pub fn not_found(&self) -> &[String] {
        match self {
            DestructionOutcome::NoMatch { not_found } => not_found,
            DestructionOutcome::Deleted { not_found, .. } => not_found,
        }
    }

    pub fn into_response_body(self) -> DestructionResponse {
        match self {
            DestructionOutcome::NoMatch { not_found } => DestructionResponse {
                message: NO_MATCH_MESSAGE.to_string(),
                deleted_ids: None,
                not_found,
            },
            DestructionOutcome::Deleted {
                qualified_table,
                deleted_ids,
                not_found,
            } => DestructionResponse {
                message: format!(
                    "Deleted {} records from {}",
                    deleted_ids.len(),
                    qualified_table
                ),
                deleted_ids: Some(deleted_ids),
                not_found,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DestructionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_ids: Option<Vec<String>>,
    pub not_found: Vec<String>,
}

/// Delete the rows of `target` whose identifiers are in `ids`.
///
/// `ids` must already be normalized and de-duplicated. The delete is only
/// issued for identifiers the existence check returned, so `deleted_ids` in
/// the outcome is exact. Store faults are not retried.
pub async fn delete_rows(
    store: &dyn ConnectIdStore,
    target: &TableTarget,
    ids: &[String],
) -> Result<DestructionOutcome> {
    let qualified_table = target.qualified_name(store.project());

    debug!(
        "Checking {} Connect_IDs against {}",
        ids.len(),
        qualified_table
    );

    let found = store.existing_ids(target, ids).await.map_err(|e| {
        error!("Existence check on {} failed: {}", qualified_table, e);
        DestructionError::query_failed(&qualified_table, e)
    })?;
    let found: HashSet<String> = found.into_iter().collect();

    // Keep the caller's ordering for both lists
    let (existing_ids, not_found): (Vec<String>, Vec<String>) =
        ids.iter().cloned().partition(|id| found.contains(id));

    if existing_ids.is_empty() {
        info!(
            "No matching Connect_IDs in {} ({} not found)",
            qualified_table,
            not_found.len()
        );
        return Ok(DestructionOutcome::NoMatch { not_found });
    }

    debug!(
        "Deleting {} Connect_IDs from {}",
        existing_ids.len(),
        qualified_table
    );

    let affected = store.delete_ids(target, &existing_ids).await.map_err(|e| {
        error!(
            "Delete on {} failed for {} Connect_IDs: {}",
            qualified_table,
            existing_ids.len(),
            e
        );
        DestructionError::query_failed(&qualified_table, e)
    })?;

    if affected < existing_ids.len() as u64 {
        // Rows went away between the two statements
        warn!(
            "Delete on {} removed {} rows for {} confirmed Connect_IDs",
            qualified_table,
            affected,
            existing_ids.len()
        );
    }

    info!(
        "Deleted {} Connect_IDs ({} rows) from {}, {} not found",
        existing_ids.len(),
        affected,
        qualified_table,
        not_found.len()
    );

    Ok(DestructionOutcome::Deleted {
        qualified_table,
        deleted_ids: existing_ids,
        not_found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreCall};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn target() -> TableTarget {
        TableTarget::new("D", "T")
    }

    #[tokio::test]
    async fn test_mixed_ids_delete_only_existing() {
        let store = MemoryStore::new("proj").with_table("D", "T", ["1", "2", "5"]);

        let outcome = delete_rows(&store, &target(), &ids(&["1", "3", "2", "4"]))
            .await
            .unwrap();

        assert_eq!(outcome.deleted_ids(), ids(&["1", "2"]).as_slice());
        assert_eq!(outcome.not_found(), ids(&["3", "4"]).as_slice());
        assert_eq!(store.delete_calls().await, vec![ids(&["1", "2"])]);
        assert_eq!(store.rows("D", "T").await.unwrap(), ids(&["5"]));
    }

    #[tokio::test]
    async fn test_no_match_skips_delete() {
        let store = MemoryStore::new("proj").with_table("D", "T", ["1"]);

        let outcome = delete_rows(&store, &target(), &ids(&["7", "8"]))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DestructionOutcome::NoMatch {
                not_found: ids(&["7", "8"])
            }
        );
        assert_eq!(
            store.calls().await,
            vec![StoreCall::ExistenceCheck {
                target: "proj.D.T".to_string(),
                ids: ids(&["7", "8"]),
            }]
        );
    }

    #[tokio::test]
    async fn test_second_run_finds_nothing() {
        let store = MemoryStore::new("proj").with_table("D", "T", ["1", "2"]);
        let request = ids(&["1", "2"]);

        let first = delete_rows(&store, &target(), &request).await.unwrap();
        assert_eq!(first.deleted_ids(), request.as_slice());

        let second = delete_rows(&store, &target(), &request).await.unwrap();
        assert!(second.deleted_ids().is_empty());
        assert_eq!(second.not_found(), request.as_slice());
        assert_eq!(store.delete_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_existence_failure_is_query_error() {
        let store = MemoryStore::new("proj").with_table("D", "T", ["1"]);
        store.fail_existence_check("Access Denied: Table proj.D.T").await;

        let err = delete_rows(&store, &target(), &ids(&["1"]))
            .await
            .unwrap_err();

        match err {
            DestructionError::QueryExecutionFailure { target, cause } => {
                assert_eq!(target, "proj.D.T");
                assert!(cause.contains("Access Denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.delete_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_is_not_retried() {
        let store = MemoryStore::new("proj").with_table("D", "T", ["1"]);
        store.fail_delete("deadline exceeded").await;

        let err = delete_rows(&store, &target(), &ids(&["1"]))
            .await
            .unwrap_err();

        assert!(matches!(err, DestructionError::QueryExecutionFailure { .. }));
        assert_eq!(store.delete_calls().await.len(), 1);
        assert_eq!(store.rows("D", "T").await.unwrap(), ids(&["1"]));
    }

    #[test]
    fn test_response_bodies() {
        let deleted = DestructionOutcome::Deleted {
            qualified_table: "proj.D.T".to_string(),
            deleted_ids: ids(&["1"]),
            not_found: ids(&["3"]),
        };
        let body = serde_json::to_value(deleted.into_response_body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "message": "Deleted 1 records from proj.D.T",
                "deleted_ids": ["1"],
                "not_found": ["3"]
            })
        );

        let none = DestructionOutcome::NoMatch {
            not_found: ids(&["3"]),
        };
        let body = serde_json::to_value(none.into_response_body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "message": "No matching Connect_IDs found",
                "not_found": ["3"]
            })
        );
    }
}
