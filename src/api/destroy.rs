//! Data destruction endpoint
//!
//! - POST / - Delete rows for a list of Connect_IDs under a named protocol
//! - POST /run_bq_data_destruction - Same handler, legacy function path

use crate::api::AppState;
use crate::destruction::delete_rows;
use crate::error::{DestructionError, Result};
use crate::registry::{Operation, Protocol, ProtocolRegistry};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// A request that passed validation.
#[derive(Debug)]
pub struct DestructionRequest<'a> {
    pub protocol: &'a Protocol,
    pub connect_ids: Vec<String>,
}

pub async fn run_data_destruction(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse> {
    // Oversized or unreadable bodies still get a JSON error
    let body = body.map_err(|rejection| DestructionError::RequestBodyRejected {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    let request = parse_request(&body, &state.registry)?;
    let protocol = request.protocol;

    info!(
        "Dispatching protocol {} ({}) for {} Connect_IDs",
        protocol.name,
        protocol.operation,
        request.connect_ids.len()
    );

    match protocol.operation {
        Operation::DeleteRow => {
            let outcome =
                delete_rows(state.store.as_ref(), &protocol.target, &request.connect_ids).await?;
            Ok((StatusCode::OK, Json(outcome.into_response_body())))
        }
        Operation::MaskFields => Err(DestructionError::OperationNotImplemented {
            operation: protocol.operation.to_string(),
        }),
    }
}

/// Validate a raw body against the registry. The first failing check wins.
pub fn parse_request<'a>(body: &[u8], registry: &'a ProtocolRegistry) -> Result<DestructionRequest<'a>> {
    let json: Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Body is not valid JSON: {}", e);
        DestructionError::InvalidRequestBody
    })?;
    let fields = json.as_object().ok_or(DestructionError::InvalidRequestBody)?;

    let name = match fields.get("protocol") {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => return Err(DestructionError::MissingOrInvalidProtocol),
    };

    let protocol = registry
        .get(name)
        .ok_or_else(|| DestructionError::UnsupportedProtocol {
            protocol: name.to_string(),
            allowed: registry.allowed_display(),
        })?;
    debug!("Resolved protocol {} to {}.{}", name, protocol.target.dataset, protocol.target.table);

    let raw_ids = match fields.get("connect_ids") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(DestructionError::InvalidIdsType {
                message: "connect_ids must be a list".to_string(),
            })
        }
    };

    let connect_ids = normalize_ids(raw_ids)?;
    if connect_ids.is_empty() {
        return Err(DestructionError::EmptyIds);
    }
    debug!("Normalized {} of {} Connect_IDs", connect_ids.len(), raw_ids.len());

    Ok(DestructionRequest {
        protocol,
        connect_ids,
    })
}

/// String form of each id, trimmed. Repeats are kept once, at their first
/// position. A blank id stays as `""` so it is reported like any other.
pub fn normalize_ids(raw: &[Value]) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut ids = Vec::with_capacity(raw.len());

    for value in raw {
        let id = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(DestructionError::InvalidIdsType {
                    message: format!("connect_ids entries must be strings or numbers, got {}", other),
                })
            }
        };

        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }

    Ok(ids)
}
