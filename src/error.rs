use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DestructionError {
    #[error("Request body must be a valid JSON object")]
    InvalidRequestBody,

    #[error("Request body could not be read: {message}")]
    RequestBodyRejected { status: StatusCode, message: String },

    #[error("Missing or invalid parameter: protocol (str)")]
    MissingOrInvalidProtocol,

    #[error("'{protocol}' is not a supported protocol. Allowed: {allowed}")]
    UnsupportedProtocol { protocol: String, allowed: String },

    #[error("{message}")]
    InvalidIdsType { message: String },

    #[error("connect_ids must be a non-empty list")]
    EmptyIds,

    #[error("Function '{operation}' not implemented")]
    OperationNotImplemented { operation: String },

    #[error("{cause}")]
    QueryExecutionFailure { target: String, cause: String },
}

impl DestructionError {
    /// Stable code used in log records.
    pub fn code(&self) -> &'static str {
        match self {
            DestructionError::InvalidRequestBody
            | DestructionError::RequestBodyRejected { .. } => "INVALID_BODY",
            DestructionError::MissingOrInvalidProtocol => "MISSING_PROTOCOL",
            DestructionError::UnsupportedProtocol { .. } => "UNSUPPORTED_PROTOCOL",
            DestructionError::InvalidIdsType { .. } => "INVALID_IDS_TYPE",
            DestructionError::EmptyIds => "EMPTY_IDS",
            DestructionError::OperationNotImplemented { .. } => "OPERATION_NOT_IMPLEMENTED",
            DestructionError::QueryExecutionFailure { .. } => "QUERY_FAILED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DestructionError::RequestBodyRejected { status, .. } => *status,
            DestructionError::OperationNotImplemented { .. }
            | DestructionError::QueryExecutionFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Fully qualified table a store failure happened on.
    pub fn target(&self) -> Option<&str> {
        match self {
            DestructionError::QueryExecutionFailure { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn query_failed(target: impl Into<String>, err: StoreError) -> Self {
        DestructionError::QueryExecutionFailure {
            target: target.into(),
            cause: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for DestructionError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                table = self.target().unwrap_or("-"),
                "Request failed: {}",
                self
            );
        } else {
            tracing::warn!(code = self.code(), "Request rejected: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, DestructionError>;
