//! Error types for the policy API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grounding_engine::{IngestError, PipelineError, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    InvalidDocument { code: &'static str, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::InvalidDocument { code, .. } => (StatusCode::BAD_REQUEST, *code),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "DOCUMENT_NOT_FOUND"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Generation(_) => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

fn ingest_code(err: &IngestError) -> &'static str {
    match err {
        IngestError::NoPages => "NO_PAGES",
        IngestError::NoExtractableText => "NO_EXTRACTABLE_TEXT",
        IngestError::NoUnits => "NO_UNITS",
        IngestError::InvalidPageNumber(_) => "INVALID_PAGE_NUMBER",
        IngestError::DuplicatePage(_) => "DUPLICATE_PAGE",
        IngestError::NotAPolicy { .. } => "NOT_A_POLICY",
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Ingest(e) => ApiError::InvalidDocument {
                code: ingest_code(&e),
                message: e.to_string(),
            },
            PipelineError::DocumentNotFound(id) => ApiError::DocumentNotFound(id),
            PipelineError::Generation(e) => ApiError::Generation(format!("{:#}", e)),
            PipelineError::Store(e) => match e.downcast_ref::<StoreError>() {
                Some(StoreError::InvalidDocumentId(id)) => {
                    ApiError::InvalidRequest(format!("invalid document id '{}'", id))
                }
                Some(StoreError::NotFound(id)) => ApiError::DocumentNotFound(id.clone()),
                _ => {
                    error!(error = %e, "Storage failure");
                    ApiError::Internal(e.to_string())
                }
            },
            PipelineError::Retrieval(e) => {
                error!(error = %e, "Retrieval failure");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_map_to_status() {
        let status = |e: PipelineError| ApiError::from(e).into_response().status();
        assert_eq!(
            status(PipelineError::Ingest(IngestError::NoPages)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(PipelineError::DocumentNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(PipelineError::Generation(anyhow::anyhow!("timeout"))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(PipelineError::Store(StoreError::InvalidDocumentId("../x".into()).into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(PipelineError::Retrieval(anyhow::anyhow!("index gone"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
