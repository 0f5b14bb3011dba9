//! API handlers for the policy API
//!
//! Provides REST endpoints for:
//! - Document ingestion, listing, chunks and removal
//! - Grounded summaries
//! - Question answering
//! - Summary evaluation

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use grounding_engine::DetailLevel;
use policy_types::{EvaluationReport, Page, PolicySummary, QaResponse, Unit};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

type AppResult<T> = Result<Json<T>, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "policy-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Extracted pages of one policy document
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub pages: Vec<Page>,
    #[serde(default)]
    pub source_name: Option<String>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub doc_id: String,
    pub page_count: usize,
    pub unit_count: usize,
}

/// Handler: POST /api/documents
pub async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> AppResult<IngestResponse> {
    debug!(pages = request.pages.len(), "Ingest request");
    let record = state.engine.ingest(request.pages, request.source_name).await?;

    Ok(Json(IngestResponse {
        success: true,
        page_count: record.page_count(),
        unit_count: record.units.len(),
        doc_id: record.doc_id,
    }))
}

#[derive(Serialize)]
pub struct DocumentListResponse {
    pub success: bool,
    pub documents: Vec<String>,
    pub count: usize,
}

/// Handler: GET /api/documents
pub async fn handle_list_documents(State(state): State<Arc<AppState>>) -> AppResult<DocumentListResponse> {
    let documents = state.engine.list_documents().await?;
    let count = documents.len();
    Ok(Json(DocumentListResponse {
        success: true,
        documents,
        count,
    }))
}

#[derive(Serialize)]
pub struct ChunksResponse {
    pub success: bool,
    pub doc_id: String,
    pub chunks: Vec<Unit>,
    pub count: usize,
}

/// Handler: GET /api/documents/:id/chunks
pub async fn handle_chunks(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> AppResult<ChunksResponse> {
    let chunks = state.engine.units(&doc_id).await?;
    let count = chunks.len();
    Ok(Json(ChunksResponse {
        success: true,
        doc_id,
        chunks,
        count,
    }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub doc_id: String,
}

/// Handler: DELETE /api/documents/:id
pub async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> AppResult<DeleteResponse> {
    state.engine.delete_document(&doc_id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        doc_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryRequest {
    #[serde(default)]
    pub detail: DetailLevel,
}

/// Handler: POST /api/documents/:id/summary
///
/// The body is optional; without one a standard summary is produced.
pub async fn handle_generate_summary(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
    request: Option<Json<SummaryRequest>>,
) -> AppResult<PolicySummary> {
    let detail = request.map(|Json(r)| r.detail).unwrap_or_default();
    info!(doc_id = %doc_id, ?detail, "Summary request");
    let summary = state.engine.summarize(&doc_id, detail).await?;
    Ok(Json(summary))
}

/// Handler: GET /api/documents/:id/summary
pub async fn handle_get_summary(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> AppResult<PolicySummary> {
    state
        .engine
        .stored_summary(&doc_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No summary for document {}", doc_id)))
}

#[derive(Debug, Deserialize)]
pub struct QaRequest {
    pub question: String,
}

/// Handler: POST /api/documents/:id/qa
pub async fn handle_qa(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
    Json(request): Json<QaRequest>,
) -> AppResult<QaResponse> {
    const MAX_QUESTION_CHARS: usize = 2000;
    if request.question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::InvalidRequest(format!(
            "question longer than {} characters",
            MAX_QUESTION_CHARS
        )));
    }

    let response = state.engine.answer(&doc_id, &request.question).await?;
    Ok(Json(response))
}

/// Handler: POST /api/documents/:id/evaluation
pub async fn handle_evaluate(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> AppResult<EvaluationReport> {
    let report = state.engine.evaluate(&doc_id).await?;
    Ok(Json(report))
}

/// Handler: GET /api/documents/:id/evaluation
pub async fn handle_get_evaluation(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> AppResult<EvaluationReport> {
    state
        .engine
        .stored_evaluation(&doc_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No evaluation for document {}", doc_id)))
}
