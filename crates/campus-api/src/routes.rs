use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campus_core::error::{IngestError, StoreError};
use campus_core::ingestion::{ImportSummary, Ingestor};
use campus_core::scoring::narrative::enrich_report;
use campus_core::scoring::{GlobalReport, Questionnaire, ReportAssembler, SubmittedReport};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::AppState;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => {
                error!("store operation failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

/// Takes the raw body so unparseable JSON still gets a summary back.
pub async fn import_catalog(
    State(state): State<Arc<AppState>>,
    body: String,
) -> (StatusCode, Json<ImportSummary>) {
    let ingestor = Ingestor::new(state.records.as_ref(), state.batch.clone());

    let result = match serde_json::from_str::<Value>(&body) {
        Ok(payload) => {
            ingestor
                .run(&payload, |event| {
                    debug!(phase = %event.phase, percent = event.percent, "import progress")
                })
                .await
        }
        Err(err) => Err(IngestError::from(err)),
    };

    match result {
        Ok(summary) => (StatusCode::OK, Json(summary)),
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ImportSummary::failed(format!("Error processing import: {err}"))),
        ),
    }
}

pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    Json(questionnaire): Json<Questionnaire>,
) -> Result<(StatusCode, Json<SubmittedReport>), ApiError> {
    let submitted = ReportAssembler::new(state.reports.as_ref())
        .submit(questionnaire)
        .await?;

    if let Some(generator) = state.narrative.clone() {
        let reports = state.reports.clone();
        let id = submitted.id.clone();
        let report = submitted.report.clone();
        tokio::spawn(async move {
            if let Err(err) = enrich_report(reports.as_ref(), generator.as_ref(), &id, &report).await {
                error!(report_id = %id, "failed to attach narrative: {err}");
            }
        });
    }

    Ok((StatusCode::CREATED, Json(submitted)))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GlobalReport>, ApiError> {
    Ok(Json(state.reports.fetch(&id).await?))
}
