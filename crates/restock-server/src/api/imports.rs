//! Batch submission, job status, and stop endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use restock_core::dedup::DuplicateMatch;
use restock_core::{JobStatus, RawInputRecord};
use restock_pipeline::{
    run_job, submit_batch, BatchOptions, RejectedInput, StopHandle, SubmitError,
};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SubmitRequest {
    pub raw_inputs: Vec<String>,
    #[serde(default)]
    pub options: BatchOptions,
}

#[derive(Debug, Serialize)]
pub(super) struct SubmitResponse {
    job_id: Uuid,
    accepted_count: usize,
    rejected_inputs: Vec<RejectedInput>,
    duplicates: Vec<DuplicateMatch>,
}

/// `POST /api/v1/imports` — validates and registers a batch synchronously,
/// then processes it on a background task. Budget exhaustion and empty
/// batches are rejected here with no job created.
pub(super) async fn submit_import(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitResponse>>), ApiError> {
    let raw_inputs: Vec<RawInputRecord> = request
        .raw_inputs
        .into_iter()
        .map(RawInputRecord::from_reference)
        .collect();

    let (receipt, plan) = submit_batch(
        &state.pool,
        &state.pool,
        &state.budget,
        raw_inputs,
        request.options,
        state.fuzzy_threshold,
        "api",
    )
    .await
    .map_err(|e| map_submit_error(req_id.0.clone(), &e))?;

    let stop = StopHandle::new();
    state.registry.register(receipt.job.public_id, stop.clone());

    let pool = state.pool.clone();
    let pipeline = std::sync::Arc::clone(&state.pipeline);
    let enricher = std::sync::Arc::clone(&state.enricher);
    let pusher = state.pusher.clone();
    tokio::spawn(async move {
        run_job(
            plan,
            &pipeline,
            &pool,
            &pool,
            enricher.as_ref(),
            pusher.as_deref(),
            stop,
        )
        .await;
    });

    let data = SubmitResponse {
        job_id: receipt.job.public_id,
        accepted_count: receipt.accepted_count,
        rejected_inputs: receipt.rejected_inputs,
        duplicates: receipt.duplicates,
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

fn map_submit_error(request_id: String, error: &SubmitError) -> ApiError {
    match error {
        SubmitError::EmptyBatch => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        SubmitError::BudgetExceeded { .. } => {
            ApiError::new(request_id, "budget_exceeded", error.to_string())
        }
        SubmitError::Store(e) => {
            tracing::error!(error = %e, "batch submission failed on the store");
            ApiError::new(request_id, "internal_error", "batch submission failed")
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ImportsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ImportJobItem {
    job_id: Uuid,
    status: String,
    trigger_source: String,
    total: i32,
    processed: i32,
    succeeded: i32,
    failed: i32,
    skipped: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<restock_db::ImportJobRow> for ImportJobItem {
    fn from(row: restock_db::ImportJobRow) -> Self {
        Self {
            job_id: row.public_id,
            status: row.status,
            trigger_source: row.trigger_source,
            total: row.total,
            processed: row.processed,
            succeeded: row.succeeded,
            failed: row.failed,
            skipped: row.skipped,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}

/// `GET /api/v1/imports` — most recent jobs.
pub(super) async fn list_imports(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ImportsQuery>,
) -> Result<Json<ApiResponse<Vec<ImportJobItem>>>, ApiError> {
    let rows = restock_db::list_import_jobs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(ImportJobItem::from).collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct JobErrorItem {
    identifier: Option<String>,
    kind: String,
    message: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct ImportJobDetail {
    #[serde(flatten)]
    job: ImportJobItem,
    errors: Vec<JobErrorItem>,
}

/// `GET /api/v1/imports/{job_id}` — the pollable job read model, including
/// the full error list (the single source of truth for partial failure).
pub(super) async fn get_import(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ImportJobDetail>>, ApiError> {
    let row = restock_db::get_import_job_by_public_id(&state.pool, job_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let errors = restock_db::list_job_errors(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .into_iter()
        .map(|e| JobErrorItem {
            identifier: e.identifier,
            kind: e.kind,
            message: e.message,
            created_at: e.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data: ImportJobDetail {
            job: ImportJobItem::from(row),
            errors,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct StopResponse {
    job_id: Uuid,
    stop_requested: bool,
}

/// `POST /api/v1/imports/{job_id}/stop` — cooperative cancellation. The
/// running task observes the flag between sub-batches; a pending job with no
/// live task in this process is stopped directly in the store.
pub(super) async fn stop_import(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<StopResponse>>, ApiError> {
    let row = restock_db::get_import_job_by_public_id(&state.pool, job_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let status: JobStatus = row.status.parse().map_err(|_| {
        ApiError::new(req_id.0.clone(), "internal_error", "unknown job status")
    })?;

    if status.is_terminal() {
        return Err(ApiError::new(
            req_id.0,
            "conflict",
            format!("job is already {status}"),
        ));
    }

    if let Some(handle) = state.registry.get(job_id) {
        handle.stop();
    } else {
        // No live task in this process (e.g. restarted since submission);
        // stop the persisted job directly.
        restock_db::stop_import_job(&state.pool, row.id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
        restock_db::append_job_error(
            &state.pool,
            row.id,
            None,
            restock_core::ItemErrorKind::Cancelled,
            "stop requested — job had no running worker",
        )
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    }

    Ok(Json(ApiResponse {
        data: StopResponse {
            job_id,
            stop_requested: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> ImportJobItem {
        ImportJobItem {
            job_id: Uuid::new_v4(),
            status: "processing".to_string(),
            trigger_source: "api".to_string(),
            total: 10,
            processed: 4,
            succeeded: 3,
            failed: 1,
            skipped: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn import_job_item_is_serializable() {
        let json = serde_json::to_string(&sample_item()).expect("serialize import job");
        assert!(json.contains("\"status\":\"processing\""));
        assert!(json.contains("\"processed\":4"));
    }

    #[test]
    fn import_job_detail_flattens_job_fields() {
        let detail = ImportJobDetail {
            job: sample_item(),
            errors: vec![JobErrorItem {
                identifier: Some("B0ABC12345".to_string()),
                kind: "enrichment_miss".to_string(),
                message: "no enrichment data returned".to_string(),
                created_at: Utc::now(),
            }],
        };
        let json = serde_json::to_value(&detail).expect("serialize detail");
        assert_eq!(json["status"], "processing", "job fields are flattened");
        assert_eq!(json["errors"][0]["kind"], "enrichment_miss");
    }

    #[test]
    fn submit_request_options_default() {
        let request: SubmitRequest =
            serde_json::from_str(r#"{"raw_inputs": ["B0ABC12345"]}"#).expect("deserialize");
        assert_eq!(request.raw_inputs.len(), 1);
        assert!(!request.options.skip_existing);
    }

    #[test]
    fn map_submit_error_codes() {
        let e = map_submit_error("r".into(), &SubmitError::EmptyBatch);
        assert_eq!(e.error.code, "validation_error");

        let e = map_submit_error(
            "r".into(),
            &SubmitError::BudgetExceeded {
                required: 5,
                remaining: 2,
            },
        );
        assert_eq!(e.error.code, "budget_exceeded");
        assert!(e.error.message.contains('5'));
    }
}
