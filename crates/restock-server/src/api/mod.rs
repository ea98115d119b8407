mod budget;
mod catalog;
mod imports;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use restock_enrich::EnrichmentClient;
use restock_pipeline::{BudgetManager, PipelineConfig, StopHandle};
use restock_storefront::StorefrontClient;

use crate::middleware::{request_id, RequestId};

/// In-process registry of stop handles for jobs running in this process.
///
/// The persisted job table is the source of truth for status; this map only
/// carries the cooperative cancellation flags. Entries are never evicted —
/// a handle is a single `Arc<AtomicBool>`, and external cleanup/TTL owns
/// long-term hygiene.
#[derive(Clone, Default)]
pub struct JobRegistry(Arc<Mutex<HashMap<Uuid, StopHandle>>>);

impl JobRegistry {
    pub fn register(&self, job_id: Uuid, handle: StopHandle) {
        self.lock().insert(job_id, handle);
    }

    #[must_use]
    pub fn get(&self, job_id: Uuid) -> Option<StopHandle> {
        self.lock().get(&job_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, StopHandle>> {
        // A poisoned lock would only mean a panic between two map ops; the
        // map itself stays consistent, so recover the guard.
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub budget: Arc<BudgetManager>,
    pub pipeline: Arc<PipelineConfig>,
    pub fuzzy_threshold: f64,
    pub enricher: Arc<EnrichmentClient>,
    pub pusher: Option<Arc<StorefrontClient>>,
    pub registry: JobRegistry,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "budget_exceeded" | "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &restock_db::DbError) -> ApiError {
    if matches!(error, restock_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/imports",
            get(imports::list_imports).post(imports::submit_import),
        )
        .route("/api/v1/imports/{job_id}", get(imports::get_import))
        .route("/api/v1/imports/{job_id}/stop", post(imports::stop_import))
        .route("/api/v1/catalog", get(catalog::list_catalog))
        .route("/api/v1/catalog/{identifier}", get(catalog::get_catalog_entry))
        .route("/api/v1/budget", get(budget::get_budget))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match restock_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
