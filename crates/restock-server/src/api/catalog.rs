//! Catalog read endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use restock_core::{CatalogEntry, Identifier};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CatalogQuery {
    pub limit: Option<i64>,
}

/// `GET /api/v1/catalog` — most recently updated entries.
pub(super) async fn list_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<Vec<CatalogEntry>>>, ApiError> {
    let data = restock_db::list_catalog_entries(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/catalog/{identifier}` — one entry by canonical identifier.
/// The path segment is normalized (an ASIN-bearing URL works too).
pub(super) async fn get_catalog_entry(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
) -> Result<Json<ApiResponse<CatalogEntry>>, ApiError> {
    let identifier = Identifier::parse(&identifier).ok_or_else(|| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            "not a recognizable product identifier",
        )
    })?;

    let entry = restock_db::find_by_identifier(&state.pool, &identifier)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no catalog entry for {identifier}"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: entry,
        meta: ResponseMeta::new(req_id.0),
    }))
}
