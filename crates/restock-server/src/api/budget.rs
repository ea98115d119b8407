//! Token budget read endpoint.

use axum::{extract::State, Extension, Json};

use restock_pipeline::BudgetSnapshot;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState, ResponseMeta};

/// `GET /api/v1/budget` — today's enrichment token figures.
pub(super) async fn get_budget(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<BudgetSnapshot>> {
    Json(ApiResponse {
        data: state.budget.snapshot(),
        meta: ResponseMeta::new(req_id.0),
    })
}
