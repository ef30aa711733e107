use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Actor,
    entities::receipt,
    errors::ServiceError,
    handlers::{ensure_order_access, AppState},
    ledger::ReceiptProgress,
    services::receiving::{LineReceiptStatus, ReceiptInput, ReceiptRegistration},
    ApiResponse, ApiResult,
};

#[derive(Debug, Deserialize)]
pub struct RegisterReceiptsRequest {
    pub items: Vec<ReceiptInput>,
}

#[derive(Debug, Serialize)]
pub struct ReceiptStatusResponse {
    #[serde(flatten)]
    pub progress: ReceiptProgress,
    pub lines: Vec<LineReceiptStatus>,
}

pub async fn register_receipts(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
    Json(request): Json<RegisterReceiptsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReceiptRegistration>>), ServiceError> {
    let registration = state
        .services
        .receiving
        .register_receipts(&actor, &order_no, request.items)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(registration))))
}

pub async fn receipt_history(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<Vec<receipt::Model>> {
    ensure_order_access(&state, &actor, &order_no).await?;
    let history = state.services.receiving.get_receipt_history(&order_no).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn receipt_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<ReceiptStatusResponse> {
    ensure_order_access(&state, &actor, &order_no).await?;
    let receiving = &state.services.receiving;
    let progress = receiving.get_receipt_status(&order_no).await?;
    let lines = receiving.get_detailed_receipt_status(&order_no).await?;
    Ok(Json(ApiResponse::success(ReceiptStatusResponse { progress, lines })))
}
