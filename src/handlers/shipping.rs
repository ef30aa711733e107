use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::{
    auth::Actor,
    entities::shipping_plan,
    errors::ServiceError,
    handlers::{ensure_order_access, AppState},
    ledger::LineInventory,
    services::shipping::{
        ConfirmReceiptRequest, LineAvailability, ShipmentConfirmation, ShippingPlanInput,
    },
    ApiResponse, ApiResult,
};

#[derive(Debug, Deserialize)]
pub struct CreateShippingPlansRequest {
    pub items: Vec<ShippingPlanInput>,
}

pub async fn create_shipping_plans(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateShippingPlansRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<shipping_plan::Model>>>), ServiceError> {
    let plans = state
        .services
        .shipping
        .create_shipping_plans(&actor, request.items)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(plans))))
}

pub async fn list_shipping_plans(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<Vec<shipping_plan::Model>> {
    ensure_order_access(&state, &actor, &order_no).await?;
    let plans = state.services.shipping.get_shipping_plans(&order_no).await?;
    Ok(Json(ApiResponse::success(plans)))
}

/// Returns only the plans this call moved; repeating it yields an empty list.
pub async fn instruct_plans(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<Vec<shipping_plan::Model>> {
    let plans = state.services.shipping.instruct_plans(&actor, &order_no).await?;
    Ok(Json(ApiResponse::success(plans)))
}

pub async fn confirm_receipt(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
    Json(request): Json<ConfirmReceiptRequest>,
) -> ApiResult<ShipmentConfirmation> {
    let confirmation = state
        .services
        .shipping
        .confirm_receipt(&actor, &order_no, request)
        .await?;
    Ok(Json(ApiResponse::success(confirmation)))
}

pub async fn line_inventory(
    State(state): State<AppState>,
    actor: Actor,
    Path((order_no, line_seq)): Path<(String, i32)>,
) -> ApiResult<LineInventory> {
    ensure_order_access(&state, &actor, &order_no).await?;
    let inventory = state
        .services
        .shipping
        .get_line_inventory(&order_no, line_seq)
        .await?;
    Ok(Json(ApiResponse::success(inventory)))
}

pub async fn order_availability(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<Vec<LineAvailability>> {
    ensure_order_access(&state, &actor, &order_no).await?;
    let lines = state.services.shipping.get_order_availability(&order_no).await?;
    Ok(Json(ApiResponse::success(lines)))
}
