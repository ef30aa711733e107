use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    auth::{Actor, Role},
    entities::order,
    errors::ServiceError,
    handlers::AppState,
    services::{
        order_import::{self, ImportOutcome, ImportRow},
        orders::{ApproveOrderRequest, CreateOrderRequest, OrderDetails, OrderFilter},
    },
    ApiResponse, ApiResult,
};

/// Body of `POST /orders/import/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveImportRequest {
    pub rows: Vec<ImportRow>,
}

pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<order::Model>>), ServiceError> {
    let created = state.services.orders.create_order(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Clients are always narrowed to their own company's orders.
pub async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(mut filter): Query<OrderFilter>,
) -> ApiResult<Vec<order::Model>> {
    if let Some(company) = actor.customer_scope()? {
        filter.customer_name = Some(company.to_string());
    }
    let orders = state.services.orders.list_orders(filter).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<OrderDetails> {
    let details = state.services.orders.get_order_details(&order_no).await?;
    actor.ensure_customer_access(&order_no, &details.order.customer_name)?;
    Ok(Json(ApiResponse::success(details)))
}

pub async fn approve_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
    Json(request): Json<ApproveOrderRequest>,
) -> ApiResult<order::Model> {
    request.validate()?;
    let approved = state
        .services
        .orders
        .approve_order(&actor, &order_no, request.priority)
        .await?;
    Ok(Json(ApiResponse::success(approved)))
}

pub async fn reject_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<order::Model> {
    let rejected = state.services.orders.reject_order(&actor, &order_no).await?;
    Ok(Json(ApiResponse::success(rejected)))
}

pub async fn start_production(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_no): Path<String>,
) -> ApiResult<order::Model> {
    let updated = state
        .services
        .orders
        .advance_to_production(&actor, &order_no)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Resolves parsed sheet rows into order lines without creating anything.
pub async fn resolve_import(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<ResolveImportRequest>,
) -> ApiResult<ImportOutcome> {
    actor.require_role(&[Role::Client])?;
    let outcome =
        order_import::resolve_import(state.services.catalog.as_ref(), &request.rows).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
