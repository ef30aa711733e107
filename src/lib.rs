//! Battery SCM Library
//!
//! Order lifecycle, receiving and shipping reconciliation for a
//! battery-component supply chain, with the HTTP surface that exposes it.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod ledger;
pub mod lifecycle;
pub mod migrator;
pub mod services;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: Option<Arc<events::EventSender>>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender, &config);
        Self {
            db,
            config,
            services,
        }
    }
}

// Common response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`. Role checks happen in the services, so
/// every route only needs an [`auth::Actor`].
pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/orders/import/resolve", post(handlers::orders::resolve_import))
        .route("/orders/:order_no", get(handlers::orders::get_order))
        .route("/orders/:order_no/approve", post(handlers::orders::approve_order))
        .route("/orders/:order_no/reject", post(handlers::orders::reject_order))
        .route(
            "/orders/:order_no/production",
            post(handlers::orders::start_production),
        );

    let receiving = Router::new()
        .route(
            "/orders/:order_no/receipts",
            get(handlers::receiving::receipt_history).post(handlers::receiving::register_receipts),
        )
        .route(
            "/orders/:order_no/receipt-status",
            get(handlers::receiving::receipt_status),
        );

    let shipping = Router::new()
        .route(
            "/shipping-plans",
            post(handlers::shipping::create_shipping_plans),
        )
        .route(
            "/orders/:order_no/shipping-plans",
            get(handlers::shipping::list_shipping_plans),
        )
        .route(
            "/orders/:order_no/shipping-plans/instruct",
            post(handlers::shipping::instruct_plans),
        )
        .route(
            "/orders/:order_no/shipping-plans/confirm",
            post(handlers::shipping::confirm_receipt),
        )
        .route(
            "/orders/:order_no/lines/:line_seq/inventory",
            get(handlers::shipping::line_inventory),
        )
        .route(
            "/orders/:order_no/availability",
            get(handlers::shipping::order_availability),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/items", get(handlers::catalog::list_items))
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
        .merge(orders)
        .merge(receiving)
        .merge(shipping)
}

/// Full application router with tracing and request logging.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Request logging middleware
async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

pub mod prelude {
    pub use crate::auth::{Actor, Role};
    pub use crate::db::*;
    pub use crate::entities::{OrderKind, OrderStatus, ShippingPlanStatus};
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::ledger::{LineInventory, ReceiptProgress};
}
