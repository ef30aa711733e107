//! The order lifecycle engine.
//!
//! Services are the only writers of orders, order lines, receipts and
//! shipping plans. Each mutating operation runs in one transaction that
//! first locks the order header, re-reads the ledgers it needs, applies its
//! writes and status post-conditions, and publishes events after commit.

pub mod catalog;
pub mod dashboard;
pub mod order_import;
pub mod order_numbers;
pub mod orders;
pub mod receiving;
pub mod shipping;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::{error, warn};

use crate::{
    entities::{order, order_line, receipt, shipping_plan, OrderStatus},
    errors::ServiceError,
    events::Event,
    lifecycle::ensure_transition,
};

/// Re-reads an order header under a row lock (`SELECT ... FOR UPDATE`).
pub(crate) async fn lock_order<C: ConnectionTrait>(
    conn: &C,
    order_no: &str,
) -> Result<order::Model, ServiceError> {
    order::Entity::find_by_id(order_no.to_string())
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(|e| {
            error!(order_no, error = %e, "Failed to load order");
            ServiceError::db_error(e)
        })?
        .ok_or_else(|| {
            warn!(order_no, "Order not found");
            ServiceError::not_found(format!("Order {} not found", order_no))
        })
}

pub(crate) async fn find_order<C: ConnectionTrait>(
    conn: &C,
    order_no: &str,
) -> Result<order::Model, ServiceError> {
    order::Entity::find_by_id(order_no.to_string())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found(format!("Order {} not found", order_no)))
}

pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    order_no: &str,
) -> Result<Vec<order_line::Model>, ServiceError> {
    order_line::Entity::find()
        .filter(order_line::Column::OrderNo.eq(order_no))
        .order_by_asc(order_line::Column::LineSeq)
        .all(conn)
        .await
        .map_err(|e| {
            error!(order_no, error = %e, "Failed to load order lines");
            ServiceError::db_error(e)
        })
}

pub(crate) async fn load_receipts<C: ConnectionTrait>(
    conn: &C,
    order_no: &str,
) -> Result<Vec<receipt::Model>, ServiceError> {
    receipt::Entity::find()
        .filter(receipt::Column::OrderNo.eq(order_no))
        .order_by_asc(receipt::Column::ReceiptId)
        .all(conn)
        .await
        .map_err(|e| {
            error!(order_no, error = %e, "Failed to load receipts");
            ServiceError::db_error(e)
        })
}

pub(crate) async fn load_plans<C: ConnectionTrait>(
    conn: &C,
    order_no: &str,
) -> Result<Vec<shipping_plan::Model>, ServiceError> {
    shipping_plan::Entity::find()
        .filter(shipping_plan::Column::OrderNo.eq(order_no))
        .order_by_asc(shipping_plan::Column::PlanId)
        .all(conn)
        .await
        .map_err(|e| {
            error!(order_no, error = %e, "Failed to load shipping plans");
            ServiceError::db_error(e)
        })
}

/// Moves `order` one legal step to `next` and returns the updated header
/// together with the matching status-change event.
pub(crate) async fn advance_status<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
    next: OrderStatus,
) -> Result<(order::Model, Event), ServiceError> {
    let old_status = order.status;
    ensure_transition(&order.order_no, old_status, next)?;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(next);
    active.updated_at = Set(Some(Utc::now()));
    let updated = active.update(conn).await.map_err(|e| {
        error!(error = %e, "Failed to update order status");
        ServiceError::db_error(e)
    })?;

    let event = Event::OrderStatusChanged {
        order_no: updated.order_no.clone(),
        old_status,
        new_status: next,
    };
    Ok((updated, event))
}
