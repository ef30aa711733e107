use chrono::{NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::{
    auth::{Actor, Role},
    db::{self, DbPool},
    entities::{
        item,
        order::{self, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY},
        order_line, OrderKind, OrderStatus,
    },
    errors::ServiceError,
    events::{publish_all, Event, EventSender},
    lifecycle::ensure_transition,
    services::{
        advance_status,
        catalog::CatalogReader,
        find_order, load_lines, lock_order,
        order_numbers::{self, OrderNumberSettings},
    },
};

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub item_code: String,
    pub quantity: i32,
    /// Catalog price is used when absent.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub planned_shipping_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub order_date: NaiveDate,
    pub order_kind: OrderKind,
    #[validate(length(min = 1, max = 128, message = "customer_name must be 1-128 characters"))]
    pub customer_name: String,
    pub lines: Vec<OrderLineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApproveOrderRequest {
    #[validate(range(min = 1, max = 9, message = "priority must be between 1 and 9"))]
    pub priority: i32,
}

/// Optional filters for [`OrderService::list_orders`]; unset fields match all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub order_kind: Option<OrderKind>,
    pub customer_name: Option<String>,
    pub created_by: Option<String>,
    /// Substring of the order number.
    pub order_no: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub lines: Vec<order_line::Model>,
    /// Sum of `ordered_qty * unit_price` over all lines.
    pub total_amount: Decimal,
}

/// A line input after catalog resolution: everything the insert needs.
#[derive(Debug, Clone)]
struct ResolvedLine {
    item_code: String,
    item_name: String,
    quantity: i32,
    unit_price: Decimal,
    planned_shipping_date: Option<NaiveDate>,
}

/// Order placement, approval and the manual status transitions.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    catalog: Arc<dyn CatalogReader>,
    event_sender: Option<Arc<EventSender>>,
    numbering: OrderNumberSettings,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        catalog: Arc<dyn CatalogReader>,
        event_sender: Option<Arc<EventSender>>,
        numbering: OrderNumberSettings,
    ) -> Self {
        Self {
            db_pool,
            catalog,
            event_sender,
            numbering,
        }
    }

    /// Places a new `pending` order and returns its header.
    ///
    /// All inputs are validated against the active catalog before the
    /// transaction starts. The order number is allocated inside the
    /// transaction; when a concurrent creator wins the race (primary-key
    /// collision, busy writer lock or stale snapshot) the whole insert is
    /// retried with a freshly derived number.
    #[instrument(skip(self, request), fields(actor = %actor.id, customer = %request.customer_name))]
    pub async fn create_order(
        &self,
        actor: &Actor,
        mut request: CreateOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(&[Role::Client])?;
        request.customer_name = request.customer_name.trim().to_string();
        request.validate()?;
        if request.lines.is_empty() {
            warn!("Order rejected: no lines");
            return Err(ServiceError::validation("An order needs at least one line"));
        }

        let lines = self.resolve_lines(&request).await?;
        let max_attempts = self.numbering.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let prefix = self.numbering.prefix.clone();
            let header = request.clone();
            let attempt_lines = lines.clone();
            let created_by = actor.id.clone();

            let result = db::in_transaction(&self.db_pool, "create_order", move |txn| {
                Box::pin(async move {
                    let order_no = order_numbers::allocate(txn, &prefix, header.order_date).await?;
                    let now = Utc::now();

                    let order = order::ActiveModel {
                        order_no: Set(order_no.clone()),
                        order_date: Set(header.order_date),
                        order_kind: Set(header.order_kind),
                        customer_name: Set(header.customer_name),
                        status: Set(OrderStatus::Pending),
                        priority: Set(DEFAULT_PRIORITY),
                        approved_by: Set(None),
                        approved_at: Set(None),
                        created_by: Set(created_by),
                        created_at: Set(now),
                        updated_at: Set(None),
                    }
                    .insert(txn)
                    .await?;

                    let rows = attempt_lines.into_iter().zip(1..).map(|(line, seq)| order_line::ActiveModel {
                        order_no: Set(order_no.clone()),
                        line_seq: Set(seq),
                        item_code: Set(line.item_code),
                        item_name: Set(line.item_name),
                        ordered_qty: Set(line.quantity),
                        unit_price: Set(line.unit_price),
                        shipped_qty: Set(0),
                        shipped_amount: Set(Decimal::ZERO),
                        planned_shipping_date: Set(line.planned_shipping_date),
                        actual_shipping_date: Set(None),
                    });
                    order_line::Entity::insert_many(rows)
                        .exec_without_returning(txn)
                        .await?;

                    Ok(order)
                })
            })
            .await;

            match result {
                Ok(order) => {
                    info!(order_no = %order.order_no, lines = lines.len(), "Order created");
                    publish_all(
                        self.event_sender.as_deref(),
                        vec![Event::OrderCreated {
                            order_no: order.order_no.clone(),
                            customer_name: order.customer_name.clone(),
                            line_count: lines.len(),
                        }],
                    )
                    .await;
                    return Ok(order);
                }
                Err(ServiceError::DatabaseError(ref e)) if db::is_write_conflict(e) => {
                    counter!("scm_order_number_retries_total", 1);
                    warn!(attempt, max_attempts, error = %e, "Order number collision; retrying");
                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Order creation failed");
                    return Err(e);
                }
            }
        }

        error!(max_attempts, "Could not allocate an order number");
        Err(ServiceError::Conflict(format!(
            "Could not allocate an order number after {} attempts",
            max_attempts
        )))
    }

    /// Checks every line against the active catalog and snapshots item
    /// name and price.
    async fn resolve_lines(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<Vec<ResolvedLine>, ServiceError> {
        let mut resolved = Vec::with_capacity(request.lines.len());
        for (idx, line) in request.lines.iter().enumerate() {
            let line_no = idx + 1;
            if line.item_code.trim().is_empty() {
                return Err(ServiceError::validation(format!(
                    "Line {}: item_code is required",
                    line_no
                )));
            }
            if line.quantity <= 0 {
                return Err(ServiceError::validation(format!(
                    "Line {}: quantity must be positive",
                    line_no
                )));
            }
            if line.unit_price.is_some_and(|p| p < Decimal::ZERO) {
                return Err(ServiceError::validation(format!(
                    "Line {}: unit_price must not be negative",
                    line_no
                )));
            }

            let item = self
                .catalog
                .find_active_item(line.item_code.trim())
                .await?
                .ok_or_else(|| {
                    warn!(item_code = %line.item_code, "Unknown or inactive item");
                    ServiceError::validation(format!(
                        "Line {}: item '{}' is not in the active catalog",
                        line_no, line.item_code
                    ))
                })?;

            check_lead_time(line_no, &item, request.order_date, line.planned_shipping_date)?;

            resolved.push(ResolvedLine {
                item_code: item.item_code.clone(),
                item_name: item.item_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price.unwrap_or(item.unit_price),
                planned_shipping_date: line.planned_shipping_date,
            });
        }
        Ok(resolved)
    }

    /// `pending -> approved`, setting priority, approver and approval time
    /// in one update.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn approve_order(
        &self,
        actor: &Actor,
        order_no: &str,
        priority: i32,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(&[Role::OrderManager])?;
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            warn!(priority, "Approval rejected: priority out of range");
            return Err(ServiceError::validation(format!(
                "priority must be between {} and {}, got {}",
                MIN_PRIORITY, MAX_PRIORITY, priority
            )));
        }

        let order_no_owned = order_no.to_string();
        let approver = actor.id.clone();
        let order = db::in_transaction(&self.db_pool, "approve_order", move |txn| {
            Box::pin(async move {
                let order = lock_order(txn, &order_no_owned).await?;
                ensure_transition(
                    &order.order_no,
                    order.status,
                    OrderStatus::Approved,
                )?;

                let now = Utc::now();
                let mut active: order::ActiveModel = order.into();
                active.status = Set(OrderStatus::Approved);
                active.priority = Set(priority);
                active.approved_by = Set(Some(approver));
                active.approved_at = Set(Some(now));
                active.updated_at = Set(Some(now));
                Ok(active.update(txn).await?)
            })
        })
        .await?;

        info!(order_no = %order.order_no, priority, "Order approved");
        publish_all(
            self.event_sender.as_deref(),
            vec![
                Event::OrderApproved {
                    order_no: order.order_no.clone(),
                    approved_by: actor.id.clone(),
                    approved_at: order.approved_at.unwrap_or_else(Utc::now),
                },
                Event::OrderStatusChanged {
                    order_no: order.order_no.clone(),
                    old_status: OrderStatus::Pending,
                    new_status: OrderStatus::Approved,
                },
            ],
        )
        .await;
        Ok(order)
    }

    /// `pending -> rejected`. Rejected orders are kept and never move again.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn reject_order(
        &self,
        actor: &Actor,
        order_no: &str,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(&[Role::OrderManager])?;

        let order_no_owned = order_no.to_string();
        let (order, event) = db::in_transaction(&self.db_pool, "reject_order", move |txn| {
            Box::pin(async move {
                let order = lock_order(txn, &order_no_owned).await?;
                advance_status(txn, order, OrderStatus::Rejected).await
            })
        })
        .await?;

        info!(order_no = %order.order_no, "Order rejected");
        publish_all(
            self.event_sender.as_deref(),
            vec![
                Event::OrderRejected {
                    order_no: order.order_no.clone(),
                    rejected_by: actor.id.clone(),
                },
                event,
            ],
        )
        .await;
        Ok(order)
    }

    /// Manual `approved -> in_production`.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn advance_to_production(
        &self,
        actor: &Actor,
        order_no: &str,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(&[Role::OrderManager, Role::Manufacturing])?;

        let order_no_owned = order_no.to_string();
        let (order, event) =
            db::in_transaction(&self.db_pool, "advance_to_production", move |txn| {
                Box::pin(async move {
                    let order = lock_order(txn, &order_no_owned).await?;
                    advance_status(txn, order, OrderStatus::InProduction).await
                })
            })
            .await?;

        info!(order_no = %order.order_no, "Order entered production");
        publish_all(self.event_sender.as_deref(), vec![event]).await;
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_no: &str) -> Result<order::Model, ServiceError> {
        find_order(&*self.db_pool, order_no).await
    }

    #[instrument(skip(self))]
    pub async fn get_order_details(&self, order_no: &str) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db_pool;
        let order = find_order(db, order_no).await?;
        let lines = load_lines(db, order_no).await?;
        let total_amount = lines.iter().map(order_line::Model::line_amount).sum();
        Ok(OrderDetails {
            order,
            lines,
            total_amount,
        })
    }

    /// Orders matching `filter`, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<order::Model>, ServiceError> {
        let mut condition = Condition::all();
        if let Some(status) = filter.status {
            condition = condition.add(order::Column::Status.eq(status));
        }
        if let Some(kind) = filter.order_kind {
            condition = condition.add(order::Column::OrderKind.eq(kind));
        }
        if let Some(customer) = filter.customer_name {
            condition = condition.add(order::Column::CustomerName.eq(customer));
        }
        if let Some(creator) = filter.created_by {
            condition = condition.add(order::Column::CreatedBy.eq(creator));
        }
        if let Some(fragment) = filter.order_no.filter(|f| !f.is_empty()) {
            condition = condition.add(order::Column::OrderNo.contains(fragment.as_str()));
        }

        order::Entity::find()
            .filter(condition)
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::OrderNo)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list orders");
                ServiceError::db_error(e)
            })
    }
}

fn check_lead_time(
    line_no: usize,
    item: &item::Model,
    order_date: NaiveDate,
    planned: Option<NaiveDate>,
) -> Result<(), ServiceError> {
    let Some(planned) = planned else {
        return Ok(());
    };
    let earliest = item.earliest_delivery_date(order_date);
    if planned < earliest {
        warn!(item_code = %item.item_code, %planned, %earliest, "Planned date inside lead time");
        return Err(ServiceError::validation(format!(
            "Line {}: planned shipping date {} is before {} ({} days lead time for '{}')",
            line_no, planned, earliest, item.lead_time_days, item.item_name
        )));
    }
    Ok(())
}
