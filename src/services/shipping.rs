use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{Actor, Role},
    db::{self, DbPool},
    entities::{order, order_line, receipt, shipping_plan, OrderStatus, ShippingPlanStatus},
    errors::ServiceError,
    events::{publish_all, Event, EventSender},
    ledger::{self, LineInventory},
    lifecycle::ensure_plan_transition,
    services::{advance_status, find_order, load_lines, load_plans, load_receipts, lock_order},
};

/// One requested shipment against an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPlanInput {
    pub order_no: String,
    pub line_seq: i32,
    pub quantity: i32,
    pub planned_shipping_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmReceiptRequest {
    /// Instructed plans of the order being confirmed.
    pub plan_ids: Vec<i32>,
    /// Date the goods arrived; today when absent.
    #[serde(default)]
    pub received_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentConfirmation {
    pub plans: Vec<shipping_plan::Model>,
    pub lines: Vec<order_line::Model>,
    pub status: OrderStatus,
}

/// Ledger figures for one line, with its item snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAvailability {
    pub line_seq: i32,
    pub item_code: String,
    pub item_name: String,
    pub ordered: i64,
    #[serde(flatten)]
    pub inventory: LineInventory,
}

#[derive(Clone)]
pub struct ShippingService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ShippingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates `planned` shipping plans. Items may span several orders; every
    /// order must be `received_complete` and no line may be planned beyond
    /// its available-to-ship quantity, counting the whole batch.
    #[instrument(skip(self, items), fields(actor = %actor.id, items = items.len()))]
    pub async fn create_shipping_plans(
        &self,
        actor: &Actor,
        items: Vec<ShippingPlanInput>,
    ) -> Result<Vec<shipping_plan::Model>, ServiceError> {
        actor.require_role(&[Role::OrderManager])?;
        if items.is_empty() {
            return Err(ServiceError::validation("No shipping plan items given"));
        }
        if let Some(bad) = items.iter().find(|i| i.quantity <= 0) {
            return Err(ServiceError::validation(format!(
                "Order {} line {}: planned quantity must be positive",
                bad.order_no, bad.line_seq
            )));
        }

        // Orders are locked in key order so two batches cannot deadlock.
        let mut by_order: BTreeMap<String, Vec<ShippingPlanInput>> = BTreeMap::new();
        for item in items {
            by_order.entry(item.order_no.clone()).or_default().push(item);
        }

        let creator = actor.id.clone();
        let created = db::in_transaction(&self.db_pool, "create_shipping_plans", move |txn| {
            Box::pin(async move {
                let mut created = Vec::new();
                for (order_no, items) in by_order {
                    let order = lock_order(txn, &order_no).await?;
                    if order.status != OrderStatus::ReceivedComplete {
                        return Err(ServiceError::invalid_status(format!(
                            "Order {} is '{}'; shipping plans need 'received_complete'",
                            order.order_no, order.status
                        )));
                    }

                    let lines = load_lines(txn, &order_no).await?;
                    let receipts = load_receipts(txn, &order_no).await?;
                    let plans = load_plans(txn, &order_no).await?;
                    check_against_available(&order_no, &lines, &receipts, &plans, &items)?;

                    let now = Utc::now();
                    for item in items {
                        let plan = shipping_plan::ActiveModel {
                            order_no: Set(item.order_no),
                            line_seq: Set(item.line_seq),
                            planned_qty: Set(item.quantity),
                            planned_shipping_date: Set(item.planned_shipping_date),
                            status: Set(ShippingPlanStatus::Planned),
                            created_by: Set(creator.clone()),
                            created_at: Set(now),
                            instructed_at: Set(None),
                            completed_at: Set(None),
                            confirmed_by: Set(None),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                        created.push(plan);
                    }
                }
                Ok(created)
            })
        })
        .await?;

        let mut per_order: BTreeMap<&str, Vec<i32>> = BTreeMap::new();
        for plan in &created {
            per_order.entry(plan.order_no.as_str()).or_default().push(plan.plan_id);
        }
        info!(plans = created.len(), orders = per_order.len(), "Shipping plans created");

        let events = per_order
            .into_iter()
            .map(|(order_no, plan_ids)| Event::ShippingPlansCreated {
                order_no: order_no.to_string(),
                plan_ids,
            })
            .collect();
        publish_all(self.event_sender.as_deref(), events).await;
        Ok(created)
    }

    /// Moves every `planned` plan of the order to `instructed` and returns
    /// the plans it moved. Plans already instructed or completed are left
    /// alone, so a repeated call returns an empty list.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn instruct_plans(
        &self,
        actor: &Actor,
        order_no: &str,
    ) -> Result<Vec<shipping_plan::Model>, ServiceError> {
        actor.require_role(&[Role::OrderManager])?;

        let order_no_owned = order_no.to_string();
        let instructed = db::in_transaction(&self.db_pool, "instruct_plans", move |txn| {
            Box::pin(async move {
                let order = lock_order(txn, &order_no_owned).await?;
                let planned = shipping_plan::Entity::find()
                    .filter(shipping_plan::Column::OrderNo.eq(order.order_no.as_str()))
                    .filter(shipping_plan::Column::Status.eq(ShippingPlanStatus::Planned))
                    .order_by_asc(shipping_plan::Column::PlanId)
                    .all(txn)
                    .await?;

                let now = Utc::now();
                let mut instructed = Vec::with_capacity(planned.len());
                for plan in planned {
                    ensure_plan_transition(plan.plan_id, plan.status, ShippingPlanStatus::Instructed)?;
                    let mut active: shipping_plan::ActiveModel = plan.into();
                    active.status = Set(ShippingPlanStatus::Instructed);
                    active.instructed_at = Set(Some(now));
                    instructed.push(active.update(txn).await?);
                }
                Ok(instructed)
            })
        })
        .await?;

        if instructed.is_empty() {
            info!(order_no, "No planned shipping plans to instruct");
        } else {
            info!(order_no, plans = instructed.len(), "Shipping plans instructed");
            publish_all(
                self.event_sender.as_deref(),
                vec![Event::ShippingPlansInstructed {
                    order_no: order_no.to_string(),
                    plan_ids: instructed.iter().map(|p| p.plan_id).collect(),
                }],
            )
            .await;
        }
        Ok(instructed)
    }

    /// Client confirmation that instructed shipments arrived.
    ///
    /// Each plan becomes `completed` and its quantity is added to the line's
    /// shipped totals. The first confirmation of a line sets its actual
    /// shipping date. Once every line is fully shipped the order becomes
    /// `shipped_complete`.
    #[instrument(skip(self, request), fields(actor = %actor.id, plans = request.plan_ids.len()))]
    pub async fn confirm_receipt(
        &self,
        actor: &Actor,
        order_no: &str,
        request: ConfirmReceiptRequest,
    ) -> Result<ShipmentConfirmation, ServiceError> {
        actor.require_role(&[Role::Client])?;
        if request.plan_ids.is_empty() {
            return Err(ServiceError::validation("No shipping plans given"));
        }
        let unique: BTreeSet<i32> = request.plan_ids.iter().copied().collect();
        if unique.len() != request.plan_ids.len() {
            return Err(ServiceError::validation("A shipping plan is listed more than once"));
        }

        let order_no_owned = order_no.to_string();
        let confirmer = actor.clone();
        let shipped_on = request.received_on.unwrap_or_else(|| Utc::now().date_naive());
        let (plans, lines, order, events) =
            db::in_transaction(&self.db_pool, "confirm_receipt", move |txn| {
                Box::pin(async move {
                    let order = lock_order(txn, &order_no_owned).await?;
                    if !confirmer.can_access_customer(&order.customer_name) {
                        warn!(order_no = %order.order_no, "Client confirmation for another customer's order");
                        return Err(ServiceError::Forbidden(format!(
                            "Order {} belongs to another customer",
                            order.order_no
                        )));
                    }
                    if order.status != OrderStatus::ReceivedComplete {
                        return Err(ServiceError::invalid_status(format!(
                            "Order {} is '{}'; confirmation needs 'received_complete'",
                            order.order_no, order.status
                        )));
                    }

                    let plans = shipping_plan::Entity::find()
                        .filter(shipping_plan::Column::OrderNo.eq(order.order_no.as_str()))
                        .filter(shipping_plan::Column::PlanId.is_in(unique.iter().copied()))
                        .order_by_asc(shipping_plan::Column::PlanId)
                        .all(txn)
                        .await?;
                    if let Some(missing) = unique.iter().find(|id| !plans.iter().any(|p| p.plan_id == **id)) {
                        return Err(ServiceError::not_found(format!(
                            "Shipping plan {} not found for order {}",
                            missing, order.order_no
                        )));
                    }
                    for plan in &plans {
                        ensure_plan_transition(plan.plan_id, plan.status, ShippingPlanStatus::Completed)?;
                    }

                    let mut lines: HashMap<i32, order_line::Model> = load_lines(txn, &order.order_no)
                        .await?
                        .into_iter()
                        .map(|l| (l.line_seq, l))
                        .collect();
                    apply_shipments(&mut lines, &plans, shipped_on)?;

                    let now = Utc::now();
                    let mut completed = Vec::with_capacity(plans.len());
                    for plan in plans {
                        let mut active: shipping_plan::ActiveModel = plan.into();
                        active.status = Set(ShippingPlanStatus::Completed);
                        active.completed_at = Set(Some(now));
                        active.confirmed_by = Set(Some(confirmer.id.clone()));
                        completed.push(active.update(txn).await?);
                    }

                    let touched: BTreeSet<i32> = completed.iter().map(|p| p.line_seq).collect();
                    for seq in touched {
                        if let Some(line) = lines.get(&seq) {
                            let mut active: order_line::ActiveModel = line.clone().into();
                            active.shipped_qty = Set(line.shipped_qty);
                            active.shipped_amount = Set(line.shipped_amount);
                            active.actual_shipping_date = Set(line.actual_shipping_date);
                            active.update(txn).await?;
                        }
                    }

                    // Recomputed over every line of the order.
                    let lines = load_lines(txn, &order.order_no).await?;
                    let mut events = Vec::new();
                    let mut order = order;
                    if ledger::all_lines_shipped(&lines) {
                        let (updated, event) =
                            advance_status(txn, order, OrderStatus::ShippedComplete).await?;
                        order = updated;
                        events.push(event);
                    }
                    Ok((completed, lines, order, events))
                })
            })
            .await?;

        let shipped_qty: i64 = plans.iter().map(|p| i64::from(p.planned_qty)).sum();
        info!(
            order_no = %order.order_no,
            plans = plans.len(),
            shipped_qty,
            status = %order.status,
            "Shipment receipt confirmed"
        );

        let mut published = vec![Event::ShipmentConfirmed {
            order_no: order.order_no.clone(),
            plan_ids: plans.iter().map(|p| p.plan_id).collect(),
            shipped_qty,
            shipped_on,
        }];
        published.extend(events);
        publish_all(self.event_sender.as_deref(), published).await;

        Ok(ShipmentConfirmation {
            plans,
            lines,
            status: order.status,
        })
    }

    /// Received / planned / shipped / available for one line.
    #[instrument(skip(self))]
    pub async fn get_line_inventory(
        &self,
        order_no: &str,
        line_seq: i32,
    ) -> Result<LineInventory, ServiceError> {
        let db = &*self.db_pool;
        let exists = order_line::Entity::find_by_id((order_no.to_string(), line_seq))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if exists.is_none() {
            return Err(ServiceError::not_found(format!(
                "Order {} has no line {}",
                order_no, line_seq
            )));
        }

        let receipts = load_receipts(db, order_no).await?;
        let plans = load_plans(db, order_no).await?;
        Ok(LineInventory::from_ledgers(
            receipts.iter().filter(|r| r.line_seq == line_seq),
            plans.iter().filter(|p| p.line_seq == line_seq),
        ))
    }

    /// Ledger figures for every line of an order, for the planning screen.
    #[instrument(skip(self))]
    pub async fn get_order_availability(
        &self,
        order_no: &str,
    ) -> Result<Vec<LineAvailability>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_no).await?;
        let lines = load_lines(db, order_no).await?;
        let receipts = load_receipts(db, order_no).await?;
        let plans = load_plans(db, order_no).await?;

        Ok(lines
            .into_iter()
            .map(|line| LineAvailability {
                inventory: LineInventory::from_ledgers(
                    receipts.iter().filter(|r| r.line_seq == line.line_seq),
                    plans.iter().filter(|p| p.line_seq == line.line_seq),
                ),
                ordered: i64::from(line.ordered_qty),
                line_seq: line.line_seq,
                item_code: line.item_code,
                item_name: line.item_name,
            })
            .collect())
    }

    /// Fully received orders, highest priority first.
    #[instrument(skip(self))]
    pub async fn orders_ready_for_planning(&self) -> Result<Vec<order::Model>, ServiceError> {
        order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::ReceivedComplete))
            .order_by_desc(order::Column::Priority)
            .order_by_asc(order::Column::OrderDate)
            .order_by_asc(order::Column::OrderNo)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Plans of an order by planned date, then line.
    #[instrument(skip(self))]
    pub async fn get_shipping_plans(
        &self,
        order_no: &str,
    ) -> Result<Vec<shipping_plan::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_no).await?;
        shipping_plan::Entity::find()
            .filter(shipping_plan::Column::OrderNo.eq(order_no))
            .order_by_asc(shipping_plan::Column::PlannedShippingDate)
            .order_by_asc(shipping_plan::Column::LineSeq)
            .order_by_asc(shipping_plan::Column::PlanId)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load shipping plans");
                ServiceError::db_error(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn get_instructed_plans(
        &self,
        order_no: &str,
    ) -> Result<Vec<shipping_plan::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_no).await?;
        shipping_plan::Entity::find()
            .filter(shipping_plan::Column::OrderNo.eq(order_no))
            .filter(shipping_plan::Column::Status.eq(ShippingPlanStatus::Instructed))
            .order_by_asc(shipping_plan::Column::PlannedShippingDate)
            .order_by_asc(shipping_plan::Column::PlanId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Orders of `customer_name` with at least one instructed plan.
    #[instrument(skip(self))]
    pub async fn orders_awaiting_confirmation(
        &self,
        customer_name: &str,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let db = &*self.db_pool;
        let instructed: Vec<String> = shipping_plan::Entity::find()
            .filter(shipping_plan::Column::Status.eq(ShippingPlanStatus::Instructed))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|p| p.order_no)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if instructed.is_empty() {
            return Ok(Vec::new());
        }

        order::Entity::find()
            .filter(order::Column::CustomerName.eq(customer_name))
            .filter(order::Column::OrderNo.is_in(instructed))
            .order_by_asc(order::Column::OrderDate)
            .order_by_asc(order::Column::OrderNo)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Rejects a plan batch that would over-commit any line. Quantities for the
/// same line are summed across the batch.
fn check_against_available(
    order_no: &str,
    lines: &[order_line::Model],
    receipts: &[receipt::Model],
    plans: &[shipping_plan::Model],
    items: &[ShippingPlanInput],
) -> Result<(), ServiceError> {
    let mut requested: BTreeMap<i32, i64> = BTreeMap::new();
    for item in items {
        *requested.entry(item.line_seq).or_insert(0) += i64::from(item.quantity);
    }

    for (line_seq, qty) in requested {
        if !lines.iter().any(|l| l.line_seq == line_seq) {
            return Err(ServiceError::not_found(format!(
                "Order {} has no line {}",
                order_no, line_seq
            )));
        }
        let inventory = LineInventory::from_ledgers(
            receipts.iter().filter(|r| r.line_seq == line_seq),
            plans.iter().filter(|p| p.line_seq == line_seq),
        );
        if qty > inventory.available {
            warn!(order_no, line_seq, requested = qty, available = inventory.available, "Plan exceeds available quantity");
            return Err(ServiceError::validation(format!(
                "Order {} line {}: planning {} exceeds the available quantity {}",
                order_no, line_seq, qty, inventory.available
            )));
        }
    }
    Ok(())
}

/// Adds each plan's quantity to its line's shipped totals in place.
fn apply_shipments(
    lines: &mut HashMap<i32, order_line::Model>,
    plans: &[shipping_plan::Model],
    shipped_on: NaiveDate,
) -> Result<(), ServiceError> {
    for plan in plans {
        let line = lines.get_mut(&plan.line_seq).ok_or_else(|| {
            ServiceError::not_found(format!(
                "Order {} has no line {}",
                plan.order_no, plan.line_seq
            ))
        })?;
        let shipped = line.shipped_qty + plan.planned_qty;
        if shipped > line.ordered_qty {
            error!(
                order_no = %plan.order_no,
                line_seq = plan.line_seq,
                shipped,
                ordered = line.ordered_qty,
                "Confirmation would ship more than ordered"
            );
            return Err(ServiceError::validation(format!(
                "Line {}: shipping {} would exceed the ordered quantity {}",
                plan.line_seq, shipped, line.ordered_qty
            )));
        }
        line.shipped_qty = shipped;
        line.shipped_amount = line.unit_price * Decimal::from(shipped);
        if line.actual_shipping_date.is_none() {
            line.actual_shipping_date = Some(shipped_on);
        }
    }
    Ok(())
}
