use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{Actor, Role},
    db::{self, DbPool},
    entities::{order, order_line, receipt, OrderStatus},
    errors::ServiceError,
    events::{publish_all, Event, EventSender},
    ledger::{self, ReceiptProgress},
    lifecycle::status_after_receipts,
    services::{advance_status, find_order, load_lines, load_receipts, lock_order},
};

/// One goods-received entry against a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptInput {
    pub line_seq: i32,
    pub quantity: i32,
    pub received_date: NaiveDate,
    /// Defaults to the registering actor.
    #[serde(default)]
    pub received_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRegistration {
    pub receipts: Vec<receipt::Model>,
    /// Order status after all post-conditions ran.
    pub status: OrderStatus,
}

/// Per-line receiving figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceiptStatus {
    pub line_seq: i32,
    pub item_code: String,
    pub item_name: String,
    pub ordered: i64,
    pub received: i64,
    /// Never negative.
    pub remaining: i64,
}

#[derive(Clone)]
pub struct ReceivingService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ReceivingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Appends receipts for one order.
    ///
    /// The whole batch is rejected when any line would end up receiving more
    /// than was ordered. An `approved` order moves to `in_production`, and to
    /// `received_complete` as soon as every one of its lines is fully
    /// received.
    #[instrument(skip(self, items), fields(actor = %actor.id, items = items.len()))]
    pub async fn register_receipts(
        &self,
        actor: &Actor,
        order_no: &str,
        items: Vec<ReceiptInput>,
    ) -> Result<ReceiptRegistration, ServiceError> {
        actor.require_role(&[Role::Manufacturing])?;
        if items.is_empty() {
            return Err(ServiceError::validation("No receipt items given"));
        }
        if let Some(bad) = items.iter().find(|i| i.quantity <= 0) {
            warn!(line_seq = bad.line_seq, quantity = bad.quantity, "Non-positive receipt quantity");
            return Err(ServiceError::validation(format!(
                "Line {}: received quantity must be positive",
                bad.line_seq
            )));
        }

        let order_no_owned = order_no.to_string();
        let receiver = actor.id.clone();
        let (receipts, order, events) =
            db::in_transaction(&self.db_pool, "register_receipts", move |txn| {
                Box::pin(async move {
                    let order = lock_order(txn, &order_no_owned).await?;
                    if !order.status.accepts_receipts() {
                        return Err(ServiceError::invalid_status(format!(
                            "Order {} is '{}'; receipts need 'approved' or 'in_production'",
                            order.order_no, order.status
                        )));
                    }

                    let lines = load_lines(txn, &order.order_no).await?;
                    let existing = load_receipts(txn, &order.order_no).await?;
                    check_against_remaining(&order.order_no, &lines, &existing, &items)?;

                    let by_seq: HashMap<i32, &order_line::Model> =
                        lines.iter().map(|l| (l.line_seq, l)).collect();
                    let now = Utc::now();
                    let mut inserted = Vec::with_capacity(items.len());
                    for item in items {
                        let Some(line) = by_seq.get(&item.line_seq) else {
                            continue;
                        };
                        let row = receipt::ActiveModel {
                            order_no: Set(order.order_no.clone()),
                            line_seq: Set(item.line_seq),
                            item_code: Set(line.item_code.clone()),
                            item_name: Set(line.item_name.clone()),
                            received_qty: Set(item.quantity),
                            received_date: Set(item.received_date),
                            received_by: Set(item.received_by.unwrap_or_else(|| receiver.clone())),
                            created_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                        inserted.push(row);
                    }

                    // Recomputed from the ledger, including the rows just written.
                    let all_receipts = load_receipts(txn, &order.order_no).await?;
                    let received = ledger::received_by_line(&all_receipts);
                    let fully_received = ledger::all_lines_received(&lines, &received);

                    let mut events = Vec::new();
                    let mut order = order;
                    for next in status_after_receipts(order.status, fully_received) {
                        let (updated, event) = advance_status(txn, order, next).await?;
                        order = updated;
                        events.push(event);
                    }
                    Ok((inserted, order, events))
                })
            })
            .await?;

        let total_qty: i64 = receipts.iter().map(|r| i64::from(r.received_qty)).sum();
        info!(
            order_no = %order.order_no,
            receipts = receipts.len(),
            total_qty,
            status = %order.status,
            "Receipts registered"
        );

        let mut published = vec![Event::ReceiptsRegistered {
            order_no: order.order_no.clone(),
            receipt_ids: receipts.iter().map(|r| r.receipt_id).collect(),
            total_qty,
        }];
        published.extend(events);
        publish_all(self.event_sender.as_deref(), published).await;

        Ok(ReceiptRegistration {
            receipts,
            status: order.status,
        })
    }

    /// Ordered vs. received quantity over the whole order.
    #[instrument(skip(self))]
    pub async fn get_receipt_status(&self, order_no: &str) -> Result<ReceiptProgress, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_no).await?;
        let lines = load_lines(db, order_no).await?;
        let receipts = load_receipts(db, order_no).await?;
        Ok(ReceiptProgress::compute(&lines, &receipts))
    }

    #[instrument(skip(self))]
    pub async fn get_detailed_receipt_status(
        &self,
        order_no: &str,
    ) -> Result<Vec<LineReceiptStatus>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_no).await?;
        let lines = load_lines(db, order_no).await?;
        let receipts = load_receipts(db, order_no).await?;
        let received = ledger::received_by_line(&receipts);

        Ok(lines
            .into_iter()
            .map(|line| {
                let got = received.get(&line.line_seq).copied().unwrap_or(0);
                LineReceiptStatus {
                    remaining: ledger::remaining_quantity(line.ordered_qty, got),
                    ordered: i64::from(line.ordered_qty),
                    received: got,
                    line_seq: line.line_seq,
                    item_code: line.item_code,
                    item_name: line.item_name,
                }
            })
            .collect())
    }

    /// Receipts of an order, most recent receiving date first.
    #[instrument(skip(self))]
    pub async fn get_receipt_history(&self, order_no: &str) -> Result<Vec<receipt::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_no).await?;
        receipt::Entity::find()
            .filter(receipt::Column::OrderNo.eq(order_no))
            .order_by_desc(receipt::Column::ReceivedDate)
            .order_by_desc(receipt::Column::ReceiptId)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load receipt history");
                ServiceError::db_error(e)
            })
    }

    /// Orders that can still take receipts, highest priority first.
    #[instrument(skip(self))]
    pub async fn orders_awaiting_receipt(&self) -> Result<Vec<order::Model>, ServiceError> {
        order::Entity::find()
            .filter(
                order::Column::Status.is_in([OrderStatus::Approved, OrderStatus::InProduction]),
            )
            .order_by_desc(order::Column::Priority)
            .order_by_asc(order::Column::OrderDate)
            .order_by_asc(order::Column::OrderNo)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Validates a receipt batch against what each line still lacks. Quantities
/// for the same line are summed across the batch before comparing.
fn check_against_remaining(
    order_no: &str,
    lines: &[order_line::Model],
    existing: &[receipt::Model],
    items: &[ReceiptInput],
) -> Result<(), ServiceError> {
    let mut requested: BTreeMap<i32, i64> = BTreeMap::new();
    for item in items {
        *requested.entry(item.line_seq).or_insert(0) += i64::from(item.quantity);
    }

    let received = ledger::received_by_line(existing);
    for (line_seq, qty) in requested {
        let line = lines
            .iter()
            .find(|l| l.line_seq == line_seq)
            .ok_or_else(|| {
                ServiceError::not_found(format!("Order {} has no line {}", order_no, line_seq))
            })?;
        let got = received.get(&line_seq).copied().unwrap_or(0);
        let remaining = ledger::remaining_quantity(line.ordered_qty, got);
        if qty > remaining {
            warn!(order_no, line_seq, requested = qty, remaining, "Receipt would overshoot order");
            return Err(ServiceError::validation(format!(
                "Line {}: receiving {} exceeds the remaining quantity {} (ordered {}, received {})",
                line_seq, qty, remaining, line.ordered_qty, got
            )));
        }
    }
    Ok(())
}
