//! Quantity arithmetic over the append-only ledgers.
//!
//! Nothing here is cached: every figure is a sum over receipt and shipping
//! plan rows handed in by the caller, usually read inside the same
//! transaction that acts on the result.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{order_line, receipt, shipping_plan};

/// Received / planned / shipped / available figures for one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineInventory {
    /// Sum of all receipts for the line.
    pub received: i64,
    /// Sum of plans still `planned` or `instructed`.
    pub planned: i64,
    /// Sum of `completed` plans.
    pub shipped: i64,
    /// `received - planned - shipped`.
    pub available: i64,
}

impl LineInventory {
    pub fn from_ledgers<'a>(
        receipts: impl IntoIterator<Item = &'a receipt::Model>,
        plans: impl IntoIterator<Item = &'a shipping_plan::Model>,
    ) -> Self {
        let received = receipts
            .into_iter()
            .map(|r| i64::from(r.received_qty))
            .sum::<i64>();

        let (mut planned, mut shipped) = (0i64, 0i64);
        for plan in plans {
            if plan.status.is_open() {
                planned += i64::from(plan.planned_qty);
            } else {
                shipped += i64::from(plan.planned_qty);
            }
        }

        Self {
            received,
            planned,
            shipped,
            available: received - planned - shipped,
        }
    }
}

/// Order-level receiving progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceiptProgress {
    pub ordered: i64,
    pub received: i64,
    /// `received / ordered * 100`, 0 for an order without lines.
    pub progress: f64,
}

impl ReceiptProgress {
    pub fn compute(lines: &[order_line::Model], receipts: &[receipt::Model]) -> Self {
        let ordered: i64 = lines.iter().map(|l| i64::from(l.ordered_qty)).sum();
        let received: i64 = receipts.iter().map(|r| i64::from(r.received_qty)).sum();
        let progress = if ordered > 0 {
            received as f64 / ordered as f64 * 100.0
        } else {
            0.0
        };
        Self {
            ordered,
            received,
            progress,
        }
    }
}

/// Sum of received quantity per line sequence.
pub fn received_by_line(receipts: &[receipt::Model]) -> HashMap<i32, i64> {
    let mut totals = HashMap::new();
    for r in receipts {
        *totals.entry(r.line_seq).or_insert(0) += i64::from(r.received_qty);
    }
    totals
}

/// Quantity still to be received on a line, never negative.
pub fn remaining_quantity(ordered: i32, received: i64) -> i64 {
    (i64::from(ordered) - received).max(0)
}

/// True when every line's received total reaches its ordered quantity.
pub fn all_lines_received(lines: &[order_line::Model], received: &HashMap<i32, i64>) -> bool {
    !lines.is_empty()
        && lines.iter().all(|line| {
            received.get(&line.line_seq).copied().unwrap_or(0) >= i64::from(line.ordered_qty)
        })
}

/// True when every line's cumulative shipped quantity reaches its ordered quantity.
pub fn all_lines_shipped(lines: &[order_line::Model]) -> bool {
    !lines.is_empty() && lines.iter().all(order_line::Model::is_fully_shipped)
}
