//! Turns parsed spreadsheet rows into order line inputs.
//!
//! Reading the workbook happens upstream; rows arrive here already split
//! into cells. Problems are reported per row so the uploader can fix the
//! sheet in one pass.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::{
    entities::item,
    errors::ServiceError,
    services::{catalog::CatalogReader, orders::OrderLineInput},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    /// Sheet row, for messages.
    pub row_number: u32,
    pub item_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub planned_shipping_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportIssue {
    pub row_number: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub lines: Vec<OrderLineInput>,
    pub errors: Vec<ImportIssue>,
    pub warnings: Vec<ImportIssue>,
}

impl ImportOutcome {
    /// Lines are only usable when no row failed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.lines.is_empty()
    }
}

/// Resolves rows against the active catalog.
#[instrument(skip(catalog, rows), fields(rows = rows.len()))]
pub async fn resolve_import(
    catalog: &dyn CatalogReader,
    rows: &[ImportRow],
) -> Result<ImportOutcome, ServiceError> {
    let items = catalog.list_active_items().await?;
    let outcome = resolve_rows(&items, rows);
    info!(
        lines = outcome.lines.len(),
        errors = outcome.errors.len(),
        warnings = outcome.warnings.len(),
        "Import rows resolved"
    );
    Ok(outcome)
}

/// Item names are matched exactly after trimming. The catalog price always
/// wins over a differing sheet price.
pub fn resolve_rows(items: &[item::Model], rows: &[ImportRow]) -> ImportOutcome {
    let by_name: HashMap<&str, &item::Model> =
        items.iter().map(|i| (i.item_name.as_str(), i)).collect();
    let mut outcome = ImportOutcome::default();

    for row in rows {
        let name = row.item_name.trim();
        if name.is_empty() {
            outcome.errors.push(issue(row, "item name is empty".to_string()));
            continue;
        }
        let Some(item) = by_name.get(name) else {
            outcome
                .errors
                .push(issue(row, format!("unknown item '{}'", name)));
            continue;
        };
        let quantity = match i32::try_from(row.quantity) {
            Ok(q) if q > 0 => q,
            _ => {
                outcome
                    .errors
                    .push(issue(row, format!("quantity {} must be a positive whole number", row.quantity)));
                continue;
            }
        };

        if let Some(sheet_price) = row.unit_price {
            if sheet_price != item.unit_price {
                outcome.warnings.push(issue(
                    row,
                    format!(
                        "sheet price {} differs from catalog price {} for '{}'; using catalog price",
                        sheet_price, item.unit_price, item.item_name
                    ),
                ));
            }
        }

        outcome.lines.push(OrderLineInput {
            item_code: item.item_code.clone(),
            quantity,
            unit_price: Some(item.unit_price),
            planned_shipping_date: row.planned_shipping_date,
        });
    }
    outcome
}

fn issue(row: &ImportRow, message: String) -> ImportIssue {
    ImportIssue {
        row_number: row.row_number,
        message,
    }
}
