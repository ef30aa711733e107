//! Year-scoped order numbers: `<prefix>-<YYYY>-<NNN>`.
//!
//! The next number is always derived from the rows already committed, inside
//! the transaction that inserts the new order. Two creators racing for the
//! same number collide on the `orders` primary key; the loser retries.

use chrono::{Datelike, NaiveDate};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::debug;

use crate::{config::AppConfig, entities::order, errors::ServiceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumberSettings {
    pub prefix: String,
    /// Total attempts, the first included.
    pub max_attempts: u32,
}

impl Default for OrderNumberSettings {
    fn default() -> Self {
        Self {
            prefix: "ORD".to_string(),
            max_attempts: 5,
        }
    }
}

impl From<&AppConfig> for OrderNumberSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            prefix: cfg.order_number_prefix.clone(),
            max_attempts: cfg.order_number_max_attempts,
        }
    }
}

/// `ORD-2024-` for prefix `ORD` and year 2024.
pub fn year_prefix(prefix: &str, year: i32) -> String {
    format!("{}-{:04}-", prefix, year)
}

pub fn format_order_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{}{:03}", year_prefix(prefix, year), sequence)
}

/// Numeric suffix of `order_no` under `year_prefix`, or `None` when the
/// number belongs to another year or its suffix is not purely digits.
pub fn parse_sequence(order_no: &str, year_prefix: &str) -> Option<u32> {
    let suffix = order_no.strip_prefix(year_prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// `max + 1` over the well-formed sequences of `year`, starting at 1.
pub fn next_order_number<'a>(
    prefix: &str,
    year: i32,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let scope = year_prefix(prefix, year);
    let max = existing
        .into_iter()
        .filter_map(|no| parse_sequence(no, &scope))
        .max()
        .unwrap_or(0);
    format_order_number(prefix, year, max.saturating_add(1))
}

/// Reads the committed numbers for the order date's year and returns the
/// next one. Must run on the same transaction that inserts the order.
pub async fn allocate<C: ConnectionTrait>(
    conn: &C,
    prefix: &str,
    order_date: NaiveDate,
) -> Result<String, ServiceError> {
    let year = order_date.year();
    let scope = year_prefix(prefix, year);

    let existing: Vec<String> = order::Entity::find()
        .select_only()
        .column(order::Column::OrderNo)
        .filter(order::Column::OrderNo.starts_with(scope.as_str()))
        .into_tuple()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let next = next_order_number(prefix, year, existing.iter().map(String::as_str));
    debug!(order_no = %next, scanned = existing.len(), "Allocated order number");
    Ok(next)
}
