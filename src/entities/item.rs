use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog entry. The lifecycle engine only ever reads active items.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item_master")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub item_code: String,
    #[sea_orm(unique)]
    pub item_name: String,
    /// Minimum days between the order date and the earliest deliverable date.
    pub lead_time_days: i32,
    pub unit_price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Earliest date this item can be delivered for an order placed on `order_date`.
    pub fn earliest_delivery_date(&self, order_date: NaiveDate) -> NaiveDate {
        let days = u64::try_from(self.lead_time_days).unwrap_or(0);
        order_date
            .checked_add_days(chrono::Days::new(days))
            .unwrap_or(order_date)
    }
}
