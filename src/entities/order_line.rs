use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ordered item within an order.
///
/// `item_code`, `item_name` and `unit_price` are snapshots taken when the
/// order was placed; later catalog edits never reach existing lines.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_no: String,
    /// Starts at 1 within each order.
    #[sea_orm(primary_key, auto_increment = false)]
    pub line_seq: i32,
    pub item_code: String,
    pub item_name: String,
    pub ordered_qty: i32,
    pub unit_price: Decimal,
    /// Cumulative quantity confirmed as received by the client.
    pub shipped_qty: i32,
    /// Always `shipped_qty * unit_price`.
    pub shipped_amount: Decimal,
    pub planned_shipping_date: Option<NaiveDate>,
    /// Date of the first shipment confirmation.
    pub actual_shipping_date: Option<NaiveDate>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderNo",
        to = "super::order::Column::OrderNo",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Ordered value of the line.
    pub fn line_amount(&self) -> Decimal {
        self.unit_price * Decimal::from(self.ordered_qty)
    }

    pub fn is_fully_shipped(&self) -> bool {
        self.shipped_qty >= self.ordered_qty
    }
}
