use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shipping plan status. Only ever moves forward:
/// planned -> instructed -> completed.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShippingPlanStatus {
    #[sea_orm(string_value = "planned")]
    Planned,
    #[sea_orm(string_value = "instructed")]
    Instructed,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// One shipment intent against an order line. The quantity never changes
/// after insert; corrections are new rows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_plans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub plan_id: i32,
    pub order_no: String,
    pub line_seq: i32,
    pub planned_qty: i32,
    pub planned_shipping_date: NaiveDate,
    pub status: ShippingPlanStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub instructed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderNo",
        to = "super::order::Column::OrderNo"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
